//! Download actions: write Markdown or DOCX to disk.

use crate::error::DocIntelliError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default name of the "Download MD" action.
pub const MARKDOWN_FILE_NAME: &str = "extracted-document.md";
/// Default name of the "Download DOCX" action.
pub const DOCX_FILE_NAME: &str = "extracted-document.docx";
/// Default name of the notes DOCX export.
pub const NOTES_DOCX_FILE_NAME: &str = "my-notes.docx";

pub const MARKDOWN_MIME: &str = "text/markdown";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";

/// `path`, or `default_name` in the current directory.
pub fn output_path(path: Option<&Path>, default_name: &str) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default_name))
}

/// Write `bytes` to `path` atomically (temp file + rename).
///
/// Missing parent directories are created.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocIntelliError> {
    let fail = |source| DocIntelliError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Save Markdown. Empty documents are refused.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<(), DocIntelliError> {
    if markdown.is_empty() {
        return Err(DocIntelliError::EmptyDocument);
    }
    write_atomic(path, markdown.as_bytes()).await
}
