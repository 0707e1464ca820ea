//! File intake: turn a user-picked path or dropped bytes into an upload.
//!
//! The upload widget only accepts PDFs, so validation happens here, before
//! any request: the `%PDF` magic bytes must be present and the size must be
//! within the configured limit.

use crate::error::DocIntelliError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF selected for conversion, held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    name: String,
    bytes: Bytes,
}

impl PdfFile {
    /// Build an upload from in-memory bytes (e.g. a drag-and-drop payload).
    ///
    /// `name` is the display name sent as the multipart filename; the service
    /// rejects names that do not end in `.pdf`.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        max_bytes: u64,
    ) -> Result<Self, DocIntelliError> {
        let name = name.into();
        let bytes = bytes.into();
        validate(Path::new(&name), &bytes, max_bytes)?;
        Ok(Self { name, bytes })
    }

    /// Read and validate a local file.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, DocIntelliError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        if meta.len() > max_bytes {
            return Err(DocIntelliError::FileTooLarge {
                path: path.to_path_buf(),
                size: meta.len(),
                limit: max_bytes,
            });
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        validate(path, &bytes, max_bytes)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        debug!("Selected PDF '{}' ({} bytes)", name, bytes.len());
        Ok(Self {
            name,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn validate(path: &Path, bytes: &[u8], max_bytes: u64) -> Result<(), DocIntelliError> {
    if bytes.len() as u64 > max_bytes {
        return Err(DocIntelliError::FileTooLarge {
            path: path.to_path_buf(),
            size: bytes.len() as u64,
            limit: max_bytes,
        });
    }
    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DocIntelliError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn map_io_error(path: &Path, e: std::io::Error) -> DocIntelliError {
    let path: PathBuf = path.to_path_buf();
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocIntelliError::PermissionDenied { path },
        _ => DocIntelliError::FileNotFound { path },
    }
}
