//! Error types for the docintelli client.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocIntelliError`]: **Fatal** for the current attempt: the backend is
//!   unreachable, answered with a non-2xx status, or the local input is
//!   unusable. Returned as `Err(DocIntelliError)` and surfaced by the calling
//!   view as a single generic message.
//!
//! * [`RenderWarning`]: **Non-fatal**: one math span could not be typeset.
//!   Stored inside [`crate::render::RenderedMarkdown`]; the surrounding
//!   Markdown still renders.
//!
//! Raw error detail (status text, response body) is meant for logs only. Views
//! never show it to the end user; see [`UserMessage`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docintelli library.
#[derive(Debug, Error)]
pub enum DocIntelliError {
    // ── Transport errors ──────────────────────────────────────────────────
    /// No response was received (connection refused, DNS, TLS, timeout…).
    #[error("Network error calling '{endpoint}': {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-2xx status.
    #[error("Request to '{endpoint}' failed with {status} {status_text}: {body}")]
    RequestFailed {
        endpoint: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// A 2xx response whose payload could not be decoded.
    #[error("Invalid response from '{endpoint}': {detail}")]
    InvalidResponse { endpoint: String, detail: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// `start` was called while a conversion is still in flight.
    #[error("A conversion is already in progress for this session")]
    AlreadyInProgress,

    /// An action needs a freshly uploaded document and none is selected.
    #[error("No document selected")]
    NoDocument,

    /// An export was requested for empty Markdown.
    #[error("Nothing to export: the document is empty")]
    EmptyDocument,

    /// The selected history entry does not reference a PDF conversion.
    #[error("History entry '{filename}' is not a PDF conversion")]
    NotLoadable { filename: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file exceeds the configured upload limit.
    #[error("File '{path}' is {size} bytes; the upload limit is {limit} bytes")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Session storage could not be read or written.
    #[error("Session storage failed for key '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an exported file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocIntelliError {
    /// HTTP status carried by a [`DocIntelliError::RequestFailed`].
    pub fn status(&self) -> Option<u16> {
        match self {
            DocIntelliError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures that happened on the wire rather than locally.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            DocIntelliError::Network { .. }
                | DocIntelliError::RequestFailed { .. }
                | DocIntelliError::InvalidResponse { .. }
        )
    }
}

/// Fixed, user-facing messages shown by the views.
///
/// The wording never includes status codes or response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    ProcessingFailed,
    HistoryUnavailable,
    HistoryItemUnavailable,
    DocxFailed,
}

impl UserMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            UserMessage::ProcessingFailed => {
                "An error occurred during processing. Please try again."
            }
            UserMessage::HistoryUnavailable => "Failed to load conversion history.",
            UserMessage::HistoryItemUnavailable => "Could not load the selected history item.",
            UserMessage::DocxFailed => {
                "Failed to generate DOCX file. Please ensure the conversion server is running."
            }
        }
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal math typesetting failure.
///
/// The offending span is left in the output as its original (escaped) TeX.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderWarning {
    pub tex: String,
    pub display: bool,
    pub detail: String,
}

impl std::fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.display { "display" } else { "inline" };
        write!(f, "Could not typeset {mode} math '{}': {}", self.tex, self.detail)
    }
}

impl std::error::Error for RenderWarning {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display() {
        let e = DocIntelliError::RequestFailed {
            endpoint: "/convert".into(),
            status: 500,
            status_text: "Internal Server Error".into(),
            body: "oops".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"), "got: {msg}");
        assert!(msg.contains("oops"), "got: {msg}");
        assert_eq!(e.status(), Some(500));
        assert!(e.is_backend_failure());
    }

    #[test]
    fn user_messages_carry_no_detail() {
        for m in [
            UserMessage::ProcessingFailed,
            UserMessage::HistoryUnavailable,
            UserMessage::HistoryItemUnavailable,
            UserMessage::DocxFailed,
        ] {
            assert!(!m.as_str().contains("500"));
            assert!(!m.to_string().is_empty());
        }
    }

    #[test]
    fn local_errors_are_not_backend_failures() {
        assert!(!DocIntelliError::AlreadyInProgress.is_backend_failure());
        assert!(!DocIntelliError::NoDocument.is_backend_failure());
        assert_eq!(DocIntelliError::NoDocument.status(), None);
    }

    #[test]
    fn render_warning_display() {
        let w = RenderWarning {
            tex: r"\frac{1}{".into(),
            display: true,
            detail: "unexpected end".into(),
        };
        let msg = w.to_string();
        assert!(msg.contains("display"), "got: {msg}");
        assert!(msg.contains("unexpected end"), "got: {msg}");
    }
}
