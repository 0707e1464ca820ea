//! Backend gateway: the typed boundary to the conversion service.
//!
//! Views never build requests themselves. They hold an
//! `Arc<dyn Backend>` and call one of the operations below; tests swap in an
//! in-memory implementation.
//!
//! ## Endpoints
//!
//! ```text
//! POST /convert             multipart file + ocr   → Markdown (raw bytes)
//! POST /convert_raw         multipart file + ocr   → Markdown (raw bytes)
//! POST /convert_md_to_docx  multipart file (.md)   → DOCX bytes
//! GET  /history                                    → [HistoryEntry]
//! GET  /get_file?filename=…                        → HistoryFile
//! GET  <pdf_url>                                   → PDF bytes
//! ```
//!
//! There is no caching and no retry at this layer: every failure is terminal
//! for the attempt and comes back as a [`DocIntelliError`].

pub mod http;

use crate::error::DocIntelliError;
use crate::history::{HistoryEntry, HistoryFile};
use crate::input::PdfFile;
use async_trait::async_trait;
use bytes::Bytes;

pub use http::HttpGateway;

/// Path of the AI-assisted conversion endpoint.
pub const CONVERT_PATH: &str = "/convert";
/// Path of the conversion endpoint without AI summarisation.
pub const CONVERT_RAW_PATH: &str = "/convert_raw";
/// Path of the Markdown→DOCX endpoint.
pub const DOCX_PATH: &str = "/convert_md_to_docx";
/// Path of the history listing.
pub const HISTORY_PATH: &str = "/history";
/// Path of the single history record lookup.
pub const GET_FILE_PATH: &str = "/get_file";

/// Select the conversion endpoint for the AI flag.
pub fn convert_path(use_ai: bool) -> &'static str {
    if use_ai {
        CONVERT_PATH
    } else {
        CONVERT_RAW_PATH
    }
}

/// Operations offered by the conversion service.
///
/// Implementations must be `Send + Sync`: the terminal front end shares one
/// gateway between views behind an `Arc`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Convert a PDF to Markdown via `/convert` (`use_ai`) or `/convert_raw`.
    async fn convert(&self, file: &PdfFile, ocr: bool, use_ai: bool)
        -> Result<String, DocIntelliError>;

    /// Convert Markdown to a DOCX document.
    async fn convert_to_docx(&self, markdown: &str) -> Result<Bytes, DocIntelliError>;

    /// List past sessions in service order (unsorted).
    async fn list_history(&self) -> Result<Vec<HistoryEntry>, DocIntelliError>;

    /// Fetch the stored Markdown and PDF reference for one filename.
    async fn fetch_history_file(&self, filename: &str) -> Result<HistoryFile, DocIntelliError>;

    /// Download the original PDF referenced by [`HistoryFile::pdf_url`].
    async fn fetch_pdf(&self, pdf_url: &str) -> Result<Bytes, DocIntelliError>;
}
