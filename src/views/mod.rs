//! The four views of the application.
//!
//! Each view owns its own transient state and talks to the service only
//! through an `Arc<dyn Backend>`. Cross-view effects (loading a history item
//! into the conversion view, resetting it) go through [`crate::app::App`].

pub mod conversion;
pub mod history;
pub mod notes;
pub mod settings;

pub use conversion::ConversionView;
pub use history::HistoryView;
pub use notes::NotesView;
pub use settings::{Setting, SettingsView, Toggle};

use crate::error::DocIntelliError;
use crate::gateway::Backend;
use bytes::Bytes;
use tracing::error;

/// Ask the service for a DOCX rendition of `markdown`.
///
/// Empty Markdown is refused locally without a request.
pub async fn generate_docx(backend: &dyn Backend, markdown: &str) -> Result<Bytes, DocIntelliError> {
    if markdown.is_empty() {
        return Err(DocIntelliError::EmptyDocument);
    }
    backend.convert_to_docx(markdown).await.map_err(|e| {
        error!("DOCX generation failed: {}", e);
        e
    })
}
