//! History view: past sessions, most recent first.

use crate::error::{DocIntelliError, UserMessage};
use crate::gateway::Backend;
use crate::history::{sort_by_recency, HistoryEntry};
use std::sync::Arc;
use tracing::{error, info};

pub struct HistoryView {
    backend: Arc<dyn Backend>,
    entries: Vec<HistoryEntry>,
    loaded: bool,
    error: Option<UserMessage>,
}

impl HistoryView {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            entries: Vec::new(),
            loaded: false,
            error: None,
        }
    }

    /// Fetch the list from the service and sort it by recency.
    pub async fn load(&mut self) -> Result<&[HistoryEntry], DocIntelliError> {
        self.error = None;
        match self.backend.list_history().await {
            Ok(mut entries) => {
                sort_by_recency(&mut entries);
                info!("Loaded {} history entries", entries.len());
                self.entries = entries;
                self.loaded = true;
                Ok(&self.entries)
            }
            Err(e) => {
                error!("Failed to load history: {}", e);
                self.entries.clear();
                self.loaded = true;
                self.error = Some(UserMessage::HistoryUnavailable);
                Err(e)
            }
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// True until the first [`Self::load`] settles.
    pub fn is_loading(&self) -> bool {
        !self.loaded
    }

    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }

    /// Filename to request for the entry at `index`.
    ///
    /// Only PDF conversions can be reopened.
    pub fn selection(&self, index: usize) -> Result<&str, DocIntelliError> {
        let entry = self.entries.get(index).ok_or_else(|| {
            DocIntelliError::Internal(format!(
                "history index {index} out of range ({} entries)",
                self.entries.len()
            ))
        })?;
        if !entry.is_pdf_conversion() {
            return Err(DocIntelliError::NotLoadable {
                filename: entry.filename.clone(),
            });
        }
        Ok(&entry.filename)
    }
}
