//! Notes view: a Markdown scratchpad saved to session storage on every edit.

use super::generate_docx;
use crate::error::{DocIntelliError, UserMessage};
use crate::gateway::Backend;
use crate::render::{MarkdownPreview, MarkdownRenderer, RenderedMarkdown};
use crate::storage::SessionStorage;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

/// Storage key of the notes document.
pub const NOTES_KEY: &str = "docintelli-notes-content";

/// Content shown when nothing has been saved yet.
pub const DEFAULT_NOTES: &str = "# My Notes\n\nStart typing your markdown notes here...";

pub struct NotesView {
    storage: Arc<dyn SessionStorage>,
    backend: Arc<dyn Backend>,
    content: String,
    preview: MarkdownPreview,
    error: Option<UserMessage>,
}

impl NotesView {
    /// Open the view, restoring saved notes or falling back to the default text.
    pub fn open(
        storage: Arc<dyn SessionStorage>,
        backend: Arc<dyn Backend>,
        renderer: MarkdownRenderer,
    ) -> Self {
        let content = match storage.get(NOTES_KEY) {
            Ok(Some(saved)) => saved,
            Ok(None) => DEFAULT_NOTES.to_string(),
            Err(e) => {
                warn!("Could not restore notes, starting from default: {}", e);
                DEFAULT_NOTES.to_string()
            }
        };
        let mut preview = MarkdownPreview::new(renderer);
        preview.update(Some(&content));
        Self {
            storage,
            backend,
            content,
            preview,
            error: None,
        }
    }

    /// Replace the notes and save them.
    pub fn edit(&mut self, content: impl Into<String>) -> Result<(), DocIntelliError> {
        self.content = content.into();
        self.preview.update(Some(&self.content));
        self.storage.set(NOTES_KEY, &self.content)
    }

    /// Forget the saved notes; the view returns to the default text.
    pub fn discard(&mut self) -> Result<(), DocIntelliError> {
        self.storage.remove(NOTES_KEY)?;
        self.content = DEFAULT_NOTES.to_string();
        self.preview.update(Some(&self.content));
        Ok(())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn rendered(&self) -> &RenderedMarkdown {
        self.preview.output()
    }

    /// The DOCX action is unavailable for empty notes.
    pub fn can_export_docx(&self) -> bool {
        !self.content.is_empty()
    }

    pub async fn export_docx(&mut self) -> Result<Bytes, DocIntelliError> {
        self.error = None;
        match generate_docx(self.backend.as_ref(), &self.content).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if e.is_backend_failure() {
                    self.error = Some(UserMessage::DocxFailed);
                }
                Err(e)
            }
        }
    }

    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }
}
