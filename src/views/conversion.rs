//! Conversion view: one freshly uploaded PDF, its processing session and the
//! resulting Markdown.
//!
//! A loaded history item is displayed by the [`crate::app::App`] instead of
//! this view's own document; the app clears this view before loading one.

use crate::config::{ClientConfig, FeatureFlags};
use crate::error::{DocIntelliError, UserMessage};
use crate::export::PDF_MIME;
use crate::gateway::Backend;
use crate::handles::{HandleRegistry, HandleSlot};
use crate::input::PdfFile;
use crate::progress::ProcessingObserver;
use crate::render::{MarkdownPreview, MarkdownRenderer, RenderedMarkdown};
use crate::session::{ProcessingSession, StepList};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct ConversionView {
    backend: Arc<dyn Backend>,
    registry: HandleRegistry,
    max_upload_bytes: u64,
    file: Option<PdfFile>,
    pdf: HandleSlot,
    session: ProcessingSession,
    preview: MarkdownPreview,
    error: Option<UserMessage>,
}

impl ConversionView {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: HandleRegistry,
        renderer: MarkdownRenderer,
        config: &ClientConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            max_upload_bytes: config.max_upload_bytes,
            file: None,
            pdf: HandleSlot::new(),
            session: ProcessingSession::new(config.pacing),
            preview: MarkdownPreview::new(renderer),
            error: None,
        }
    }

    /// Make `file` the active document.
    ///
    /// Any previous document, result and error are discarded and its display
    /// handle released.
    pub fn select_file(&mut self, file: PdfFile) {
        info!("Selected '{}' ({} bytes)", file.name(), file.len());
        self.clear();
        self.pdf
            .replace(self.registry.create(file.bytes().clone(), PDF_MIME));
        self.file = Some(file);
    }

    /// Read, validate and select a local PDF.
    pub async fn select_path(&mut self, path: impl AsRef<Path>) -> Result<(), DocIntelliError> {
        let file = PdfFile::from_path(path, self.max_upload_bytes).await?;
        self.select_file(file);
        Ok(())
    }

    /// Process is offered only for a fresh upload with no result yet.
    pub fn can_process(&self) -> bool {
        self.file.is_some() && self.session.markdown().is_none() && !self.is_loading()
    }

    /// Convert the selected file with `flags`.
    ///
    /// On failure the view shows the generic processing message; the
    /// returned error carries the detail.
    pub async fn process(
        &mut self,
        flags: FeatureFlags,
        observer: &dyn ProcessingObserver,
    ) -> Result<&str, DocIntelliError> {
        let file = self.file.clone().ok_or(DocIntelliError::NoDocument)?;
        self.error = None;
        self.preview.clear();

        let outcome = self
            .session
            .run(self.backend.as_ref(), &file, flags, observer)
            .await;
        match outcome {
            Ok(()) => {
                self.preview.update(self.session.markdown());
                Ok(self.session.markdown().unwrap_or_default())
            }
            Err(e) => {
                if !matches!(e, DocIntelliError::AlreadyInProgress) {
                    self.error = self.session.error();
                }
                Err(e)
            }
        }
    }

    /// Drop the document, its handle and any result.
    pub fn reset(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.file = None;
        self.pdf.release();
        self.session.reset();
        self.preview.clear();
        self.error = None;
    }

    pub fn file(&self) -> Option<&PdfFile> {
        self.file.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.as_ref().map(PdfFile::name)
    }

    /// Display reference of the uploaded PDF.
    pub fn pdf_url(&self) -> Option<String> {
        self.pdf.url()
    }

    pub fn markdown(&self) -> Option<&str> {
        self.session.markdown()
    }

    pub fn rendered(&self) -> &RenderedMarkdown {
        self.preview.output()
    }

    pub fn steps(&self) -> &StepList {
        self.session.steps()
    }

    pub fn session(&self) -> &ProcessingSession {
        &self.session
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_running()
    }

    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }
}
