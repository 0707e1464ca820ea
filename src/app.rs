//! App shell: the application-state value object and the router that owns
//! the views.
//!
//! [`AppState`] is plain data changed only through [`AppState::reduce`].
//! [`App`] performs the side effects around it (network calls, display
//! handles) and routes cross-view events, so the conversion and history
//! views never reference each other.

use crate::config::{ClientConfig, FeatureFlags};
use crate::error::{DocIntelliError, UserMessage};
use crate::export::{
    output_path, write_atomic, write_markdown, DOCX_FILE_NAME, MARKDOWN_FILE_NAME, PDF_MIME,
};
use crate::gateway::{Backend, HttpGateway};
use crate::handles::{HandleRegistry, HandleSlot};
use crate::input::PdfFile;
use crate::progress::ProcessingObserver;
use crate::render::{MarkdownRenderer, RenderedMarkdown};
use crate::storage::{FileStorage, SessionStorage};
use crate::views::{generate_docx, ConversionView, HistoryView, NotesView, SettingsView};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

// ── State ────────────────────────────────────────────────────────────────

/// The four views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum View {
    #[default]
    Conversion,
    History,
    Notes,
    Settings,
}

impl View {
    pub const ALL: [View; 4] = [View::Conversion, View::History, View::Notes, View::Settings];

    pub fn title(self) -> &'static str {
        match self {
            View::Conversion => "Conversion",
            View::History => "Conversion History",
            View::Notes => "Notes Editor",
            View::Settings => "Settings",
        }
    }
}

/// A history item shown in the conversion view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedItem {
    pub filename: String,
    pub markdown: String,
    /// Display reference of the fetched PDF.
    pub pdf_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    SelectView(View),
    SetOcr(bool),
    SetAiSummarization(bool),
    /// Show a history item; switches to the conversion view.
    LoadHistoryItem(LoadedItem),
    /// Stop showing the loaded history item.
    ClearLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub view: View,
    pub flags: FeatureFlags,
    pub loaded: Option<LoadedItem>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(FeatureFlags::default())
    }
}

impl AppState {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            view: View::Conversion,
            flags,
            loaded: None,
        }
    }

    /// Apply one event.
    #[must_use]
    pub fn reduce(self, event: AppEvent) -> Self {
        match event {
            AppEvent::SelectView(view) => Self { view, ..self },
            AppEvent::SetOcr(ocr) => Self {
                flags: FeatureFlags { ocr, ..self.flags },
                ..self
            },
            AppEvent::SetAiSummarization(ai_summarization) => Self {
                flags: FeatureFlags {
                    ai_summarization,
                    ..self.flags
                },
                ..self
            },
            AppEvent::LoadHistoryItem(item) => Self {
                view: View::Conversion,
                loaded: Some(item),
                ..self
            },
            AppEvent::ClearLoaded => Self {
                loaded: None,
                ..self
            },
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Where the displayed document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Upload,
    History,
}

/// The document the conversion view currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedDocument<'a> {
    pub source: DocumentSource,
    pub filename: &'a str,
    pub pdf_url: Option<String>,
    pub markdown: Option<&'a str>,
}

pub struct App {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    registry: HandleRegistry,
    renderer: MarkdownRenderer,
    state: AppState,
    history_pdf: HandleSlot,
    conversion: ConversionView,
    history: HistoryView,
    notes: NotesView,
    settings: SettingsView,
    notice: Option<UserMessage>,
}

impl App {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let registry = HandleRegistry::new();
        let renderer = MarkdownRenderer::new();
        Self {
            conversion: ConversionView::new(
                backend.clone(),
                registry.clone(),
                renderer.clone(),
                &config,
            ),
            history: HistoryView::new(backend.clone()),
            notes: NotesView::open(storage, backend.clone(), renderer.clone()),
            settings: SettingsView::new(),
            state: AppState::new(config.default_flags),
            history_pdf: HandleSlot::new(),
            notice: None,
            config,
            backend,
            registry,
            renderer,
        }
    }

    /// App talking HTTP to `config.base_url`, with notes under `config.session_dir`.
    pub fn connect(config: ClientConfig) -> Result<Self, DocIntelliError> {
        let backend = Arc::new(HttpGateway::new(config.clone())?);
        let storage = Arc::new(FileStorage::new(config.session_dir.clone()));
        Ok(Self::new(config, backend, storage))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Last app-level failure message (history load, DOCX export).
    pub fn notice(&self) -> Option<UserMessage> {
        self.notice
    }

    pub fn conversion(&self) -> &ConversionView {
        &self.conversion
    }

    pub fn history(&self) -> &HistoryView {
        &self.history
    }

    pub fn notes(&self) -> &NotesView {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut NotesView {
        &mut self.notes
    }

    pub fn settings(&self) -> &SettingsView {
        &self.settings
    }

    /// Apply `event` and release the history handle once nothing refers to it.
    pub fn dispatch(&mut self, event: AppEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = state.reduce(event);
        if self.state.loaded.is_none() {
            self.history_pdf.release();
        }
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Make `file` the active document, replacing any loaded history item.
    pub fn select_file(&mut self, file: PdfFile) {
        self.notice = None;
        self.dispatch(AppEvent::ClearLoaded);
        self.conversion.select_file(file);
    }

    /// Validate and select a local PDF. Invalid files leave the state untouched.
    pub async fn select_path(&mut self, path: impl AsRef<Path>) -> Result<(), DocIntelliError> {
        let file = PdfFile::from_path(path, self.config.max_upload_bytes).await?;
        self.select_file(file);
        Ok(())
    }

    /// Convert the selected upload with the current flags.
    pub async fn process(
        &mut self,
        observer: &dyn ProcessingObserver,
    ) -> Result<&str, DocIntelliError> {
        self.conversion.process(self.state.flags, observer).await
    }

    /// Clear both the upload and any loaded history item.
    pub fn reset(&mut self) {
        self.conversion.reset();
        self.dispatch(AppEvent::ClearLoaded);
        self.notice = None;
    }

    // ── History ──────────────────────────────────────────────────────────

    pub async fn load_history(&mut self) -> Result<(), DocIntelliError> {
        self.history.load().await.map(|_| ())
    }

    /// Fetch a stored conversion and its PDF, then show it.
    ///
    /// On failure nothing changes except [`Self::notice`]: the previously
    /// displayed document and its handle stay as they were.
    pub async fn load_history_item(&mut self, filename: &str) -> Result<(), DocIntelliError> {
        info!("Loading history item '{}'", filename);
        let fetched = async {
            let file = self.backend.fetch_history_file(filename).await?;
            let pdf = self.backend.fetch_pdf(&file.pdf_url).await?;
            Ok::<_, DocIntelliError>((file, pdf))
        }
        .await;
        let (file, pdf) = match fetched {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to load history item '{}': {}", filename, e);
                self.notice = Some(UserMessage::HistoryItemUnavailable);
                return Err(e);
            }
        };

        let handle = self.registry.create(pdf, PDF_MIME);
        let item = LoadedItem {
            filename: file.filename,
            markdown: file.markdown_content,
            pdf_url: handle.url(),
        };
        self.conversion.reset();
        self.history_pdf.replace(handle);
        self.notice = None;
        self.dispatch(AppEvent::LoadHistoryItem(item));
        Ok(())
    }

    // ── Display ──────────────────────────────────────────────────────────

    /// The document to show; a loaded history item wins over an upload.
    pub fn display(&self) -> Option<DisplayedDocument<'_>> {
        if let Some(item) = &self.state.loaded {
            return Some(DisplayedDocument {
                source: DocumentSource::History,
                filename: item.filename.as_str(),
                pdf_url: Some(item.pdf_url.clone()),
                markdown: Some(item.markdown.as_str()),
            });
        }
        let name = self.conversion.file_name()?;
        Some(DisplayedDocument {
            source: DocumentSource::Upload,
            filename: name,
            pdf_url: self.conversion.pdf_url(),
            markdown: self.conversion.markdown(),
        })
    }

    /// Rendered Markdown of the displayed document.
    pub fn rendered(&self) -> RenderedMarkdown {
        self.renderer
            .render(self.display().and_then(|d| d.markdown))
    }

    fn displayed_markdown(&self) -> Result<String, DocIntelliError> {
        self.display()
            .and_then(|d| d.markdown)
            .map(str::to_string)
            .ok_or(DocIntelliError::NoDocument)
    }

    /// "Download MD": save the displayed Markdown.
    pub async fn export_markdown(&self, path: Option<&Path>) -> Result<PathBuf, DocIntelliError> {
        let markdown = self.displayed_markdown()?;
        let path = output_path(path, MARKDOWN_FILE_NAME);
        write_markdown(&path, &markdown).await?;
        Ok(path)
    }

    /// "Download DOCX": convert the displayed Markdown and save it.
    pub async fn export_docx(&mut self, path: Option<&Path>) -> Result<PathBuf, DocIntelliError> {
        let markdown = self.displayed_markdown()?;
        let docx = match generate_docx(self.backend.as_ref(), &markdown).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.is_backend_failure() {
                    self.notice = Some(UserMessage::DocxFailed);
                }
                return Err(e);
            }
        };
        let path = output_path(path, DOCX_FILE_NAME);
        write_atomic(&path, &docx).await?;
        Ok(path)
    }
}
