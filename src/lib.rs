//! # docintelli
//!
//! Client core and terminal front end for the DocIntelli conversion service.
//!
//! ## Why this crate?
//!
//! The conversion service does all the heavy lifting (PDF parsing, OCR, AI
//! analysis, Markdown and DOCX generation) and exposes it over a small HTTP
//! API. This crate is everything on the client side of that API: a typed
//! gateway, the processing session that paces the six-step progress display
//! around the real request, a Markdown renderer that sanitises output and
//! typesets math, revocable display handles for binary content, and the four
//! views (conversion, history, notes, settings) tied together by an app shell.
//!
//! ## Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Intake    validate %PDF magic + upload limit, create display handle
//!  ├─ 2. Session   six paced steps; step 4 waits on the real request
//!  ├─ 3. Gateway   POST /convert (AI) or /convert_raw, multipart file + ocr
//!  ├─ 4. Render    Markdown → sanitised HTML → typeset math
//!  └─ 5. Export    Download MD, or DOCX via /convert_md_to_docx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docintelli::{App, ClientConfig, NoopObserver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://127.0.0.1:9898")
//!         .build()?;
//!     let mut app = App::connect(config)?;
//!
//!     app.select_path("paper.pdf").await?;
//!     let markdown = app.process(&NoopObserver).await?.to_string();
//!     println!("{markdown}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docintelli` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docintelli = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod handles;
pub mod history;
pub mod input;
pub mod progress;
pub mod render;
pub mod session;
pub mod storage;
pub mod views;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use app::{App, AppEvent, AppState, DisplayedDocument, DocumentSource, LoadedItem, View};
pub use config::{ClientConfig, ClientConfigBuilder, FeatureFlags, StepPacing};
pub use error::{DocIntelliError, RenderWarning, UserMessage};
pub use gateway::{Backend, HttpGateway};
pub use handles::{DisplayHandle, HandleRegistry, HandleSlot};
pub use history::{HistoryEntry, HistoryFile};
pub use input::PdfFile;
pub use progress::{NoopObserver, ProcessingObserver, SharedObserver};
pub use render::math::{MathMlTypesetter, MathTypesetter};
pub use render::{MarkdownPreview, MarkdownRenderer, RenderedMarkdown};
pub use session::{ProcessingSession, ProcessingStep, SessionPhase, StepKind, StepList, StepStatus};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use views::{ConversionView, HistoryView, NotesView, SettingsView};
