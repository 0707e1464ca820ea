//! Configuration types for the docintelli client.
//!
//! Every knob lives in [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Views and the gateway only ever read it, so one
//! config can be cloned into every component of an [`crate::app::App`].

use crate::error::DocIntelliError;
use once_cell::sync::Lazy;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Address the conversion service listens on when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9898";

/// Upload ceiling advertised by the upload widget (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration shared by the gateway and the views.
///
/// # Example
/// ```rust
/// use docintelli::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:9898")
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url.port(), Some(9898));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address of the conversion service. Default: `http://127.0.0.1:9898`.
    pub base_url: Url,

    /// Whole-request timeout. Default: `None` (transport default, no deadline).
    ///
    /// Conversions of large scanned documents with OCR can take minutes, so
    /// no deadline is imposed unless the caller asks for one.
    pub request_timeout: Option<Duration>,

    /// Cosmetic pacing of the processing steps.
    pub pacing: StepPacing,

    /// Largest PDF accepted for upload, in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Directory backing the session-scoped storage (notes).
    /// Default: `$TMPDIR/docintelli-session`.
    pub session_dir: PathBuf,

    /// Feature flags a fresh [`crate::app::AppState`] starts with.
    pub default_flags: FeatureFlags,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.clone(),
            request_timeout: None,
            pacing: StepPacing::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_dir: std::env::temp_dir().join("docintelli-session"),
            default_flags: FeatureFlags::default(),
        }
    }
}

static DEFAULT_URL: Lazy<Url> = Lazy::new(|| Url::parse(DEFAULT_BASE_URL).unwrap());

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            base_url: None,
        }
    }

    /// Resolve a service path (e.g. `/convert` or a `pdf_url` returned by
    /// `/get_file`) against the base address.
    ///
    /// The path is appended to the base path, so a service mounted under a
    /// prefix (`http://host/api`) is reached at `http://host/api/convert`.
    /// Query strings on `path` are kept.
    pub fn endpoint(&self, path: &str) -> Result<Url, DocIntelliError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| DocIntelliError::InvalidConfig(format!("cannot join '{path}': {e}")))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    base_url: Option<String>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn pacing(mut self, pacing: StepPacing) -> Self {
        self.config.pacing = pacing;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.session_dir = dir.into();
        self
    }

    pub fn default_flags(mut self, flags: FeatureFlags) -> Self {
        self.config.default_flags = flags;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, DocIntelliError> {
        if let Some(raw) = self.base_url.take() {
            let url = Url::parse(raw.trim()).map_err(|e| {
                DocIntelliError::InvalidConfig(format!("base URL '{raw}' is invalid: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(DocIntelliError::InvalidConfig(format!(
                    "base URL must be http or https, got '{}'",
                    url.scheme()
                )));
            }
            self.config.base_url = url;
        }
        if self.config.max_upload_bytes == 0 {
            return Err(DocIntelliError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if self.config.request_timeout == Some(Duration::ZERO) {
            return Err(DocIntelliError::InvalidConfig(
                "Request timeout must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Flags & pacing ───────────────────────────────────────────────────────

/// The two processing toggles exposed by the settings view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Ask the backend to OCR scanned pages. Default: off.
    pub ocr: bool,
    /// Use the AI-assisted `/convert` endpoint instead of `/convert_raw`. Default: on.
    pub ai_summarization: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            ocr: false,
            ai_summarization: true,
        }
    }
}

/// Fixed delays that pace the processing steps.
///
/// The backend returns only a final result, so these timers are purely
/// visual. The AI-analysis step has no timer: it lasts exactly as long as the
/// real request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPacing {
    pub parse: Duration,
    pub extract: Duration,
    pub detect_formulas: Duration,
    pub formulas_to_latex: Duration,
    pub generate_markdown: Duration,
}

impl Default for StepPacing {
    fn default() -> Self {
        Self {
            parse: Duration::from_millis(300),
            extract: Duration::from_millis(400),
            detect_formulas: Duration::from_millis(300),
            formulas_to_latex: Duration::from_millis(300),
            generate_markdown: Duration::from_millis(200),
        }
    }
}

impl StepPacing {
    /// No artificial delays; steps advance as fast as the request allows.
    pub fn immediate() -> Self {
        Self {
            parse: Duration::ZERO,
            extract: Duration::ZERO,
            detect_formulas: Duration::ZERO,
            formulas_to_latex: Duration::ZERO,
            generate_markdown: Duration::ZERO,
        }
    }
}
