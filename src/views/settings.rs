//! Settings view: the two processing toggles.
//!
//! The flags themselves live in [`crate::app::AppState`]; this view only
//! describes them and turns a toggle into an [`AppEvent`].

use crate::app::AppEvent;
use crate::config::FeatureFlags;
use serde::Serialize;

pub const TITLE: &str = "Settings";
pub const SUBTITLE: &str = "Configure application behavior";

/// One of the two feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Setting {
    Ocr,
    AiSummarization,
}

impl Setting {
    pub const ALL: [Setting; 2] = [Setting::Ocr, Setting::AiSummarization];

    pub fn section(self) -> &'static str {
        match self {
            Setting::Ocr => "PDF Processing",
            Setting::AiSummarization => "AI Features",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Setting::Ocr => "Enable OCR",
            Setting::AiSummarization => "AI Summarization",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Setting::Ocr => {
                "Use Optical Character Recognition for scanned documents. May increase processing time."
            }
            Setting::AiSummarization => {
                "Use AI to analyze content structure and rewrite it for better readability and coherence."
            }
        }
    }

    pub fn value(self, flags: FeatureFlags) -> bool {
        match self {
            Setting::Ocr => flags.ocr,
            Setting::AiSummarization => flags.ai_summarization,
        }
    }

    /// Event that sets this flag to `enabled`.
    pub fn event(self, enabled: bool) -> AppEvent {
        match self {
            Setting::Ocr => AppEvent::SetOcr(enabled),
            Setting::AiSummarization => AppEvent::SetAiSummarization(enabled),
        }
    }
}

/// A toggle as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toggle {
    pub setting: Setting,
    pub section: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsView;

impl SettingsView {
    pub fn new() -> Self {
        Self
    }

    pub fn toggles(&self, flags: FeatureFlags) -> Vec<Toggle> {
        Setting::ALL
            .into_iter()
            .map(|setting| Toggle {
                setting,
                section: setting.section(),
                label: setting.label(),
                description: setting.description(),
                enabled: setting.value(flags),
            })
            .collect()
    }

    /// Event flipping `setting` relative to `flags`.
    pub fn toggle(&self, setting: Setting, flags: FeatureFlags) -> AppEvent {
        setting.event(!setting.value(flags))
    }
}
