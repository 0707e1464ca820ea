//! Markdown render pipeline: Markdown → sanitised HTML with typeset math.
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Parse     GFM tables, strikethrough, task lists, footnotes;
//!  │               soft line breaks become hard breaks
//!  ├─ 2. Sanitise  raw HTML demoted to text, script-capable URLs neutralised
//!  └─ 3. Math      $..$ / $$..$$ events, then \(..\) / \[..\] in the text
//! ```
//!
//! Rendering is a pure function of its input: the same Markdown always gives
//! the same [`RenderedMarkdown`]. Math failures never abort a render; they
//! are logged and collected as [`RenderWarning`]s.

pub mod math;
pub mod sanitize;

use crate::error::RenderWarning;
use math::{MathMlTypesetter, MathTypesetter};
use pulldown_cmark::{html, Event, Options, Parser};
use std::sync::Arc;
use tracing::debug;

/// Output of one render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub warnings: Vec<RenderWarning>,
}

impl RenderedMarkdown {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Stateless renderer; cheap to clone.
#[derive(Clone)]
pub struct MarkdownRenderer {
    typesetter: Arc<dyn MathTypesetter>,
}

impl std::fmt::Debug for MarkdownRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownRenderer").finish_non_exhaustive()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Renderer typesetting math as MathML.
    pub fn new() -> Self {
        Self::with_typesetter(MathMlTypesetter)
    }

    pub fn with_typesetter(typesetter: impl MathTypesetter + 'static) -> Self {
        Self {
            typesetter: Arc::new(typesetter),
        }
    }

    /// Render `content`. Absent or empty content gives an empty result.
    pub fn render(&self, content: Option<&str>) -> RenderedMarkdown {
        let Some(source) = content.filter(|s| !s.is_empty()) else {
            return RenderedMarkdown::default();
        };

        let typesetter = self.typesetter.as_ref();
        let mut warnings = Vec::new();
        let events: Vec<Event<'_>> = Parser::new_ext(source, parser_options())
            .map(|event| match event {
                Event::SoftBreak => Event::HardBreak,
                other => sanitize::sanitize_event(other),
            })
            .map(|event| math::typeset_event(event, typesetter, &mut warnings))
            .collect();

        let mut raw = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut raw, events.into_iter());
        let html = math::typeset_delimited(&raw, typesetter, &mut warnings);

        debug!(
            "Rendered {} bytes of Markdown into {} bytes of HTML ({} math warnings)",
            source.len(),
            html.len(),
            warnings.len()
        );
        RenderedMarkdown { html, warnings }
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_MATH
}

/// A rendered view bound to changing content.
///
/// Every [`MarkdownPreview::update`] re-renders from scratch and replaces the
/// previous output wholesale.
#[derive(Debug, Clone, Default)]
pub struct MarkdownPreview {
    renderer: MarkdownRenderer,
    source: Option<String>,
    output: RenderedMarkdown,
}

impl MarkdownPreview {
    pub fn new(renderer: MarkdownRenderer) -> Self {
        Self {
            renderer,
            source: None,
            output: RenderedMarkdown::default(),
        }
    }

    pub fn update(&mut self, content: Option<&str>) -> &RenderedMarkdown {
        self.output = self.renderer.render(content);
        self.source = content.map(str::to_string);
        &self.output
    }

    pub fn clear(&mut self) {
        self.update(None);
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn html(&self) -> &str {
        &self.output.html
    }

    pub fn output(&self) -> &RenderedMarkdown {
        &self.output
    }
}
