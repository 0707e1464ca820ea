//! Math typesetting over sanitised output.
//!
//! Two sources of math reach this module:
//!
//! * `$...$` and `$$...$$` arrive as dedicated parser events, so their TeX is
//!   never touched by emphasis or escape rules.
//! * `\(...\)` and `\[...\]` are found in the text of the rendered HTML,
//!   outside `<pre>`, `<code>` and already typeset `<math>` elements. Markdown
//!   consumes a single backslash before punctuation, so the source spells
//!   these `\\(` and `\\[`.
//!
//! A span that fails to typeset is kept as its original text and reported
//! as a [`RenderWarning`].

use super::sanitize::is_safe_fragment;
use crate::error::RenderWarning;
use latex2mathml::{latex_to_mathml, DisplayStyle};
use once_cell::sync::Lazy;
use pulldown_cmark::Event;
use regex::Regex;
use tracing::warn;

/// Turns one TeX expression into markup.
pub trait MathTypesetter: Send + Sync {
    /// Typeset `tex`. `display` selects block layout over inline layout.
    fn typeset(&self, tex: &str, display: bool) -> Result<String, String>;
}

/// MathML output via `latex2mathml`.
///
/// `latex2mathml` reports some errors (unknown commands, unbalanced groups)
/// inline as `<mtext>[PARSE ERROR: ..]</mtext>`; those count as failures.
/// Token text is emitted raw, so `<`, `>` and `&` are escaped afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlTypesetter;

impl MathTypesetter for MathMlTypesetter {
    fn typeset(&self, tex: &str, display: bool) -> Result<String, String> {
        let style = if display {
            DisplayStyle::Block
        } else {
            DisplayStyle::Inline
        };
        let markup = latex_to_mathml(tex.trim(), style).map_err(|e| e.to_string())?;
        if let Some(detail) = embedded_error(&markup) {
            return Err(detail);
        }
        Ok(escape_token_text(&markup))
    }
}

const PARSE_ERROR_MARK: &str = "[PARSE ERROR";

fn embedded_error(markup: &str) -> Option<String> {
    let start = markup.find(PARSE_ERROR_MARK)?;
    let rest = &markup[start + 1..];
    let end = rest.find("</").unwrap_or(rest.len());
    Some(rest[..end].trim_end_matches(']').to_string())
}

static RE_TOKEN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(<(?:mi|mn|mo|ms|mtext)(?:\s[^>]*)?>)(.*?)(</(?:mi|mn|mo|ms|mtext)>)").unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);").unwrap());

/// Escape markup characters in the text of MathML token elements.
fn escape_token_text(markup: &str) -> String {
    RE_TOKEN_TEXT
        .replace_all(markup, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], escape_text(&caps[2]), &caps[3])
        })
        .into_owned()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // Entities already present stay as they are.
            '&' if !RE_ENTITY.is_match(&text[i..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Typeset one span, rejecting output that would carry active content.
pub fn typeset(
    typesetter: &dyn MathTypesetter,
    tex: &str,
    display: bool,
) -> Result<String, RenderWarning> {
    let warning = |detail: String| RenderWarning {
        tex: tex.to_string(),
        display,
        detail,
    };
    let markup = typesetter.typeset(tex, display).map_err(warning)?;
    if !is_safe_fragment(&markup) {
        return Err(warning("typeset output contains active markup".into()));
    }
    Ok(markup)
}

/// Replace a math event with typeset markup, or with its source on failure.
pub fn typeset_event<'a>(
    event: Event<'a>,
    typesetter: &dyn MathTypesetter,
    warnings: &mut Vec<RenderWarning>,
) -> Event<'a> {
    let (tex, display) = match event {
        Event::InlineMath(tex) => (tex, false),
        Event::DisplayMath(tex) => (tex, true),
        other => return other,
    };
    match typeset(typesetter, &tex, display) {
        Ok(markup) => Event::InlineHtml(markup.into()),
        Err(warning) => {
            warn!("{}", warning);
            warnings.push(warning);
            let delim = if display { "$$" } else { "$" };
            Event::Text(format!("{delim}{tex}{delim}").into())
        }
    }
}

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)[^>]*>").unwrap());

static RE_BACKSLASH_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]|\\\((.+?)\\\)").unwrap());

const OPAQUE_ELEMENTS: [&str; 3] = ["pre", "code", "math"];

/// Typeset `\(...\)` and `\[...\]` spans found in the text of `html`.
pub fn typeset_delimited(
    html: &str,
    typesetter: &dyn MathTypesetter,
    warnings: &mut Vec<RenderWarning>,
) -> String {
    let mut out = String::with_capacity(html.len());
    let mut opaque_depth = 0usize;
    let mut last = 0;

    for caps in RE_TAG.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        let text = &html[last..tag.start()];
        if opaque_depth == 0 {
            out.push_str(&typeset_text(text, typesetter, warnings));
        } else {
            out.push_str(text);
        }
        out.push_str(tag.as_str());
        last = tag.end();

        let name = caps[2].to_ascii_lowercase();
        if OPAQUE_ELEMENTS.contains(&name.as_str()) {
            if &caps[1] == "/" {
                opaque_depth = opaque_depth.saturating_sub(1);
            } else if !tag.as_str().ends_with("/>") {
                opaque_depth += 1;
            }
        }
    }

    let tail = &html[last..];
    if opaque_depth == 0 {
        out.push_str(&typeset_text(tail, typesetter, warnings));
    } else {
        out.push_str(tail);
    }
    out
}

fn typeset_text(
    text: &str,
    typesetter: &dyn MathTypesetter,
    warnings: &mut Vec<RenderWarning>,
) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    RE_BACKSLASH_MATH
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let (escaped, display) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => (m.as_str(), true),
                (None, Some(m)) => (m.as_str(), false),
                (None, None) => return caps[0].to_string(),
            };
            match typeset(typesetter, &unescape_html(escaped), display) {
                Ok(markup) => markup,
                Err(warning) => {
                    warn!("{}", warning);
                    warnings.push(warning);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Undo the entity escaping applied to text by the HTML writer.
fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
