//! Event-level sanitiser.
//!
//! Markdown may carry raw HTML and arbitrary link targets. Nothing from the
//! source is allowed to reach the output as live markup: raw HTML is demoted
//! to text (escaped on output) and links or images pointing at script-capable
//! schemes are rewritten to an inert target.

use once_cell::sync::Lazy;
use pulldown_cmark::{CowStr, Event, Tag};
use regex::Regex;

/// Target substituted for a neutralised link.
pub const INERT_LINK: &str = "#";

static RE_UNSAFE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:javascript|vbscript|data|file):").unwrap());

static RE_SAFE_DATA_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^data:image/(?:png|gif|jpe?g|webp);").unwrap());

static RE_ACTIVE_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*/?\s*(?:script|style|iframe|object|embed|link|meta|base|form)\b|\son[a-z]+\s*=|javascript:|vbscript:",
    )
    .unwrap()
});

/// Make one parser event safe to emit.
pub fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralise(dest_url, false),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralise(dest_url, true),
            title,
            id,
        }),
        other => other,
    }
}

fn neutralise(url: CowStr<'_>, is_image: bool) -> CowStr<'_> {
    if is_safe_url(&url, is_image) {
        url
    } else {
        CowStr::Borrowed(INERT_LINK)
    }
}

/// True when `url` cannot execute script when followed or loaded.
///
/// Whitespace and control characters are ignored when matching the scheme,
/// since browsers strip them too (`java\tscript:`). Inline raster images are
/// allowed as `data:` URLs; every other `data:` target is refused.
pub fn is_safe_url(url: &str, is_image: bool) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    if !RE_UNSAFE_SCHEME.is_match(&compact) {
        return true;
    }
    is_image && RE_SAFE_DATA_IMAGE.is_match(&compact)
}

/// True when generated markup (e.g. typeset math) carries no active content.
pub fn is_safe_fragment(markup: &str) -> bool {
    !RE_ACTIVE_MARKUP.is_match(markup)
}
