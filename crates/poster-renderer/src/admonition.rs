//! Panel macro selection for blockquotes.
//!
//! A blockquote whose first paragraph opens with a recognised keyword
//! (`Note:`, `Warning:`, `Tip:`, `Info:`) becomes the matching panel macro and
//! loses the keyword. The keyword may be emphasised (`**Note:**`,
//! `*Warning*:`), and the first remaining letter is upper-cased. GFM alerts
//! (`> [!WARNING]`) map directly. Everything else is an `info` panel.

use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{BlockQuoteKind, CowStr, Event, Tag, TagEnd};
use regex::Regex;

static KEYWORD_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(note|warning|tip|info)\s*:\s*").unwrap());
static KEYWORD_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(note|warning|tip|info)\s*(:)?\s*$").unwrap());
static COLON_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*:\s*").unwrap());

/// Confluence panel macro flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelKind {
    Info,
    Note,
    Warning,
    Tip,
}

impl PanelKind {
    /// Macro name in storage format.
    pub fn macro_name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Tip => "tip",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "note" => Some(Self::Note),
            "warning" => Some(Self::Warning),
            "tip" => Some(Self::Tip),
            _ => None,
        }
    }

    /// Panel for a `~X … X~` paragraph marker character.
    pub(crate) fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '?' => Some(Self::Info),
            '!' => Some(Self::Note),
            '%' => Some(Self::Warning),
            _ => None,
        }
    }

    /// Parse a macro name back into a kind.
    pub(crate) fn from_macro_name(name: &str) -> Option<Self> {
        Self::from_keyword(name)
    }
}

impl From<BlockQuoteKind> for PanelKind {
    fn from(kind: BlockQuoteKind) -> Self {
        match kind {
            BlockQuoteKind::Note => Self::Note,
            BlockQuoteKind::Tip => Self::Tip,
            BlockQuoteKind::Important => Self::Info,
            BlockQuoteKind::Warning | BlockQuoteKind::Caution => Self::Warning,
        }
    }
}

/// Choose a panel for every blockquote and strip recognised keywords.
///
/// Returns a map from the index of each `Start(BlockQuote)` event to its panel.
pub(crate) fn resolve_panels(events: &mut [Event<'_>]) -> HashMap<usize, PanelKind> {
    let mut panels = HashMap::new();
    for i in 0..events.len() {
        let kind = match &events[i] {
            Event::Start(Tag::BlockQuote(Some(alert))) => PanelKind::from(*alert),
            Event::Start(Tag::BlockQuote(None)) => {
                strip_keyword(events, i + 1).unwrap_or(PanelKind::Info)
            }
            _ => continue,
        };
        panels.insert(i, kind);
    }
    panels
}

fn strip_keyword(events: &mut [Event<'_>], paragraph: usize) -> Option<PanelKind> {
    if !matches!(events.get(paragraph), Some(Event::Start(Tag::Paragraph))) {
        return None;
    }
    let first = paragraph + 1;

    if matches!(
        events.get(first),
        Some(Event::Start(Tag::Strong | Tag::Emphasis))
    ) {
        return strip_emphasised_keyword(events, first);
    }

    let (kind, rest) = match events.get(first) {
        Some(Event::Text(text)) => split_keyword(text)?,
        _ => return None,
    };
    events[first] = Event::Text(CowStr::from(rest));
    Some(kind)
}

/// Handle `**Note:** text`, `**Note**: text` and `**Note: text**`.
fn strip_emphasised_keyword(events: &mut [Event<'_>], start: usize) -> Option<PanelKind> {
    let inner = start + 1;
    let end = start + 2;
    let after = start + 3;

    let Some(Event::Text(text)) = events.get(inner) else {
        return None;
    };

    if let Some(caps) = KEYWORD_ONLY.captures(text) {
        if !matches!(
            events.get(end),
            Some(Event::End(TagEnd::Strong | TagEnd::Emphasis))
        ) {
            return None;
        }
        let kind = PanelKind::from_keyword(&caps[1])?;
        let has_colon = caps.get(2).is_some();

        let rest = match events.get(after) {
            Some(Event::Text(next)) if has_colon => Some(capitalize_first(next.trim_start())),
            Some(Event::Text(next)) => {
                let colon = COLON_PREFIX.find(next)?;
                Some(capitalize_first(&next[colon.end()..]))
            }
            _ if has_colon => None,
            _ => return None,
        };

        for index in start..=end {
            events[index] = Event::Text(CowStr::Borrowed(""));
        }
        if let Some(rest) = rest {
            events[after] = Event::Text(CowStr::from(rest));
        }
        return Some(kind);
    }

    let (kind, rest) = split_keyword(text)?;
    events[inner] = Event::Text(CowStr::from(rest));
    Some(kind)
}

/// Split `Note: rest` into the panel kind and the capitalised rest.
fn split_keyword(text: &str) -> Option<(PanelKind, String)> {
    let caps = KEYWORD_PREFIX.captures(text)?;
    let kind = PanelKind::from_keyword(&caps[1])?;
    let matched = caps.get(0)?;
    Some((kind, capitalize_first(&text[matched.end()..])))
}

pub(crate) fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
