//! Line-level rewrites applied before markdown parsing.
//!
//! Two things happen here, both outside fenced code:
//!
//! - a doctoc block is replaced by a table of contents sentinel comment
//! - `~? … ?~`, `~! … !~` and `~% … %~` markers become panel sentinels
//!
//! Sentinels are HTML comments on their own line, which the parser reports as
//! HTML blocks and the renderer turns back into macros. They carry
//! `SENTINEL_MARK`, a private-use character that is replaced in the input,
//! so no comment written by an author can be mistaken for one.

use crate::admonition::PanelKind;

/// Private-use character that only sentinels contain.
const SENTINEL_MARK: char = '\u{E000}';

pub(crate) const TOC_SENTINEL: &str = "<!--\u{E000}toc-->";
pub(crate) const PANEL_OPEN_PREFIX: &str = "<!--\u{E000}panel ";
pub(crate) const PANEL_CLOSE: &str = "<!--\u{E000}/panel-->";
const SENTINEL_SUFFIX: &str = "-->";

/// An open code fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn open(line: &str) -> Option<Self> {
        let rest = strip_indent(line)?;
        let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = rest.chars().take_while(|c| *c == marker).count();
        if len < 3 {
            return None;
        }
        let info = &rest[len..];
        if marker == '`' && info.contains('`') {
            return None;
        }
        Some(Self { marker, len })
    }

    fn is_closed_by(self, line: &str) -> bool {
        let Some(rest) = strip_indent(line) else {
            return false;
        };
        let len = rest.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && rest[len..].trim().is_empty()
    }
}

/// Strip up to three spaces of indentation, rejecting deeper indents.
fn strip_indent(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(' ');
    (line.len() - rest.len() <= 3).then_some(rest)
}

/// Normalize line endings and apply the sentinel rewrites.
///
/// An unterminated fence keeps everything after it untouched; the renderer
/// emits such a block as literal text.
pub(crate) fn preprocess(source: &str) -> String {
    let normalized = source
        .replace("\r\n", "\n")
        .replace(SENTINEL_MARK, "\u{FFFD}");
    let lines: Vec<&str> = normalized.split_inclusive('\n').collect();

    let mut markdown = String::with_capacity(normalized.len());
    let mut fence: Option<Fence> = None;
    let mut open_panels: Vec<char> = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        index += 1;

        if let Some(open) = fence {
            if open.is_closed_by(line) {
                fence = None;
            }
            markdown.push_str(line);
            continue;
        }

        if let Some(open) = Fence::open(line) {
            fence = Some(open);
            markdown.push_str(line);
            continue;
        }

        if line.starts_with("<!-- START doctoc") {
            let end = (index - 1..lines.len()).find(|&i| lines[i].contains("END doctoc"));
            if let Some(end) = end {
                index = end + 1;
                push_sentinel(TOC_SENTINEL, &mut markdown);
                continue;
            }
        }

        rewrite_panel_markers(line, &mut open_panels, &mut markdown);
    }

    markdown
}

/// Opening line of a fenced code block that has no closing fence.
///
/// `block` is the source of one fenced block as the parser reports it, which
/// inside a blockquote or list still carries the container prefixes.
pub(crate) fn unterminated_fence(block: &str) -> Option<&str> {
    let mut lines = block.lines();
    let opener = without_container_prefix(lines.next()?).trim_end();
    let fence = Fence::open(opener)?;
    let closed = lines
        .last()
        .is_some_and(|line| fence.is_closed_by(without_container_prefix(line)));
    (!closed).then_some(opener)
}

/// `line` without blockquote markers and indentation.
fn without_container_prefix(line: &str) -> &str {
    line.trim_start_matches([' ', '\t', '>'])
}

fn push_sentinel(sentinel: &str, out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(sentinel);
    out.push_str("\n\n");
}

pub(crate) fn panel_open_sentinel(kind: PanelKind) -> String {
    format!("{PANEL_OPEN_PREFIX}{}{SENTINEL_SUFFIX}", kind.macro_name())
}

/// Parse a panel open sentinel back into its kind.
pub(crate) fn parse_panel_open(comment: &str) -> Option<PanelKind> {
    let name = comment
        .trim()
        .strip_prefix(PANEL_OPEN_PREFIX)?
        .strip_suffix(SENTINEL_SUFFIX)?;
    PanelKind::from_macro_name(name)
}

fn rewrite_panel_markers(line: &str, open_panels: &mut Vec<char>, out: &mut String) {
    let (mut body, newline) = match line.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (line, ""),
    };

    let opener = body
        .strip_prefix('~')
        .and_then(|rest| rest.chars().next())
        .and_then(|marker| PanelKind::from_marker(marker).map(|kind| (marker, kind)));
    if let Some((marker, kind)) = opener {
        body = &body[1 + marker.len_utf8()..];
        push_sentinel(&panel_open_sentinel(kind), out);
        open_panels.push(marker);
    }

    if let Some(&marker) = open_panels.last() {
        let trimmed = body.trim_end();
        if let Some(content) = trimmed
            .strip_suffix('~')
            .and_then(|rest| rest.strip_suffix(marker))
        {
            out.push_str(content);
            push_sentinel(PANEL_CLOSE, out);
            open_panels.pop();
            return;
        }
    }

    out.push_str(body);
    out.push_str(newline);
}
