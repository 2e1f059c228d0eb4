//! Conversion of HTML input files.
//!
//! HTML is already close to storage format, so only a few constructs are
//! rewritten. Everything else passes through unchanged.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::admonition::{PanelKind, capitalize_first};
use crate::storage::{self, CodeMacroStyle};

static DOCTOC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*START doctoc.*?END doctoc.*?-->").unwrap()
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre[^>]*>\s*<code([^>]*)>(.*?)</code>\s*</pre>").unwrap()
});
static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)class\s*=\s*["']([^"']*)["']"#).unwrap());
static BLOCKQUOTE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<blockquote\b[^>]*>").unwrap());
static BLOCKQUOTE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</blockquote\s*>").unwrap());
static QUOTE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(\s*<p[^>]*>\s*)(?:<(?:strong|em|b|i)>\s*)?(note|warning|tip|info)\s*(?::\s*(?:</(?:strong|em|b|i)>)?|</(?:strong|em|b|i)>\s*:)\s*",
    )
    .unwrap()
});
static VOID_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(area|base|br|col|embed|hr|img|input|link|meta|param|source|track|wbr)\b([^>]*?)\s*/?>",
    )
    .unwrap()
});

/// Rewrite an HTML document into storage format.
pub(crate) fn convert(source: &str, style: &CodeMacroStyle<'_>) -> String {
    let mut toc = String::new();
    storage::toc_macro(&mut toc);

    let source = storage::strip_non_xml_chars(source);
    let html = DOCTOC.replace_all(&source, regex::NoExpand(&toc));
    let html = COMMENT.replace_all(&html, "");
    let html = VOID_ELEMENT.replace_all(&html, |caps: &Captures<'_>| {
        format!("<{}{} />", caps[1].to_ascii_lowercase(), &caps[2])
    });
    let html = rewrite_blockquotes(&html);
    let html = CODE_BLOCK.replace_all(&html, |caps: &Captures<'_>| {
        let language = caps.get(1).and_then(|attrs| code_language(attrs.as_str()));
        let mut out = String::new();
        storage::code_macro(language, &unescape(&caps[2]), style, &mut out);
        out
    });
    html.trim().to_owned()
}

/// Turn every blockquote into a panel, innermost first.
///
/// Each pass pairs the first closing tag with the nearest opening tag before
/// it. A closing tag with no opener is dropped.
fn rewrite_blockquotes(html: &str) -> String {
    let mut html = html.to_owned();
    while let Some(close) = BLOCKQUOTE_CLOSE.find(&html) {
        let close = close.range();
        let open = BLOCKQUOTE_OPEN
            .find_iter(&html[..close.start])
            .last()
            .map(|m| m.range());
        let Some(open) = open else {
            html.replace_range(close, "");
            continue;
        };
        let panel = blockquote_panel(&html[open.end..close.start]);
        html.replace_range(open.start..close.end, &panel);
    }
    html
}

/// Language from a `class="language-x"` or `class="lang-x"` attribute.
fn code_language(attrs: &str) -> Option<&str> {
    let caps = CLASS_ATTR.captures(attrs)?;
    let classes = caps.get(1)?.as_str();
    classes.split_whitespace().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|language| !language.is_empty())
    })
}

fn blockquote_panel(inner: &str) -> String {
    let (kind, body) = match QUOTE_KEYWORD.captures(inner) {
        Some(caps) => {
            let kind = caps
                .get(2)
                .and_then(|word| PanelKind::from_macro_name(word.as_str()))
                .unwrap_or(PanelKind::Info);
            let matched_end = caps.get(0).map_or(0, |m| m.end());
            let lead = caps.get(1).map_or("", |m| m.as_str());
            let rest = &inner[matched_end..];
            (kind, format!("{lead}{}", capitalize_first(rest)))
        }
        None => (PanelKind::Info, inner.to_owned()),
    };

    let mut out = String::new();
    storage::panel_start(kind, &mut out);
    out.push_str(body.trim());
    storage::panel_end(&mut out);
    out
}

/// Decode the entities HTML generators emit inside `<code>`.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
