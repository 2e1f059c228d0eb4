//! Storage format building blocks.
//!
//! Small writers shared by the markdown and HTML converters. All of them
//! append to an output buffer and produce balanced markup.

use std::borrow::Cow;
use std::fmt::Write;

use crate::admonition::PanelKind;

/// Escape text for use in XML element content and attribute values.
///
/// Characters XML 1.0 cannot carry at all (most C0 controls, U+FFFE, U+FFFF)
/// are dropped.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c if !is_xml_char(c) => {}
            _ => out.push(c),
        }
    }
    out
}

/// Whether `c` is allowed anywhere in an XML 1.0 document.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// `text` without the characters XML cannot carry.
pub(crate) fn strip_non_xml_chars(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

/// Options baked into every code macro.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CodeMacroStyle<'a> {
    pub(crate) theme: Option<&'a str>,
    pub(crate) line_numbers: bool,
}

/// Write a `code` macro with a verbatim CDATA body.
pub(crate) fn code_macro(
    language: Option<&str>,
    content: &str,
    style: &CodeMacroStyle<'_>,
    out: &mut String,
) {
    let language = language.filter(|l| !l.is_empty()).unwrap_or("none");
    out.push_str(r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#);
    let _ = write!(
        out,
        r#"<ac:parameter ac:name="language">{}</ac:parameter>"#,
        escape_xml(language)
    );
    if let Some(theme) = style.theme.filter(|t| !t.is_empty()) {
        let _ = write!(
            out,
            r#"<ac:parameter ac:name="theme">{}</ac:parameter>"#,
            escape_xml(theme)
        );
    }
    let _ = write!(
        out,
        r#"<ac:parameter ac:name="linenumbers">{}</ac:parameter>"#,
        style.line_numbers
    );
    out.push_str("<ac:plain-text-body>");
    cdata(content, out);
    out.push_str("</ac:plain-text-body></ac:structured-macro>");
}

/// Write `content` as one or more CDATA sections.
///
/// A literal `]]>` cannot appear inside CDATA, so it is split between two
/// sections. Concatenating the section contents yields `content` minus any
/// characters XML cannot carry.
fn cdata(content: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&strip_non_xml_chars(content).replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

pub(crate) fn panel_start(kind: PanelKind, out: &mut String) {
    let _ = write!(
        out,
        r#"<ac:structured-macro ac:name="{}" ac:schema-version="1"><ac:rich-text-body>"#,
        kind.macro_name()
    );
}

pub(crate) fn panel_end(out: &mut String) {
    out.push_str("</ac:rich-text-body></ac:structured-macro>");
}

/// Table of contents parameters: printable bullet list of every heading level.
const TOC_PARAMETERS: [(&str, &str); 7] = [
    ("printable", "true"),
    ("style", "disc"),
    ("maxLevel", "7"),
    ("minLevel", "1"),
    ("type", "list"),
    ("outline", "clear"),
    ("include", ".*"),
];

pub(crate) fn toc_macro(out: &mut String) {
    out.push_str(r#"<ac:structured-macro ac:name="toc" ac:schema-version="1">"#);
    for (name, value) in TOC_PARAMETERS {
        let _ = write!(out, r#"<ac:parameter ac:name="{name}">{value}</ac:parameter>"#);
    }
    out.push_str("</ac:structured-macro>");
}

/// Write an image reference.
///
/// External URLs use `ri:url`. Anything else is treated as a page attachment
/// named after the last path segment.
pub(crate) fn image(src: &str, alt: &str, out: &mut String) {
    out.push_str("<ac:image");
    if !alt.is_empty() {
        let _ = write!(out, r#" ac:alt="{}""#, escape_xml(alt));
    }
    out.push('>');
    if src.starts_with("http://") || src.starts_with("https://") {
        let _ = write!(out, r#"<ri:url ri:value="{}" />"#, escape_xml(src));
    } else {
        let filename = src.rsplit('/').next().unwrap_or(src);
        let _ = write!(
            out,
            r#"<ri:attachment ri:filename="{}" />"#,
            escape_xml(filename)
        );
    }
    out.push_str("</ac:image>");
}

/// Write text as a paragraph of escaped literal lines.
pub(crate) fn literal_paragraph(text: &str, out: &mut String) {
    let text = text.trim_end_matches('\n');
    if text.is_empty() {
        return;
    }
    out.push_str("<p>");
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push_str("<br />");
        }
        out.push_str(&escape_xml(line));
    }
    out.push_str("</p>");
}
