//! Event renderer producing Confluence storage format.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, LinkType, Tag, TagEnd};
use regex::Regex;

use crate::admonition::{PanelKind, resolve_panels};
use crate::preprocess::{PANEL_CLOSE, TOC_SENTINEL, parse_panel_open};
use crate::state::{CodeBlockState, FootnoteState, HtmlBlockState, ImageState, TableState};
use crate::storage::{self, CodeMacroStyle, escape_xml};

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?(-->|\z)").unwrap());
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<br\s*/?>$").unwrap());

/// Render parsed events.
///
/// `unterminated_fences` maps the start event index of each fenced code block
/// that has no closing fence to its opening line. Those blocks are written as
/// literal text instead of code macros.
pub(crate) fn render(
    mut events: Vec<Event<'_>>,
    style: &CodeMacroStyle<'_>,
    unterminated_fences: HashMap<usize, String>,
) -> String {
    let panels = resolve_panels(&mut events);
    let footnotes = FootnoteState::scan(&events);
    let mut renderer = StorageRenderer::new(style, panels, footnotes, unterminated_fences);
    for (index, event) in events.into_iter().enumerate() {
        renderer.process_event(index, event);
    }
    renderer.finish()
}

struct StorageRenderer<'s> {
    style: &'s CodeMacroStyle<'s>,
    output: String,
    code: CodeBlockState,
    table: TableState,
    image: ImageState,
    html: HtmlBlockState,
    footnotes: FootnoteState,
    /// Panel chosen for each blockquote, keyed by its start event index.
    panels: HashMap<usize, PanelKind>,
    /// Opening lines of unterminated fences, keyed by start event index.
    unterminated_fences: HashMap<usize, String>,
    /// Opening line of the code block being collected, if it is unterminated.
    literal_fence: Option<String>,
    /// Blockquotes, list items and footnote definitions currently open.
    container_depth: usize,
    /// Panels opened by paragraph markers and not yet closed.
    marker_panels: usize,
    /// Label to prefix the next paragraph of a rendered footnote definition.
    pending_footnote: Option<String>,
}

impl<'s> StorageRenderer<'s> {
    fn new(
        style: &'s CodeMacroStyle<'s>,
        panels: HashMap<usize, PanelKind>,
        footnotes: FootnoteState,
        unterminated_fences: HashMap<usize, String>,
    ) -> Self {
        Self {
            style,
            output: String::new(),
            code: CodeBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            html: HtmlBlockState::default(),
            footnotes,
            panels,
            unterminated_fences,
            literal_fence: None,
            container_depth: 0,
            marker_panels: 0,
            pending_footnote: None,
        }
    }

    fn finish(mut self) -> String {
        for _ in 0..self.marker_panels {
            storage::panel_end(&mut self.output);
        }
        self.output
    }

    /// Push inline markup unless it belongs to an image's alt text.
    fn push_inline(&mut self, markup: &str) {
        if !self.image.is_active() {
            self.output.push_str(markup);
        }
    }

    fn process_event(&mut self, index: usize, event: Event<'_>) {
        if self.footnotes.is_skipping() {
            match event {
                Event::Start(Tag::FootnoteDefinition(label)) => {
                    self.footnotes.enter_definition(&label);
                }
                Event::End(TagEnd::FootnoteDefinition) => {
                    self.footnotes.leave_definition();
                }
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start_tag(index, tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) | Event::InlineMath(text) | Event::DisplayMath(text) => {
                self.text(&text);
            }
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) if self.html.is_active() => self.html.push_str(&html),
            Event::Html(html) | Event::InlineHtml(html) => self.inline_html(&html),
            Event::FootnoteReference(label) => self.footnote_reference(&label),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.push_inline("<br />"),
            Event::Rule => self.output.push_str("<hr />"),
            Event::TaskListMarker(checked) => {
                self.output.push_str(if checked { "[x] " } else { "[ ] " });
            }
        }
    }

    fn start_tag(&mut self, index: usize, tag: Tag<'_>) {
        if !matches!(tag, Tag::Paragraph)
            && let Some(label) = self.pending_footnote.take()
        {
            let _ = write!(self.output, "<p><sup>{}</sup></p>", escape_xml(&label));
        }

        match tag {
            Tag::Paragraph => {
                self.output.push_str("<p>");
                if let Some(label) = self.pending_footnote.take() {
                    let _ = write!(self.output, "<sup>{}</sup> ", escape_xml(&label));
                }
            }
            Tag::Heading { level, .. } => {
                let _ = write!(self.output, "<{level}>");
            }
            Tag::BlockQuote(_) => {
                let kind = self.panels.get(&index).copied().unwrap_or(PanelKind::Info);
                storage::panel_start(kind, &mut self.output);
                self.container_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.literal_fence = self.unterminated_fences.remove(&index);
                self.code.start(language);
            }
            Tag::List(Some(1)) => self.output.push_str("<ol>"),
            Tag::List(Some(start)) => {
                let _ = write!(self.output, r#"<ol start="{start}">"#);
            }
            Tag::List(None) => self.output.push_str("<ul>"),
            Tag::Item => {
                self.output.push_str("<li>");
                self.container_depth += 1;
            }
            Tag::FootnoteDefinition(label) => {
                if self.footnotes.enter_definition(&label) {
                    self.pending_footnote = Some(label.to_string());
                    self.container_depth += 1;
                }
            }
            Tag::HtmlBlock => self.html.start(),
            Tag::MetadataBlock(_) => {}
            Tag::DefinitionList => self.output.push_str("<dl>"),
            Tag::DefinitionListTitle => self.output.push_str("<dt>"),
            Tag::DefinitionListDefinition => self.output.push_str("<dd>"),
            Tag::Table(alignments) => {
                self.table.start(alignments);
                self.output.push_str("<table>");
            }
            Tag::TableHead => {
                self.table.start_head();
                self.output.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table.start_row();
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                let _ = write!(
                    self.output,
                    "<{}{}>",
                    self.table.cell_tag(),
                    self.table.alignment_style()
                );
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Superscript => self.push_inline("<sup>"),
            Tag::Subscript => self.push_inline("<sub>"),
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => {
                let href = if link_type == LinkType::Email && !dest_url.starts_with("mailto:") {
                    format!("mailto:{dest_url}")
                } else {
                    dest_url.to_string()
                };
                self.push_inline(&format!(r#"<a href="{}">"#, escape_xml(&href)));
            }
            Tag::Image { dest_url, .. } => self.image.start(dest_url.to_string()),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.output.push_str("</p>"),
            TagEnd::Heading(level) => {
                let _ = write!(self.output, "</{level}>");
            }
            TagEnd::BlockQuote(_) => {
                storage::panel_end(&mut self.output);
                self.container_depth = self.container_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                let (language, content) = self.code.end();
                match self.literal_fence.take() {
                    Some(opener) => {
                        let text = format!("{opener}\n{content}");
                        storage::literal_paragraph(&text, &mut self.output);
                    }
                    None => storage::code_macro(
                        language.as_deref(),
                        &content,
                        self.style,
                        &mut self.output,
                    ),
                }
            }
            TagEnd::List(ordered) => {
                self.output.push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => {
                self.output.push_str("</li>");
                self.container_depth = self.container_depth.saturating_sub(1);
            }
            TagEnd::FootnoteDefinition => {
                if self.footnotes.leave_definition() {
                    if let Some(label) = self.pending_footnote.take() {
                        let _ = write!(self.output, "<p><sup>{}</sup></p>", escape_xml(&label));
                    }
                    self.container_depth = self.container_depth.saturating_sub(1);
                }
            }
            TagEnd::HtmlBlock => {
                let html = self.html.end();
                self.html_block(&html);
            }
            TagEnd::MetadataBlock(_) => {}
            TagEnd::DefinitionList => self.output.push_str("</dl>"),
            TagEnd::DefinitionListTitle => self.output.push_str("</dt>"),
            TagEnd::DefinitionListDefinition => self.output.push_str("</dd>"),
            TagEnd::Table => self.output.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.output.push_str("</tr></thead><tbody>");
                self.table.end_head();
            }
            TagEnd::TableRow => self.output.push_str("</tr>"),
            TagEnd::TableCell => {
                let _ = write!(self.output, "</{}>", self.table.cell_tag());
                self.table.next_cell();
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Superscript => self.push_inline("</sup>"),
            TagEnd::Subscript => self.push_inline("</sub>"),
            TagEnd::Link => self.push_inline("</a>"),
            TagEnd::Image => {
                if let Some((source, alt)) = self.image.end() {
                    storage::image(&source, &alt, &mut self.output);
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.code.is_active() {
            self.code.push_str(text);
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else {
            self.output.push_str(&escape_xml(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.image.is_active() {
            self.image.push_str(code);
        } else {
            let _ = write!(self.output, "<code>{}</code>", escape_xml(code));
        }
    }

    fn soft_break(&mut self) {
        if self.image.is_active() {
            self.image.push_str(" ");
        } else {
            self.output.push('\n');
        }
    }

    /// Line breaks survive, comments are dropped, other tags become text.
    fn inline_html(&mut self, html: &str) {
        let trimmed = html.trim();
        if LINE_BREAK.is_match(trimmed) {
            self.push_inline("<br />");
        } else if !trimmed.starts_with("<!--") {
            self.text(html);
        }
    }

    fn html_block(&mut self, html: &str) {
        let trimmed = html.trim();
        if self.container_depth == 0 {
            if trimmed == TOC_SENTINEL {
                storage::toc_macro(&mut self.output);
                return;
            }
            if trimmed == PANEL_CLOSE {
                if self.marker_panels > 0 {
                    storage::panel_end(&mut self.output);
                    self.marker_panels -= 1;
                }
                return;
            }
            if let Some(kind) = parse_panel_open(trimmed) {
                storage::panel_start(kind, &mut self.output);
                self.marker_panels += 1;
                return;
            }
        }

        let text = COMMENT.replace_all(html, "");
        storage::literal_paragraph(text.trim(), &mut self.output);
    }

    fn footnote_reference(&mut self, label: &str) {
        let href = self.footnotes.link_for(label).map(escape_xml);
        let label = escape_xml(label);
        match href {
            Some(href) => {
                let _ = write!(self.output, r#"<a href="{href}"><sup>{label}</sup></a>"#);
            }
            None => {
                let _ = write!(self.output, "<sup>{label}</sup>");
            }
        }
    }
}

/// Language from a fence info string such as `rust,ignore` or `python {.x}`.
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .filter(|language| !language.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::preprocess::panel_open_sentinel;
    use pulldown_cmark::{Options, Parser};

    fn render_markdown(markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_GFM;
        let events = Parser::new_ext(markdown, options).collect();
        let style = CodeMacroStyle {
            theme: None,
            line_numbers: true,
        };
        render(events, &style, HashMap::new())
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("rust"), Some("rust".to_owned()));
        assert_eq!(fence_language("rust,ignore"), Some("rust".to_owned()));
        assert_eq!(fence_language("python {.numberLines}"), Some("python".to_owned()));
        assert_eq!(fence_language(""), None);
    }

    #[test]
    fn test_heading_and_paragraph() {
        assert_eq!(
            render_markdown("## Setup\n\nRun *this* & **that**."),
            "<h2>Setup</h2><p>Run <em>this</em> &amp; <strong>that</strong>.</p>"
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(
            render_markdown("3. c\n4. d"),
            r#"<ol start="3"><li>c</li><li>d</li></ol>"#
        );
    }

    #[test]
    fn test_task_list() {
        assert_eq!(
            render_markdown("- [ ] todo\n- [x] done"),
            "<ul><li>[ ] todo</li><li>[x] done</li></ul>"
        );
    }

    #[test]
    fn test_table_with_alignment() {
        assert_eq!(
            render_markdown("| a | b |\n|---|--:|\n| 1 | 2 |"),
            concat!(
                "<table><thead><tr><th>a</th>",
                r#"<th style="text-align: right;">b</th></tr></thead>"#,
                "<tbody><tr><td>1</td>",
                r#"<td style="text-align: right;">2</td></tr></tbody></table>"#
            )
        );
    }

    #[test]
    fn test_email_autolink() {
        assert_eq!(
            render_markdown("<ops@example.com>"),
            r#"<p><a href="mailto:ops@example.com">ops@example.com</a></p>"#
        );
    }

    #[test]
    fn test_image_alt_from_inline_markup() {
        assert_eq!(
            render_markdown("![*Build* graph](img/build.png)"),
            r#"<p><ac:image ac:alt="Build graph"><ri:attachment ri:filename="build.png" /></ac:image></p>"#
        );
    }

    #[test]
    fn test_inline_html_escaped_except_breaks() {
        assert_eq!(
            render_markdown("a<br>b <span>c</span><!-- hidden -->"),
            "<p>a<br />b &lt;span&gt;c&lt;/span&gt;</p>"
        );
    }

    #[test]
    fn test_html_block_becomes_text() {
        assert_eq!(
            render_markdown("<div class=\"x\">\nhi\n</div>\n\n<!-- gone -->\n"),
            "<p>&lt;div class=&quot;x&quot;&gt;<br />hi<br />&lt;/div&gt;</p>"
        );
    }

    #[test]
    fn test_footnote_with_link_folds_into_reference() {
        assert_eq!(
            render_markdown("Read this[^1].\n\n[^1]: Source: [RFC](https://rfc.example.com/1)\n"),
            r#"<p>Read this<a href="https://rfc.example.com/1"><sup>1</sup></a>.</p>"#
        );
    }

    #[test]
    fn test_footnote_without_link_rendered_in_place() {
        assert_eq!(
            render_markdown("Claim[^a].\n\n[^a]: Trust me.\n"),
            "<p>Claim<sup>a</sup>.</p><p><sup>a</sup> Trust me.</p>"
        );
    }

    #[test]
    fn test_sentinels_inside_list_are_dropped() {
        let out = render_markdown(&format!("- item\n\n  {TOC_SENTINEL}\n"));
        assert!(!out.contains("ac:name=\"toc\""));
    }

    #[test]
    fn test_unclosed_marker_panel_closed_at_end() {
        let open = panel_open_sentinel(PanelKind::Note);
        let out = render_markdown(&format!("{open}\n\nbody\n"));
        assert_eq!(
            out,
            r#"<ac:structured-macro ac:name="note" ac:schema-version="1"><ac:rich-text-body><p>body</p></ac:rich-text-body></ac:structured-macro>"#
        );
    }

    #[test]
    fn test_unterminated_fence_written_as_text() {
        let events: Vec<_> = Parser::new("```sh\necho <x>\n").collect();
        let style = CodeMacroStyle {
            theme: None,
            line_numbers: true,
        };
        let out = render(events, &style, HashMap::from([(0, "```sh".to_owned())]));
        assert_eq!(out, "<p>```sh<br />echo &lt;x&gt;</p>");
    }

    #[test]
    fn test_authored_comment_is_not_a_sentinel() {
        let out = render_markdown("<!-- confluence-poster:toc -->\n\ntext\n");
        assert_eq!(out, "<p>text</p>");
    }

    #[test]
    fn test_stray_panel_close_ignored() {
        assert_eq!(render_markdown(&format!("{PANEL_CLOSE}\n\ntext\n")), "<p>text</p>");
    }
}
