//! Context tracked while walking parser events.

use std::collections::HashMap;

use pulldown_cmark::{Alignment, Event, LinkType, Tag, TagEnd};

/// Code block being collected.
#[derive(Default)]
pub(crate) struct CodeBlockState {
    active: bool,
    language: Option<String>,
    buffer: String,
}

impl CodeBlockState {
    pub(crate) fn start(&mut self, language: Option<String>) {
        self.active = true;
        self.language = language;
        self.buffer.clear();
    }

    /// Finish the block, returning its language and verbatim content.
    pub(crate) fn end(&mut self) -> (Option<String>, String) {
        self.active = false;
        (self.language.take(), std::mem::take(&mut self.buffer))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// Position inside a table.
#[derive(Default)]
pub(crate) struct TableState {
    in_head: bool,
    alignments: Vec<Alignment>,
    column: usize,
}

impl TableState {
    pub(crate) fn start(&mut self, alignments: Vec<Alignment>) {
        self.alignments = alignments;
        self.in_head = false;
        self.column = 0;
    }

    pub(crate) fn start_head(&mut self) {
        self.in_head = true;
        self.column = 0;
    }

    pub(crate) fn end_head(&mut self) {
        self.in_head = false;
    }

    pub(crate) fn start_row(&mut self) {
        self.column = 0;
    }

    pub(crate) fn next_cell(&mut self) {
        self.column += 1;
    }

    /// Cell element name for the current row.
    pub(crate) fn cell_tag(&self) -> &'static str {
        if self.in_head { "th" } else { "td" }
    }

    /// `style` attribute for the current column, including the leading space.
    pub(crate) fn alignment_style(&self) -> &'static str {
        match self.alignments.get(self.column) {
            Some(Alignment::Left) => r#" style="text-align: left;""#,
            Some(Alignment::Center) => r#" style="text-align: center;""#,
            Some(Alignment::Right) => r#" style="text-align: right;""#,
            Some(Alignment::None) | None => "",
        }
    }
}

/// Image whose alt text is being collected.
#[derive(Default)]
pub(crate) struct ImageState {
    source: Option<String>,
    alt: String,
}

impl ImageState {
    pub(crate) fn start(&mut self, source: String) {
        self.source = Some(source);
        self.alt.clear();
    }

    /// Finish the image, returning its source and alt text.
    pub(crate) fn end(&mut self) -> Option<(String, String)> {
        let source = self.source.take()?;
        Some((source, std::mem::take(&mut self.alt)))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.alt.push_str(text);
    }
}

/// Footnote handling for one document.
///
/// A definition that contains a link is folded into its references: each
/// reference becomes a superscript link to that URL and the definition itself
/// is not rendered.
#[derive(Default)]
pub(crate) struct FootnoteState {
    links: HashMap<String, String>,
    /// Nesting depth inside a suppressed definition.
    skipping: usize,
}

impl FootnoteState {
    /// Record the first link of every footnote definition.
    pub(crate) fn scan(events: &[Event<'_>]) -> Self {
        let mut links = HashMap::new();
        let mut current: Option<&str> = None;
        for event in events {
            match event {
                Event::Start(Tag::FootnoteDefinition(label)) => current = Some(label.as_ref()),
                Event::End(TagEnd::FootnoteDefinition) => current = None,
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    ..
                }) if *link_type != LinkType::Email => {
                    if let Some(label) = current {
                        links
                            .entry(label.to_owned())
                            .or_insert_with(|| dest_url.to_string());
                    }
                }
                _ => {}
            }
        }
        Self { links, skipping: 0 }
    }

    /// URL a reference should link to, if its definition has one.
    pub(crate) fn link_for(&self, label: &str) -> Option<&str> {
        self.links.get(label).map(String::as_str)
    }

    pub(crate) fn is_skipping(&self) -> bool {
        self.skipping > 0
    }

    /// Enter a definition. Returns `false` when it should not be rendered.
    pub(crate) fn enter_definition(&mut self, label: &str) -> bool {
        if self.skipping > 0 || self.links.contains_key(label) {
            self.skipping += 1;
            return false;
        }
        true
    }

    /// Leave a definition. Returns `false` when it was not rendered.
    pub(crate) fn leave_definition(&mut self) -> bool {
        if self.skipping > 0 {
            self.skipping -= 1;
            return false;
        }
        true
    }
}

/// Raw HTML block contents.
#[derive(Default)]
pub(crate) struct HtmlBlockState {
    active: bool,
    buffer: String,
}

impl HtmlBlockState {
    pub(crate) fn start(&mut self) {
        self.active = true;
        self.buffer.clear();
    }

    pub(crate) fn end(&mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.buffer)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn push_str(&mut self, html: &str) {
        self.buffer.push_str(html);
    }
}
