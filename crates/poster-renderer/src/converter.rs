//! Configured conversion entry point.

use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

use crate::content::StorageContent;
use crate::html;
use crate::preprocess::{preprocess, unterminated_fence};
use crate::renderer::render;
use crate::storage::CodeMacroStyle;

/// Code theme used when none is configured.
pub const DEFAULT_CODE_THEME: &str = "Midnight";

/// Options affecting generated macros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConverterOptions {
    /// `theme` parameter of code macros. `None` omits the parameter.
    pub code_theme: Option<String>,
    /// `linenumbers` parameter of code macros.
    pub line_numbers: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            code_theme: Some(DEFAULT_CODE_THEME.to_owned()),
            line_numbers: true,
        }
    }
}

/// Markdown and HTML to storage format converter.
///
/// Holds only options, so one instance can be shared across threads.
#[derive(Clone, Debug, Default)]
pub struct Converter {
    options: ConverterOptions,
}

impl Converter {
    #[must_use]
    pub fn new(options: ConverterOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    fn code_style(&self) -> CodeMacroStyle<'_> {
        CodeMacroStyle {
            theme: self.options.code_theme.as_deref(),
            line_numbers: self.options.line_numbers,
        }
    }

    /// Convert markdown to storage format.
    ///
    /// Never fails: anything that cannot be represented is emitted as escaped
    /// text. The same input always produces the same output.
    #[must_use]
    pub fn convert(&self, source: &str) -> StorageContent {
        let markdown = preprocess(source);
        let mut unterminated = HashMap::new();
        let events = Parser::new_ext(&markdown, parser_options())
            .into_offset_iter()
            .enumerate()
            .map(|(index, (event, range))| {
                if let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) = &event
                    && let Some(opener) = markdown.get(range).and_then(unterminated_fence)
                {
                    unterminated.insert(index, opener.to_owned());
                }
                event
            })
            .collect();
        StorageContent::new(render(events, &self.code_style(), unterminated))
    }

    /// Convert an HTML document to storage format.
    ///
    /// Comments are removed, doctoc blocks become a table of contents and
    /// `<pre><code>` blocks become code macros. Other markup passes through.
    #[must_use]
    pub fn convert_html(&self, source: &str) -> StorageContent {
        StorageContent::new(html::convert(source, &self.code_style()))
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}
