/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lexical tokens produced by the [`TemplateParser`](crate::parser::TemplateParser).

use crate::error::SourceLocation;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// The pair of strings that open and close a tag, `{{` and `}}` by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDelimiterPair {
    pub start: String,
    pub end: String,
}

impl TagDelimiterPair {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Whether this is the `{{`/`}}` pair, the only one that enables `{{{...}}}` tags.
    pub fn is_default(&self) -> bool {
        self.start == "{{" && self.end == "}}"
    }
}

impl Default for TagDelimiterPair {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// The kind of a token, with the content found between its delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text.
    Text(String),
    /// `{{! ... }}`
    Comment,
    /// `{{# content }}`
    Section {
        content: String,
        delimiters: TagDelimiterPair,
    },
    /// `{{^ content }}`
    InvertedSection {
        content: String,
        delimiters: TagDelimiterPair,
    },
    /// `{{$ content }}`
    InheritableSection { content: String },
    /// `{{/ content }}`
    Close { content: String },
    /// `{{> content }}`
    Partial { content: String },
    /// `{{< content }}`
    InheritedPartial { content: String },
    /// `{{{ content }}}` or `{{& content }}`
    UnescapedVariable {
        content: String,
        delimiters: TagDelimiterPair,
    },
    /// `{{ content }}`
    EscapedVariable {
        content: String,
        delimiters: TagDelimiterPair,
    },
    /// `{{% content }}`
    Pragma { content: String },
    /// `{{=<% %>=}}`
    SetDelimiters,
}

/// A token, with enough of its origin to report errors and re-slice the source.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Line where the token starts (1-based).
    pub line: usize,
    pub template_id: Option<Arc<str>>,
    /// The whole template the token was read from.
    pub template_string: Arc<str>,
    /// Byte range of the token in `template_string`, delimiters included.
    pub range: Range<usize>,
}

impl Token {
    /// The literal text of the token, delimiters included.
    pub fn source(&self) -> &str {
        &self.template_string[self.range.clone()]
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.template_id.clone())
    }
}
