/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing and rendering.
//!
//! Parsing and rendering fail in different ways, so they get different error
//! types: [`ParseError`] always carries the location of the offending tag,
//! while [`RenderError`] carries the literal text of the tag being rendered.
//! [`MustacheError`] wraps both (plus lookup and I/O failures from template
//! sources) for the public entry points.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a token starts in its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: usize,
    /// Identifier of the template, when it was loaded from a repository.
    pub template_id: Option<Arc<str>>,
}

impl SourceLocation {
    pub fn new(line: usize, template_id: Option<Arc<str>>) -> Self {
        Self { line, template_id }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template_id {
            Some(id) => write!(f, "line {} of template `{}`", self.line, id),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// Errors raised while tokenizing or assembling a template.
///
/// Parsing stops at the first error; no partial AST is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `{{=...=}}` tag that does not contain exactly two delimiters.
    #[error("Parse error at {location}: Invalid set delimiters tag")]
    InvalidSetDelimiters { location: SourceLocation },

    /// End of input inside an open tag.
    #[error("Parse error at {location}: Unclosed Mustache tag")]
    UnclosedTag { location: SourceLocation },

    /// End of input inside an open section.
    #[error("Parse error at {location}: Unclosed Mustache section `{name}`")]
    UnclosedSection {
        name: String,
        location: SourceLocation,
    },

    /// A closing tag that does not match the innermost open section.
    #[error("Parse error at {location}: Unmatched closing tag `{tag}`")]
    UnmatchedClosingTag {
        tag: String,
        location: SourceLocation,
    },

    /// A tag whose content is not a valid expression.
    #[error("Parse error at {location}: Invalid expression `{expression}`: {message}")]
    InvalidExpression {
        expression: String,
        message: String,
        location: SourceLocation,
    },

    /// A partial or inheritable section tag without a name.
    #[error("Parse error at {location}: Missing {kind} name")]
    MissingName {
        kind: &'static str,
        location: SourceLocation,
    },

    /// A content type pragma that follows other tags.
    #[error(
        "Parse error at {location}: {pragma} pragma tag must prepend any Mustache variable, section, or partial tag"
    )]
    MisplacedPragma {
        pragma: String,
        location: SourceLocation,
    },

    /// A partial name the template repository cannot resolve.
    #[error("Parse error at {location}: No such partial named `{name}`")]
    MissingPartial {
        name: String,
        location: SourceLocation,
    },
}

impl ParseError {
    /// Location of the tag that caused the error.
    pub fn location(&self) -> &SourceLocation {
        match self {
            ParseError::InvalidSetDelimiters { location }
            | ParseError::UnclosedTag { location }
            | ParseError::UnclosedSection { location, .. }
            | ParseError::UnmatchedClosingTag { location, .. }
            | ParseError::InvalidExpression { location, .. }
            | ParseError::MissingName { location, .. }
            | ParseError::MisplacedPragma { location, .. }
            | ParseError::MissingPartial { location, .. } => location,
        }
    }
}

/// Errors raised while parsing the expression of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("Missing expression")]
    Empty,

    #[error("Missing identifier")]
    MissingIdentifier,

    #[error("Unexpected character `{0}`")]
    UnexpectedCharacter(char),

    #[error("Missing `)` in filter call")]
    UnclosedFilterCall,
}

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The expression of a tag could not be evaluated.
    #[error("Error evaluating {tag}: {reason}")]
    Evaluation { tag: String, reason: String },

    /// A filter call whose filter resolves to nothing.
    #[error("Missing filter `{name}`")]
    MissingFilter { name: String },

    /// A filter call whose filter resolves to a value that is not a filter.
    #[error("`{name}` is not a filter")]
    NotAFilter { name: String },

    /// Iteration was requested over a value that is neither a sequence nor a mapping.
    #[error("Non-enumerable argument in each filter: {value}")]
    NonEnumerable { value: String },

    /// The items of a sequence rendered with different content types.
    #[error("Content type mismatch")]
    ContentTypeMismatch,

    /// Failure reported by a host-supplied render function or filter.
    #[error("{0}")]
    Custom(String),
}

impl RenderError {
    /// Create an error from any message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Errors returned by the public template API.
#[derive(Debug, Error)]
pub enum MustacheError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// A template name the template source cannot resolve.
    #[error("No such template `{name}`")]
    TemplateNotFound { name: String },

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for public template operations.
pub type MustacheResult<T> = Result<T, MustacheError>;
