/*
 * rendering.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Rendered output and the information handed to render functions.

use crate::ast::Tag;
use crate::context::Context;
use serde::{Deserialize, Serialize};

/// Whether output is HTML (escaped when interpolated text is embedded) or plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Text,
}

/// The output of a render step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    pub string: String,
    pub content_type: ContentType,
}

impl Rendering {
    pub fn new(string: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            string: string.into(),
            content_type,
        }
    }

    /// A plain text rendering, escaped when embedded in HTML.
    pub fn text(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Text)
    }

    /// An HTML rendering, embedded verbatim in HTML.
    pub fn html(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Html)
    }
}

/// What a value needs to know to render itself for a tag.
#[derive(Debug, Clone)]
pub struct RenderingInfo<'a> {
    /// The tag being rendered.
    pub tag: &'a Tag,
    /// The context at the tag.
    pub context: Context,
    /// Set when the value is an item of a sequence being rendered.
    pub enumeration_item: bool,
}

impl<'a> RenderingInfo<'a> {
    pub fn new(tag: &'a Tag, context: Context) -> Self {
        Self {
            tag,
            context,
            enumeration_item: false,
        }
    }

    /// The same rendering, in another context.
    pub fn with_context(&self, context: Context) -> Self {
        Self {
            tag: self.tag,
            context,
            enumeration_item: self.enumeration_item,
        }
    }

    pub(crate) fn as_enumeration_item(&self) -> Self {
        Self {
            tag: self.tag,
            context: self.context.clone(),
            enumeration_item: true,
        }
    }
}

/// Escape the characters that are significant in HTML.
pub fn escape_html(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_content_type_deserializes_lowercase() {
        let content_type: ContentType = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(content_type, ContentType::Text);
        assert_eq!(serde_json::to_string(&ContentType::Html).unwrap(), "\"html\"");
    }
}
