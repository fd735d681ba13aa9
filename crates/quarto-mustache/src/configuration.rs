/*
 * configuration.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Settings shared by the templates of a [`TemplateRepository`](crate::TemplateRepository).

use crate::context::Context;
use crate::goodies::standard_library;
use crate::rendering::ContentType;
use crate::token::TagDelimiterPair;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// How templates are compiled and the context they render in.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Content type of templates without a `CONTENT_TYPE` pragma.
    pub content_type: ContentType,

    /// Delimiters templates start with.
    pub tag_delimiter_pair: TagDelimiterPair,

    /// Context every rendering starts from.
    pub base_context: Context,
}

impl Default for Configuration {
    /// HTML templates with `{{`/`}}` delimiters and the standard library in scope.
    fn default() -> Self {
        Self {
            content_type: ContentType::Html,
            tag_delimiter_pair: TagDelimiterPair::default(),
            base_context: Context::with_value(standard_library()),
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_tag_delimiter_pair(mut self, tag_delimiter_pair: TagDelimiterPair) -> Self {
        self.tag_delimiter_pair = tag_delimiter_pair;
        self
    }

    /// Replace the base context, standard library included.
    pub fn with_base_context(mut self, base_context: Context) -> Self {
        self.base_context = base_context;
        self
    }

    /// Push a value on the base context.
    pub fn extend_base_context(mut self, value: impl Into<Value>) -> Self {
        self.base_context = self.base_context.extended(value);
        self
    }

    /// Make `key` resolve to `value` in every rendering.
    pub fn with_registered_key(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.base_context = self.base_context.with_registered_key(key, value);
        self
    }

    /// Apply settings loaded from a configuration file.
    pub fn with_options(mut self, options: ConfigurationOptions) -> Self {
        if let Some(content_type) = options.content_type {
            self.content_type = content_type;
        }
        if let Some(tag_delimiter_pair) = options.tag_delimiter_pair {
            self.tag_delimiter_pair = tag_delimiter_pair;
        }
        self
    }
}

/// The serializable part of a [`Configuration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigurationOptions {
    pub content_type: Option<ContentType>,
    pub tag_delimiter_pair: Option<TagDelimiterPair>,
}
