/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mustache template engine for Quarto.
//!
//! This crate implements logic-less [Mustache](https://mustache.github.io)
//! templates with template inheritance. It supports:
//!
//! - Variables: `{{name}}` (HTML-escaped), `{{{name}}}` and `{{&name}}` (raw)
//! - Dotted names and filters: `{{user.name}}`, `{{uppercase(name)}}`
//! - Sections and inverted sections: `{{#items}}...{{/items}}`, `{{^items}}...{{/items}}`
//! - Partials: `{{>header}}`, including recursive partials
//! - Template inheritance: `{{<layout}}{{$title}}...{{/title}}{{/layout}}`
//! - Delimiter switching: `{{=<% %>=}}`
//! - Content type pragmas: `{{%CONTENT_TYPE:TEXT}}`
//! - Comments: `{{! comment }}`
//!
//! # Architecture
//!
//! Templates go through three stages:
//!
//! 1. [`TemplateParser`] scans the template text into [`Token`]s.
//! 2. The compiler assembles tokens into an immutable [`TemplateAst`], loading
//!    partials through a [`TemplateRepository`].
//! 3. A rendering engine interprets the AST against a [`Context`], a persistent
//!    stack of [`Value`]s.
//!
//! Compiled templates and values can be rendered from several threads at once.
//!
//! # Example
//!
//! ```ignore
//! use quarto_mustache::{MemorySource, Template, TemplateRepository, Value};
//!
//! // Compile a template
//! let template = Template::compile("Hello, {{name}}!")?;
//!
//! // Render it with some data
//! let data = Value::map([("name", "World")]);
//! assert_eq!(template.render(&data)?, "Hello, World!");
//!
//! // Templates with partials come from a repository
//! let repository = TemplateRepository::new(MemorySource::with_templates([
//!     ("layout", "<h1>{{$title}}Untitled{{/title}}</h1>"),
//!     ("page", "{{<layout}}{{$title}}{{name}}{{/title}}{{/layout}}"),
//! ]));
//! let page = repository.template("page")?;
//! assert_eq!(page.render(&data)?, "<h1>World</h1>");
//! ```

pub mod ast;
mod compiler;
pub mod configuration;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod goodies;
pub mod parser;
pub mod rendering;
pub mod repository;
pub mod template;
pub mod token;
pub mod value;

// Re-export main types at crate root
pub use ast::{InheritanceFrame, Node, Tag, TagKind, TemplateAst};
pub use configuration::{Configuration, ConfigurationOptions};
pub use context::Context;
pub use engine::RenderingEngine;
pub use error::{
    ExpressionError, MustacheError, MustacheResult, ParseError, RenderError, RenderResult,
    SourceLocation,
};
pub use expression::Expression;
pub use goodies::standard_library;
pub use parser::{TemplateParser, TokenConsumer};
pub use rendering::{ContentType, Rendering, RenderingInfo, escape_html};
pub use repository::{DirectorySource, MemorySource, TemplateRepository, TemplateSource};
pub use template::Template;
pub use token::{TagDelimiterPair, Token, TokenKind};
pub use value::{CustomValue, DidRenderFn, FilterFn, LookupFn, RenderFn, Value, WillRenderFn};
