/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates.

use crate::ast::TemplateAst;
use crate::context::Context;
use crate::engine::RenderingEngine;
use crate::error::MustacheResult;
use crate::rendering::{ContentType, Rendering};
use crate::repository::{DirectorySource, TemplateRepository};
use crate::value::Value;
use std::path::Path;
use std::sync::Arc;

/// A compiled template, ready to render.
///
/// Cloning a template is cheap: clones share the compiled AST. Each clone has
/// its own base context.
#[derive(Debug, Clone)]
pub struct Template {
    ast: Arc<TemplateAst>,
    base_context: Context,
}

impl Template {
    pub(crate) fn new(ast: Arc<TemplateAst>, base_context: Context) -> Self {
        Self { ast, base_context }
    }

    /// Compile a template from source text.
    ///
    /// The template has no partials to load; use a [`TemplateRepository`] for that.
    pub fn compile(source: &str) -> MustacheResult<Self> {
        TemplateRepository::default().template_from_string(source)
    }

    /// Compile a template from a file, resolving partials from the filesystem.
    ///
    /// Partials are loaded relative to the template file. Partial names without
    /// an extension get the extension of the template file.
    pub fn compile_from_file(path: impl AsRef<Path>) -> MustacheResult<Self> {
        let path = path.as_ref();
        let directory = path.parent().unwrap_or(Path::new("."));
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or("");
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let source = DirectorySource::new(directory).with_extension(extension);
        TemplateRepository::new(source).template(&name)
    }

    /// Render the template with `value` on top of the base context.
    pub fn render(&self, value: &Value) -> MustacheResult<String> {
        let rendering = self.render_with_context(&self.base_context.extended(value.clone()))?;
        Ok(rendering.string)
    }

    /// Render the template in `context`, ignoring the base context.
    pub fn render_with_context(&self, context: &Context) -> MustacheResult<Rendering> {
        Ok(RenderingEngine::new(Arc::clone(&self.ast), context.clone()).render()?)
    }

    /// Make `key` resolve to `value` in every rendering of this template.
    pub fn register(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.base_context = self.base_context.with_registered_key(key, value);
    }

    /// Push a value on the base context.
    pub fn extend_base_context(&mut self, value: impl Into<Value>) {
        self.base_context = self.base_context.extended(value);
    }

    pub fn base_context(&self) -> &Context {
        &self.base_context
    }

    pub fn content_type(&self) -> ContentType {
        self.ast.content_type()
    }

    pub(crate) fn ast(&self) -> &Arc<TemplateAst> {
        &self.ast
    }
}

/// A template used as a value renders in the context of the tag that renders it.
impl From<Template> for Value {
    fn from(template: Template) -> Self {
        let ast = template.ast;
        Value::render_fn(move |info| {
            RenderingEngine::new(Arc::clone(&ast), info.context.clone()).render()
        })
    }
}
