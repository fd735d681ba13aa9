/*
 * repository.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template loading and caching.
//!
//! A [`TemplateSource`] turns template names into identifiers and identifiers
//! into template strings. A [`TemplateRepository`] compiles the templates of a
//! source on demand and caches the resulting ASTs, so that every reference to a
//! template, from any template of the repository, shares one AST.

use crate::ast::{Node, TemplateAst};
use crate::compiler::TemplateCompiler;
use crate::configuration::Configuration;
use crate::error::{MustacheError, MustacheResult};
use crate::parser::TemplateParser;
use crate::rendering::ContentType;
use crate::template::Template;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Trait for loading templates.
///
/// Implementations of this trait are responsible for finding templates by
/// name, relative to the template that references them, and for loading their
/// content.
pub trait TemplateSource: Send + Sync {
    /// The identifier of the template `name`, referenced from `base_template_id`.
    ///
    /// `base_template_id` is `None` for templates that were not loaded from this
    /// source. Returns `None` when there is no such template.
    fn template_id(&self, name: &str, base_template_id: Option<&str>) -> Option<String>;

    /// The content of the template identified by `template_id`.
    fn template_string(&self, template_id: &str) -> MustacheResult<String>;
}

/// Source that loads templates from an in-memory map.
///
/// Useful for testing and for scenarios where templates are bundled
/// into the application. Names are identifiers.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    templates: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template to the source.
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.templates.insert(name.into(), content.into());
        self
    }

    /// Create a source with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut source = Self::new();
        for (name, content) in templates {
            source.add(name, content);
        }
        source
    }
}

impl TemplateSource for MemorySource {
    fn template_id(&self, name: &str, _base_template_id: Option<&str>) -> Option<String> {
        self.templates.contains_key(name).then(|| name.to_string())
    }

    fn template_string(&self, template_id: &str) -> MustacheResult<String> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| MustacheError::TemplateNotFound {
                name: template_id.to_string(),
            })
    }
}

/// Source that loads templates from files under a root directory.
///
/// Path resolution rules:
/// - Names are relative to the directory of the referencing template
/// - A leading `/` makes a name relative to the root directory
/// - A name without an extension gets the source's extension (`mustache` by default)
/// - Names that would leave the root directory are not found
///
/// Identifiers are `/`-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "mustache".to_string(),
        }
    }

    /// Use another extension for names that have none. An empty one adds nothing.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl TemplateSource for DirectorySource {
    fn template_id(&self, name: &str, base_template_id: Option<&str>) -> Option<String> {
        let template_id = resolve_template_path(name, base_template_id, &self.extension)?;
        self.root.join(&template_id).is_file().then_some(template_id)
    }

    fn template_string(&self, template_id: &str) -> MustacheResult<String> {
        Ok(std::fs::read_to_string(self.root.join(template_id))?)
    }
}

/// Resolve a template name to a path relative to the root of a [`DirectorySource`].
///
/// # Examples
///
/// ```ignore
/// // Base: partials/doc.mustache, Name: "header"      → partials/header.mustache
/// // Base: partials/doc.mustache, Name: "header.html" → partials/header.html
/// // Base: partials/doc.mustache, Name: "/header"     → header.mustache
/// // Base: partials/doc.mustache, Name: "../header"   → header.mustache
/// ```
pub fn resolve_template_path(
    name: &str,
    base_template_id: Option<&str>,
    extension: &str,
) -> Option<String> {
    let (base_dir, name) = match name.strip_prefix('/') {
        Some(from_root) => (Path::new(""), from_root),
        None => (
            base_template_id
                .and_then(|id| Path::new(id).parent())
                .unwrap_or(Path::new("")),
            name,
        ),
    };

    let mut path = base_dir.join(name);
    if path.extension().is_none() && !extension.is_empty() {
        path.set_extension(extension);
    }

    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => components.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!components.is_empty()).then(|| components.join("/"))
}

/// Compiles and caches the templates of a [`TemplateSource`].
///
/// Compilation is serialized: one template (with the partials it pulls in) is
/// compiled at a time. Compiled templates are immutable and render without locking.
pub struct TemplateRepository {
    source: Option<Box<dyn TemplateSource>>,
    configuration: Configuration,
    templates: Mutex<HashMap<String, Arc<TemplateAst>>>,
    compile_lock: Mutex<()>,
}

impl Default for TemplateRepository {
    /// A repository without templates, for templates that do not use partials.
    fn default() -> Self {
        Self {
            source: None,
            configuration: Configuration::default(),
            templates: Mutex::new(HashMap::new()),
            compile_lock: Mutex::new(()),
        }
    }
}

impl TemplateRepository {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::default()
        }
    }

    /// A repository of the template files under `root`.
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySource::new(root))
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The template named `name`.
    pub fn template(&self, name: &str) -> MustacheResult<Template> {
        let ast = self.compiling(|| {
            self.partial(name, None)?
                .ok_or_else(|| MustacheError::TemplateNotFound {
                    name: name.to_string(),
                })
        })?;
        Ok(self.make_template(ast))
    }

    /// Compile a template string whose partials are loaded from this repository.
    pub fn template_from_string(&self, template_string: &str) -> MustacheResult<Template> {
        let ast = self.compiling(|| {
            let (nodes, content_type) = self.compile(template_string, None)?;
            Ok(TemplateAst::new(nodes, content_type))
        })?;
        Ok(self.make_template(ast))
    }

    /// Forget compiled templates, so that sources are read again.
    ///
    /// Templates already handed out keep their ASTs.
    pub fn reload_templates(&self) {
        let _guard = lock(&self.compile_lock);
        self.templates().clear();
    }

    fn make_template(&self, ast: Arc<TemplateAst>) -> Template {
        Template::new(ast, self.configuration.base_context.clone())
    }

    fn templates(&self) -> MutexGuard<'_, HashMap<String, Arc<TemplateAst>>> {
        lock(&self.templates)
    }

    /// Run a compilation under the compile lock.
    ///
    /// On failure, templates cached during the attempt are discarded.
    fn compiling<T>(&self, compile: impl FnOnce() -> MustacheResult<T>) -> MustacheResult<T> {
        let _guard = lock(&self.compile_lock);
        let cached: HashSet<String> = self.templates().keys().cloned().collect();
        let result = compile();
        if let Err(error) = &result {
            tracing::debug!(error = %error, "Template compilation failed");
            self.templates().retain(|template_id, _| cached.contains(template_id));
        }
        result
    }

    /// The AST of the template `name` referenced from `base_template_id`.
    ///
    /// Must be called under the compile lock.
    pub(crate) fn partial(
        &self,
        name: &str,
        base_template_id: Option<&str>,
    ) -> MustacheResult<Option<Arc<TemplateAst>>> {
        let Some(source) = &self.source else {
            return Ok(None);
        };
        let Some(template_id) = source.template_id(name, base_template_id) else {
            return Ok(None);
        };

        let cached = self.templates().get(&template_id).cloned();
        if let Some(ast) = cached {
            tracing::debug!(template_id = %template_id, "Reusing compiled template");
            return Ok(Some(ast));
        }

        // Cache the AST before compiling it, so that recursive partials find it.
        let ast = TemplateAst::placeholder();
        self.templates()
            .insert(template_id.clone(), Arc::clone(&ast));

        let template_string = source.template_string(&template_id)?;
        let (nodes, content_type) = self.compile(&template_string, Some(&template_id))?;
        ast.fill(nodes, content_type);
        tracing::debug!(
            template_id = %template_id,
            content_type = ?content_type,
            "Compiled template"
        );
        Ok(Some(ast))
    }

    fn compile(
        &self,
        template_string: &str,
        template_id: Option<&str>,
    ) -> MustacheResult<(Vec<Node>, ContentType)> {
        let mut compiler =
            TemplateCompiler::new(self, template_id, self.configuration.content_type);
        TemplateParser::new(self.configuration.tag_delimiter_pair.clone()).parse(
            template_string,
            template_id,
            &mut compiler,
        );
        compiler.finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
