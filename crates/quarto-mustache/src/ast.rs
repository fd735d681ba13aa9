/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! A [`TemplateAst`] is built once per template or partial by the
//! [`TemplateCompiler`](crate::compiler::TemplateCompiler) and is immutable
//! afterwards. Partials and inherited partials hold an `Arc` to the AST they
//! reference, so one AST may be reachable from many places; the identity of
//! the `Arc` is what inheritance resolution compares.

use crate::context::Context;
use crate::engine::RenderingEngine;
use crate::error::{RenderResult, SourceLocation};
use crate::expression::Expression;
use crate::rendering::{ContentType, Rendering};
use crate::token::TagDelimiterPair;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A compiled template: its nodes and its content type.
pub struct TemplateAst {
    body: OnceLock<AstBody>,
}

struct AstBody {
    nodes: Vec<Node>,
    content_type: ContentType,
}

impl TemplateAst {
    pub fn new(nodes: Vec<Node>, content_type: ContentType) -> Arc<Self> {
        let ast = Self::placeholder();
        ast.fill(nodes, content_type);
        ast
    }

    /// An AST whose body is provided later with [`TemplateAst::fill`].
    ///
    /// Recursive partials reference the placeholder of the template being compiled.
    pub(crate) fn placeholder() -> Arc<Self> {
        Arc::new(Self {
            body: OnceLock::new(),
        })
    }

    /// Set the body of a placeholder. A body that is already set is never replaced.
    pub(crate) fn fill(&self, nodes: Vec<Node>, content_type: ContentType) -> bool {
        self.body
            .set(AstBody {
                nodes,
                content_type,
            })
            .is_ok()
    }

    pub fn nodes(&self) -> &[Node] {
        match self.body.get() {
            Some(body) => &body.nodes,
            None => &[],
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.body
            .get()
            .map_or(ContentType::default(), |body| body.content_type)
    }
}

impl fmt::Debug for TemplateAst {
    // Shallow: partial ASTs may reference each other recursively.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateAst")
            .field("nodes", &self.nodes().len())
            .field("content_type", &self.content_type())
            .finish()
    }
}

/// A node in the template AST.
#[derive(Debug, Clone)]
pub enum Node {
    /// Literal text to be output as-is.
    Text(String),

    /// `{{name}}`, `{{{name}}}` or `{{&name}}`
    Variable(VariableNode),

    /// `{{#name}}...{{/name}}` or `{{^name}}...{{/name}}`
    Section(SectionNode),

    /// `{{$name}}...{{/name}}`
    InheritableSection(InheritableSection),

    /// `{{>name}}`
    Partial(PartialNode),

    /// `{{<name}}...{{/name}}`
    InheritedPartial(InheritedPartial),
}

#[derive(Debug, Clone)]
pub struct VariableNode {
    pub tag: Tag,
    pub expression: Expression,
    pub escapes_html: bool,
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    /// The tag, which holds the inner AST.
    pub tag: Tag,
    pub expression: Expression,
    pub inverted: bool,
}

/// An overridable block of a parent template.
#[derive(Debug, Clone)]
pub struct InheritableSection {
    pub name: String,
    pub inner_ast: Arc<TemplateAst>,
}

#[derive(Debug, Clone)]
pub struct PartialNode {
    pub name: String,
    pub ast: Arc<TemplateAst>,
}

/// Inclusion of a parent template with overrides for its inheritable sections.
#[derive(Debug, Clone)]
pub struct InheritedPartial {
    pub name: String,
    pub parent_partial_ast: Arc<TemplateAst>,
    /// The content between `{{<name}}` and `{{/name}}`.
    pub overriding_ast: Arc<TemplateAst>,
}

impl InheritedPartial {
    pub fn frame(&self) -> InheritanceFrame {
        InheritanceFrame {
            parent_partial_ast: Arc::clone(&self.parent_partial_ast),
            overriding_ast: Arc::clone(&self.overriding_ast),
        }
    }
}

/// An inherited partial being rendered, as recorded in the context.
#[derive(Debug, Clone)]
pub struct InheritanceFrame {
    pub parent_partial_ast: Arc<TemplateAst>,
    pub overriding_ast: Arc<TemplateAst>,
}

/// Whether a tag is a variable or a section tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Variable,
    Section,
}

/// A variable or section tag, as seen by values while they render.
#[derive(Debug, Clone)]
pub struct Tag {
    kind: TagKind,
    delimiters: TagDelimiterPair,
    location: SourceLocation,
    /// The literal opening tag, e.g. `{{#items}}`.
    source: String,
    section: Option<SectionBody>,
}

#[derive(Debug, Clone)]
struct SectionBody {
    inner_ast: Arc<TemplateAst>,
    inner_template_string: String,
}

impl Tag {
    pub fn variable(
        source: impl Into<String>,
        delimiters: TagDelimiterPair,
        location: SourceLocation,
    ) -> Self {
        Self {
            kind: TagKind::Variable,
            delimiters,
            location,
            source: source.into(),
            section: None,
        }
    }

    pub fn section(
        source: impl Into<String>,
        delimiters: TagDelimiterPair,
        location: SourceLocation,
        inner_ast: Arc<TemplateAst>,
        inner_template_string: impl Into<String>,
    ) -> Self {
        Self {
            kind: TagKind::Section,
            delimiters,
            location,
            source: source.into(),
            section: Some(SectionBody {
                inner_ast,
                inner_template_string: inner_template_string.into(),
            }),
        }
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// The delimiters in effect where the tag appears.
    pub fn tag_delimiter_pair(&self) -> &TagDelimiterPair {
        &self.delimiters
    }

    /// The literal template text between a section's opening and closing tags.
    ///
    /// Empty for variable tags.
    pub fn inner_template_string(&self) -> &str {
        self.section
            .as_ref()
            .map_or("", |section| section.inner_template_string.as_str())
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Render the content of a section tag in `context`.
    ///
    /// Variable tags have no content and render as empty text.
    pub fn render(&self, context: &Context) -> RenderResult<Rendering> {
        match &self.section {
            Some(section) => {
                RenderingEngine::new(Arc::clone(&section.inner_ast), context.clone()).render()
            }
            None => Ok(Rendering::text("")),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::variable("{{name}}", TagDelimiterPair::default(), SourceLocation::new(1, None))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` at {}", self.source, self.location)
    }
}
