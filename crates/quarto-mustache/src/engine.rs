/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The rendering engine.
//!
//! A [`RenderingEngine`] interprets one [`TemplateAst`] against a base
//! [`Context`]. It holds the output buffer, the only mutable state of a render,
//! so every render uses its own engine while ASTs and values are shared.
//!
//! Subtrees whose content type differs from the root's (a text partial
//! included in an HTML template, for example) are rendered by a nested engine
//! and escaped once where they are merged back.

use crate::ast::{InheritableSection, Node, Tag, TagKind, TemplateAst};
use crate::context::Context;
use crate::error::{RenderError, RenderResult};
use crate::expression::Expression;
use crate::rendering::{ContentType, Rendering, RenderingInfo, escape_html};
use std::sync::Arc;

pub struct RenderingEngine {
    template_ast: Arc<TemplateAst>,
    base_context: Context,
    buffer: String,
}

impl RenderingEngine {
    pub fn new(template_ast: Arc<TemplateAst>, base_context: Context) -> Self {
        Self {
            template_ast,
            base_context,
            buffer: String::new(),
        }
    }

    /// Render the whole template.
    ///
    /// On error the partial output is dropped.
    pub fn render(&mut self) -> RenderResult<Rendering> {
        self.buffer.clear();
        let ast = Arc::clone(&self.template_ast);
        let context = self.base_context.clone();
        self.render_ast(&ast, &context)?;
        Ok(Rendering::new(
            std::mem::take(&mut self.buffer),
            self.template_ast.content_type(),
        ))
    }

    fn content_type(&self) -> ContentType {
        self.template_ast.content_type()
    }

    fn render_ast(&mut self, ast: &Arc<TemplateAst>, context: &Context) -> RenderResult<()> {
        let content_type = self.content_type();
        if ast.content_type() == content_type {
            for node in ast.nodes() {
                self.render_node(node, context)?;
            }
            return Ok(());
        }

        tracing::trace!(
            outer = ?content_type,
            inner = ?ast.content_type(),
            "Rendering template of another content type"
        );
        let rendering = RenderingEngine::new(Arc::clone(ast), context.clone()).render()?;
        if content_type == ContentType::Html && rendering.content_type == ContentType::Text {
            self.buffer.push_str(&escape_html(&rendering.string));
        } else {
            self.buffer.push_str(&rendering.string);
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, context: &Context) -> RenderResult<()> {
        match node {
            Node::Text(text) => {
                self.buffer.push_str(text);
                Ok(())
            }
            Node::Variable(variable) => self.render_tag(
                &variable.tag,
                &variable.expression,
                false,
                variable.escapes_html,
                context,
            ),
            // Section renderings are escaped only when they turn out to be text.
            Node::Section(section) => {
                self.render_tag(&section.tag, &section.expression, section.inverted, true, context)
            }
            Node::InheritableSection(section) => {
                let resolved = resolve_inheritable_section(section, context);
                self.render_ast(&resolved.inner_ast, context)
            }
            Node::InheritedPartial(partial) => {
                let context = context.extended_with_inheritance_frame(partial.frame());
                self.render_ast(&partial.parent_partial_ast, &context)
            }
            Node::Partial(partial) => self.render_ast(&partial.ast, context),
        }
    }

    fn render_tag(
        &mut self,
        tag: &Tag,
        expression: &Expression,
        inverted: bool,
        escapes_html: bool,
        context: &Context,
    ) -> RenderResult<()> {
        let mut value = expression
            .evaluate(context)
            .map_err(|error| RenderError::Evaluation {
                tag: tag.to_string(),
                reason: error.to_string(),
            })?;

        for will_render in context.will_render_stack() {
            value = will_render(tag, value);
        }

        let info = RenderingInfo::new(tag, context.clone());
        let result = match (tag.kind(), inverted, value.bool_value()) {
            (TagKind::Variable, _, _) | (TagKind::Section, false, true) => value.render(&info),
            (TagKind::Section, true, false) => tag.render(context),
            (TagKind::Section, _, _) => Ok(Rendering::text("")),
        };

        let did_render_stack = context.did_render_stack();
        let rendering = match result {
            Ok(rendering) => rendering,
            Err(error) => {
                for did_render in &did_render_stack {
                    did_render(tag, &value, None);
                }
                return Err(error);
            }
        };

        let string = if self.content_type() == ContentType::Html
            && rendering.content_type == ContentType::Text
            && escapes_html
        {
            escape_html(&rendering.string)
        } else {
            rendering.string
        };
        self.buffer.push_str(&string);

        for did_render in &did_render_stack {
            did_render(tag, &value, Some(&string));
        }
        Ok(())
    }
}

/// The section that actually renders for `section`, given the inherited partials in `context`.
///
/// A parent template reused at several levels of the inheritance chain is only
/// applied once: the first time it provides an override.
fn resolve_inheritable_section(
    section: &InheritableSection,
    context: &Context,
) -> InheritableSection {
    let mut resolved = section.clone();
    let mut used_parents: Vec<Arc<TemplateAst>> = Vec::new();

    for frame in context.inheritance_frames() {
        let parent = &frame.parent_partial_ast;
        if used_parents.iter().any(|used| Arc::ptr_eq(used, parent)) {
            continue;
        }

        let mut visiting = Vec::new();
        let (candidate, found) = search_override(resolved.clone(), parent, &mut visiting);
        let (candidate, found_in_overrides) =
            search_override(candidate, &frame.overriding_ast, &mut visiting);
        if found || found_in_overrides {
            resolved = candidate;
            used_parents.push(Arc::clone(parent));
        }
    }

    resolved
}

/// Look for sections overriding `section` at the top level of `ast` and the partials it includes.
///
/// `visiting` holds the ASTs being searched, so that recursive partials are not re-entered.
fn search_override(
    mut section: InheritableSection,
    ast: &Arc<TemplateAst>,
    visiting: &mut Vec<Arc<TemplateAst>>,
) -> (InheritableSection, bool) {
    if visiting.iter().any(|other| Arc::ptr_eq(other, ast)) {
        return (section, false);
    }
    visiting.push(Arc::clone(ast));

    let mut found = false;
    for node in ast.nodes() {
        match node {
            Node::InheritableSection(candidate) if candidate.name == section.name => {
                section = candidate.clone();
                found = true;
            }
            Node::InheritedPartial(partial) => {
                let (candidate, found_in_parent) =
                    search_override(section, &partial.parent_partial_ast, visiting);
                let (candidate, found_in_overrides) =
                    search_override(candidate, &partial.overriding_ast, visiting);
                section = candidate;
                found |= found_in_parent || found_in_overrides;
            }
            Node::Partial(partial) => {
                let (candidate, found_in_partial) = search_override(section, &partial.ast, visiting);
                section = candidate;
                found |= found_in_partial;
            }
            _ => {}
        }
    }

    visiting.pop();
    (section, found)
}
