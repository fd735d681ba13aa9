/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Assembly of tokens into a [`TemplateAst`].
//!
//! The compiler consumes the token stream of one template, matches opening and
//! closing tags, parses tag expressions, and resolves partials through the
//! template repository. Parsing stops at the first error.

use crate::ast::{
    InheritableSection, InheritedPartial, Node, PartialNode, SectionNode, Tag, TemplateAst,
    VariableNode,
};
use crate::error::{MustacheError, MustacheResult, ParseError};
use crate::expression::Expression;
use crate::parser::TokenConsumer;
use crate::rendering::ContentType;
use crate::repository::TemplateRepository;
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static CONTENT_TYPE_PRAGMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CONTENT_TYPE\s*:\s*(TEXT|HTML)$")
        .expect("Invalid regex pattern for content type pragma")
});

/// The content type of the template being compiled.
///
/// It may be set by a pragma until the first tag that renders something.
#[derive(Debug, Clone, Copy)]
enum ContentTypeState {
    Unlocked(ContentType),
    Locked(ContentType),
}

impl ContentTypeState {
    fn content_type(self) -> ContentType {
        match self {
            ContentTypeState::Unlocked(content_type) | ContentTypeState::Locked(content_type) => {
                content_type
            }
        }
    }

    fn lock(&mut self) {
        *self = ContentTypeState::Locked(self.content_type());
    }
}

enum ScopeKind {
    Root,
    Section {
        opening: Token,
        expression: Expression,
        inverted: bool,
    },
    InheritableSection {
        opening: Token,
        name: String,
    },
    InheritedPartial {
        opening: Token,
        name: String,
        parent_partial_ast: Arc<TemplateAst>,
    },
}

struct CompilerScope {
    kind: ScopeKind,
    nodes: Vec<Node>,
}

pub(crate) struct TemplateCompiler<'a> {
    repository: &'a TemplateRepository,
    template_id: Option<String>,
    content_type: ContentTypeState,
    scopes: Vec<CompilerScope>,
    failure: Option<MustacheError>,
}

impl<'a> TemplateCompiler<'a> {
    pub(crate) fn new(
        repository: &'a TemplateRepository,
        template_id: Option<&str>,
        content_type: ContentType,
    ) -> Self {
        Self {
            repository,
            template_id: template_id.map(str::to_string),
            content_type: ContentTypeState::Unlocked(content_type),
            scopes: vec![CompilerScope {
                kind: ScopeKind::Root,
                nodes: Vec::new(),
            }],
            failure: None,
        }
    }

    /// The nodes and content type of the compiled template.
    pub(crate) fn finish(mut self) -> MustacheResult<(Vec<Node>, ContentType)> {
        if let Some(error) = self.failure {
            return Err(error);
        }
        // The innermost scope still open is the one reported.
        if let Some(error) = self.scopes.iter().rev().find_map(|scope| unclosed(&scope.kind)) {
            return Err(error.into());
        }
        let content_type = self.content_type.content_type();
        let nodes = self.scopes.pop().map(|root| root.nodes).unwrap_or_default();
        Ok((nodes, content_type))
    }

    fn current_nodes(&mut self) -> &mut Vec<Node> {
        // The root scope is never popped while tokens are consumed.
        let last = self.scopes.len() - 1;
        &mut self.scopes[last].nodes
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(CompilerScope {
            kind,
            nodes: Vec::new(),
        });
    }

    fn parse_expression(token: &Token, content: &str) -> Result<Expression, ParseError> {
        Expression::parse(content).map_err(|error| ParseError::InvalidExpression {
            expression: content.trim().to_string(),
            message: error.to_string(),
            location: token.location(),
        })
    }

    fn resolve_partial(&self, token: &Token, name: &str) -> MustacheResult<Arc<TemplateAst>> {
        self.repository
            .partial(name, self.template_id.as_deref())?
            .ok_or_else(|| {
                ParseError::MissingPartial {
                    name: name.to_string(),
                    location: token.location(),
                }
                .into()
            })
    }

    fn consume(&mut self, token: Token) -> MustacheResult<()> {
        match &token.kind {
            TokenKind::Text(text) => {
                self.current_nodes().push(Node::Text(text.clone()));
            }
            TokenKind::Comment | TokenKind::SetDelimiters => {}
            TokenKind::Pragma { content } => self.pragma(&token, content.trim())?,
            TokenKind::EscapedVariable {
                content,
                delimiters,
            }
            | TokenKind::UnescapedVariable {
                content,
                delimiters,
            } => {
                self.content_type.lock();
                let expression = Self::parse_expression(&token, content)?;
                let escapes_html = matches!(token.kind, TokenKind::EscapedVariable { .. });
                let tag = Tag::variable(token.source(), delimiters.clone(), token.location());
                self.current_nodes().push(Node::Variable(VariableNode {
                    tag,
                    expression,
                    escapes_html,
                }));
            }
            TokenKind::Section { content, .. } | TokenKind::InvertedSection { content, .. } => {
                self.content_type.lock();
                let expression = Self::parse_expression(&token, content)?;
                let inverted = matches!(token.kind, TokenKind::InvertedSection { .. });
                self.push_scope(ScopeKind::Section {
                    opening: token,
                    expression,
                    inverted,
                });
            }
            TokenKind::InheritableSection { content } => {
                self.content_type.lock();
                let name = required_name(&token, content, "inheritable section")?;
                self.push_scope(ScopeKind::InheritableSection {
                    opening: token,
                    name,
                });
            }
            TokenKind::Partial { content } => {
                self.content_type.lock();
                let name = required_name(&token, content, "partial")?;
                let ast = self.resolve_partial(&token, &name)?;
                self.current_nodes()
                    .push(Node::Partial(PartialNode { name, ast }));
            }
            TokenKind::InheritedPartial { content } => {
                self.content_type.lock();
                let name = required_name(&token, content, "partial")?;
                let parent_partial_ast = self.resolve_partial(&token, &name)?;
                self.push_scope(ScopeKind::InheritedPartial {
                    opening: token,
                    name,
                    parent_partial_ast,
                });
            }
            TokenKind::Close { content } => self.close(&token, content.trim())?,
        }
        Ok(())
    }

    fn pragma(&mut self, token: &Token, pragma: &str) -> Result<(), ParseError> {
        let Some(captures) = CONTENT_TYPE_PRAGMA.captures(pragma) else {
            return Ok(());
        };
        let content_type = match &captures[1] {
            "TEXT" => ContentType::Text,
            _ => ContentType::Html,
        };
        match self.content_type {
            ContentTypeState::Unlocked(_) => {
                self.content_type = ContentTypeState::Unlocked(content_type);
                Ok(())
            }
            ContentTypeState::Locked(_) => Err(ParseError::MisplacedPragma {
                pragma: pragma.to_string(),
                location: token.location(),
            }),
        }
    }

    fn close(&mut self, token: &Token, name: &str) -> Result<(), ParseError> {
        let unmatched = || ParseError::UnmatchedClosingTag {
            tag: token.source().to_string(),
            location: token.location(),
        };

        let matches = match self.scopes.last().map(|scope| &scope.kind) {
            None | Some(ScopeKind::Root) => false,
            Some(_) if name.is_empty() => true,
            Some(ScopeKind::Section { expression, .. }) => {
                Expression::parse(name).is_ok_and(|closing| closing == *expression)
            }
            Some(
                ScopeKind::InheritableSection { name: open, .. }
                | ScopeKind::InheritedPartial { name: open, .. },
            ) => open == name,
        };
        if !matches {
            return Err(unmatched());
        }

        let Some(scope) = self.scopes.pop() else {
            return Err(unmatched());
        };
        let content_type = self.content_type.content_type();
        let inner_ast = TemplateAst::new(scope.nodes, content_type);
        let node = match scope.kind {
            ScopeKind::Root => return Err(unmatched()),
            ScopeKind::Section {
                opening,
                expression,
                inverted,
            } => {
                let delimiters = match &opening.kind {
                    TokenKind::Section { delimiters, .. }
                    | TokenKind::InvertedSection { delimiters, .. } => delimiters.clone(),
                    _ => Default::default(),
                };
                let inner_template_string =
                    &opening.template_string[opening.range.end..token.range.start];
                let tag = Tag::section(
                    opening.source(),
                    delimiters,
                    opening.location(),
                    inner_ast,
                    inner_template_string,
                );
                Node::Section(SectionNode {
                    tag,
                    expression,
                    inverted,
                })
            }
            ScopeKind::InheritableSection { name, .. } => {
                Node::InheritableSection(InheritableSection { name, inner_ast })
            }
            ScopeKind::InheritedPartial {
                name,
                parent_partial_ast,
                ..
            } => Node::InheritedPartial(InheritedPartial {
                name,
                parent_partial_ast,
                overriding_ast: inner_ast,
            }),
        };
        self.current_nodes().push(node);
        Ok(())
    }
}

impl TokenConsumer for TemplateCompiler<'_> {
    fn on_token(&mut self, token: Token) -> bool {
        if self.failure.is_some() {
            return false;
        }
        match self.consume(token) {
            Ok(()) => true,
            Err(error) => {
                self.failure = Some(error);
                false
            }
        }
    }

    fn on_parse_failure(&mut self, error: ParseError) {
        if self.failure.is_none() {
            self.failure = Some(error.into());
        }
    }
}

fn required_name(token: &Token, content: &str, kind: &'static str) -> Result<String, ParseError> {
    let name = content.trim();
    if name.is_empty() {
        return Err(ParseError::MissingName {
            kind,
            location: token.location(),
        });
    }
    Ok(name.to_string())
}

/// The error for a scope left open at the end of the template. The root scope is never closed.
fn unclosed(kind: &ScopeKind) -> Option<ParseError> {
    let error = match kind {
        ScopeKind::Section {
            opening,
            expression,
            ..
        } => ParseError::UnclosedSection {
            name: expression.to_string(),
            location: opening.location(),
        },
        ScopeKind::InheritableSection { opening, name }
        | ScopeKind::InheritedPartial { opening, name, .. } => ParseError::UnclosedSection {
            name: name.clone(),
            location: opening.location(),
        },
        ScopeKind::Root => return None,
    };
    Some(error)
}
