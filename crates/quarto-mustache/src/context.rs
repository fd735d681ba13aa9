/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The context stack in which templates are rendered.
//!
//! A [`Context`] is an immutable, reference-counted linked list of scopes.
//! Sections and partials never modify the context they are given: they derive a
//! new one whose parent is the unchanged original. This is what lets many
//! renders share templates and contexts without locking.
//!
//! Key lookup starts at the innermost scope and digs outward until a non-empty
//! value is found. Keys registered with [`Context::with_registered_key`] are
//! looked up before the stack and always win.

use crate::ast::InheritanceFrame;
use crate::error::{MustacheError, MustacheResult};
use crate::expression::Expression;
use crate::value::{DidRenderFn, Value, WillRenderFn};
use std::fmt;
use std::sync::Arc;

/// A state of the context stack.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<ContextNode>,
}

#[derive(Clone, Default)]
struct ContextNode {
    kind: ContextKind,
    registered_keys: Option<Context>,
}

#[derive(Clone, Default)]
enum ContextKind {
    #[default]
    Root,
    Scope {
        value: Value,
        parent: Context,
    },
    InheritedPartial {
        frame: InheritanceFrame,
        parent: Context,
    },
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding a single value.
    pub fn with_value(value: impl Into<Value>) -> Self {
        Context::new().extended(value)
    }

    fn from_parts(kind: ContextKind, registered_keys: Option<Context>) -> Self {
        Self {
            inner: Arc::new(ContextNode {
                kind,
                registered_keys,
            }),
        }
    }

    /// A new context with `value` pushed on top of this one.
    #[must_use = "Context::extended returns a new Context"]
    pub fn extended(&self, value: impl Into<Value>) -> Self {
        Self::from_parts(
            ContextKind::Scope {
                value: value.into(),
                parent: self.clone(),
            },
            self.inner.registered_keys.clone(),
        )
    }

    /// A new context in which `key` resolves to `value`, whatever the stack holds.
    #[must_use = "Context::with_registered_key returns a new Context"]
    pub fn with_registered_key(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let registered_keys = self
            .inner
            .registered_keys
            .clone()
            .unwrap_or_default()
            .extended(Value::map([(key.into(), value.into())]));
        Self::from_parts(self.inner.kind.clone(), Some(registered_keys))
    }

    /// A new context that records an inherited partial being rendered.
    ///
    /// The frame takes part in inheritable section resolution, but not in key lookup.
    #[must_use = "Context::extended_with_inheritance_frame returns a new Context"]
    pub fn extended_with_inheritance_frame(&self, frame: InheritanceFrame) -> Self {
        Self::from_parts(
            ContextKind::InheritedPartial {
                frame,
                parent: self.clone(),
            },
            self.inner.registered_keys.clone(),
        )
    }

    /// The value rendered by `{{.}}`.
    pub fn top_value(&self) -> Value {
        self.scope_values().next().cloned().unwrap_or_default()
    }

    /// The value for `key`, or the empty value when no scope has one.
    pub fn lookup(&self, key: &str) -> Value {
        if let Some(registered_keys) = &self.inner.registered_keys {
            let value = registered_keys.lookup(key);
            if !value.is_empty() {
                return value;
            }
        }

        self.scope_values()
            .map(|value| value.lookup(key))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Evaluate an expression such as `name`, `user.name` or `uppercase(name)`.
    pub fn value_for_expression(&self, text: &str) -> MustacheResult<Value> {
        let expression = Expression::parse(text).map_err(|error| {
            MustacheError::Render(crate::error::RenderError::custom(error.to_string()))
        })?;
        Ok(expression.evaluate(self)?)
    }

    /// Will-render hooks, innermost scope first.
    pub fn will_render_stack(&self) -> Vec<WillRenderFn> {
        self.scope_values()
            .filter_map(|value| value.will_render().cloned())
            .collect()
    }

    /// Did-render hooks, outermost scope first.
    pub fn did_render_stack(&self) -> Vec<DidRenderFn> {
        let mut stack: Vec<DidRenderFn> = self
            .scope_values()
            .filter_map(|value| value.did_render().cloned())
            .collect();
        stack.reverse();
        stack
    }

    /// Inherited partials being rendered, innermost first.
    pub fn inheritance_frames(&self) -> Vec<InheritanceFrame> {
        self.nodes()
            .filter_map(|node| match &node.kind {
                ContextKind::InheritedPartial { frame, .. } => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Walk the stack from this node to the root.
    fn nodes(&self) -> impl Iterator<Item = &ContextNode> {
        std::iter::successors(Some(self.inner.as_ref()), |node| match &node.kind {
            ContextKind::Root => None,
            ContextKind::Scope { parent, .. } | ContextKind::InheritedPartial { parent, .. } => {
                Some(parent.inner.as_ref())
            }
        })
    }

    /// Values pushed on the stack, innermost first.
    fn scope_values(&self) -> impl Iterator<Item = &Value> {
        self.nodes().filter_map(|node| match &node.kind {
            ContextKind::Scope { value, .. } => Some(value),
            _ => None,
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for node in self.nodes() {
            if !first {
                write!(f, ":")?;
            }
            first = false;
            match &node.kind {
                ContextKind::Root => write!(f, "Context.Root")?,
                ContextKind::Scope { value, .. } => write!(f, "Context.Scope({value:?})")?,
                ContextKind::InheritedPartial { .. } => write!(f, "Context.InheritedPartial")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TemplateAst;
    use crate::rendering::ContentType;
    use crate::value::CustomValue;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_root_lookup_is_empty() {
        let context = Context::new();
        assert!(context.lookup("anything").is_empty());
        assert!(context.top_value().is_empty());
    }

    #[test]
    fn test_scoping() {
        let parent = Context::with_value(Value::map([("x", "parent_x"), ("y", "parent_y")]));
        let child = parent.extended(Value::map([("x", "child_x")]));

        // Child shadows parent for 'x'
        assert_eq!(child.lookup("x"), Value::from("child_x"));
        // Child inherits 'y' from parent
        assert_eq!(child.lookup("y"), Value::from("parent_y"));
        // Parent unchanged
        assert_eq!(parent.lookup("x"), Value::from("parent_x"));
    }

    #[test]
    fn test_false_values_stop_lookup() {
        let context = Context::with_value(Value::map([("flag", true)]))
            .extended(Value::map([("flag", false)]));
        assert_eq!(context.lookup("flag"), Value::Bool(false));
    }

    #[test]
    fn test_top_value() {
        let context = Context::with_value("outer").extended("inner");
        assert_eq!(context.top_value(), Value::from("inner"));
    }

    #[test]
    fn test_registered_key_wins() {
        let context = Context::with_value(Value::map([("k", "deep")]))
            .extended(Value::map([("other", 1)]))
            .with_registered_key("k", "registered")
            .extended(Value::map([("k", "shallow")]));
        assert_eq!(context.lookup("k"), Value::from("registered"));
        assert_eq!(context.lookup("other"), Value::Int(1));
        assert_eq!(context.top_value().lookup("k"), Value::from("shallow"));
    }

    #[test]
    fn test_registered_key_keeps_stack() {
        let context = Context::with_value("top").with_registered_key("k", 1);
        assert_eq!(context.top_value(), Value::from("top"));
    }

    #[test]
    fn test_inheritance_frames_are_transparent_to_lookup() {
        let parent = TemplateAst::new(Vec::new(), ContentType::Html);
        let overriding = TemplateAst::new(Vec::new(), ContentType::Html);
        let frame = InheritanceFrame {
            parent_partial_ast: Arc::clone(&parent),
            overriding_ast: overriding,
        };

        let context = Context::with_value(Value::map([("a", "b")]))
            .extended_with_inheritance_frame(frame.clone())
            .extended("top")
            .extended_with_inheritance_frame(frame);

        assert_eq!(context.lookup("a"), Value::from("b"));
        assert_eq!(context.top_value(), Value::from("top"));

        let frames = context.inheritance_frames();
        assert_eq!(frames.len(), 2);
        assert!(Arc::ptr_eq(&frames[0].parent_partial_ast, &parent));
        assert!(Context::with_value("x").inheritance_frames().is_empty());
    }

    #[test]
    fn test_hook_stacks_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hook = |name: &'static str| {
            let will_calls = Arc::clone(&calls);
            let did_calls = Arc::clone(&calls);
            Value::from(
                CustomValue::new()
                    .with_will_render(move |_, value| {
                        will_calls.lock().unwrap().push(format!("will {name}"));
                        value
                    })
                    .with_did_render(move |_, _, _| {
                        did_calls.lock().unwrap().push(format!("did {name}"));
                    }),
            )
        };

        let context = Context::with_value(hook("outer"))
            .extended("no hooks")
            .extended(hook("inner"));

        let will = context.will_render_stack();
        let did = context.did_render_stack();
        assert_eq!(will.len(), 2);
        assert_eq!(did.len(), 2);

        let tag = crate::ast::Tag::for_tests();
        let mut value = Value::Null;
        for will_render in &will {
            value = will_render(&tag, value);
        }
        for did_render in &did {
            did_render(&tag, &value, Some(""));
        }

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["will inner", "will outer", "did outer", "did inner"]
        );
    }

    #[test]
    fn test_value_for_expression() {
        let context = Context::with_value(Value::map([(
            "person",
            Value::map([("name", "Albert Einstein")]),
        )]));
        assert_eq!(
            context.value_for_expression("person.name").unwrap(),
            Value::from("Albert Einstein")
        );
        assert!(context.value_for_expression("person.").is_err());
    }

    #[test]
    fn test_debug_description() {
        let context = Context::with_value(1);
        assert_eq!(format!("{context:?}"), "Context.Scope(Int(1)):Context.Root");
    }
}
