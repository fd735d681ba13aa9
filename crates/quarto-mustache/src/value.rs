/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dynamic values that flow through contexts and rendering.
//!
//! [`Value`] is a closed set of variants for ordinary data (scalars, lists and
//! maps) plus [`Value::Custom`], an escape hatch through which the host can
//! supply its own lookup, truthiness, filter, render and hook behavior.

use crate::ast::{Tag, TagKind};
use crate::error::{RenderError, RenderResult};
use crate::rendering::{ContentType, Rendering, RenderingInfo};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Custom rendering of a value for a tag.
pub type RenderFn = Arc<dyn Fn(&RenderingInfo<'_>) -> RenderResult<Rendering> + Send + Sync>;

/// A filter, called as `filter(argument, ...)` from a template.
pub type FilterFn = Arc<dyn Fn(&[Value]) -> RenderResult<Value> + Send + Sync>;

/// Key lookup for custom values.
pub type LookupFn = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Hook called before a tag renders, able to replace the rendered value.
pub type WillRenderFn = Arc<dyn Fn(&Tag, Value) -> Value + Send + Sync>;

/// Hook called after a tag rendered, with its output or `None` on failure.
pub type DidRenderFn = Arc<dyn Fn(&Tag, &Value, Option<&str>) + Send + Sync>;

/// A value that can be used in template rendering.
#[derive(Clone, Default)]
pub enum Value {
    /// The empty value: missing keys and explicit nulls.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    /// A host-defined value.
    Custom(Arc<CustomValue>),
}

/// Host-defined capabilities for a [`Value::Custom`].
///
/// Capabilities that are not set fall back to the wrapped value, if any.
#[derive(Clone, Default)]
pub struct CustomValue {
    inner: Option<Value>,
    description: Option<String>,
    bool_value: Option<bool>,
    lookup: Option<LookupFn>,
    filter: Option<FilterFn>,
    render: Option<RenderFn>,
    will_render: Option<WillRenderFn>,
    did_render: Option<DidRenderFn>,
}

impl CustomValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A custom value that delegates to `value` for every capability it does not set.
    pub fn wrapping(value: impl Into<Value>) -> Self {
        Self {
            inner: Some(value.into()),
            ..Self::default()
        }
    }

    /// Text rendered by `{{value}}` unless a render function is set.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_bool_value(mut self, bool_value: bool) -> Self {
        self.bool_value = Some(bool_value);
        self
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Value + Send + Sync + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    pub fn with_filter(
        mut self,
        filter: impl Fn(&[Value]) -> RenderResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_render(
        mut self,
        render: impl Fn(&RenderingInfo<'_>) -> RenderResult<Rendering> + Send + Sync + 'static,
    ) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn with_will_render(
        mut self,
        will_render: impl Fn(&Tag, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.will_render = Some(Arc::new(will_render));
        self
    }

    pub fn with_did_render(
        mut self,
        did_render: impl Fn(&Tag, &Value, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.did_render = Some(Arc::new(did_render));
        self
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("inner", &self.inner)
            .field("description", &self.description)
            .field("filter", &self.filter.is_some())
            .field("render", &self.render.is_some())
            .field("will_render", &self.will_render.is_some())
            .field("did_render", &self.did_render.is_some())
            .finish_non_exhaustive()
    }
}

impl Value {
    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build a map value.
    pub fn map(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>) -> Self {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// A value rendered by a custom function.
    pub fn render_fn(
        render: impl Fn(&RenderingInfo<'_>) -> RenderResult<Rendering> + Send + Sync + 'static,
    ) -> Self {
        CustomValue::new().with_render(render).into()
    }

    /// A value usable as a filter.
    pub fn filter(
        filter: impl Fn(&[Value]) -> RenderResult<Value> + Send + Sync + 'static,
    ) -> Self {
        CustomValue::new().with_filter(filter).into()
    }

    /// Convert any serializable data through its JSON representation.
    pub fn from_serialize<T: serde::Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Value::from)
    }

    /// Only the empty value stops a context lookup from digging further.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Custom(custom) => custom.inner.as_ref().is_some_and(Value::is_empty),
            _ => false,
        }
    }

    /// Truthiness for sections: `{{#value}}` renders when true, `{{^value}}` when false.
    pub fn bool_value(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(_) => true,
            Value::Custom(custom) => custom
                .bool_value
                .unwrap_or_else(|| custom.inner.as_ref().is_none_or(Value::bool_value)),
        }
    }

    pub fn dictionary_view(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map.as_ref()),
            Value::Custom(custom) => custom.inner.as_ref().and_then(Value::dictionary_view),
            _ => None,
        }
    }

    pub fn sequence_view(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            Value::Custom(custom) => custom.inner.as_ref().and_then(Value::sequence_view),
            _ => None,
        }
    }

    /// Look up a key of this value, yielding the empty value when there is none.
    pub fn lookup(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
            Value::List(items) => match key {
                "count" => Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)),
                "first" => items.first().cloned().unwrap_or_default(),
                "last" => items.last().cloned().unwrap_or_default(),
                _ => Value::Null,
            },
            Value::Custom(custom) => match (&custom.lookup, &custom.inner) {
                (Some(lookup), _) => lookup(key),
                (None, Some(inner)) => inner.lookup(key),
                (None, None) => Value::Null,
            },
            _ => Value::Null,
        }
    }

    pub fn filter_fn(&self) -> Option<&FilterFn> {
        match self {
            Value::Custom(custom) => custom
                .filter
                .as_ref()
                .or_else(|| custom.inner.as_ref().and_then(Value::filter_fn)),
            _ => None,
        }
    }

    pub fn will_render(&self) -> Option<&WillRenderFn> {
        match self {
            Value::Custom(custom) => custom.will_render.as_ref(),
            _ => None,
        }
    }

    pub fn did_render(&self) -> Option<&DidRenderFn> {
        match self {
            Value::Custom(custom) => custom.did_render.as_ref(),
            _ => None,
        }
    }

    /// Render this value for the tag described by `info`.
    pub fn render(&self, info: &RenderingInfo<'_>) -> RenderResult<Rendering> {
        match self {
            Value::List(items) => self.render_sequence(items, info),
            Value::Custom(custom) => {
                if let Some(render) = &custom.render {
                    return render(info);
                }
                match (info.tag.kind(), &custom.inner) {
                    (_, Some(inner @ Value::List(_))) if !info.enumeration_item => {
                        inner.render(info)
                    }
                    (TagKind::Variable, Some(inner)) => inner.render(info),
                    (TagKind::Variable, None) => Ok(Rendering::text(
                        custom.description.clone().unwrap_or_default(),
                    )),
                    (TagKind::Section, _) => info.tag.render(&info.context.extended(self.clone())),
                }
            }
            _ => match info.tag.kind() {
                TagKind::Variable => Ok(Rendering::text(self.to_text())),
                TagKind::Section => info.tag.render(&info.context.extended(self.clone())),
            },
        }
    }

    fn render_sequence(&self, items: &[Value], info: &RenderingInfo<'_>) -> RenderResult<Rendering> {
        // A list nested in a list is pushed on the context like any other item.
        if info.enumeration_item {
            return info.tag.render(&info.context.extended(self.clone()));
        }

        let item_info = info.as_enumeration_item();
        let mut buffer = String::new();
        let mut content_type = None;
        for item in items {
            let rendering = item.render(&item_info)?;
            match content_type {
                None => content_type = Some(rendering.content_type),
                Some(existing) if existing != rendering.content_type => {
                    return Err(RenderError::ContentTypeMismatch);
                }
                Some(_) => {}
            }
            buffer.push_str(&rendering.string);
        }
        Ok(Rendering::new(
            buffer,
            content_type.unwrap_or(ContentType::Text),
        ))
    }

    /// The text of a scalar, as interpolated by `{{value}}`.
    fn to_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Null | Value::List(_) | Value::Map(_) | Value::Custom(_) => String::new(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Custom(custom) => fmt::Debug::fmt(custom, f),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality; custom values are equal only to themselves.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl<V: Into<Value>, S: std::hash::BuildHasher> From<HashMap<String, V, S>> for Value {
    fn from(map: HashMap<String, V, S>) -> Self {
        Value::map(map)
    }
}

impl From<CustomValue> for Value {
    fn from(custom: CustomValue) -> Self {
        Value::Custom(Arc::new(custom))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(entries) => Value::map(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.bool_value());
        assert!(Value::Bool(true).bool_value());
        assert!(!Value::Bool(false).bool_value());
        assert!(!Value::Int(0).bool_value());
        assert!(Value::Int(-1).bool_value());
        assert!(!Value::Float(0.0).bool_value());
        assert!(!Value::from("").bool_value());
        assert!(Value::from("false").bool_value());
        assert!(!Value::list(Vec::<Value>::new()).bool_value());
        assert!(Value::list([1]).bool_value());
        assert!(Value::map(Vec::<(String, Value)>::new()).bool_value());
    }

    #[test]
    fn test_only_null_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(!Value::Bool(false).is_empty());
        assert!(!Value::from("").is_empty());
        assert!(!Value::list(Vec::<Value>::new()).is_empty());
        assert!(Value::from(CustomValue::wrapping(Value::Null)).is_empty());
        assert!(!Value::from(CustomValue::new()).is_empty());
    }

    #[test]
    fn test_lookup() {
        let value = Value::map([("name", Value::from("Ada")), ("tags", Value::list(["a", "b"]))]);
        assert_eq!(value.lookup("name"), Value::from("Ada"));
        assert_eq!(value.lookup("missing"), Value::Null);

        let tags = value.lookup("tags");
        assert_eq!(tags.lookup("count"), Value::Int(2));
        assert_eq!(tags.lookup("first"), Value::from("a"));
        assert_eq!(tags.lookup("last"), Value::from("b"));
        assert_eq!(Value::from("text").lookup("anything"), Value::Null);
    }

    #[test]
    fn test_custom_value_delegates_to_inner() {
        let custom: Value = CustomValue::wrapping(Value::map([("a", 1)]))
            .with_will_render(|_, value| value)
            .into();
        assert_eq!(custom.lookup("a"), Value::Int(1));
        assert!(custom.bool_value());
        assert!(custom.dictionary_view().is_some());
        assert!(custom.will_render().is_some());
        assert!(custom.did_render().is_none());
    }

    #[test]
    fn test_custom_lookup_overrides_inner() {
        let custom: Value = CustomValue::wrapping(Value::map([("a", 1)]))
            .with_lookup(|key| Value::from(key.to_uppercase()))
            .with_bool_value(false)
            .into();
        assert_eq!(custom.lookup("a"), Value::from("A"));
        assert!(!custom.bool_value());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({
            "name": "Ada",
            "age": 36,
            "ratio": 0.5,
            "languages": ["en", "fr"],
            "missing": null,
        }));
        assert_eq!(value.lookup("name"), Value::from("Ada"));
        assert_eq!(value.lookup("age"), Value::Int(36));
        assert_eq!(value.lookup("ratio"), Value::Float(0.5));
        assert_eq!(value.lookup("languages"), Value::list(["en", "fr"]));
        assert_eq!(value.lookup("missing"), Value::Null);
    }

    #[test]
    fn test_from_serialize() {
        #[derive(serde::Serialize)]
        struct Person {
            name: &'static str,
            admin: bool,
        }

        let value = Value::from_serialize(&Person {
            name: "Grace",
            admin: true,
        })
        .unwrap();
        assert_eq!(value.lookup("name"), Value::from("Grace"));
        assert_eq!(value.lookup("admin"), Value::Bool(true));
    }

    #[test]
    fn test_custom_values_compare_by_identity() {
        let a: Value = CustomValue::new().into();
        let b: Value = CustomValue::new().into();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
