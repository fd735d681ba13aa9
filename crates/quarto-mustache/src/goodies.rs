/*
 * goodies.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Filters available to every template of the default configuration.
//!
//! - `each(collection)` iterates a list or a map and exposes the position of
//!   each item as `@index`, `@indexPlusOne`, `@indexIsEven`, `@first` and
//!   `@last`, plus `@key` for maps.
//! - `HTMLEscape(value)` renders a value and escapes the result.

use crate::error::{RenderError, RenderResult};
use crate::rendering::{Rendering, escape_html};
use crate::value::Value;

/// The filters of the standard library, keyed by name.
pub fn standard_library() -> Value {
    Value::map([
        ("each", Value::filter(each)),
        ("HTMLEscape", Value::filter(html_escape)),
    ])
}

fn single_argument<'a>(name: &str, arguments: &'a [Value]) -> RenderResult<&'a Value> {
    match arguments {
        [argument] => Ok(argument),
        _ => Err(RenderError::custom(format!(
            "{name} filter expects one argument, got {}",
            arguments.len()
        ))),
    }
}

fn each(arguments: &[Value]) -> RenderResult<Value> {
    let collection = single_argument("each", arguments)?;
    if collection.is_empty() {
        return Ok(collection.clone());
    }

    if let Some(map) = collection.dictionary_view() {
        let count = map.len();
        let items = map.iter().enumerate().map(|(index, (key, item))| {
            positioned(item.clone(), index, count, Some(key.as_str()))
        });
        return Ok(Value::list(items.collect::<Vec<_>>()));
    }

    if let Some(items) = collection.sequence_view() {
        let count = items.len();
        let items = items
            .iter()
            .enumerate()
            .map(|(index, item)| positioned(item.clone(), index, count, None));
        return Ok(Value::list(items.collect::<Vec<_>>()));
    }

    Err(RenderError::NonEnumerable {
        value: format!("{collection:?}"),
    })
}

/// An item that renders with its position pushed on the context.
fn positioned(item: Value, index: usize, count: usize, key: Option<&str>) -> Value {
    let mut position = vec![
        ("@index", Value::from(index)),
        ("@indexPlusOne", Value::from(index + 1)),
        ("@indexIsEven", Value::Bool(index % 2 == 0)),
        ("@first", Value::Bool(index == 0)),
        ("@last", Value::Bool(index + 1 == count)),
    ];
    if let Some(key) = key {
        position.push(("@key", Value::from(key)));
    }
    let position = Value::map(position);

    Value::render_fn(move |info| {
        let info = info.with_context(info.context.extended(position.clone()));
        item.render(&info)
    })
}

fn html_escape(arguments: &[Value]) -> RenderResult<Value> {
    let value = single_argument("HTMLEscape", arguments)?.clone();
    Ok(Value::render_fn(move |info| {
        let rendering = value.render(info)?;
        Ok(Rendering::html(escape_html(&rendering.string)))
    }))
}
