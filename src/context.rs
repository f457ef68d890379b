//! Run-scoped context store
//!
//! Carries values produced by earlier steps (a measured product count, a
//! captured list) to later ones. A store lives for exactly one run and is
//! never shared between runs.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::common::{Error, Result};

/// Key/value store shared by the steps of one run
#[derive(Debug, Default)]
pub struct ContextStore {
    values: HashMap<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`
    ///
    /// Keys are written once per run by convention; an overwrite is allowed
    /// but logged.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(previous) = self.values.insert(key.clone(), value) {
            tracing::debug!(key = %key, previous = %previous, "context key overwritten");
        }
    }

    /// Read a value stored by an earlier step
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Read a value and deserialize it into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::InvalidValue(format!("context key '{}' holds {}: {}", key, value, e))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expand `${key}` placeholders in `template`
    ///
    /// `locals` shadow the store (fixture fields inside a table-driven
    /// step). Strings are inserted verbatim, numbers and booleans via their
    /// JSON form, arrays as comma-separated items. `$$` escapes a dollar.
    pub fn render(&self, template: &str, locals: &HashMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let end = body.find('}').ok_or_else(|| {
                    Error::InvalidValue(format!("unterminated placeholder in '{}'", template))
                })?;
                let key = body[..end].trim();
                match locals.get(key) {
                    Some(local) => out.push_str(local),
                    None => out.push_str(&display_value(key, self.get(key)?)?),
                }
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Interpret a rendered string as a JSON scalar
///
/// Integers, floats and booleans become JSON numbers and booleans when
/// rendering them back gives the same text; everything else stays a
/// string, so `007` or `12.50` survive a store and render unchanged.
pub fn parse_scalar(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        if n.to_string() == text {
            return Value::from(n);
        }
    }
    if let Ok(f) = text.parse::<f64>() {
        let value = Value::from(f);
        if f.is_finite() && value.to_string() == text {
            return value;
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

fn display_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| display_value(key, item))
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Object(_) => Err(Error::InvalidValue(format!(
            "context key '{}' holds an object and cannot be interpolated",
            key
        ))),
    }
}
