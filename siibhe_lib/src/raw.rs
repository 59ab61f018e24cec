//! Untyped field maps produced by evaluating a report script.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::error::ExtractionError;

/// One scalar value of a report script object.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(Number),
}

impl RawValue {
    /// Text rendering. Numbers render the way the page script would print them.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => render_number(n),
        }
    }
}

fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Field code → value map of one report script object.
///
/// Keys carry no ordering. A `null` in the source is stored as absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawFieldMap {
    fields: HashMap<String, RawValue>,
}

impl RawFieldMap {
    /// Parses the JSON text of a serialized script object.
    pub fn from_json(text: &str) -> Result<Self, ExtractionError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ExtractionError::InvalidResult(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(ExtractionError::InvalidResult(format!(
                "expected an object, got {}",
                truncate(text)
            )));
        };

        let mut fields = HashMap::with_capacity(object.len());
        for (key, value) in object {
            let raw = match value {
                Value::Null => continue,
                Value::String(s) => RawValue::Text(s),
                Value::Number(n) => RawValue::Number(n),
                Value::Bool(b) => RawValue::Text(b.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ExtractionError::UnexpectedValue { key })
                }
            };
            fields.insert(key, raw);
        }
        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    /// Text of a field, or an empty string when absent.
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(RawValue::as_text).unwrap_or_default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for RawFieldMap {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 200;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX)
            .last()
            .unwrap_or(0);
        format!("{}...[truncated]", &text[..cut])
    }
}
