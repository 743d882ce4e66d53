//! Form field values
//!
//! The host form delivers a flat mapping from field name to either a text
//! value or a checkbox state. Anything else found in stored data is skipped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// A value counts as filled if it is `true` or non-blank text
    pub fn is_filled(&self) -> bool {
        match self {
            FieldValue::Bool(checked) => *checked,
            FieldValue::Text(text) => !text.trim().is_empty(),
        }
    }

    /// A value is reportable if it is a boolean (either state) or non-empty text
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Bool(_) => true,
            FieldValue::Text(text) => !text.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Bool(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Field name to value mapping, ordered by name for stable serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormData(BTreeMap<String, FieldValue>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    pub fn is_filled(&self, name: &str) -> bool {
        self.0.get(name).map(FieldValue::is_filled).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'de> Deserialize<'de> for FormData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            match value {
                serde_json::Value::Bool(checked) => {
                    fields.insert(name, FieldValue::Bool(checked));
                }
                serde_json::Value::String(text) => {
                    fields.insert(name, FieldValue::Text(text));
                }
                other => {
                    tracing::debug!(field = %name, value = %other, "Skipping unsupported form value");
                }
            }
        }
        Ok(Self(fields))
    }
}
