//! Boundary type for loosely-typed panel responses
//!
//! Nothing outside the normalizer and the panel client should look inside a `RawPayload`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(Value);

impl RawPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The object carrying the fields, looking through a `{"data": {...}}` envelope
    pub fn body(&self) -> Option<&Map<String, Value>> {
        let object = self.0.as_object()?;
        match object.get("data") {
            Some(Value::Object(inner)) => Some(inner),
            _ => Some(object),
        }
    }

    /// Combines two payloads; fields of `self` win over fields of `fallback`
    pub fn merged_with(self, fallback: RawPayload) -> Self {
        let mut merged = fallback.body().cloned().unwrap_or_default();
        if let Some(primary) = self.body() {
            for (key, value) in primary {
                merged.insert(key.clone(), value.clone());
            }
        }
        Self(Value::Object(merged))
    }

    /// First key present with a boolean value
    pub fn first_bool(&self, keys: &[&str]) -> Option<bool> {
        self.first_of(keys, Value::as_bool)
    }

    /// First key present with a numeric value, with the key it came from
    pub fn first_number<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, f64)> {
        let body = self.body()?;
        keys.iter().find_map(|key| match body.get(*key) {
            Some(value) => match value.as_f64() {
                Some(n) => Some((*key, n)),
                None => {
                    debug!("Ignoring {} in panel payload: not a number ({})", key, value);
                    None
                }
            },
            None => None,
        })
    }

    /// First key present with a string value
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        self.first_of(keys, Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body()?.get(key)
    }

    fn first_of<'a, T>(&'a self, keys: &[&str], extract: fn(&'a Value) -> Option<T>) -> Option<T> {
        let body = self.body()?;
        keys.iter().find_map(|key| {
            let value = body.get(*key)?;
            let extracted = extract(value);
            if extracted.is_none() {
                debug!("Ignoring {} in panel payload: unexpected type ({})", key, value);
            }
            extracted
        })
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
