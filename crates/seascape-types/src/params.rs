//! # Envelope Parameters
//!
//! The `params` object of a request or reply, with typed accessors.
//!
//! Numbers are kept in serde_json's arbitrary-precision form, so a 64-bit
//! block number or token id is never squeezed through an `f64`. Read numeric
//! values through [`Params::get_u64`] and [`Params::get_f64`] instead of
//! matching on the raw [`Value`].

use crate::errors::ParamError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object carried by requests and replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn require(&self, key: &str) -> Result<&Value, ParamError> {
        self.0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    fn invalid(key: &str, expected: &'static str) -> ParamError {
        ParamError::InvalidType {
            key: key.to_string(),
            expected,
        }
    }

    /// Unsigned integer, from a JSON integer or a decimal string.
    pub fn get_u64(&self, key: &str) -> Result<u64, ParamError> {
        match self.require(key)? {
            Value::Number(n) => n.as_u64().ok_or_else(|| Self::invalid(key, "an unsigned integer")),
            Value::String(s) => s
                .parse::<u64>()
                .map_err(|_| Self::invalid(key, "an unsigned integer")),
            _ => Err(Self::invalid(key, "an unsigned integer")),
        }
    }

    /// Float, from a JSON number or a numeric string.
    pub fn get_f64(&self, key: &str) -> Result<f64, ParamError> {
        match self.require(key)? {
            Value::Number(n) => n.as_f64().ok_or_else(|| Self::invalid(key, "a number")),
            Value::String(s) => s.parse::<f64>().map_err(|_| Self::invalid(key, "a number")),
            _ => Err(Self::invalid(key, "a number")),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<String, ParamError> {
        self.require(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::invalid(key, "a string"))
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, ParamError> {
        let items = self
            .require(key)?
            .as_array()
            .ok_or_else(|| Self::invalid(key, "a list of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Self::invalid(key, "a list of strings"))
            })
            .collect()
    }

    pub fn get_map(&self, key: &str) -> Result<Params, ParamError> {
        self.require(key)?
            .as_object()
            .map(|m| Params(m.clone()))
            .ok_or_else(|| Self::invalid(key, "an object"))
    }

    pub fn get_map_list(&self, key: &str) -> Result<Vec<Params>, ParamError> {
        let items = self
            .require(key)?
            .as_array()
            .ok_or_else(|| Self::invalid(key, "a list of objects"))?;
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .map(|m| Params(m.clone()))
                    .ok_or_else(|| Self::invalid(key, "a list of objects"))
            })
            .collect()
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Value::Object(params.0)
    }
}
