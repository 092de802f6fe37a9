//! Request parameter container.
//!
//! [`ParameterBag`] is the loose bag of key/value arguments every API
//! operation accepts. Keys are unique, insertion order is preserved, and the
//! bag serializes to a percent-encoded query string. The validator rewrites
//! values in place (list values become comma-joined strings, booleans become
//! the literal strings the API expects) before the bag is serialized.

use std::fmt;

/// A single parameter value.
///
/// The API only ever transmits strings; the richer variants exist so callers
/// can hand over native values and let validation normalize them.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    /// A list of ids, joined with commas on the wire.
    List(Vec<String>),
}

impl ParamValue {
    /// Render the value as it would appear on the wire (before encoding).
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Self::List(items) => items.join(","),
        }
    }

    /// Empty values are treated as absent when serializing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<&[&str]> for ParamValue {
    fn from(items: &[&str]) -> Self {
        Self::List(items.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Ordered mapping of request parameters for one API call.
///
/// Constructed per call, mutated in place by validation, discarded after the
/// request completes.
#[derive(Debug, Clone, Default)]
pub struct ParameterBag {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a parameter. Returns `self` for chaining.
    pub fn add(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Upsert a parameter in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Delete a key if present; no-op otherwise.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Look up a value. Never panics for unknown keys.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize to a percent-encoded query string.
    ///
    /// Keys listed in `exclude` (typically ids already embedded in the URL
    /// path) and empty values are skipped. Pair order follows insertion order,
    /// so output is deterministic.
    pub fn to_query_string(&self, exclude: &[&str]) -> String {
        self.entries
            .iter()
            .filter(|(k, v)| !exclude.contains(&k.as_str()) && !v.is_empty())
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    urlencoding::encode(k),
                    urlencoding::encode(&v.render())
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.set(k, v);
        }
        bag
    }
}
