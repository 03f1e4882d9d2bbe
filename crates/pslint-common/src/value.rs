//! Host-neutral values produced by evaluating literal syntax.
//!
//! A [`LiteralValue`] is what a settings file turns into once its hashtable
//! literal has been evaluated. Maps are [`NameMap`]s: they keep insertion
//! order and look keys up case-insensitively, matching how PowerShell
//! hashtables treat their keys.

use pslint_parser::ast::Number;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// An insertion-ordered map with case-insensitive string keys.
///
/// The key keeps the spelling it was first inserted with.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> NameMap<V> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.position(key).map(|i| &mut self.entries[i].1)
    }

    /// The stored spelling of `key`, if present.
    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].0.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace a value. Replacing keeps the original key and position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> Default for NameMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for NameMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V> IntoIterator for NameMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for NameMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The value of a literal expression.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<LiteralValue>),
    Map(NameMap<LiteralValue>),
}

impl LiteralValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LiteralValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[LiteralValue]> {
        match self {
            LiteralValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&NameMap<LiteralValue>> {
        match self {
            LiteralValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// A string, or an array made only of strings.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            LiteralValue::String(s) => Some(vec![s.clone()]),
            LiteralValue::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            LiteralValue::Bool(_) => "boolean",
            LiteralValue::Number(_) => "number",
            LiteralValue::String(_) => "string",
            LiteralValue::Array(_) => "array",
            LiteralValue::Map(_) => "hashtable",
        }
    }

    /// Render the value back into PowerShell literal syntax.
    pub fn to_literal_text(&self) -> String {
        let mut out = String::new();
        self.write_literal(&mut out, 0);
        out
    }

    fn write_literal(&self, out: &mut String, indent: usize) {
        match self {
            LiteralValue::Bool(true) => out.push_str("$true"),
            LiteralValue::Bool(false) => out.push_str("$false"),
            LiteralValue::Number(n) => out.push_str(&n.to_string()),
            LiteralValue::String(s) => out.push_str(&quote(s)),
            LiteralValue::Array(items) => {
                out.push_str("@(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_literal(out, indent);
                }
                out.push(')');
            }
            LiteralValue::Map(map) if map.is_empty() => out.push_str("@{}"),
            LiteralValue::Map(map) => {
                out.push_str("@{\n");
                let pad = "    ".repeat(indent + 1);
                for (key, value) in map.iter() {
                    out.push_str(&pad);
                    out.push_str(&map_key(key));
                    out.push_str(" = ");
                    value.write_literal(out, indent + 1);
                    out.push('\n');
                }
                out.push_str(&"    ".repeat(indent));
                out.push('}');
            }
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal_text())
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Bool(value)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::String(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::String(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Number(Number::Int(value))
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn map_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        && !key.starts_with('-');
    if bare { key.to_string() } else { quote(key) }
}
