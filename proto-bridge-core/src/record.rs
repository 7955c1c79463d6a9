//! The generic record: the schema-agnostic value tree shared by decode and encode

use std::collections::BTreeMap;

/// Marker prefix the host pipeline uses for its own metadata fields
/// (e.g. `@timestamp`). Schema fields can never carry it; the encoder strips
/// it before matching keys against the schema, and the decoder never emits it.
pub const RESERVED_KEY_MARKER: char = '@';

/// A single value inside a [`GenericRecord`].
///
/// # Example
///
/// ```
/// use proto_bridge_core::record::{GenericRecord, Value};
///
/// let record = GenericRecord::new()
///     .with("name", "Pinkie")
///     .with("age", 18i64)
///     .with("fur_colour", "PINK");
///
/// assert_eq!(record.get("age"), Some(&Value::Int(18)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// A nested message
    Record(GenericRecord),
    /// A repeated field
    List(Vec<Value>),
    /// A protobuf map field (keys are always strings in the record domain)
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Name of the runtime kind, used in diagnostics and mismatch reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_record(&self) -> Option<&GenericRecord> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<GenericRecord> for Value {
    fn from(v: GenericRecord) -> Self {
        Value::Record(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

/// An insertion-ordered mapping from field name to [`Value`].
///
/// Decode produces records in schema field-declaration order; equality is
/// order-sensitive, matching that contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericRecord {
    entries: Vec<(String, Value)>,
}

impl GenericRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent insertion, handy for building records inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, replacing any existing entry for the same key
    /// while keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let record = GenericRecord::new()
            .with("zebra", 1i64)
            .with("apple", 2i64)
            .with("mango", 3i64);

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = GenericRecord::new().with("a", 1i64).with("b", 2i64);
        record.insert("a", 99i64);

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::Int(99)));
    }

    #[test]
    fn test_remove() {
        let mut record = GenericRecord::new().with("a", 1i64).with("b", 2i64);
        assert_eq!(record.remove("a"), Some(Value::Int(1)));
        assert_eq!(record.remove("a"), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_nested_record_equality() {
        let make = || {
            GenericRecord::new()
                .with("name", "Glitter")
                .with(
                    "father",
                    GenericRecord::new().with("name", "Sparkle").with("age", 50i64),
                )
                .with("numbers", vec![Value::Int(4711), Value::Int(23)])
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Int(1).kind_name(), "integer");
        assert_eq!(Value::UInt(1).kind_name(), "integer");
        assert_eq!(Value::Float(1.5).kind_name(), "float");
        assert_eq!(Value::from("x").kind_name(), "string");
        assert_eq!(Value::Bool(true).kind_name(), "boolean");
        assert_eq!(Value::List(vec![]).kind_name(), "list");
    }
}
