//! Iterator trait implementations for records

use crate::record::{GenericRecord, Value};

/// Collect `(key, value)` pairs into a record, keeping iteration order.
///
/// # Example
///
/// ```
/// use proto_bridge_core::record::{GenericRecord, Value};
///
/// let record: GenericRecord = vec![
///     ("name".to_string(), Value::from("Pinkie")),
///     ("age".to_string(), Value::Int(18)),
/// ]
/// .into_iter()
/// .collect();
///
/// assert_eq!(record.len(), 2);
/// ```
impl FromIterator<(String, Value)> for GenericRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut record = GenericRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Extend<(String, Value)> for GenericRecord {
    fn extend<T: IntoIterator<Item = (String, Value)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for GenericRecord {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_entries().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_iterator_keeps_order() {
        let record: GenericRecord = vec![
            ("c".to_string(), Value::Int(3)),
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
        ]
        .into_iter()
        .collect();

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_extend_overwrites_duplicates() {
        let mut record = GenericRecord::new().with("a", 1i64);
        record.extend(vec![
            ("a".to_string(), Value::Int(9)),
            ("b".to_string(), Value::Int(2)),
        ]);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("a"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_into_iterator_round_trip() {
        let record = GenericRecord::new().with("x", 1i64).with("y", 2i64);
        let rebuilt: GenericRecord = record.clone().into_iter().collect();
        assert_eq!(record, rebuilt);
    }
}
