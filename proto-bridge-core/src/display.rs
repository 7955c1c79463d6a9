//! Display trait implementations for human-readable record output

use crate::record::{GenericRecord, Value};
use std::fmt;

/// Pretty-printed JSON rendering of a record.
///
/// # Example
///
/// ```
/// use proto_bridge_core::record::GenericRecord;
///
/// let record = GenericRecord::new().with("name", "Pinkie").with("age", 18i64);
/// let text = format!("{}", record);
/// assert!(text.contains("Pinkie"));
/// assert!(text.contains('\n'));
/// ```
impl fmt::Display for GenericRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "GenericRecord({} fields)", self.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<{}>", self.kind_name()),
        }
    }
}
