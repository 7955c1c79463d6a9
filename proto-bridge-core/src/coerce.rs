//! Type coercion engine
//!
//! Compares a record's runtime types against the schema-declared field types
//! and produces corrections for the encoder's single retry pass. Individual
//! corrections that fail are swallowed (the value stays as it was) — an
//! uncoercible field may still fail construction later, but coercion itself
//! never aborts anything.

use crate::meta::{Cardinality, FieldType, SchemaInfo, ValueClass};
use crate::record::{GenericRecord, Value};
use thiserror::Error;
use tracing::debug;

/// Separator for the dotted field paths in mismatch reports. List elements
/// appear as positional indices ("rules.1.action").
pub const PATH_SEPARATOR: char = '.';

/// One field whose runtime type does not match its schema declaration.
#[derive(Debug, Clone)]
pub struct TypeMismatch {
    /// Dotted path from the message root to the offending value
    pub path: String,
    /// Declared (expected) classification
    pub expected: ValueClass,
    /// Declared type, for diagnostics (e.g. "uint32", "enum zoo.Colour")
    pub expected_type: String,
    /// Runtime kind of the value found in the record
    pub actual: &'static str,
    /// The offending value itself
    pub value: Value,
}

/// A failed individual correction; always recovered locally.
#[derive(Error, Debug)]
#[error("cannot coerce {actual} to {target}: {reason}")]
pub(crate) struct CoercionError {
    target: &'static str,
    actual: &'static str,
    reason: String,
}

impl CoercionError {
    fn new(target: &'static str, value: &Value, reason: impl Into<String>) -> Self {
        Self {
            target,
            actual: value.kind_name(),
            reason: reason.into(),
        }
    }
}

/// Walk `record` against the declared shape of `type_name` and report every
/// field whose runtime type disagrees with the schema.
pub(crate) fn find_mismatches<S: SchemaInfo>(
    info: &S,
    type_name: &str,
    record: &GenericRecord,
) -> Vec<TypeMismatch> {
    let mut out = Vec::new();
    collect(info, type_name, record, "", &mut out);
    out
}

fn collect<S: SchemaInfo>(
    info: &S,
    type_name: &str,
    record: &GenericRecord,
    prefix: &str,
    out: &mut Vec<TypeMismatch>,
) {
    for (key, value) in record.iter() {
        // Unknown keys are the unknown-field policy's business, not ours
        let Some(schema) = info.field_schema(type_name, key) else {
            continue;
        };
        let path = join_path(prefix, key);
        match &schema.cardinality {
            Cardinality::Repeated => match value {
                Value::List(items) => {
                    for (index, item) in items.iter().enumerate() {
                        check_single(info, &schema.ty, item, &format!("{path}.{index}"), out);
                    }
                }
                other => out.push(TypeMismatch {
                    path,
                    expected: ValueClass::Repeated,
                    expected_type: format!("repeated {}", schema.ty),
                    actual: other.kind_name(),
                    value: other.clone(),
                }),
            },
            Cardinality::Map { .. } => match value {
                Value::Map(map) => {
                    for (map_key, map_value) in map {
                        check_single(info, &schema.ty, map_value, &format!("{path}.{map_key}"), out);
                    }
                }
                Value::Record(nested) => {
                    for (map_key, map_value) in nested.iter() {
                        check_single(info, &schema.ty, map_value, &format!("{path}.{map_key}"), out);
                    }
                }
                other => out.push(TypeMismatch {
                    path,
                    expected: ValueClass::Message,
                    expected_type: format!("map of {}", schema.ty),
                    actual: other.kind_name(),
                    value: other.clone(),
                }),
            },
            Cardinality::Single => check_single(info, &schema.ty, value, &path, out),
        }
    }
}

fn check_single<S: SchemaInfo>(
    info: &S,
    declared: &FieldType,
    value: &Value,
    path: &str,
    out: &mut Vec<TypeMismatch>,
) {
    match declared {
        FieldType::Message(nested_type) => match value {
            Value::Record(nested) => collect(info, nested_type, nested, path, out),
            Value::Map(map) => {
                let as_record: GenericRecord = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                collect(info, nested_type, &as_record, path, out);
            }
            other => out.push(TypeMismatch {
                path: path.to_string(),
                expected: ValueClass::Message,
                expected_type: declared.to_string(),
                actual: other.kind_name(),
                value: other.clone(),
            }),
        },
        _ => {
            if !class_matches(declared.class(), value) {
                out.push(TypeMismatch {
                    path: path.to_string(),
                    expected: declared.class(),
                    expected_type: declared.to_string(),
                    actual: value.kind_name(),
                    value: value.clone(),
                });
            }
        }
    }
}

/// The known-compatible pairs: exact class matches, integers where a float
/// is declared, text or bytes for bytes fields, and symbol-or-number enums.
fn class_matches(declared: ValueClass, value: &Value) -> bool {
    match declared {
        ValueClass::Integer => matches!(value, Value::Int(_) | Value::UInt(_)),
        ValueClass::Float => matches!(value, Value::Float(_) | Value::Int(_) | Value::UInt(_)),
        ValueClass::Boolean => matches!(value, Value::Bool(_)),
        ValueClass::Str => matches!(value, Value::String(_)),
        ValueClass::Bytes => matches!(value, Value::Bytes(_) | Value::String(_)),
        ValueClass::Enum => matches!(value, Value::String(_) | Value::Int(_) | Value::UInt(_)),
        ValueClass::Message | ValueClass::Repeated => false,
    }
}

/// Apply the corrections for every mismatch, in place on a copy of the
/// record. Idempotent: re-applying the same mismatch list changes nothing.
pub(crate) fn apply_corrections(
    mut record: GenericRecord,
    mismatches: &[TypeMismatch],
) -> GenericRecord {
    for mismatch in mismatches {
        let segments: Vec<&str> = mismatch.path.split(PATH_SEPARATOR).collect();
        apply_to_record(&mut record, &segments, mismatch);
    }
    record
}

fn apply_to_record(record: &mut GenericRecord, segments: &[&str], mismatch: &TypeMismatch) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match record.get_mut(head) {
        Some(value) => apply_to_value(value, rest, mismatch),
        None => debug!(path = %mismatch.path, "correction target vanished from record"),
    }
}

fn apply_to_value(value: &mut Value, segments: &[&str], mismatch: &TypeMismatch) {
    if segments.is_empty() {
        match coerce_value(value, mismatch.expected) {
            Ok(corrected) => *value = corrected,
            Err(e) => debug!(path = %mismatch.path, error = %e, "leaving value uncorrected"),
        }
        return;
    }
    match value {
        Value::Record(nested) => apply_to_record(nested, segments, mismatch),
        Value::List(items) => {
            if let Ok(index) = segments[0].parse::<usize>() {
                if let Some(item) = items.get_mut(index) {
                    apply_to_value(item, &segments[1..], mismatch);
                }
            }
        }
        Value::Map(map) => {
            if let Some(entry) = map.get_mut(segments[0]) {
                apply_to_value(entry, &segments[1..], mismatch);
            }
        }
        _ => debug!(path = %mismatch.path, "correction path does not lead into a container"),
    }
}

/// The numeric/string/bool conversion rules. A value already of the target
/// class passes through unchanged, which is what makes corrections
/// idempotent.
pub(crate) fn coerce_value(value: &Value, target: ValueClass) -> Result<Value, CoercionError> {
    match target {
        ValueClass::Integer => match value {
            Value::Int(_) | Value::UInt(_) => Ok(value.clone()),
            Value::Float(f) => {
                // 2.0 becomes 2; 2.1 is rejected, never silently floored
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Ok(Value::Int(*f as i64))
                } else {
                    Err(CoercionError::new(
                        "integer",
                        value,
                        format!("{f} has a fractional part"),
                    ))
                }
            }
            Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|e| {
                CoercionError::new("integer", value, e.to_string())
            }),
            other => Err(CoercionError::new("integer", other, "unsupported source kind")),
        },
        ValueClass::Float => match value {
            Value::Float(_) => Ok(value.clone()),
            Value::Int(n) => Ok(Value::Float(*n as f64)),
            Value::UInt(n) => Ok(Value::Float(*n as f64)),
            Value::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|e| {
                CoercionError::new("float", value, e.to_string())
            }),
            other => Err(CoercionError::new("float", other, "unsupported source kind")),
        },
        ValueClass::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => Err(CoercionError::new("boolean", other, "not a truthy text form")),
        },
        ValueClass::Str => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Int(n) => Ok(Value::String(n.to_string())),
            Value::UInt(n) => Ok(Value::String(n.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(CoercionError::new("string", other, "unsupported source kind")),
        },
        ValueClass::Bytes => match value {
            Value::Bytes(_) => Ok(value.clone()),
            Value::String(s) => Ok(Value::Bytes(s.clone().into_bytes())),
            other => Err(CoercionError::new("bytes", other, "unsupported source kind")),
        },
        ValueClass::Enum => match value {
            Value::String(_) | Value::Int(_) | Value::UInt(_) => Ok(value.clone()),
            other => Err(CoercionError::new("enum", other, "unsupported source kind")),
        },
        ValueClass::Message | ValueClass::Repeated => Err(CoercionError::new(
            "composite",
            value,
            "composite shapes cannot be coerced",
        )),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::SchemaMetadataStore;
    use crate::testutil;

    struct StoreInfo(SchemaMetadataStore);

    impl SchemaInfo for StoreInfo {
        fn field_schema(&self, message: &str, field: &str) -> Option<crate::meta::FieldSchema> {
            self.0.field(message, field).cloned()
        }
        fn field_names(&self, message: &str) -> Vec<String> {
            self.0.field_names(message)
        }
        fn enum_symbol(&self, enum_name: &str, number: i32) -> Option<String> {
            self.0.enum_symbol(enum_name, number).map(str::to_string)
        }
        fn enum_number(&self, enum_name: &str, symbol: &str) -> Option<i32> {
            self.0.enum_number(enum_name, symbol)
        }
    }

    fn unicorn_info() -> StoreInfo {
        StoreInfo(SchemaMetadataStore::from_files(&[testutil::unicorn_file()]))
    }

    #[test]
    fn test_matching_record_has_no_mismatches() {
        let record = GenericRecord::new()
            .with("name", "Pinkie")
            .with("age", 18i64)
            .with("is_pegasus", false)
            .with("fur_colour", "PINK");

        let mismatches = find_mismatches(&unicorn_info(), "zoo.Unicorn", &record);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_reports_scalar_mismatches_with_paths() {
        let record = GenericRecord::new()
            .with("age", "18")
            .with("is_pegasus", "false")
            .with("father", GenericRecord::new().with("age", 2.5f64));

        let mismatches = find_mismatches(&unicorn_info(), "zoo.Unicorn", &record);
        let paths: Vec<&str> = mismatches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["age", "is_pegasus", "father.age"]);
        assert_eq!(mismatches[0].expected, ValueClass::Integer);
        assert_eq!(mismatches[0].actual, "string");
    }

    #[test]
    fn test_repeated_elements_are_indexed() {
        let record = GenericRecord::new().with(
            "favourite_numbers",
            vec![Value::Int(1), Value::from("2"), Value::Int(3)],
        );

        let mismatches = find_mismatches(&unicorn_info(), "zoo.Unicorn", &record);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "favourite_numbers.1");
    }

    #[test]
    fn test_non_list_for_repeated_field() {
        let record = GenericRecord::new().with("favourite_numbers", 7i64);

        let mismatches = find_mismatches(&unicorn_info(), "zoo.Unicorn", &record);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].expected, ValueClass::Repeated);
    }

    #[test]
    fn test_integer_is_acceptable_for_float_fields() {
        // declared=float & actual=integer is in the known-compatible set
        assert!(class_matches(ValueClass::Float, &Value::Int(3)));
        assert!(!class_matches(ValueClass::Integer, &Value::Float(3.0)));
    }

    #[test]
    fn test_apply_corrections_fixes_nested_values() {
        let info = unicorn_info();
        let record = GenericRecord::new()
            .with("age", "18")
            .with("father", GenericRecord::new().with("age", 50.0f64));

        let mismatches = find_mismatches(&info, "zoo.Unicorn", &record);
        let corrected = apply_corrections(record, &mismatches);

        assert_eq!(corrected.get("age"), Some(&Value::Int(18)));
        assert_eq!(
            corrected.get("father").and_then(|v| v.as_record()).and_then(|r| r.get("age")),
            Some(&Value::Int(50))
        );
    }

    #[test]
    fn test_apply_corrections_is_idempotent() {
        let info = unicorn_info();
        let record = GenericRecord::new()
            .with("age", "18")
            .with("favourite_numbers", vec![Value::from("4711"), Value::Int(23)]);

        let mismatches = find_mismatches(&info, "zoo.Unicorn", &record);
        let once = apply_corrections(record, &mismatches);
        let twice = apply_corrections(once.clone(), &mismatches);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fractionless_float_truncates_and_fractional_is_rejected() {
        assert_eq!(
            coerce_value(&Value::Float(2.0), ValueClass::Integer).unwrap(),
            Value::Int(2)
        );
        assert!(coerce_value(&Value::Float(2.1), ValueClass::Integer).is_err());
    }

    #[test]
    fn test_failed_correction_leaves_value_unchanged() {
        let info = unicorn_info();
        let record = GenericRecord::new().with("age", "not-a-number");

        let mismatches = find_mismatches(&info, "zoo.Unicorn", &record);
        assert_eq!(mismatches.len(), 1);
        let corrected = apply_corrections(record, &mismatches);
        assert_eq!(corrected.get("age"), Some(&Value::String("not-a-number".to_string())));
    }

    #[test]
    fn test_string_coercions() {
        assert_eq!(
            coerce_value(&Value::Int(1234), ValueClass::Str).unwrap(),
            Value::String("1234".to_string())
        );
        assert_eq!(
            coerce_value(&Value::Bool(false), ValueClass::Boolean).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            coerce_value(&Value::from("FALSE"), ValueClass::Boolean).unwrap(),
            Value::Bool(false)
        );
        assert!(coerce_value(&Value::from("yes"), ValueClass::Boolean).is_err());
    }
}
