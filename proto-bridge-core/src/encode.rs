//! Record → message construction pipeline
//!
//! Shared by both codec implementations; everything backend-specific
//! (enum tables, known-field lists) comes in through [`SchemaInfo`].
//!
//! Pipeline per message, applied recursively: sanitize keys, drop empty
//! values, apply the unknown-field policy, build nested values, construct a
//! `DynamicMessage`, serialize. A type-mismatch failure triggers at most
//! [`MAX_COERCION_PASSES`] correction passes before the record is given up.

use crate::coerce;
use crate::decode::{LIST_VALUE_TYPE, STRUCT_TYPE, VALUE_TYPE, is_well_known_struct};
use crate::error::ConstructionError;
use crate::meta::SchemaInfo;
use crate::record::{GenericRecord, RESERVED_KEY_MARKER, Value};
use prost::Message;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, Value as ReflectValue,
};
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on coercion retries for a single record. The first
/// construction attempt is not counted; a mismatch after the final
/// correction pass discards the record.
pub(crate) const MAX_COERCION_PASSES: usize = 1;

#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeOptions {
    pub autoconvert: bool,
    pub drop_unknown: bool,
}

/// Full encode pipeline: shape, construct (with bounded coercion retry),
/// serialize.
pub(crate) fn encode_record<S: SchemaInfo>(
    info: &S,
    descriptor: &MessageDescriptor,
    record: &GenericRecord,
    options: &EncodeOptions,
) -> crate::error::Result<Vec<u8>> {
    let mut shaped = prepare(record);
    let mut passes = 0;
    loop {
        match construct(info, descriptor, &shaped, options, "") {
            Ok(message) => return Ok(message.encode_to_vec()),
            Err(e) if e.is_type_mismatch() && options.autoconvert && passes < MAX_COERCION_PASSES => {
                passes += 1;
                debug!(error = %e, "construction hit a type mismatch, trying automatic conversion");
                let mismatches = coerce::find_mismatches(info, descriptor.full_name(), &shaped);
                shaped = coerce::apply_corrections(shaped, &mismatches);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Strip the reserved host-framework key marker and drop absent values, so
/// they are never sent as schema defaults.
pub(crate) fn prepare(record: &GenericRecord) -> GenericRecord {
    let mut out = GenericRecord::new();
    for (key, value) in record.iter() {
        if value.is_null() {
            continue;
        }
        let key = key.trim_start_matches(RESERVED_KEY_MARKER);
        out.insert(key, prepare_value(value));
    }
    out
}

fn prepare_value(value: &Value) -> Value {
    match value {
        Value::Record(record) => Value::Record(prepare(record)),
        Value::List(items) => Value::List(items.iter().map(prepare_value).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), prepare_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn construct<S: SchemaInfo>(
    info: &S,
    descriptor: &MessageDescriptor,
    record: &GenericRecord,
    options: &EncodeOptions,
    path: &str,
) -> Result<DynamicMessage, ConstructionError> {
    let mut message = DynamicMessage::new(descriptor.clone());
    for (key, value) in record.iter() {
        let Some(field) = descriptor.get_field_by_name(key) else {
            if options.drop_unknown {
                debug!(field = key, message_type = descriptor.full_name(), "dropping unknown field");
                continue;
            }
            return Err(ConstructionError::UnknownField {
                field: key.to_string(),
                message_type: descriptor.full_name().to_string(),
                known_fields: info.field_names(descriptor.full_name()),
            });
        };
        let reflected = field_value(info, &field, value, options, &join_path(path, key))?;
        message.set_field(&field, reflected);
    }
    Ok(message)
}

fn field_value<S: SchemaInfo>(
    info: &S,
    field: &FieldDescriptor,
    value: &Value,
    options: &EncodeOptions,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    if field.is_map() {
        return map_value(info, field, value, options, path);
    }
    if field.is_list() {
        let Value::List(items) = value else {
            return Err(mismatch(path, format!("repeated {}", kind_token(&field.kind())), value));
        };
        let elements = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                single_value(info, field, item, options, &format!("{path}.{index}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ReflectValue::List(elements));
    }
    single_value(info, field, value, options, path)
}

fn map_value<S: SchemaInfo>(
    info: &S,
    field: &FieldDescriptor,
    value: &Value,
    options: &EncodeOptions,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    let Kind::Message(entry) = field.kind() else {
        return Err(mismatch(path, "map entry message", value));
    };
    let (Some(key_field), Some(value_field)) =
        (entry.get_field_by_name("key"), entry.get_field_by_name("value"))
    else {
        return Err(mismatch(path, "map entry message", value));
    };

    let entries: Vec<(String, Value)> = match value {
        Value::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Record(record) => record
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        other => {
            return Err(mismatch(path, format!("map of {}", kind_token(&value_field.kind())), other));
        }
    };

    let mut out = HashMap::new();
    for (key, entry_value) in entries {
        let map_key = parse_map_key(&key, &key_field.kind()).ok_or_else(|| {
            ConstructionError::Mismatch {
                path: format!("{path}.{key}"),
                expected: format!("map key of type {}", kind_token(&key_field.kind())),
                actual: format!("\"{key}\""),
            }
        })?;
        let reflected = single_value(info, &value_field, &entry_value, options, &format!("{path}.{key}"))?;
        out.insert(map_key, reflected);
    }
    Ok(ReflectValue::Map(out))
}

fn single_value<S: SchemaInfo>(
    info: &S,
    field: &FieldDescriptor,
    value: &Value,
    options: &EncodeOptions,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    match field.kind() {
        Kind::Message(nested) => {
            if is_well_known_struct(nested.full_name()) {
                return well_known_value(value, &nested, path);
            }
            match value {
                Value::Record(record) => construct(info, &nested, record, options, path)
                    .map(ReflectValue::Message),
                Value::Map(map) => {
                    let record: GenericRecord = map
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    construct(info, &nested, &record, options, path).map(ReflectValue::Message)
                }
                other => Err(mismatch(path, format!("message {}", nested.full_name()), other)),
            }
        }
        Kind::Enum(enumeration) => match value {
            Value::String(symbol) => info
                .enum_number(enumeration.full_name(), symbol)
                .map(ReflectValue::EnumNumber)
                .ok_or_else(|| ConstructionError::Mismatch {
                    path: path.to_string(),
                    expected: format!("enum {}", enumeration.full_name()),
                    actual: format!("unknown symbol \"{symbol}\""),
                }),
            Value::Int(n) => i32::try_from(*n)
                .map(ReflectValue::EnumNumber)
                .map_err(|_| out_of_range(path, "enum", value)),
            Value::UInt(n) => i32::try_from(*n)
                .map(ReflectValue::EnumNumber)
                .map_err(|_| out_of_range(path, "enum", value)),
            other => Err(mismatch(path, format!("enum {}", enumeration.full_name()), other)),
        },
        kind => scalar_reflect(&kind, value, path),
    }
}

/// Exact-type scalar conversion: only lossless matches pass. Anything the
/// coercion engine might fix (string digits for an int field, 2.0 for an
/// integer) is reported as a mismatch instead.
fn scalar_reflect(
    kind: &Kind,
    value: &Value,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    match kind {
        Kind::Double => match value {
            Value::Float(f) => Ok(ReflectValue::F64(*f)),
            Value::Int(n) => Ok(ReflectValue::F64(*n as f64)),
            Value::UInt(n) => Ok(ReflectValue::F64(*n as f64)),
            other => Err(mismatch(path, "double", other)),
        },
        Kind::Float => match value {
            Value::Float(f) => Ok(ReflectValue::F32(*f as f32)),
            Value::Int(n) => Ok(ReflectValue::F32(*n as f32)),
            Value::UInt(n) => Ok(ReflectValue::F32(*n as f32)),
            other => Err(mismatch(path, "float", other)),
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => match value {
            Value::Int(n) => i32::try_from(*n)
                .map(ReflectValue::I32)
                .map_err(|_| out_of_range(path, "int32", value)),
            Value::UInt(n) => i32::try_from(*n)
                .map(ReflectValue::I32)
                .map_err(|_| out_of_range(path, "int32", value)),
            other => Err(mismatch(path, "int32", other)),
        },
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => match value {
            Value::Int(n) => Ok(ReflectValue::I64(*n)),
            Value::UInt(n) => i64::try_from(*n)
                .map(ReflectValue::I64)
                .map_err(|_| out_of_range(path, "int64", value)),
            other => Err(mismatch(path, "int64", other)),
        },
        Kind::Uint32 | Kind::Fixed32 => match value {
            Value::Int(n) => u32::try_from(*n)
                .map(ReflectValue::U32)
                .map_err(|_| out_of_range(path, "uint32", value)),
            Value::UInt(n) => u32::try_from(*n)
                .map(ReflectValue::U32)
                .map_err(|_| out_of_range(path, "uint32", value)),
            other => Err(mismatch(path, "uint32", other)),
        },
        Kind::Uint64 | Kind::Fixed64 => match value {
            Value::Int(n) => u64::try_from(*n)
                .map(ReflectValue::U64)
                .map_err(|_| out_of_range(path, "uint64", value)),
            Value::UInt(n) => Ok(ReflectValue::U64(*n)),
            other => Err(mismatch(path, "uint64", other)),
        },
        Kind::Bool => match value {
            Value::Bool(b) => Ok(ReflectValue::Bool(*b)),
            other => Err(mismatch(path, "bool", other)),
        },
        Kind::String => match value {
            Value::String(s) => Ok(ReflectValue::String(s.clone())),
            other => Err(mismatch(path, "string", other)),
        },
        Kind::Bytes => match value {
            Value::Bytes(b) => Ok(ReflectValue::Bytes(b.clone().into())),
            Value::String(s) => Ok(ReflectValue::Bytes(s.clone().into_bytes().into())),
            other => Err(mismatch(path, "bytes", other)),
        },
        Kind::Message(_) | Kind::Enum(_) => Err(mismatch(path, kind_token(kind), value)),
    }
}

/// Wrap a record value back into `google.protobuf.{Struct,Value,ListValue}`
/// so the decoder's terminal unwrapping round-trips.
fn well_known_value(
    value: &Value,
    descriptor: &MessageDescriptor,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    let pool = descriptor.parent_pool();
    match descriptor.full_name() {
        STRUCT_TYPE => match value {
            Value::Map(map) => {
                build_struct(map.iter().map(|(k, v)| (k.as_str(), v)), &pool, path)
            }
            Value::Record(record) => build_struct(record.iter(), &pool, path),
            other => Err(mismatch(path, "message google.protobuf.Struct", other)),
        },
        LIST_VALUE_TYPE => match value {
            Value::List(items) => build_wk_list(items, &pool, path),
            other => Err(mismatch(path, "message google.protobuf.ListValue", other)),
        },
        VALUE_TYPE => build_wk_value(value, &pool, path).map(ReflectValue::Message),
        _ => Err(mismatch(path, "well-known struct type", value)),
    }
}

fn wk_descriptor(
    pool: &prost_reflect::DescriptorPool,
    name: &str,
    path: &str,
) -> Result<MessageDescriptor, ConstructionError> {
    pool.get_message_by_name(name)
        .ok_or_else(|| ConstructionError::Mismatch {
            path: path.to_string(),
            expected: name.to_string(),
            actual: "schema graph without the well-known struct types".to_string(),
        })
}

fn build_struct<'a>(
    entries: impl Iterator<Item = (&'a str, &'a Value)>,
    pool: &prost_reflect::DescriptorPool,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    let descriptor = wk_descriptor(pool, STRUCT_TYPE, path)?;
    let mut fields = HashMap::new();
    for (key, value) in entries {
        fields.insert(
            MapKey::String(key.to_string()),
            ReflectValue::Message(build_wk_value(value, pool, path)?),
        );
    }
    let mut message = DynamicMessage::new(descriptor);
    message.set_field_by_name("fields", ReflectValue::Map(fields));
    Ok(ReflectValue::Message(message))
}

fn build_wk_list(
    items: &[Value],
    pool: &prost_reflect::DescriptorPool,
    path: &str,
) -> Result<ReflectValue, ConstructionError> {
    let descriptor = wk_descriptor(pool, LIST_VALUE_TYPE, path)?;
    let values = items
        .iter()
        .map(|item| build_wk_value(item, pool, path).map(ReflectValue::Message))
        .collect::<Result<Vec<_>, _>>()?;
    let mut message = DynamicMessage::new(descriptor);
    message.set_field_by_name("values", ReflectValue::List(values));
    Ok(ReflectValue::Message(message))
}

fn build_wk_value(
    value: &Value,
    pool: &prost_reflect::DescriptorPool,
    path: &str,
) -> Result<DynamicMessage, ConstructionError> {
    let descriptor = wk_descriptor(pool, VALUE_TYPE, path)?;
    let mut message = DynamicMessage::new(descriptor);
    match value {
        Value::Null => message.set_field_by_name("null_value", ReflectValue::EnumNumber(0)),
        Value::Bool(b) => message.set_field_by_name("bool_value", ReflectValue::Bool(*b)),
        Value::Int(n) => message.set_field_by_name("number_value", ReflectValue::F64(*n as f64)),
        Value::UInt(n) => message.set_field_by_name("number_value", ReflectValue::F64(*n as f64)),
        Value::Float(f) => message.set_field_by_name("number_value", ReflectValue::F64(*f)),
        Value::String(s) => {
            message.set_field_by_name("string_value", ReflectValue::String(s.clone()))
        }
        Value::Bytes(b) => message.set_field_by_name(
            "string_value",
            ReflectValue::String(String::from_utf8_lossy(b).into_owned()),
        ),
        Value::Record(record) => {
            let inner = build_struct(record.iter(), pool, path)?;
            message.set_field_by_name("struct_value", inner);
        }
        Value::Map(map) => {
            let inner = build_struct(map.iter().map(|(k, v)| (k.as_str(), v)), pool, path)?;
            message.set_field_by_name("struct_value", inner);
        }
        Value::List(items) => {
            let inner = build_wk_list(items, pool, path)?;
            message.set_field_by_name("list_value", inner);
        }
    }
    Ok(message)
}

fn parse_map_key(key: &str, kind: &Kind) -> Option<MapKey> {
    match kind {
        Kind::String => Some(MapKey::String(key.to_string())),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => key.parse().ok().map(MapKey::I32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => key.parse().ok().map(MapKey::I64),
        Kind::Uint32 | Kind::Fixed32 => key.parse().ok().map(MapKey::U32),
        Kind::Uint64 | Kind::Fixed64 => key.parse().ok().map(MapKey::U64),
        Kind::Bool => match key {
            "true" => Some(MapKey::Bool(true)),
            "false" => Some(MapKey::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn kind_token(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".to_string(),
        Kind::Float => "float".to_string(),
        Kind::Int32 => "int32".to_string(),
        Kind::Int64 => "int64".to_string(),
        Kind::Uint32 => "uint32".to_string(),
        Kind::Uint64 => "uint64".to_string(),
        Kind::Sint32 => "sint32".to_string(),
        Kind::Sint64 => "sint64".to_string(),
        Kind::Fixed32 => "fixed32".to_string(),
        Kind::Fixed64 => "fixed64".to_string(),
        Kind::Sfixed32 => "sfixed32".to_string(),
        Kind::Sfixed64 => "sfixed64".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::String => "string".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::Message(m) => format!("message {}", m.full_name()),
        Kind::Enum(e) => format!("enum {}", e.full_name()),
    }
}

fn mismatch(path: &str, expected: impl Into<String>, value: &Value) -> ConstructionError {
    ConstructionError::Mismatch {
        path: path.to_string(),
        expected: expected.into(),
        actual: value.kind_name().to_string(),
    }
}

fn out_of_range(path: &str, expected: &str, value: &Value) -> ConstructionError {
    ConstructionError::Mismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: format!("{} out of range", value.kind_name()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_strips_marker_and_drops_nulls() {
        let record = GenericRecord::new()
            .with("@timestamp", "2020-09-24T07:21:28.000Z")
            .with("domain", Value::Null)
            .with("name", "Pinkie")
            .with(
                "geo",
                GenericRecord::new().with("city", Value::Null).with("cc", "IT"),
            );

        let shaped = prepare(&record);
        let keys: Vec<&str> = shaped.keys().collect();
        assert_eq!(keys, vec!["timestamp", "name", "geo"]);
        let geo = shaped.get("geo").unwrap().as_record().unwrap();
        assert!(!geo.contains_key("city"));
        assert_eq!(geo.get("cc"), Some(&Value::String("IT".to_string())));
    }

    #[test]
    fn test_prepare_leaves_unmarked_keys_alone() {
        let record = GenericRecord::new().with("name", "Pinkie").with("age", 18i64);
        assert_eq!(prepare(&record), record);
    }

    #[test]
    fn test_parse_map_keys() {
        assert_eq!(
            parse_map_key("7", &Kind::Int64),
            Some(MapKey::I64(7))
        );
        assert_eq!(
            parse_map_key("x", &Kind::String),
            Some(MapKey::String("x".to_string()))
        );
        assert_eq!(parse_map_key("maybe", &Kind::Bool), None);
        assert_eq!(parse_map_key("-1", &Kind::Uint32), None);
    }

    #[test]
    fn test_retry_bound_is_one_pass() {
        assert_eq!(MAX_COERCION_PASSES, 1);
    }
}
