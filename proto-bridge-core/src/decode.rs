//! Shared decode helpers used by both codec implementations

use crate::record::Value;
use prost_reflect::{DynamicMessage, MapKey, ReflectMessage, Value as ReflectValue};
use std::collections::BTreeMap;

pub(crate) const STRUCT_TYPE: &str = "google.protobuf.Struct";
pub(crate) const VALUE_TYPE: &str = "google.protobuf.Value";
pub(crate) const LIST_VALUE_TYPE: &str = "google.protobuf.ListValue";

/// The free-form well-known types are unwrapped terminally instead of being
/// walked like ordinary messages.
pub(crate) fn is_well_known_struct(full_name: &str) -> bool {
    matches!(full_name, STRUCT_TYPE | VALUE_TYPE | LIST_VALUE_TYPE)
}

/// Copy a reflected scalar into the record domain, widening numerics to the
/// record's native variants. Containers and messages are handled by the
/// walkers, not here.
pub(crate) fn scalar_value(value: &ReflectValue) -> Value {
    match value {
        ReflectValue::Bool(v) => Value::Bool(*v),
        ReflectValue::I32(v) => Value::Int(*v as i64),
        ReflectValue::I64(v) => Value::Int(*v),
        ReflectValue::U32(v) => Value::Int(*v as i64),
        ReflectValue::U64(v) => Value::UInt(*v),
        ReflectValue::F32(v) => Value::Float(*v as f64),
        ReflectValue::F64(v) => Value::Float(*v),
        ReflectValue::String(v) => Value::String(v.clone()),
        ReflectValue::Bytes(v) => Value::Bytes(v.to_vec()),
        ReflectValue::EnumNumber(v) => Value::Int(*v as i64),
        ReflectValue::Message(_) | ReflectValue::List(_) | ReflectValue::Map(_) => Value::Null,
    }
}

/// Record-domain map keys are always strings.
pub(crate) fn map_key_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

/// Unwrap `google.protobuf.{Struct,Value,ListValue}` into bare record
/// values; the well-known type's own kind tagging collapses away.
pub(crate) fn unwrap_well_known(message: &DynamicMessage) -> Value {
    match message.descriptor().full_name() {
        STRUCT_TYPE => unwrap_struct(message),
        VALUE_TYPE => unwrap_value(message),
        LIST_VALUE_TYPE => unwrap_list(message),
        _ => Value::Null,
    }
}

fn unwrap_struct(message: &DynamicMessage) -> Value {
    let mut out = BTreeMap::new();
    if let Some(fields) = message.get_field_by_name("fields") {
        if let ReflectValue::Map(entries) = fields.as_ref() {
            for (key, value) in entries {
                if let ReflectValue::Message(inner) = value {
                    out.insert(map_key_string(key), unwrap_value(inner));
                }
            }
        }
    }
    Value::Map(out)
}

fn unwrap_list(message: &DynamicMessage) -> Value {
    let mut out = Vec::new();
    if let Some(values) = message.get_field_by_name("values") {
        if let ReflectValue::List(items) = values.as_ref() {
            for item in items {
                if let ReflectValue::Message(inner) = item {
                    out.push(unwrap_value(inner));
                }
            }
        }
    }
    Value::List(out)
}

fn unwrap_value(message: &DynamicMessage) -> Value {
    if message.has_field_by_name("number_value") {
        if let Some(v) = message.get_field_by_name("number_value") {
            if let ReflectValue::F64(n) = v.as_ref() {
                return Value::Float(*n);
            }
        }
    }
    if message.has_field_by_name("string_value") {
        if let Some(v) = message.get_field_by_name("string_value") {
            if let ReflectValue::String(s) = v.as_ref() {
                return Value::String(s.clone());
            }
        }
    }
    if message.has_field_by_name("bool_value") {
        if let Some(v) = message.get_field_by_name("bool_value") {
            if let ReflectValue::Bool(b) = v.as_ref() {
                return Value::Bool(*b);
            }
        }
    }
    if message.has_field_by_name("struct_value") {
        if let Some(v) = message.get_field_by_name("struct_value") {
            if let ReflectValue::Message(inner) = v.as_ref() {
                return unwrap_struct(inner);
            }
        }
    }
    if message.has_field_by_name("list_value") {
        if let Some(v) = message.get_field_by_name("list_value") {
            if let ReflectValue::Message(inner) = v.as_ref() {
                return unwrap_list(inner);
            }
        }
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_scalar_widening() {
        assert_eq!(scalar_value(&ReflectValue::I32(-5)), Value::Int(-5));
        assert_eq!(scalar_value(&ReflectValue::U32(7)), Value::Int(7));
        assert_eq!(scalar_value(&ReflectValue::U64(7)), Value::UInt(7));
        assert_eq!(scalar_value(&ReflectValue::F32(1.5)), Value::Float(1.5));
        assert_eq!(
            scalar_value(&ReflectValue::Bytes(vec![1u8, 2].into())),
            Value::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_map_key_stringification() {
        assert_eq!(map_key_string(&MapKey::I64(42)), "42");
        assert_eq!(map_key_string(&MapKey::Bool(true)), "true");
        assert_eq!(map_key_string(&MapKey::String("k".to_string())), "k");
    }

    #[test]
    fn test_unwrap_struct_collapses_kind_tagging() {
        let pool = testutil::pool_for(vec![testutil::struct_file()]);
        let value_desc = pool.get_message_by_name(VALUE_TYPE).unwrap();
        let struct_desc = pool.get_message_by_name(STRUCT_TYPE).unwrap();

        let mut string_value = DynamicMessage::new(value_desc.clone());
        string_value.set_field_by_name("string_value", ReflectValue::String("value_a".to_string()));

        let mut number_value = DynamicMessage::new(value_desc);
        number_value.set_field_by_name("number_value", ReflectValue::F64(2.5));

        let mut strukt = DynamicMessage::new(struct_desc);
        let mut fields = std::collections::HashMap::new();
        fields.insert(
            MapKey::String("field_a".to_string()),
            ReflectValue::Message(string_value),
        );
        fields.insert(
            MapKey::String("field_b".to_string()),
            ReflectValue::Message(number_value),
        );
        strukt.set_field_by_name("fields", ReflectValue::Map(fields));

        let unwrapped = unwrap_well_known(&strukt);
        let Value::Map(map) = unwrapped else {
            panic!("expected a map");
        };
        assert_eq!(map.get("field_a"), Some(&Value::String("value_a".to_string())));
        assert_eq!(map.get("field_b"), Some(&Value::Float(2.5)));
    }
}
