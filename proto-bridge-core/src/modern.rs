//! Codec for the modern schema representation, driven by live descriptor
//! reflection. Structural questions are answered by walking the message
//! descriptor; nothing is cached outside the registry.

use crate::codec::{CodecOptions, Decoded, MessageCodec};
use crate::decode::{is_well_known_struct, map_key_string, scalar_value, unwrap_well_known};
use crate::encode::{EncodeOptions, encode_record};
use crate::error::{Error, Result};
use crate::meta::{Cardinality, FieldSchema, FieldType, SchemaInfo};
use crate::oneof::OneofSelection;
use crate::record::{GenericRecord, Value};
use prost_reflect::{
    DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor, ReflectMessage,
    Value as ReflectValue,
};
use std::collections::BTreeMap;

pub(crate) struct ModernCodec {
    descriptor: MessageDescriptor,
    options: CodecOptions,
}

impl ModernCodec {
    pub(crate) fn new(descriptor: MessageDescriptor, options: CodecOptions) -> Self {
        Self {
            descriptor,
            options,
        }
    }

    fn decode_message(&self, message: &DynamicMessage) -> (GenericRecord, OneofSelection) {
        let descriptor = message.descriptor();
        let mut record = GenericRecord::new();
        let mut selection = OneofSelection::new();

        for field in descriptor.fields() {
            if let Some(group) = field.containing_oneof() {
                if !is_synthetic_oneof(&group) {
                    // The wire guarantees at most one member is populated;
                    // only that one lands in the record, under its own name.
                    if message.has_field(&field) {
                        let value = self.convert_field(&field, message.get_field(&field).as_ref(), &mut selection);
                        record.insert(field.name(), value);
                        selection.record_choice(group.name(), field.name());
                    }
                    continue;
                }
            }
            if field.supports_presence() && !message.has_field(&field) {
                continue;
            }
            let value = self.convert_field(&field, message.get_field(&field).as_ref(), &mut selection);
            record.insert(field.name(), value);
        }
        (record, selection)
    }

    fn convert_field(
        &self,
        field: &FieldDescriptor,
        raw: &ReflectValue,
        selection: &mut OneofSelection,
    ) -> Value {
        if field.is_map() {
            return self.convert_map(field, raw);
        }
        if field.is_list() {
            let ReflectValue::List(items) = raw else {
                return Value::List(Vec::new());
            };
            if let Kind::Message(nested) = field.kind() {
                if !is_well_known_struct(nested.full_name()) {
                    let mut records = Vec::with_capacity(items.len());
                    let mut children = Vec::with_capacity(items.len());
                    for item in items {
                        if let ReflectValue::Message(inner) = item {
                            let (nested_record, child) = self.decode_message(inner);
                            records.push(Value::Record(nested_record));
                            children.push(child);
                        }
                    }
                    selection.attach_list(field.name(), children);
                    return Value::List(records);
                }
            }
            return Value::List(
                items
                    .iter()
                    .map(|item| self.convert_single(field, item, &mut OneofSelection::new()))
                    .collect(),
            );
        }
        self.convert_single(field, raw, selection)
    }

    fn convert_map(&self, field: &FieldDescriptor, raw: &ReflectValue) -> Value {
        let ReflectValue::Map(entries) = raw else {
            return Value::Map(BTreeMap::new());
        };
        let value_field = match field.kind() {
            Kind::Message(entry) => entry.get_field_by_name("value"),
            _ => None,
        };
        let mut out = BTreeMap::new();
        for (key, value) in entries {
            let converted = match &value_field {
                Some(value_field) => {
                    self.convert_single(value_field, value, &mut OneofSelection::new())
                }
                None => scalar_value(value),
            };
            out.insert(map_key_string(key), converted);
        }
        Value::Map(out)
    }

    fn convert_single(
        &self,
        field: &FieldDescriptor,
        raw: &ReflectValue,
        selection: &mut OneofSelection,
    ) -> Value {
        match field.kind() {
            Kind::Message(nested) => {
                let ReflectValue::Message(inner) = raw else {
                    return Value::Null;
                };
                if is_well_known_struct(nested.full_name()) {
                    return unwrap_well_known(inner);
                }
                let (nested_record, child) = self.decode_message(inner);
                selection.attach(field.name(), child);
                Value::Record(nested_record)
            }
            Kind::Enum(enumeration) => {
                let ReflectValue::EnumNumber(number) = raw else {
                    return Value::Null;
                };
                // Unknown codes (schema evolved upstream) keep the integer
                match enumeration.get_value(*number) {
                    Some(value) => Value::String(value.name().to_string()),
                    None => Value::Int(*number as i64),
                }
            }
            _ => scalar_value(raw),
        }
    }
}

impl MessageCodec for ModernCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded> {
        let message = DynamicMessage::decode(self.descriptor.clone(), bytes).map_err(|e| {
            Error::Decode {
                type_name: self.descriptor.full_name().to_string(),
                reason: e.to_string(),
            }
        })?;
        let (record, selection) = self.decode_message(&message);
        Ok(Decoded {
            record,
            oneofs: self.options.oneof_metadata.then_some(selection),
        })
    }

    fn encode(&self, record: &GenericRecord) -> Result<Vec<u8>> {
        let options = EncodeOptions {
            autoconvert: self.options.autoconvert,
            drop_unknown: self.options.drop_unknown,
        };
        encode_record(self, &self.descriptor, record, &options)
    }

    fn type_name(&self) -> &str {
        self.descriptor.full_name()
    }
}

impl SchemaInfo for ModernCodec {
    fn field_schema(&self, message: &str, field: &str) -> Option<FieldSchema> {
        let descriptor = self.descriptor.parent_pool().get_message_by_name(message)?;
        let field = descriptor.get_field_by_name(field)?;
        Some(field_schema_of(&field))
    }

    fn field_names(&self, message: &str) -> Vec<String> {
        self.descriptor
            .parent_pool()
            .get_message_by_name(message)
            .map(|descriptor| {
                descriptor
                    .fields()
                    .map(|field| field.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn enum_symbol(&self, enum_name: &str, number: i32) -> Option<String> {
        self.descriptor
            .parent_pool()
            .get_enum_by_name(enum_name)?
            .get_value(number)
            .map(|value| value.name().to_string())
    }

    fn enum_number(&self, enum_name: &str, symbol: &str) -> Option<i32> {
        self.descriptor
            .parent_pool()
            .get_enum_by_name(enum_name)?
            .get_value_by_name(symbol)
            .map(|value| value.number())
    }
}

fn is_synthetic_oneof(group: &OneofDescriptor) -> bool {
    // proto3 `optional` fields surface as single-member oneofs named after
    // the field with a leading underscore; those are plain presence.
    let mut fields = group.fields();
    match (fields.next(), fields.next()) {
        (Some(field), None) => group.name() == format!("_{}", field.name()),
        _ => false,
    }
}

fn field_schema_of(field: &FieldDescriptor) -> FieldSchema {
    if field.is_map() {
        if let Kind::Message(entry) = field.kind() {
            let key_type = entry
                .get_field_by_name("key")
                .map(|f| field_type_of_kind(&f.kind()))
                .unwrap_or(FieldType::String);
            let value_type = entry
                .get_field_by_name("value")
                .map(|f| field_type_of_kind(&f.kind()))
                .unwrap_or(FieldType::String);
            return FieldSchema {
                name: field.name().to_string(),
                ty: value_type,
                cardinality: Cardinality::Map { key: key_type },
                oneof: None,
            };
        }
    }
    FieldSchema {
        name: field.name().to_string(),
        ty: field_type_of_kind(&field.kind()),
        cardinality: if field.is_list() {
            Cardinality::Repeated
        } else {
            Cardinality::Single
        },
        oneof: field
            .containing_oneof()
            .filter(|group| !is_synthetic_oneof(group))
            .map(|group| group.name().to_string()),
    }
}

fn field_type_of_kind(kind: &Kind) -> FieldType {
    match kind {
        Kind::Double => FieldType::Double,
        Kind::Float => FieldType::Float,
        Kind::Int32 => FieldType::Int32,
        Kind::Int64 => FieldType::Int64,
        Kind::Uint32 => FieldType::UInt32,
        Kind::Uint64 => FieldType::UInt64,
        Kind::Sint32 => FieldType::SInt32,
        Kind::Sint64 => FieldType::SInt64,
        Kind::Fixed32 => FieldType::Fixed32,
        Kind::Fixed64 => FieldType::Fixed64,
        Kind::Sfixed32 => FieldType::SFixed32,
        Kind::Sfixed64 => FieldType::SFixed64,
        Kind::Bool => FieldType::Bool,
        Kind::String => FieldType::String,
        Kind::Bytes => FieldType::Bytes,
        Kind::Message(m) => FieldType::Message(m.full_name().to_string()),
        Kind::Enum(e) => FieldType::Enum(e.full_name().to_string()),
    }
}
