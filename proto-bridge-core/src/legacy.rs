//! Codec for the legacy schema representation
//!
//! The legacy message form has no live reflection idiom: every structural
//! decision during the walk — field order, enum symbol resolution, nested
//! type identity — comes from the [`SchemaMetadataStore`] built at
//! registration time. The underlying runtime still does the wire work;
//! only the mapping layer differs from the modern path.
//!
//! Legacy sources predate the oneof concept, so decode never emits
//! selection metadata.

use crate::codec::{CodecOptions, Decoded, MessageCodec};
use crate::decode::{map_key_string, scalar_value};
use crate::encode::{EncodeOptions, encode_record};
use crate::error::{Error, Result};
use crate::meta::{Cardinality, FieldSchema, FieldType, SchemaInfo, SchemaMetadataStore};
use crate::record::{GenericRecord, Value};
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage, Value as ReflectValue};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) struct LegacyCodec {
    descriptor: MessageDescriptor,
    store: Arc<SchemaMetadataStore>,
    options: CodecOptions,
}

impl LegacyCodec {
    pub(crate) fn new(
        descriptor: MessageDescriptor,
        store: Arc<SchemaMetadataStore>,
        options: CodecOptions,
    ) -> Self {
        Self {
            descriptor,
            store,
            options,
        }
    }

    fn decode_message(&self, message: &DynamicMessage) -> GenericRecord {
        let descriptor = message.descriptor();
        let type_name = descriptor.full_name();
        let mut record = GenericRecord::new();

        let Some(fields) = self.store.fields(type_name) else {
            return record;
        };
        for schema in fields {
            let Some(field) = descriptor.get_field_by_name(&schema.name) else {
                continue;
            };
            match &schema.cardinality {
                Cardinality::Single => {
                    // Legacy fields all carry explicit presence; unset means
                    // absent from the record, set-to-default stays visible.
                    if !message.has_field(&field) {
                        continue;
                    }
                    let raw = message.get_field(&field);
                    record.insert(
                        schema.name.clone(),
                        self.convert_single(&schema.ty, raw.as_ref()),
                    );
                }
                Cardinality::Repeated => {
                    let raw = message.get_field(&field);
                    let items = match raw.as_ref() {
                        ReflectValue::List(items) => items
                            .iter()
                            .map(|item| self.convert_single(&schema.ty, item))
                            .collect(),
                        _ => Vec::new(),
                    };
                    record.insert(schema.name.clone(), Value::List(items));
                }
                Cardinality::Map { .. } => {
                    let raw = message.get_field(&field);
                    let mut out = BTreeMap::new();
                    if let ReflectValue::Map(entries) = raw.as_ref() {
                        for (key, value) in entries {
                            out.insert(
                                map_key_string(key),
                                self.convert_single(&schema.ty, value),
                            );
                        }
                    }
                    record.insert(schema.name.clone(), Value::Map(out));
                }
            }
        }
        record
    }

    fn convert_single(&self, declared: &FieldType, raw: &ReflectValue) -> Value {
        match declared {
            FieldType::Enum(enum_name) => {
                let ReflectValue::EnumNumber(number) = raw else {
                    return Value::Null;
                };
                match self.store.enum_symbol(enum_name, *number) {
                    Some(symbol) => Value::String(symbol.to_string()),
                    None => Value::Int(*number as i64),
                }
            }
            FieldType::Message(_) => {
                let ReflectValue::Message(inner) = raw else {
                    return Value::Null;
                };
                Value::Record(self.decode_message(inner))
            }
            _ => scalar_value(raw),
        }
    }
}

impl MessageCodec for LegacyCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded> {
        let message = DynamicMessage::decode(self.descriptor.clone(), bytes).map_err(|e| {
            Error::Decode {
                type_name: self.descriptor.full_name().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Decoded {
            record: self.decode_message(&message),
            oneofs: None,
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

impl SchemaInfo for LegacyCodec {
    fn field_schema(&self, message: &str, field: &str) -> Option<FieldSchema> {
        self.store.field(message, field).cloned()
    }

    fn field_names(&self, message: &str) -> Vec<String> {
        self.store.field_names(message)
    }

    fn enum_symbol(&self, enum_name: &str, number: i32) -> Option<String> {
        self.store.enum_symbol(enum_name, number).map(str::to_string)
    }

    fn enum_number(&self, enum_name: &str, symbol: &str) -> Option<i32> {
        self.store.enum_number(enum_name, symbol)
    }
}
