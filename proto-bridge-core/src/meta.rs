//! Schema metadata: field and enum structure extracted from descriptor artifacts
//!
//! The legacy message representation has no live reflection idiom, so all
//! structural questions ("is this referenced type an enum or a message",
//! "which symbol is enum code 3") are answered from a [`SchemaMetadataStore`]
//! built once at registration time by walking the declarations of every
//! loaded `FileDescriptorProto`. The modern path answers the same questions
//! from live descriptors; both sides meet at the [`SchemaInfo`] seam used by
//! the encoder and the coercion engine.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Schema-declared type of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
    /// Fully-qualified enum type name
    Enum(String),
    /// Fully-qualified message type name
    Message(String),
}

/// Coarse classification used when comparing a record value against a
/// declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Integer,
    Float,
    Boolean,
    Str,
    Bytes,
    Enum,
    Message,
    /// Used for container mismatches: the schema wanted a repeated field
    Repeated,
}

impl FieldType {
    pub fn class(&self) -> ValueClass {
        match self {
            FieldType::Double | FieldType::Float => ValueClass::Float,
            FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::SInt32
            | FieldType::SInt64
            | FieldType::Fixed32
            | FieldType::Fixed64
            | FieldType::SFixed32
            | FieldType::SFixed64 => ValueClass::Integer,
            FieldType::Bool => ValueClass::Boolean,
            FieldType::String => ValueClass::Str,
            FieldType::Bytes => ValueClass::Bytes,
            FieldType::Enum(_) => ValueClass::Enum,
            FieldType::Message(_) => ValueClass::Message,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Double => write!(f, "double"),
            FieldType::Float => write!(f, "float"),
            FieldType::Int32 => write!(f, "int32"),
            FieldType::Int64 => write!(f, "int64"),
            FieldType::UInt32 => write!(f, "uint32"),
            FieldType::UInt64 => write!(f, "uint64"),
            FieldType::SInt32 => write!(f, "sint32"),
            FieldType::SInt64 => write!(f, "sint64"),
            FieldType::Fixed32 => write!(f, "fixed32"),
            FieldType::Fixed64 => write!(f, "fixed64"),
            FieldType::SFixed32 => write!(f, "sfixed32"),
            FieldType::SFixed64 => write!(f, "sfixed64"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Enum(name) => write!(f, "enum {}", name),
            FieldType::Message(name) => write!(f, "message {}", name),
        }
    }
}

/// Whether a field holds one value, a sequence, or a protobuf map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Repeated,
    Map { key: FieldType },
}

/// Everything the engine needs to know about one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    /// For map fields this is the value type; the key type lives in
    /// [`Cardinality::Map`].
    pub ty: FieldType,
    pub cardinality: Cardinality,
    /// Owning oneof group, if the field is a (non-synthetic) oneof member
    pub oneof: Option<String>,
}

impl FieldSchema {
    pub fn is_repeated(&self) -> bool {
        matches!(self.cardinality, Cardinality::Repeated)
    }

    pub fn is_map(&self) -> bool {
        matches!(self.cardinality, Cardinality::Map { .. })
    }
}

/// The structural-question seam shared by the legacy and modern code paths.
pub(crate) trait SchemaInfo {
    fn field_schema(&self, message: &str, field: &str) -> Option<FieldSchema>;
    fn field_names(&self, message: &str) -> Vec<String>;
    fn enum_symbol(&self, enum_name: &str, number: i32) -> Option<String>;
    fn enum_number(&self, enum_name: &str, symbol: &str) -> Option<i32>;
}

#[derive(Debug, Clone, Default)]
struct MessageMeta {
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Default)]
struct EnumMeta {
    by_number: BTreeMap<i32, String>,
    by_name: HashMap<String, i32>,
}

/// Per message type, the field → structure map needed where no runtime
/// reflection exists. Built once, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaMetadataStore {
    messages: HashMap<String, MessageMeta>,
    enums: HashMap<String, EnumMeta>,
}

impl SchemaMetadataStore {
    /// Scan the declarations of every file into one store.
    pub fn from_files(files: &[FileDescriptorProto]) -> Self {
        let mut store = Self::default();
        let mut map_entries = HashMap::new();
        for fd in files {
            let package = fd.package();
            for message in &fd.message_type {
                store.scan_message(&qualify(package, message.name()), message, &mut map_entries);
            }
            for enumeration in &fd.enum_type {
                store.scan_enum(&qualify(package, enumeration.name()), enumeration);
            }
        }
        store.resolve_map_fields(&map_entries);
        store
    }

    fn scan_message(
        &mut self,
        full_name: &str,
        message: &DescriptorProto,
        map_entries: &mut HashMap<String, (FieldType, FieldType)>,
    ) {
        if message.options.as_ref().is_some_and(|o| o.map_entry()) {
            // Synthetic map entry type: remember its key/value types so the
            // owning field can be rewritten, but don't publish it.
            let key = message
                .field
                .iter()
                .find(|f| f.name() == "key")
                .map(field_type_of);
            let value = message
                .field
                .iter()
                .find(|f| f.name() == "value")
                .map(field_type_of);
            if let (Some(key), Some(value)) = (key, value) {
                map_entries.insert(full_name.to_string(), (key, value));
            }
            return;
        }

        let fields = message
            .field
            .iter()
            .map(|f| FieldSchema {
                name: f.name().to_string(),
                ty: field_type_of(f),
                cardinality: if f.label() == Label::Repeated {
                    Cardinality::Repeated
                } else {
                    Cardinality::Single
                },
                oneof: oneof_group_of(message, f),
            })
            .collect();
        self.messages
            .insert(full_name.to_string(), MessageMeta { fields });

        for nested in &message.nested_type {
            self.scan_message(
                &format!("{}.{}", full_name, nested.name()),
                nested,
                map_entries,
            );
        }
        for enumeration in &message.enum_type {
            self.scan_enum(&format!("{}.{}", full_name, enumeration.name()), enumeration);
        }
    }

    fn scan_enum(&mut self, full_name: &str, enumeration: &EnumDescriptorProto) {
        let mut meta = EnumMeta::default();
        for value in &enumeration.value {
            meta.by_number.insert(value.number(), value.name().to_string());
            meta.by_name.insert(value.name().to_string(), value.number());
        }
        self.enums.insert(full_name.to_string(), meta);
    }

    /// Rewrite fields whose declared type is a map entry into proper map
    /// fields carrying the entry's key and value types.
    fn resolve_map_fields(&mut self, map_entries: &HashMap<String, (FieldType, FieldType)>) {
        for meta in self.messages.values_mut() {
            for field in &mut meta.fields {
                if let FieldType::Message(type_name) = &field.ty {
                    if let Some((key, value)) = map_entries.get(type_name) {
                        field.ty = value.clone();
                        field.cardinality = Cardinality::Map { key: key.clone() };
                    }
                }
            }
        }
    }

    pub fn field(&self, message: &str, field: &str) -> Option<&FieldSchema> {
        self.messages
            .get(message)?
            .fields
            .iter()
            .find(|f| f.name == field)
    }

    /// Declared fields of a message, in declaration order.
    pub fn fields(&self, message: &str) -> Option<&[FieldSchema]> {
        self.messages.get(message).map(|m| m.fields.as_slice())
    }

    pub fn field_names(&self, message: &str) -> Vec<String> {
        self.messages
            .get(message)
            .map(|m| m.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn contains_message(&self, type_name: &str) -> bool {
        self.messages.contains_key(type_name)
    }

    /// Answers "is this referenced type an enum (as opposed to a message)".
    pub fn is_enum(&self, type_name: &str) -> bool {
        self.enums.contains_key(type_name)
    }

    pub fn enum_symbol(&self, enum_name: &str, number: i32) -> Option<&str> {
        self.enums
            .get(enum_name)?
            .by_number
            .get(&number)
            .map(String::as_str)
    }

    pub fn enum_number(&self, enum_name: &str, symbol: &str) -> Option<i32> {
        self.enums.get(enum_name)?.by_name.get(symbol).copied()
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

fn field_type_of(field: &FieldDescriptorProto) -> FieldType {
    let referenced = || field.type_name().trim_start_matches('.').to_string();
    match field.r#type() {
        Type::Double => FieldType::Double,
        Type::Float => FieldType::Float,
        Type::Int32 => FieldType::Int32,
        Type::Int64 => FieldType::Int64,
        Type::Uint32 => FieldType::UInt32,
        Type::Uint64 => FieldType::UInt64,
        Type::Sint32 => FieldType::SInt32,
        Type::Sint64 => FieldType::SInt64,
        Type::Fixed32 => FieldType::Fixed32,
        Type::Fixed64 => FieldType::Fixed64,
        Type::Sfixed32 => FieldType::SFixed32,
        Type::Sfixed64 => FieldType::SFixed64,
        Type::Bool => FieldType::Bool,
        Type::String => FieldType::String,
        Type::Bytes => FieldType::Bytes,
        Type::Enum => FieldType::Enum(referenced()),
        Type::Message | Type::Group => FieldType::Message(referenced()),
    }
}

fn oneof_group_of(message: &DescriptorProto, field: &FieldDescriptorProto) -> Option<String> {
    // proto3 `optional` is represented as a synthetic single-member oneof;
    // that is plain presence, not a real group.
    if field.proto3_optional() {
        return None;
    }
    let index = field.oneof_index? as usize;
    message.oneof_decl.get(index).map(|o| o.name().to_string())
}
