//! Shared test fixtures: hand-built descriptor sets and artifact files

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};
use std::path::{Path, PathBuf};

fn field(
    name: &str,
    number: i32,
    ty: Type,
    label: Label,
    type_name: Option<&str>,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(|t| t.to_string()),
        ..Default::default()
    }
}

pub(crate) fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, ty, Label::Optional, None)
}

pub(crate) fn repeated_scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, ty, Label::Repeated, None)
}

pub(crate) fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    field(name, number, Type::Message, Label::Optional, Some(type_name))
}

pub(crate) fn repeated_message_field(
    name: &str,
    number: i32,
    type_name: &str,
) -> FieldDescriptorProto {
    field(name, number, Type::Message, Label::Repeated, Some(type_name))
}

pub(crate) fn enum_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    field(name, number, Type::Enum, Label::Optional, Some(type_name))
}

pub(crate) fn repeated_enum_field(
    name: &str,
    number: i32,
    type_name: &str,
) -> FieldDescriptorProto {
    field(name, number, Type::Enum, Label::Repeated, Some(type_name))
}

pub(crate) fn in_oneof(mut field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    field.oneof_index = Some(index);
    field
}

pub(crate) fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

pub(crate) fn oneof(name: &str) -> OneofDescriptorProto {
    OneofDescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub(crate) fn map_entry(name: &str, value: FieldDescriptorProto) -> DescriptorProto {
    let mut entry = message(name, vec![scalar_field("key", 1, Type::String), value]);
    entry.options = Some(MessageOptions {
        map_entry: Some(true),
        ..Default::default()
    });
    entry
}

pub(crate) fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(value_name, number)| EnumValueDescriptorProto {
                name: Some(value_name.to_string()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn file(
    name: &str,
    package: &str,
    messages: Vec<DescriptorProto>,
    enums: Vec<EnumDescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        message_type: messages,
        enum_type: enums,
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// The Unicorn schema used throughout decode/encode tests:
/// scalars, an enum, repeated fields and a self-referencing message field.
pub(crate) fn unicorn_file() -> FileDescriptorProto {
    file(
        "unicorn.proto",
        "zoo",
        vec![message(
            "Unicorn",
            vec![
                scalar_field("name", 1, Type::String),
                scalar_field("age", 2, Type::Int32),
                scalar_field("is_pegasus", 3, Type::Bool),
                enum_field("fur_colour", 4, ".zoo.Colour"),
                repeated_scalar_field("favourite_numbers", 5, Type::Int32),
                repeated_enum_field("favourite_colours", 6, ".zoo.Colour"),
                message_field("father", 7, ".zoo.Unicorn"),
            ],
        )],
        vec![enumeration(
            "Colour",
            &[
                ("WHITE", 0),
                ("PINK", 1),
                ("GREEN", 2),
                ("SILVER", 3),
                ("BLUE", 4),
                ("GLITTER", 5),
            ],
        )],
    )
}

/// Fantasy horses with two oneof groups, one of them nested: `horse_type`
/// on the root message and `hair_type` inside the tail.
pub(crate) fn fantasy_file() -> FileDescriptorProto {
    let mut tail = message(
        "Tail",
        vec![
            scalar_field("tail_length", 1, Type::Int32),
            in_oneof(message_field("braided", 2, ".fantasy.BraidedTail"), 0),
            in_oneof(message_field("natural", 3, ".fantasy.NaturalTail"), 0),
            in_oneof(message_field("short", 4, ".fantasy.ShortTail"), 0),
        ],
    );
    tail.oneof_decl = vec![oneof("hair_type")];

    let mut horse = message(
        "Horse",
        vec![
            scalar_field("name", 1, Type::String),
            in_oneof(message_field("pegasus", 2, ".fantasy.Pegasus"), 0),
            in_oneof(message_field("unicorn", 3, ".fantasy.UnicornForm"), 0),
            message_field("tail", 4, ".fantasy.Tail"),
        ],
    );
    horse.oneof_decl = vec![oneof("horse_type")];

    file(
        "fantasy.proto",
        "fantasy",
        vec![
            message("Pegasus", vec![scalar_field("wings_length", 1, Type::Int32)]),
            message(
                "UnicornForm",
                vec![scalar_field("horn_length", 1, Type::Int32)],
            ),
            message(
                "BraidedTail",
                vec![
                    scalar_field("braid_thickness", 1, Type::Int32),
                    scalar_field("braiding_style", 2, Type::String),
                ],
            ),
            message("NaturalTail", vec![scalar_field("wavyness", 1, Type::String)]),
            message("ShortTail", vec![scalar_field("length", 1, Type::Int32)]),
            tail,
            horse,
        ],
        vec![],
    )
}

/// Map fields: plain string values and message values.
pub(crate) fn dictionary_file() -> FileDescriptorProto {
    let mut dictionary = message(
        "Dictionary",
        vec![
            repeated_message_field("labels", 1, ".dict.Dictionary.LabelsEntry"),
            repeated_message_field("entries", 2, ".dict.Dictionary.EntriesEntry"),
        ],
    );
    dictionary.nested_type = vec![
        map_entry("LabelsEntry", scalar_field("value", 2, Type::String)),
        map_entry("EntriesEntry", message_field("value", 2, ".dict.Entry")),
    ];

    file(
        "dictionary.proto",
        "dict",
        vec![
            message(
                "Entry",
                vec![
                    scalar_field("id", 1, Type::String),
                    scalar_field("score", 2, Type::Int32),
                ],
            ),
            dictionary,
        ],
        vec![],
    )
}

/// Hand-built `google/protobuf/struct.proto` so fixtures can embed the
/// free-form well-known type without shipping protoc output.
pub(crate) fn struct_file() -> FileDescriptorProto {
    let mut strukt = message(
        "Struct",
        vec![repeated_message_field(
            "fields",
            1,
            ".google.protobuf.Struct.FieldsEntry",
        )],
    );
    strukt.nested_type = vec![map_entry(
        "FieldsEntry",
        message_field("value", 2, ".google.protobuf.Value"),
    )];

    let mut value = message(
        "Value",
        vec![
            in_oneof(enum_field("null_value", 1, ".google.protobuf.NullValue"), 0),
            in_oneof(scalar_field("number_value", 2, Type::Double), 0),
            in_oneof(scalar_field("string_value", 3, Type::String), 0),
            in_oneof(scalar_field("bool_value", 4, Type::Bool), 0),
            in_oneof(message_field("struct_value", 5, ".google.protobuf.Struct"), 0),
            in_oneof(message_field("list_value", 6, ".google.protobuf.ListValue"), 0),
        ],
    );
    value.oneof_decl = vec![oneof("kind")];

    let list_value = message(
        "ListValue",
        vec![repeated_message_field("values", 1, ".google.protobuf.Value")],
    );

    file(
        "google/protobuf/struct.proto",
        "google.protobuf",
        vec![strukt, value, list_value],
        vec![enumeration("NullValue", &[("NULL_VALUE", 0)])],
    )
}

/// A request message embedding the well-known Struct type; depends on
/// `struct_file()`.
pub(crate) fn request_file() -> FileDescriptorProto {
    let mut fd = file(
        "request.proto",
        "messages",
        vec![message(
            "SendJsonRequest",
            vec![
                scalar_field("user_id", 1, Type::String),
                message_field("details", 2, ".google.protobuf.Struct"),
            ],
        )],
        vec![],
    );
    fd.dependency = vec!["google/protobuf/struct.proto".to_string()];
    fd
}

/// A proto2 schema for the legacy code path: explicit presence everywhere,
/// a non-zero-based enum, nested recursion.
pub(crate) fn legacy_file() -> FileDescriptorProto {
    let mut fd = file(
        "animal.proto",
        "animal",
        vec![
            message(
                "Unicorn",
                vec![
                    scalar_field("colour", 1, Type::String),
                    scalar_field("horn_length", 2, Type::Int32),
                    scalar_field("last_seen", 3, Type::Int64),
                    scalar_field("has_wings", 4, Type::Bool),
                    enum_field("fur_colour", 5, ".animal.Colour"),
                ],
            ),
            message(
                "Human",
                vec![
                    scalar_field("first_name", 1, Type::String),
                    scalar_field("last_name", 2, Type::String),
                    repeated_scalar_field("middle_names", 3, Type::String),
                    scalar_field("vegetarian", 4, Type::Bool),
                    message_field("mother", 5, ".animal.Human"),
                    message_field("father", 6, ".animal.Human"),
                ],
            ),
        ],
        vec![enumeration(
            "Colour",
            &[("BLUE", 1), ("PINK", 2), ("RAINBOW", 3)],
        )],
    );
    fd.syntax = Some("proto2".to_string());
    fd
}

pub(crate) fn file_set(files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
    FileDescriptorSet { file: files }
}

pub(crate) fn pool_for(files: Vec<FileDescriptorProto>) -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(file_set(files)).expect("fixture descriptors are valid")
}

/// Serialize a descriptor set into an artifact file under `dir`, creating
/// parent directories for dependency-style names like `google/protobuf/...`.
pub(crate) fn write_artifact(dir: &Path, name: &str, files: Vec<FileDescriptorProto>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("artifact parent dir");
    }
    std::fs::write(&path, file_set(files).encode_to_vec()).expect("write artifact");
    path
}
