//! Error types for proto-bridge-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for proto-bridge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A schema artifact could not be read or understood.
    ///
    /// Fatal at registration time: the engine cannot operate on partial
    /// schema metadata, so registration aborts instead of proceeding.
    #[error("schema artifact {}: {reason}", .path.display())]
    SchemaLoad { path: PathBuf, reason: String },

    /// Invalid codec configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configured message type is not present in the loaded schemas
    #[error("message type '{0}' was not found in the loaded schema artifacts")]
    UnknownType(String),

    /// Bytes did not parse against the configured message type
    #[error("failed to decode payload as {type_name}: {reason}")]
    Decode { type_name: String, reason: String },

    /// A record could not be built into a message
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Protobuf serialization error
    #[error("protobuf encoding failed: {0}")]
    ProtobufEncode(#[from] prost::EncodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a record can fail message construction.
///
/// These are always contained per record: a single bad record is discarded
/// with a diagnostic and never aborts the surrounding stream.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// The record carries a key with no corresponding schema field
    #[error(
        "field '{field}' is not part of {message_type} (schema fields are: {})",
        .known_fields.join(", ")
    )]
    UnknownField {
        field: String,
        message_type: String,
        known_fields: Vec<String>,
    },

    /// A record value does not match the schema-declared type of its field
    #[error("type mismatch at '{path}': schema wants {expected}, record has {actual}")]
    Mismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

impl ConstructionError {
    /// True for the class of errors the coercion retry can attempt to fix.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, ConstructionError::Mismatch { .. })
    }
}
