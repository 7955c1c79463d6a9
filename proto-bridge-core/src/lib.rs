//! Proto Bridge Core Library
//!
//! This library converts pipeline event records between a dynamically typed
//! generic record format and binary Protocol Buffer messages, without
//! compile-time knowledge of the schema. Schemas arrive as pre-compiled
//! descriptor artifacts and are served from a process-wide registry.
//!
//! # Features
//!
//! - Bidirectional conversion: bytes → [`GenericRecord`] and back
//! - Legacy and modern schema representations behind one [`MessageCodec`]
//!   trait, selected once at registration time
//! - Enum codes resolved to symbolic names; oneof choices reported through
//!   [`OneofSelection`] metadata
//! - Type-directed coercion with a single bounded retry on encode
//! - Unknown-field policy (drop silently or fail the record)
//! - Length-delimited framing for streams of messages
//! - Serde support for direct JSON serialization of records
//!
//! # Examples
//!
//! ## Decoding a message
//!
//! ```no_run
//! use proto_bridge_core::{CodecConfig, ProtobufCodec, Registry, SchemaSource};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! let config = CodecConfig::new(
//!     "zoo.Unicorn",
//!     SchemaSource::Files(vec!["schemas/unicorn.desc".into()]),
//! )
//! .oneof_metadata(true);
//!
//! let codec = ProtobufCodec::new(config, &registry)?;
//! let payload = std::fs::read("unicorn.bin")?;
//! for decoded in codec.decode(&payload)? {
//!     println!("{}", decoded.record);
//! }
//! # Ok::<(), proto_bridge_core::Error>(())
//! ```
//!
//! ## Encoding a record
//!
//! ```no_run
//! use proto_bridge_core::{CodecConfig, GenericRecord, ProtobufCodec, Registry, SchemaSource};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! let codec = ProtobufCodec::new(
//!     CodecConfig::new(
//!         "zoo.Unicorn",
//!         SchemaSource::Files(vec!["schemas/unicorn.desc".into()]),
//!     ),
//!     &registry,
//! )?;
//!
//! let record = GenericRecord::new()
//!     .with("name", "Pinkie")
//!     .with("age", 18i64)
//!     .with("fur_colour", "PINK");
//! let bytes = codec.encode(&record)?;
//! # Ok::<(), proto_bridge_core::Error>(())
//! ```

// Public modules
pub mod codec;
pub mod coerce;
pub mod display;
pub mod error;
pub mod framing;
pub mod iter;
pub mod loader;
pub mod meta;
pub mod oneof;
pub mod record;
pub mod registry;
pub mod serde_support;

// Internal machinery
mod decode;
mod encode;
mod legacy;
mod modern;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use codec::{CodecConfig, DECODE_FAILURE_TAG, Decoded, MessageCodec, ProtobufCodec, SchemaVersion};
pub use coerce::TypeMismatch;
pub use error::{ConstructionError, Error, Result};
pub use loader::SchemaSource;
pub use meta::SchemaMetadataStore;
pub use oneof::OneofSelection;
pub use record::{GenericRecord, Value};
pub use registry::{RegisteredSchema, Registry};
