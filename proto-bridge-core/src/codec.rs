//! Codec configuration and the public entry point
//!
//! [`ProtobufCodec`] selects one of the two codec implementations at
//! construction time (per the configured schema representation), then layers
//! the optional length-delimited framing and the decode-error policy on top.

use crate::error::{Error, Result};
use crate::framing;
use crate::legacy::LegacyCodec;
use crate::loader::SchemaSource;
use crate::modern::ModernCodec;
use crate::oneof::OneofSelection;
use crate::record::{GenericRecord, Value};
use crate::registry::Registry;
use std::sync::Arc;
use tracing::warn;

/// Tag added to fallback records for payloads that failed to decode.
pub const DECODE_FAILURE_TAG: &str = "_protobufdecodefailure";

/// Which message representation the schema artifacts use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVersion {
    /// proto2-era representation; structure comes from the file-driven
    /// metadata store
    Legacy,
    /// proto3 representation; structure comes from live descriptor
    /// reflection
    #[default]
    Modern,
}

/// The full configuration surface of the codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Fully-qualified message type to decode/encode
    pub class_name: String,
    pub schema_source: SchemaSource,
    pub schema_version: SchemaVersion,
    /// Propagate decode failures instead of emitting a fallback record
    pub stop_on_decode_error: bool,
    /// Enable the single type-coercion retry on construction mismatches
    pub autoconvert_types: bool,
    /// Silently drop record keys with no schema field instead of failing
    pub drop_unknown_fields: bool,
    /// Emit oneof selection metadata alongside decoded records
    pub oneof_metadata: bool,
    /// Varint length-delimited message boundaries on both directions
    pub length_delimited: bool,
}

impl CodecConfig {
    pub fn new(class_name: impl Into<String>, schema_source: SchemaSource) -> Self {
        Self {
            class_name: class_name.into(),
            schema_source,
            schema_version: SchemaVersion::default(),
            stop_on_decode_error: false,
            autoconvert_types: true,
            drop_unknown_fields: false,
            oneof_metadata: false,
            length_delimited: false,
        }
    }

    pub fn schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }

    pub fn stop_on_decode_error(mut self, stop: bool) -> Self {
        self.stop_on_decode_error = stop;
        self
    }

    pub fn autoconvert_types(mut self, autoconvert: bool) -> Self {
        self.autoconvert_types = autoconvert;
        self
    }

    pub fn drop_unknown_fields(mut self, drop: bool) -> Self {
        self.drop_unknown_fields = drop;
        self
    }

    pub fn oneof_metadata(mut self, emit: bool) -> Self {
        self.oneof_metadata = emit;
        self
    }

    pub fn length_delimited(mut self, framed: bool) -> Self {
        self.length_delimited = framed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_name.is_empty() {
            return Err(Error::Config("class_name must not be empty".to_string()));
        }
        self.schema_source.validate()
    }
}

/// Behavior switches shared by both codec implementations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CodecOptions {
    pub autoconvert: bool,
    pub drop_unknown: bool,
    pub oneof_metadata: bool,
}

/// One decoded message: the record plus (when enabled) its oneof metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub record: GenericRecord,
    pub oneofs: Option<OneofSelection>,
}

/// The conversion seam between the generic record domain and one concrete
/// message representation. Exactly two implementations exist, selected once
/// at registration time.
pub trait MessageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded>;
    fn encode(&self, record: &GenericRecord) -> Result<Vec<u8>>;
    fn type_name(&self) -> &str;
}

/// Public codec front: framing, decode-error policy, and the configured
/// backend behind one object.
///
/// # Example
///
/// ```no_run
/// use proto_bridge_core::{CodecConfig, ProtobufCodec, Registry, SchemaSource};
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::new());
/// let config = CodecConfig::new(
///     "zoo.Unicorn",
///     SchemaSource::Files(vec!["schemas/unicorn.desc".into()]),
/// );
/// let codec = ProtobufCodec::new(config, &registry)?;
///
/// let decoded = codec.decode(&[0x0a, 0x06, 0x50, 0x69, 0x6e, 0x6b, 0x69, 0x65])?;
/// for message in &decoded {
///     println!("{}", message.record);
/// }
/// # Ok::<(), proto_bridge_core::Error>(())
/// ```
pub struct ProtobufCodec {
    inner: Box<dyn MessageCodec>,
    stop_on_decode_error: bool,
    length_delimited: bool,
}

impl std::fmt::Debug for ProtobufCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtobufCodec")
            .field("stop_on_decode_error", &self.stop_on_decode_error)
            .field("length_delimited", &self.length_delimited)
            .finish_non_exhaustive()
    }
}

impl ProtobufCodec {
    /// Validate the configuration, register the schema, and build the
    /// backend the configuration selects.
    pub fn new(config: CodecConfig, registry: &Arc<Registry>) -> Result<Self> {
        config.validate()?;
        let schema = registry.register(&config)?;
        let options = CodecOptions {
            autoconvert: config.autoconvert_types,
            drop_unknown: config.drop_unknown_fields,
            oneof_metadata: config.oneof_metadata,
        };
        let inner: Box<dyn MessageCodec> = match config.schema_version {
            SchemaVersion::Modern => Box::new(ModernCodec::new(schema.descriptor, options)),
            SchemaVersion::Legacy => {
                let store = schema.metadata.ok_or_else(|| {
                    Error::Config("legacy registration produced no metadata store".to_string())
                })?;
                Box::new(LegacyCodec::new(schema.descriptor, store, options))
            }
        };
        Ok(Self {
            inner,
            stop_on_decode_error: config.stop_on_decode_error,
            length_delimited: config.length_delimited,
        })
    }

    /// Decode a buffer into records: one per frame when length-delimited
    /// framing is configured, otherwise exactly one for the whole buffer.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Decoded>> {
        if !self.length_delimited {
            return Ok(vec![self.decode_one(bytes)?]);
        }
        let mut out = Vec::new();
        for frame in framing::read_frames(bytes) {
            out.push(self.decode_one(&frame?)?);
        }
        Ok(out)
    }

    fn decode_one(&self, bytes: &[u8]) -> Result<Decoded> {
        match self.inner.decode(bytes) {
            Ok(decoded) => Ok(decoded),
            Err(e @ Error::Decode { .. }) if !self.stop_on_decode_error => {
                warn!(error = %e, "payload failed to decode, emitting fallback record");
                Ok(fallback_record(bytes, &e))
            }
            Err(e) => Err(e),
        }
    }

    /// Encode one record, varint-length-prefixed when framing is configured.
    pub fn encode(&self, record: &GenericRecord) -> Result<Vec<u8>> {
        let payload = self.inner.encode(record)?;
        if !self.length_delimited {
            return Ok(payload);
        }
        let mut framed = Vec::with_capacity(payload.len() + 4);
        framing::write_frame(&mut framed, &payload)?;
        Ok(framed)
    }

    pub fn type_name(&self) -> &str {
        self.inner.type_name()
    }
}

/// The recoverable-decode-failure shape: raw payload plus a failure tag, so
/// a downstream consumer can inspect or reroute the data without losing it.
fn fallback_record(bytes: &[u8], error: &Error) -> Decoded {
    let record = GenericRecord::new()
        .with("raw_bytes", bytes.to_vec())
        .with("tags", vec![Value::from(DECODE_FAILURE_TAG)])
        .with("decode_error", error.to_string());
    Decoded {
        record,
        oneofs: None,
    }
}
