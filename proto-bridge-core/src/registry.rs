//! Process-wide descriptor registry
//!
//! One registry is constructed per process and handed (by `Arc`) to every
//! codec instance. Registration is the only mutating operation; it happens
//! once per message type, before decode/encode traffic starts, and is
//! serialized by an explicit mutex owned by the registry. Resolution is a
//! read-mostly lookup safe to call from any number of worker threads.

use crate::codec::{CodecConfig, SchemaVersion};
use crate::error::{Error, Result};
use crate::loader;
use crate::meta::SchemaMetadataStore;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::FileDescriptorSet;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Outcome of registering a message type.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    pub descriptor: MessageDescriptor,
    /// Present only for legacy registrations, which carry their structure in
    /// a file-driven metadata store instead of live reflection.
    pub metadata: Option<Arc<SchemaMetadataStore>>,
}

/// Registry of message descriptors, shared across all codec instances.
#[derive(Debug)]
pub struct Registry {
    /// Serializes bulk registration; never held during decode/encode
    registration: Mutex<()>,
    pool: RwLock<DescriptorPool>,
    loaded_files: RwLock<HashSet<String>>,
    entries: RwLock<HashMap<String, RegisteredSchema>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            registration: Mutex::new(()),
            pool: RwLock::new(DescriptorPool::new()),
            loaded_files: RwLock::new(HashSet::new()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load the configured schema artifacts and register `class_name`.
    ///
    /// Registering an already-registered type name is a no-op that returns
    /// the existing entry: a wire schema must never be redefined while other
    /// codecs may be decoding against it. When two codec instances race to
    /// register the same type, exactly one performs the load and the other
    /// observes the finished entry.
    pub fn register(&self, config: &CodecConfig) -> Result<RegisteredSchema> {
        let _guard = self
            .registration
            .lock()
            .map_err(|_| Error::Config("registry registration lock poisoned".to_string()))?;

        if let Some(existing) = self.lookup(&config.class_name) {
            return Ok(existing);
        }

        let files = loader::load_source(&config.schema_source)?;

        let fresh: Vec<_> = {
            let loaded = self
                .loaded_files
                .read()
                .map_err(|_| Error::Config("registry file index poisoned".to_string()))?;
            files
                .iter()
                .filter(|f| !loaded.contains(f.name()))
                .cloned()
                .collect()
        };

        if !fresh.is_empty() {
            let fresh_names: Vec<String> = fresh.iter().map(|f| f.name().to_string()).collect();
            self.pool
                .write()
                .map_err(|_| Error::Config("registry pool lock poisoned".to_string()))?
                .add_file_descriptor_set(FileDescriptorSet { file: fresh })
                .map_err(|e| Error::SchemaLoad {
                    path: config.schema_source.primary_path(),
                    reason: e.to_string(),
                })?;
            self.loaded_files
                .write()
                .map_err(|_| Error::Config("registry file index poisoned".to_string()))?
                .extend(fresh_names);
        }

        let descriptor = self
            .resolve(&config.class_name)
            .ok_or_else(|| Error::UnknownType(config.class_name.clone()))?;

        let metadata = match config.schema_version {
            SchemaVersion::Legacy => Some(Arc::new(SchemaMetadataStore::from_files(&files))),
            SchemaVersion::Modern => None,
        };

        let entry = RegisteredSchema {
            descriptor,
            metadata,
        };
        self.entries
            .write()
            .map_err(|_| Error::Config("registry entries lock poisoned".to_string()))?
            .insert(config.class_name.clone(), entry.clone());
        Ok(entry)
    }

    /// Concurrent-safe lookup of a registered or pool-known message type.
    pub fn resolve(&self, type_name: &str) -> Option<MessageDescriptor> {
        if let Some(entry) = self.lookup(type_name) {
            return Some(entry.descriptor);
        }
        self.pool.read().ok()?.get_message_by_name(type_name)
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(type_name))
            .unwrap_or(false)
    }

    fn lookup(&self, type_name: &str) -> Option<RegisteredSchema> {
        self.entries.read().ok()?.get(type_name).cloned()
    }
}
