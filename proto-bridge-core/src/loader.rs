//! Loading of pre-compiled schema descriptor artifacts
//!
//! An artifact is a serialized `FileDescriptorSet` (or a single serialized
//! `FileDescriptorProto`), i.e. the output of a schema compiler — never
//! `.proto` source. Artifacts either arrive as an explicit list of
//! self-contained files, or as one root artifact whose declared dependencies
//! are resolved against an include directory and loaded transitively.

use crate::error::{Error, Result};
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Where schema artifacts come from. The two addressing modes are mutually
/// exclusive by construction; emptiness is caught by [`SchemaSource::validate`].
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Explicit list of artifact files, each self-contained
    Files(Vec<PathBuf>),
    /// One root artifact plus a directory for resolving its declared
    /// dependencies (transitively)
    Root {
        file: PathBuf,
        include_root: PathBuf,
    },
}

impl SchemaSource {
    pub fn validate(&self) -> Result<()> {
        match self {
            SchemaSource::Files(paths) if paths.is_empty() => Err(Error::Config(
                "schema source: at least one artifact file is required".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Representative path for diagnostics.
    pub(crate) fn primary_path(&self) -> PathBuf {
        match self {
            SchemaSource::Files(paths) => paths.first().cloned().unwrap_or_default(),
            SchemaSource::Root { file, .. } => file.clone(),
        }
    }
}

/// Read every file the source describes, dependency-ordered so that a
/// descriptor pool can ingest them in one pass.
pub(crate) fn load_source(source: &SchemaSource) -> Result<Vec<FileDescriptorProto>> {
    source.validate()?;
    let files = match source {
        SchemaSource::Files(paths) => {
            let mut files = Vec::new();
            let mut seen = HashSet::new();
            for path in paths {
                for fd in read_artifact(path)? {
                    if seen.insert(fd.name().to_string()) {
                        files.push(fd);
                    }
                }
            }
            files
        }
        SchemaSource::Root { file, include_root } => {
            let mut visited = HashSet::new();
            let mut files = Vec::new();
            load_recursive(file, include_root, &mut visited, &mut files)?;
            files
        }
    };
    Ok(order_by_dependency(files))
}

/// Decode one artifact file. Tries the set form first, then a bare
/// `FileDescriptorProto`; anything else is a fatal schema-load error.
fn read_artifact(path: &Path) -> Result<Vec<FileDescriptorProto>> {
    let bytes = std::fs::read(path).map_err(|e| Error::SchemaLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Ok(set) = FileDescriptorSet::decode(bytes.as_slice()) {
        if !set.file.is_empty() && set.file.iter().all(|f| f.name.is_some()) {
            return Ok(set.file);
        }
    }
    match FileDescriptorProto::decode(bytes.as_slice()) {
        Ok(fd) if fd.name.is_some() => Ok(vec![fd]),
        _ => Err(Error::SchemaLoad {
            path: path.to_path_buf(),
            reason: "not a serialized FileDescriptorSet or FileDescriptorProto".to_string(),
        }),
    }
}

/// Depth-first load of an artifact and everything it declares as a
/// dependency. Already-visited names are skipped, which also terminates
/// dependency cycles.
fn load_recursive(
    path: &Path,
    include_root: &Path,
    visited: &mut HashSet<String>,
    out: &mut Vec<FileDescriptorProto>,
) -> Result<()> {
    for fd in read_artifact(path)? {
        if !visited.insert(fd.name().to_string()) {
            continue;
        }
        for dependency in &fd.dependency {
            if visited.contains(dependency) {
                continue;
            }
            load_recursive(&include_root.join(dependency), include_root, visited, out)?;
        }
        out.push(fd);
    }
    Ok(())
}

/// Order files so every dependency precedes its dependents. Dependencies
/// that are not part of the loaded set are left for the descriptor pool to
/// report; cycles fall back to first-seen order instead of recursing.
fn order_by_dependency(files: Vec<FileDescriptorProto>) -> Vec<FileDescriptorProto> {
    let names: Vec<String> = files.iter().map(|f| f.name().to_string()).collect();
    let by_name: HashMap<String, FileDescriptorProto> = files
        .into_iter()
        .map(|f| (f.name().to_string(), f))
        .collect();

    let mut done: HashSet<String> = HashSet::new();
    let mut in_progress: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(by_name.len());

    fn visit(
        name: &str,
        by_name: &HashMap<String, FileDescriptorProto>,
        done: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        ordered: &mut Vec<FileDescriptorProto>,
    ) {
        if done.contains(name) || !in_progress.insert(name.to_string()) {
            return;
        }
        if let Some(fd) = by_name.get(name) {
            for dependency in &fd.dependency {
                visit(dependency, by_name, done, in_progress, ordered);
            }
            ordered.push(fd.clone());
            done.insert(name.to_string());
        }
        in_progress.remove(name);
    }

    for name in &names {
        visit(name, &by_name, &mut done, &mut in_progress, &mut ordered);
    }
    ordered
}
