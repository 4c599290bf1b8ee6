//! `#include` target resolution
//!
//! The parser never touches storage directly; every `#include` goes through a
//! [`FileResolver`]. [`FsResolver`] reads from disk, [`MemoryResolver`] serves
//! a fixed set of in-memory documents (editor buffers, tests).

use rustc_hash::FxHashMap;
use std::fs;
use std::io;
use std::path::{Component, Path};
use thiserror::Error;

/// Why an `#include` target could not be opened
#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("circular #includes")]
    Circular,
    #[error("#include target '{0}' does not exist")]
    NotFound(String),
    #[error("#include target '{0}' is not a file")]
    NotAFile(String),
    #[error("could not read #include target '{target}': {source}")]
    Unreadable {
        target: String,
        #[source]
        source: io::Error,
    },
}

/// Storage access used for `#include` targets
pub trait FileResolver: Send + Sync {
    fn does_file_exist(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn load_file_contents(&self, path: &str) -> io::Result<String>;
}

/// Resolves includes against the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl FileResolver for FsResolver {
    fn does_file_exist(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn is_file(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn load_file_contents(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// In-memory documents keyed by normalized path. Any proper prefix of a
/// stored path counts as an existing directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: FxHashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: &str) {
        let key = normalize(Path::new(path));
        self.files.insert(key, contents.to_string());
    }

    fn is_directory(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.files.keys().any(|key| key.starts_with(&prefix))
    }
}

impl FileResolver for MemoryResolver {
    fn does_file_exist(&self, path: &str) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn load_file_contents(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Load the include target `target`, already resolved to `path`.
pub fn load_include(
    resolver: &dyn FileResolver,
    path: &str,
    target: &str,
) -> Result<String, IncludeError> {
    if !resolver.does_file_exist(path) {
        return Err(IncludeError::NotFound(target.to_string()));
    }
    if !resolver.is_file(path) {
        return Err(IncludeError::NotAFile(target.to_string()));
    }
    resolver
        .load_file_contents(path)
        .map_err(|source| IncludeError::Unreadable {
            target: target.to_string(),
            source,
        })
}

/// Resolve `target` relative to the directory of `including_file`.
pub fn resolve_path(including_file: &str, target: &str) -> String {
    let target = Path::new(target);
    if target.is_absolute() {
        return normalize(target);
    }
    let base = Path::new(including_file)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    normalize(&base.join(target))
}

/// Lexically normalize a path: drop `.`, fold `..` into its parent and use
/// `/` separators.
pub fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned())
            }
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push("..".to_string()),
            },
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}
