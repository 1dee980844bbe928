#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::TodoError;

/// Default slot the task list is stored under.
pub const DEFAULT_KEY: &str = "todo_list_v1";

/// A string-valued key-value store holding the encoded task list.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, TodoError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), TodoError>;
    fn remove(&mut self, key: &str) -> Result<(), TodoError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), TodoError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| TodoError::IoPath {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, TodoError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, TodoError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TodoError::IoPath { path, source }),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), TodoError> {
        self.ensure_dir()?;
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value.as_bytes()).map_err(|source| TodoError::IoPath {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| TodoError::IoPath {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), TodoError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TodoError::IoPath { path, source }),
        }
    }
}

/// In-process store, for embedding hosts that persist elsewhere and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_owned(), value.to_owned());
        Self { values }
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TodoError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), TodoError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), TodoError> {
        self.values.remove(key);
        Ok(())
    }
}

pub fn validate_key(key: &str) -> Result<(), TodoError> {
    let invalid = |msg: &str| TodoError::InvalidStorageKey {
        key: key.to_owned(),
        msg: msg.to_owned(),
    };
    if key.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    if key.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    Ok(())
}
