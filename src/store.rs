//! File-backed key-value slots.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a sibling temp file
//! first and are renamed into place, so a crash mid-write leaves the previous
//! scene intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use canvas::persist::{KeyValueStore, PersistError};
use tracing::debug;

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the slot for `key`.
    ///
    /// # Errors
    ///
    /// Rejects keys that would escape the store directory.
    pub fn slot_path(&self, key: &str) -> Result<PathBuf, PersistError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(PersistError::Backend(format!("invalid key `{key}`")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        let path = self.slot_path(key)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "slot written");
        Ok(())
    }
}
