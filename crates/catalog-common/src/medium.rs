/// Durable key → string storage port.
///
/// The catalog treats its backing store as a synchronous, process-local mapping from
/// string keys to string blobs. Every `set` replaces the whole value for a key, so a
/// reader observes either the previous or the new blob, never a partial one.
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::CommonError;

pub trait StorageMedium: Send + Sync {
    /// Read the blob stored under `key`. `Ok(None)` means the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, CommonError>;

    /// Replace the blob stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), CommonError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), CommonError>;
}

/// In-process medium backed by a `HashMap`. Nothing survives the process.
#[derive(Default)]
pub struct MemoryMedium {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CommonError> {
        self.values
            .lock()
            .map_err(|_| CommonError::Unavailable("memory medium lock poisoned".to_string()))
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CommonError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key inside a data directory.
///
/// Writes land in a sibling `.tmp` file first and are renamed over the target, so an
/// interrupted write leaves the previous blob intact.
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CommonError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CommonError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
        if !valid {
            return Err(CommonError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key.replace(':', "_"))))
    }
}

impl StorageMedium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), bytes = value.len(), "medium blob written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CommonError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_medium_set_get_remove() {
        let medium = MemoryMedium::new();
        assert_eq!(medium.get("k").unwrap(), None);

        medium.set("k", "[1]").unwrap();
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("[1]"));

        medium.set("k", "[2]").unwrap();
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("[2]"));

        medium.remove("k").unwrap();
        medium.remove("k").unwrap();
        assert_eq!(medium.get("k").unwrap(), None);
    }

    #[test]
    fn file_medium_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        {
            let medium = FileMedium::open(temp_dir.path()).unwrap();
            medium.set("portfolio:v1:projects", "[]").unwrap();
        }
        let reopened = FileMedium::open(temp_dir.path()).unwrap();
        assert_eq!(
            reopened.get("portfolio:v1:projects").unwrap().as_deref(),
            Some("[]")
        );
        assert!(temp_dir.path().join("portfolio_v1_projects.json").exists());
        assert!(!temp_dir.path().join("portfolio_v1_projects.json.tmp").exists());
    }

    #[test]
    fn file_medium_missing_key_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let medium = FileMedium::open(temp_dir.path().join("nested")).unwrap();
        assert!(medium.dir().is_dir());
        assert_eq!(medium.get("absent").unwrap(), None);
        medium.remove("absent").unwrap();
    }

    #[test]
    fn file_medium_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let medium = FileMedium::open(temp_dir.path()).unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(medium.set(key, "x"), Err(CommonError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}
