//! Small key/value persistence for state that lives outside the tree:
//! the legacy blob and the persisted mount handles.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns true when the key existed
    async fn remove(&self, key: &str) -> Result<bool>;
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
        return Err(Error::invalid_path(key));
    }
    Ok(())
}

/// One `<key>.json` file per key under a state directory
pub struct FileKeyValue {
    dir: PathBuf,
}

impl FileKeyValue {
    /// The directory is created on first write
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValue {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file_for(key)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_io(file.display().to_string(), &e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let file = self.file_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::from_io(self.dir.display().to_string(), &e))?;
        // Write beside the target then rename, so a crash never leaves half a value
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&staging, value)
            .await
            .map_err(|e| Error::from_io(staging.display().to_string(), &e))?;
        tokio::fs::rename(&staging, &file)
            .await
            .map_err(|e| Error::from_io(file.display().to_string(), &e))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let file = self.file_for(key)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::from_io(file.display().to_string(), &e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryKeyValue {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValue {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let _ = self
            .values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.values.lock().await.remove(key).is_some())
    }
}
