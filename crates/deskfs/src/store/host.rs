// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{BackingStore, StoreEntry, system_time_millis};
use crate::error::{Error, Result};
use crate::item::ItemKind;
use crate::path;
use async_trait::async_trait;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A persistable grant to one host directory.
///
/// Handles are acquired once (creating the directory if needed) and then
/// saved, so the grant survives a restart. The directory can disappear or
/// lose its permissions at any time afterwards, so every store operation
/// re-validates the handle first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHandle {
    root: PathBuf,
}

impl StoreHandle {
    /// Wrap an already-granted directory without touching the disk
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if it does not exist yet and return a handle
    /// to its canonical location
    pub async fn acquire<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let display = root.display().to_string();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| Error::from_io(&display, &e))?;
        let canonical = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| Error::from_io(&display, &e))?;
        debug!("acquired store handle {root}", root: canonical.display().to_string());
        Ok(Self { root: canonical })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fails with `PermissionDenied` unless the root is still a reachable directory
    pub async fn verify(&self) -> Result<()> {
        let display = self.root.display().to_string();
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::permission_denied(format!(
                "{display} is no longer a directory"
            ))),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                Err(Error::permission_denied(format!("{display}: {e}")))
            }
            Err(e) => Err(Error::from_io(&display, &e)),
        }
    }
}

/// A store backed by a host directory, via `tokio::fs`.
pub struct HostStore {
    handle: StoreHandle,
}

impl HostStore {
    #[must_use]
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    /// Acquire `root` and wrap it in a store
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self::new(StoreHandle::acquire(root).await?))
    }

    #[must_use]
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Map a store path onto the host, refusing anything that could escape the root
    fn host_path(&self, store_path: &str) -> Result<PathBuf> {
        path::validate(store_path)?;
        let mut host = self.handle.root.clone();
        for segment in path::split(store_path) {
            host.push(segment);
        }
        Ok(host)
    }

    async fn host_metadata(&self, host: &Path, store_path: &str) -> Result<Option<std::fs::Metadata>> {
        match tokio::fs::metadata(host).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_io(store_path, &e)),
        }
    }

    /// Walk `store_path` creating each missing directory
    async fn ensure_dirs(&self, store_path: &str) -> Result<()> {
        let segments = path::split(store_path);
        let mut host = self.handle.root.clone();
        let mut walked = String::new();
        for segment in segments {
            host.push(segment);
            walked.push('/');
            walked.push_str(segment);
            match self.host_metadata(&host, &walked).await? {
                Some(meta) if meta.is_dir() => {}
                Some(_) => return Err(Error::not_a_directory(&walked)),
                None => match tokio::fs::create_dir(&host).await {
                    Ok(()) => {}
                    // Lost a race with another writer; fine as long as it is a directory
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        match self.host_metadata(&host, &walked).await? {
                            Some(meta) if meta.is_dir() => {}
                            _ => return Err(Error::from_io(&walked, &e)),
                        }
                    }
                    Err(e) => return Err(Error::from_io(&walked, &e)),
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for HostStore {
    fn describe(&self) -> String {
        format!("host:{}", self.handle.root.display())
    }

    async fn stat(&self, store_path: &str) -> Result<Option<StoreEntry>> {
        self.handle.verify().await?;
        let host = self.host_path(store_path)?;
        Ok(self
            .host_metadata(&host, store_path)
            .await?
            .map(|meta| StoreEntry {
                name: path::basename(store_path).unwrap_or_default().to_string(),
                kind: if meta.is_dir() {
                    ItemKind::Directory
                } else {
                    ItemKind::File
                },
                last_modified: system_time_millis(meta.modified()),
            }))
    }

    async fn read(&self, store_path: &str) -> Result<Vec<u8>> {
        self.handle.verify().await?;
        let host = self.host_path(store_path)?;
        match self.host_metadata(&host, store_path).await? {
            None => Err(Error::not_found(store_path)),
            Some(meta) if meta.is_dir() => Err(Error::not_a_file(store_path)),
            Some(_) => tokio::fs::read(&host)
                .await
                .map_err(|e| Error::from_io(store_path, &e)),
        }
    }

    async fn create_file(&self, store_path: &str, content: &[u8]) -> Result<()> {
        self.handle.verify().await?;
        let (parent, _) = path::parent_and_name(store_path)?;
        let host = self.host_path(store_path)?;
        self.ensure_dirs(&parent).await?;

        if let Some(meta) = self.host_metadata(&host, store_path).await? {
            if meta.is_dir() {
                return Err(Error::already_exists(store_path));
            }
        }

        let mut file = tokio::fs::File::create(&host)
            .await
            .map_err(|e| Error::from_io(store_path, &e))?;
        file.write_all(content)
            .await
            .map_err(|e| Error::from_io(store_path, &e))?;
        file.flush()
            .await
            .map_err(|e| Error::from_io(store_path, &e))?;
        debug!("wrote {len} bytes to {path}", len: content.len(), path: host.display().to_string());
        Ok(())
    }

    async fn create_folder(&self, store_path: &str) -> Result<()> {
        self.handle.verify().await?;
        let host = self.host_path(store_path)?;
        if let Some(meta) = self.host_metadata(&host, store_path).await? {
            if !meta.is_dir() {
                return Err(Error::already_exists(store_path));
            }
        }
        self.ensure_dirs(store_path).await
    }

    async fn delete(&self, store_path: &str) -> Result<()> {
        self.handle.verify().await?;
        if path::is_root(store_path) {
            return Err(Error::invalid_path(store_path));
        }
        let host = self.host_path(store_path)?;
        let result = match self.host_metadata(&host, store_path).await? {
            None => return Err(Error::not_found(store_path)),
            Some(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&host).await,
            Some(_) => tokio::fs::remove_file(&host).await,
        };
        result.map_err(|e| Error::from_io(store_path, &e))
    }

    async fn enumerate(&self, store_path: &str) -> Result<Vec<StoreEntry>> {
        self.handle.verify().await?;
        let host = self.host_path(store_path)?;
        match self.host_metadata(&host, store_path).await? {
            None => return Err(Error::not_found(store_path)),
            Some(meta) if !meta.is_dir() => return Err(Error::not_a_directory(store_path)),
            Some(_) => {}
        }

        let mut read_dir = tokio::fs::read_dir(&host)
            .await
            .map_err(|e| Error::from_io(store_path, &e))?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Error::from_io(store_path, &e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            // Follows symlinks; a dangling link is skipped rather than failing the listing
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::from_io(path::join(store_path, &name), &e)),
            };
            entries.push(StoreEntry {
                name,
                kind: if meta.is_dir() {
                    ItemKind::Directory
                } else {
                    ItemKind::File
                },
                last_modified: system_time_millis(meta.modified()),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn supports_rename(&self) -> bool {
        true
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.handle.verify().await?;
        if path::is_root(from) || path::is_root(to) {
            return Err(Error::invalid_path(if path::is_root(from) { from } else { to }));
        }
        let from_host = self.host_path(from)?;
        let to_host = self.host_path(to)?;
        if self.host_metadata(&to_host, to).await?.is_some() {
            return Err(Error::already_exists(to));
        }
        tokio::fs::rename(&from_host, &to_host)
            .await
            .map_err(|e| Error::from_io(from, &e))
    }
}
