// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Backing stores -- the flat primitives every drive is built on.
//!
//! A store is one persistent root of files and folders. Paths handed to a
//! store are relative to that root and already normalized (`/` is the root).
//! Two implementations live here:
//!
//! - [`HostStore`] maps the root onto a host directory through a
//!   persistable [`StoreHandle`].
//! - [`MemoryStore`] keeps everything in process; used for tests and
//!   scratch mounts.

mod host;
mod memory;

pub use host::{HostStore, StoreHandle};
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::item::ItemKind;
use async_trait::async_trait;
use std::time::SystemTime;

/// One child as reported by `enumerate` or `stat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub name: String,
    pub kind: ItemKind,
    /// Milliseconds since the Unix epoch
    pub last_modified: i64,
}

/// Primitive operations over a single persistent root.
///
/// Nothing here is transactional across path segments: a failure part way
/// through `create_file` may leave intermediate directories behind.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Human-readable description for log messages
    fn describe(&self) -> String;

    /// What lives at `path`, if anything
    async fn get_item(&self, path: &str) -> Result<Option<ItemKind>> {
        Ok(self.stat(path).await?.map(|entry| entry.kind))
    }

    /// Metadata for `path`, if it exists
    async fn stat(&self, path: &str) -> Result<Option<StoreEntry>>;

    /// Full content of the file at `path`
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Creates missing parents, then creates or truncates the leaf file and
    /// writes `content`. Returns once the data is flushed.
    async fn create_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Creates every missing segment of `path`. Existing directories are fine.
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Removes a file, or a folder and everything beneath it
    async fn delete(&self, path: &str) -> Result<()>;

    /// Immediate children of the folder at `path`, sorted by name
    async fn enumerate(&self, path: &str) -> Result<Vec<StoreEntry>>;

    /// Whether `rename` is a native single-step operation
    fn supports_rename(&self) -> bool {
        false
    }

    /// Native rename of one node. `to` must not exist and its parent must.
    async fn rename(&self, from: &str, _to: &str) -> Result<()> {
        Err(Error::Io {
            path: from.to_string(),
            message: format!("{} does not support rename", self.describe()),
        })
    }
}

/// Current wall-clock time in milliseconds since the epoch
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn system_time_millis(time: std::io::Result<SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
