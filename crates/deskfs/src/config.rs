//! Runtime configuration for an [`FsManager`](crate::FsManager).
//!
//! Values come from defaults, then environment variables, then whatever the
//! caller layers on top with the builder setters:
//!
//! - `DESKFS_ROOT`: host directory backing the root drive
//! - `DESKFS_STATE`: directory for key/value state (legacy blob, mounts)
//! - `DESKFS_POLL_MS`: cache polling interval in milliseconds

use crate::error::{Error, Result};
use crate::legacy::DEFAULT_LEGACY_KEY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_ROOT: &str = "DESKFS_ROOT";
pub const ENV_STATE: &str = "DESKFS_STATE";
pub const ENV_POLL_MS: &str = "DESKFS_POLL_MS";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsConfig {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    pub legacy_key: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        let base = PathBuf::from(".deskfs");
        Self {
            root: base.join("root"),
            state_dir: base.join("state"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            legacy_key: DEFAULT_LEGACY_KEY.to_string(),
        }
    }
}

impl FsConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_ROOT) {
            config.root = PathBuf::from(root);
        }
        if let Some(state) = lookup(ENV_STATE) {
            config.state_dir = PathBuf::from(state);
        }
        if let Some(ms) = lookup(ENV_POLL_MS) {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::parse(format!("{ENV_POLL_MS}={ms}: {e}")))?;
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn with_state_dir<P: Into<PathBuf>>(mut self, state_dir: P) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_legacy_key<S: Into<String>>(mut self, key: S) -> Self {
        self.legacy_key = key.into();
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
