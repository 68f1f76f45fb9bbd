use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use deskfs::{FsConfig, FsManager};
use serde_json::Value;

/// Where the command line points: flag overrides layered on the
/// DESKFS_ROOT / DESKFS_STATE environment
#[derive(Debug, Clone, Default)]
pub struct FsContext {
    pub root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
}

impl FsContext {
    pub fn new(root: Option<PathBuf>, state_dir: Option<PathBuf>) -> Self {
        Self { root, state_dir }
    }

    pub fn config(&self) -> Result<FsConfig> {
        let mut config = FsConfig::from_env().context("reading DESKFS_* environment")?;
        if let Some(root) = &self.root {
            config = config.with_root(root.clone());
        }
        if let Some(state_dir) = &self.state_dir {
            config = config.with_state_dir(state_dir.clone());
        }
        Ok(config)
    }

    /// Open (and bootstrap) the tree
    pub async fn open(&self) -> Result<FsManager> {
        let config = self.config()?;
        let root = config.root.display().to_string();
        FsManager::open(config)
            .await
            .with_context(|| format!("opening file store at {root}"))
    }
}

/// Pretty JSON followed by a newline
pub fn write_json<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
