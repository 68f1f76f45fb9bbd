//! Persisted intents for moves that cross a store boundary.
//!
//! A cross-store move is a copy followed by a delete, so a crash in between
//! leaves the item in both places. An intent is written to the root drive
//! before copying and removed after the source is gone; whatever intents
//! survive a restart are replayed.

use crate::drive::Drive;
use crate::error::{Error, Result};
use crate::item::{DeepItem, Depth};
use crate::path;
use crate::store::now_millis;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub const JOURNAL_DIR: &str = "/system/journal";

/// One move in flight. Paths are unified paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub from: String,
    pub to: String,
    /// Milliseconds since the epoch
    pub started: i64,
}

/// Summary of a `resume_moves` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Intents whose copy was replayed
    pub resumed: usize,
    /// Intents whose move had already completed
    pub dropped: usize,
    /// Intents left for a later pass (e.g. their mount is not registered)
    pub deferred: usize,
}

impl RecoveryResult {
    #[must_use]
    pub fn was_needed(&self) -> bool {
        self.resumed + self.dropped + self.deferred > 0
    }
}

pub struct Journal {
    drive: Drive,
    seq: AtomicU64,
}

impl Journal {
    pub fn new(drive: Drive) -> Self {
        Self {
            drive,
            seq: AtomicU64::new(0),
        }
    }

    fn entry_path(id: &str) -> String {
        path::join(JOURNAL_DIR, &format!("{id}.json"))
    }

    /// Record that `from` is about to move to `to`; returns the intent id
    pub async fn begin(&self, from: &str, to: &str) -> Result<String> {
        let intent = MoveIntent {
            from: from.to_string(),
            to: to.to_string(),
            started: now_millis(),
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{}-{seq}", intent.started, std::process::id());
        let body = serde_json::to_vec_pretty(&intent)?;
        self.drive.write_file(&Self::entry_path(&id), body).await?;
        debug!("journal {id}: {from} -> {to}", id: id.as_str(), from: from, to: to);
        Ok(id)
    }

    /// Drop a completed intent. A missing intent is not an error.
    pub async fn finish(&self, id: &str) -> Result<()> {
        match self.drive.delete(&Self::entry_path(id)).await {
            Ok(()) | Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Every recorded intent, oldest first
    pub async fn pending(&self) -> Result<Vec<(String, MoveIntent)>> {
        let Some(folder) = self.drive.get_folder(JOURNAL_DIR, Depth::Deep).await? else {
            return Ok(Vec::new());
        };
        let Some(folder) = folder.into_deep() else {
            return Ok(Vec::new());
        };
        let mut intents = Vec::new();
        for (name, item) in folder.items {
            let Some(id) = name.strip_suffix(".json") else {
                continue;
            };
            let DeepItem::File(file) = item else {
                continue;
            };
            let intent: MoveIntent = serde_json::from_slice(file.content.as_bytes())
                .map_err(|e| Error::parse(format!("journal entry {name}: {e}")))?;
            intents.push((id.to_string(), intent));
        }
        intents.sort_by_key(|(_, intent)| intent.started);
        Ok(intents)
    }
}
