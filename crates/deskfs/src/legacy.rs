//! One-shot upgrade of the legacy persisted tree.
//!
//! The legacy format is a single JSON blob under one key:
//!
//! ```json
//! {"data": {"type": "folder", "name": "", "items": {
//!     "notes.txt": {"type": "file", "name": "notes.txt", "content": "hi"}}},
//!  "migrated": false}
//! ```
//!
//! Legacy nodes carry no timestamps; upgraded files are stamped with the
//! time of migration. The `migrated` flag lives beside the data so that the
//! decision survives restarts.

use crate::error::Result;
use crate::item::{DeepFile, DeepFolder, DeepItem};
use crate::kv::KeyValueStore;
use crate::path;
use crate::store::now_millis;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_LEGACY_KEY: &str = "legacy-fs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LegacyNode {
    File {
        name: String,
        #[serde(default)]
        content: String,
    },
    Folder {
        name: String,
        #[serde(default)]
        items: BTreeMap<String, LegacyNode>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct LegacyBlob {
    data: LegacyNode,
    #[serde(default)]
    migrated: bool,
}

impl LegacyNode {
    /// Upgrade into the current shape. Children are named after their map
    /// key, which keeps item keys and names in agreement.
    #[must_use]
    pub fn upgrade(self, now: i64) -> DeepItem {
        match self {
            LegacyNode::File { name, content } => DeepItem::File(DeepFile::new(name, content, now)),
            LegacyNode::Folder { name, items } => {
                let items = items
                    .into_iter()
                    .map(|(key, child)| {
                        let upgraded = match child.upgrade(now) {
                            DeepItem::File(mut f) => {
                                f.name.clone_from(&key);
                                DeepItem::File(f)
                            }
                            DeepItem::Folder(mut f) => {
                                f.name.clone_from(&key);
                                DeepItem::Folder(f)
                            }
                        };
                        (key, upgraded)
                    })
                    .collect();
                DeepItem::Folder(DeepFolder { name, items })
            }
        }
    }
}

/// Reads the legacy blob and hands back its upgraded tree, at most once per
/// dataset
pub struct LegacyMigrator {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl LegacyMigrator {
    pub fn new<S: Into<String>>(kv: Arc<dyn KeyValueStore>, key: S) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// The upgraded tree, or `None` when there is nothing (left) to migrate.
    /// A blob that does not parse counts as nothing to migrate.
    pub async fn load(&self) -> Result<Option<DeepFolder>> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(None);
        };
        let blob: LegacyBlob = match serde_json::from_str(&raw) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("ignoring unparsable legacy data under {key}: {reason}", key: self.key.as_str(), reason: e.to_string());
                return Ok(None);
            }
        };
        if blob.migrated {
            debug!("legacy data under {key} already migrated", key: self.key.as_str());
            return Ok(None);
        }

        let mut root = match blob.data.upgrade(now_millis()) {
            DeepItem::Folder(folder) => folder,
            file @ DeepItem::File(_) => {
                let mut root = DeepFolder::new("");
                let _ = root.items.insert(file.name().to_string(), file);
                root
            }
        };
        move_out_of_mount_root(&mut root);
        info!("found legacy data with {count} items", count: root.items.len());
        Ok(Some(root))
    }

    /// Flip the persisted flag, keeping the data as it was
    pub async fn mark_migrated(&self) -> Result<()> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(());
        };
        let mut value: serde_json::Value = serde_json::from_str(&raw)?;
        if let Some(object) = value.as_object_mut() {
            let _ = object.insert("migrated".to_string(), serde_json::Value::Bool(true));
        }
        self.kv.set(&self.key, &value.to_string()).await
    }
}

/// `/mnt` belongs to the mount namespace, so a legacy top-level `mnt` would
/// be shadowed as soon as anything is mounted. It lands under `mnt_1` (or
/// the next free suffix) instead.
fn move_out_of_mount_root(root: &mut DeepFolder) {
    let Some(item) = root.items.remove(path::MOUNT_ROOT) else {
        return;
    };
    let mut n = 1;
    let name = loop {
        let candidate = format!("{}_{n}", path::MOUNT_ROOT);
        if !root.items.contains_key(&candidate) {
            break candidate;
        }
        n += 1;
    };
    warn!("legacy {old} renamed to {new}", old: path::MOUNT_ROOT, new: name.as_str());
    let item = match item {
        DeepItem::File(mut f) => {
            f.name.clone_from(&name);
            DeepItem::File(f)
        }
        DeepItem::Folder(mut f) => {
            f.name.clone_from(&name);
            DeepItem::Folder(f)
        }
    };
    let _ = root.items.insert(name, item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValue;
    use serde_json::json;

    async fn migrator_with(blob: &str) -> (Arc<MemoryKeyValue>, LegacyMigrator) {
        let kv = Arc::new(MemoryKeyValue::new());
        kv.set(DEFAULT_LEGACY_KEY, blob).await.unwrap();
        let migrator = LegacyMigrator::new(kv.clone(), DEFAULT_LEGACY_KEY);
        (kv, migrator)
    }

    fn sample() -> serde_json::Value {
        json!({
            "data": {
                "type": "folder",
                "name": "root",
                "items": {
                    "readme.txt": {"type": "file", "name": "readme.txt", "content": "hello"},
                    "docs": {"type": "folder", "name": "docs", "items": {
                        "a.md": {"type": "file", "name": "a.md", "content": "# A"}
                    }}
                }
            },
            "migrated": false
        })
    }

    #[tokio::test]
    async fn test_absent_blob_is_nothing() {
        let migrator = LegacyMigrator::new(Arc::new(MemoryKeyValue::new()), DEFAULT_LEGACY_KEY);
        assert_eq!(migrator.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upgrade_stamps_files() {
        let (_kv, migrator) = migrator_with(&sample().to_string()).await;
        let root = migrator.load().await.unwrap().unwrap();
        assert_eq!(root.items.len(), 2);

        let DeepItem::File(readme) = &root.items["readme.txt"] else {
            panic!("readme should be a file");
        };
        assert_eq!(readme.content.as_text(), Some("hello"));
        assert!(readme.last_modified > 0);

        let DeepItem::Folder(docs) = &root.items["docs"] else {
            panic!("docs should be a folder");
        };
        assert!(docs.items.contains_key("a.md"));
    }

    #[tokio::test]
    async fn test_mark_migrated_preserves_data() {
        let (kv, migrator) = migrator_with(&sample().to_string()).await;
        migrator.mark_migrated().await.unwrap();
        assert_eq!(migrator.load().await.unwrap(), None);

        let stored: serde_json::Value =
            serde_json::from_str(&kv.get(DEFAULT_LEGACY_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored["migrated"], json!(true));
        assert_eq!(stored["data"], sample()["data"]);
    }

    #[tokio::test]
    async fn test_parse_failure_is_nothing_to_migrate() {
        let (_kv, migrator) = migrator_with("{not json").await;
        assert_eq!(migrator.load().await.unwrap(), None);

        let (_kv, migrator) = migrator_with(r#"{"data": {"type": "symlink"}}"#).await;
        assert_eq!(migrator.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_win_over_names() {
        let blob = json!({
            "data": {"type": "folder", "name": "", "items": {
                "right.txt": {"type": "file", "name": "wrong.txt", "content": ""}
            }}
        });
        let (_kv, migrator) = migrator_with(&blob.to_string()).await;
        let root = migrator.load().await.unwrap().unwrap();
        assert_eq!(root.items["right.txt"].name(), "right.txt");
    }

    #[tokio::test]
    async fn test_file_root_is_wrapped() {
        let blob = json!({"data": {"type": "file", "name": "only.txt", "content": "x"}});
        let (_kv, migrator) = migrator_with(&blob.to_string()).await;
        let root = migrator.load().await.unwrap().unwrap();
        assert_eq!(root.name, "");
        assert!(root.items.contains_key("only.txt"));
    }

    #[tokio::test]
    async fn test_top_level_mnt_is_renamed() {
        let blob = json!({
            "data": {"type": "folder", "name": "", "items": {
                "mnt": {"type": "folder", "name": "mnt", "items": {
                    "photo.jpg": {"type": "file", "name": "photo.jpg", "content": "jpg"}
                }},
                "mnt_1": {"type": "file", "name": "mnt_1", "content": "taken"}
            }}
        });
        let (_kv, migrator) = migrator_with(&blob.to_string()).await;
        let root = migrator.load().await.unwrap().unwrap();
        assert!(!root.items.contains_key("mnt"));
        assert_eq!(root.items["mnt_1"].kind(), crate::item::ItemKind::File);

        let DeepItem::Folder(moved) = &root.items["mnt_2"] else {
            panic!("mnt_2 should be a folder");
        };
        assert_eq!(moved.name, "mnt_2");
        assert!(moved.items.contains_key("photo.jpg"));
    }
}
