use super::{BackingStore, StoreEntry, now_millis};
use crate::error::{Error, Result};
use crate::item::ItemKind;
use crate::path;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

enum MemoryNode {
    File { content: Vec<u8>, modified: i64 },
    Directory { modified: i64 },
}

impl MemoryNode {
    fn kind(&self) -> ItemKind {
        match self {
            MemoryNode::File { .. } => ItemKind::File,
            MemoryNode::Directory { .. } => ItemKind::Directory,
        }
    }

    fn modified(&self) -> i64 {
        match self {
            MemoryNode::File { modified, .. } | MemoryNode::Directory { modified } => *modified,
        }
    }
}

/// In-process store keyed by normalized path.
///
/// Suitable for tests and scratch mounts. It can be revoked to behave like
/// a host directory whose grant has been withdrawn, and it counts writes so
/// tests can assert that nothing was re-inserted.
pub struct MemoryStore {
    name: String,
    nodes: Mutex<BTreeMap<String, MemoryNode>>,
    revoked: AtomicBool,
    file_writes: AtomicUsize,
    mutations: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStore {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let mut nodes = BTreeMap::new();
        let _ = nodes.insert(
            "/".to_string(),
            MemoryNode::Directory {
                modified: now_millis(),
            },
        );
        Self {
            name: name.into(),
            nodes: Mutex::new(nodes),
            revoked: AtomicBool::new(false),
            file_writes: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Withdraw (or restore) access; every operation then fails with `PermissionDenied`
    pub fn set_revoked(&self, revoked: bool) {
        self.revoked.store(revoked, Ordering::SeqCst);
    }

    /// Number of `create_file` calls so far
    #[must_use]
    pub fn file_writes(&self) -> usize {
        self.file_writes.load(Ordering::SeqCst)
    }

    /// Number of mutating calls (file and folder creation, delete, rename)
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check(&self, store_path: &str) -> Result<String> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(Error::permission_denied(format!("{} revoked", self.name)));
        }
        path::validate(store_path)?;
        Ok(path::normalize(store_path))
    }

    fn count_mutation(&self) {
        let _ = self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn child_prefix(key: &str) -> String {
        if key == "/" {
            "/".to_string()
        } else {
            format!("{key}/")
        }
    }

    fn ensure_dirs(nodes: &mut BTreeMap<String, MemoryNode>, key: &str) -> Result<()> {
        let segments = path::split(key);
        let mut walked = String::new();
        for segment in segments {
            walked.push('/');
            walked.push_str(segment);
            match nodes.get(&walked) {
                Some(MemoryNode::Directory { .. }) => {}
                Some(MemoryNode::File { .. }) => return Err(Error::not_a_directory(&walked)),
                None => {
                    let _ = nodes.insert(
                        walked.clone(),
                        MemoryNode::Directory {
                            modified: now_millis(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn subtree_keys(nodes: &BTreeMap<String, MemoryNode>, key: &str) -> Vec<String> {
        let prefix = Self::child_prefix(key);
        let mut keys = vec![key.to_string()];
        keys.extend(
            nodes
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, _)| k.clone()),
        );
        keys
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn stat(&self, store_path: &str) -> Result<Option<StoreEntry>> {
        let key = self.check(store_path)?;
        let nodes = self.nodes.lock().await;
        Ok(nodes.get(&key).map(|node| StoreEntry {
            name: path::basename(&key).unwrap_or_default().to_string(),
            kind: node.kind(),
            last_modified: node.modified(),
        }))
    }

    async fn read(&self, store_path: &str) -> Result<Vec<u8>> {
        let key = self.check(store_path)?;
        let nodes = self.nodes.lock().await;
        match nodes.get(&key) {
            Some(MemoryNode::File { content, .. }) => Ok(content.clone()),
            Some(MemoryNode::Directory { .. }) => Err(Error::not_a_file(&key)),
            None => Err(Error::not_found(&key)),
        }
    }

    async fn create_file(&self, store_path: &str, content: &[u8]) -> Result<()> {
        let key = self.check(store_path)?;
        let (parent, _) = path::parent_and_name(&key)?;
        self.count_mutation();
        let _ = self.file_writes.fetch_add(1, Ordering::SeqCst);

        let mut nodes = self.nodes.lock().await;
        Self::ensure_dirs(&mut nodes, &parent)?;
        if let Some(MemoryNode::Directory { .. }) = nodes.get(&key) {
            return Err(Error::already_exists(&key));
        }
        let _ = nodes.insert(
            key,
            MemoryNode::File {
                content: content.to_vec(),
                modified: now_millis(),
            },
        );
        Ok(())
    }

    async fn create_folder(&self, store_path: &str) -> Result<()> {
        let key = self.check(store_path)?;
        self.count_mutation();
        let mut nodes = self.nodes.lock().await;
        if let Some(MemoryNode::File { .. }) = nodes.get(&key) {
            return Err(Error::already_exists(&key));
        }
        Self::ensure_dirs(&mut nodes, &key)
    }

    async fn delete(&self, store_path: &str) -> Result<()> {
        let key = self.check(store_path)?;
        if path::is_root(&key) {
            return Err(Error::invalid_path(store_path));
        }
        self.count_mutation();
        let mut nodes = self.nodes.lock().await;
        if !nodes.contains_key(&key) {
            return Err(Error::not_found(&key));
        }
        for k in Self::subtree_keys(&nodes, &key) {
            let _ = nodes.remove(&k);
        }
        Ok(())
    }

    async fn enumerate(&self, store_path: &str) -> Result<Vec<StoreEntry>> {
        let key = self.check(store_path)?;
        let nodes = self.nodes.lock().await;
        match nodes.get(&key) {
            None => return Err(Error::not_found(&key)),
            Some(MemoryNode::File { .. }) => return Err(Error::not_a_directory(&key)),
            Some(MemoryNode::Directory { .. }) => {}
        }

        let prefix = Self::child_prefix(&key);
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
            .map(|(k, node)| StoreEntry {
                name: k[prefix.len()..].to_string(),
                kind: node.kind(),
                last_modified: node.modified(),
            })
            .collect())
    }

    fn supports_rename(&self) -> bool {
        true
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_key = self.check(from)?;
        let to_key = self.check(to)?;
        if path::is_root(&from_key) || path::is_root(&to_key) {
            return Err(Error::invalid_path(from));
        }
        let (to_parent, _) = path::parent_and_name(&to_key)?;
        self.count_mutation();

        let mut nodes = self.nodes.lock().await;
        if !nodes.contains_key(&from_key) {
            return Err(Error::not_found(&from_key));
        }
        if nodes.contains_key(&to_key) {
            return Err(Error::already_exists(&to_key));
        }
        match nodes.get(&to_parent) {
            Some(MemoryNode::Directory { .. }) => {}
            Some(MemoryNode::File { .. }) => return Err(Error::not_a_directory(&to_parent)),
            None => return Err(Error::not_found(&to_parent)),
        }

        for old_key in Self::subtree_keys(&nodes, &from_key) {
            if let Some(node) = nodes.remove(&old_key) {
                let new_key = format!("{to_key}{}", &old_key[from_key.len()..]);
                let _ = nodes.insert(new_key, node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_file_creates_parents() {
        let store = MemoryStore::default();
        store.create_file("/a/b/c.txt", b"hi").await.unwrap();
        assert_eq!(store.get_item("/a").await.unwrap(), Some(ItemKind::Directory));
        assert_eq!(store.get_item("/a/b").await.unwrap(), Some(ItemKind::Directory));
        assert_eq!(store.read("/a/b/c.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_enumerate_one_level() {
        let store = MemoryStore::default();
        store.create_file("/a/x", b"1").await.unwrap();
        store.create_file("/a/sub/y", b"2").await.unwrap();
        store.create_file("/ab", b"3").await.unwrap();

        let names: Vec<_> = store
            .enumerate("/a")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["sub", "x"]);

        let root: Vec<_> = store
            .enumerate("/")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(root, vec!["a", "ab"]);
    }

    #[tokio::test]
    async fn test_kind_conflicts() {
        let store = MemoryStore::default();
        store.create_file("/f", b"").await.unwrap();
        assert_eq!(
            store.create_folder("/f").await,
            Err(Error::already_exists("/f"))
        );
        assert_eq!(
            store.create_file("/f/g", b"").await,
            Err(Error::not_a_directory("/f"))
        );
        store.create_folder("/d").await.unwrap();
        assert_eq!(
            store.create_file("/d", b"").await,
            Err(Error::already_exists("/d"))
        );
    }

    #[tokio::test]
    async fn test_delete_subtree_only() {
        let store = MemoryStore::default();
        store.create_file("/a/x", b"1").await.unwrap();
        store.create_file("/ab", b"2").await.unwrap();
        store.delete("/a").await.unwrap();
        assert_eq!(store.get_item("/a/x").await.unwrap(), None);
        assert_eq!(store.get_item("/ab").await.unwrap(), Some(ItemKind::File));
        assert_eq!(store.delete("/a").await, Err(Error::not_found("/a")));
        assert_eq!(store.delete("/").await, Err(Error::invalid_path("/")));
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let store = MemoryStore::default();
        store.create_file("/a/x", b"1").await.unwrap();
        store.create_folder("/b").await.unwrap();
        store.rename("/a", "/b/a2").await.unwrap();
        assert_eq!(store.read("/b/a2/x").await.unwrap(), b"1");
        assert_eq!(store.get_item("/a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revoked_store_denies_everything() {
        let store = MemoryStore::default();
        store.set_revoked(true);
        assert!(matches!(
            store.stat("/").await,
            Err(Error::PermissionDenied(_))
        ));
        store.set_revoked(false);
        assert!(store.stat("/").await.unwrap().is_some());
    }
}
