//! Named secondary stores under the `/mnt` namespace.

use crate::drive::Drive;
use crate::item::{ShallowFolder, StubFolder, StubItem};
use crate::path::{self, MountPath};
use crate::store::BackingStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a unified-tree path lands
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A path inside the root drive or inside a mount
    Drive {
        drive: Drive,
        /// Path relative to `drive`'s store
        path: String,
        /// Mount name, `None` for the root drive
        mount: Option<String>,
    },
    /// `/mnt` itself, which no store owns
    Namespace,
}

impl Resolved {
    /// True for `/mnt` and for the root of a mount: places the unified tree
    /// synthesizes rather than stores
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        match self {
            Resolved::Namespace => true,
            Resolved::Drive { path, mount, .. } => mount.is_some() && path::is_root(path),
        }
    }
}

/// Maps mount names to drives and resolves unified paths.
///
/// Registering a name that already exists replaces the old mount.
pub struct MountTable {
    root: Drive,
    mounts: BTreeMap<String, Drive>,
}

impl MountTable {
    pub fn new(root: Drive) -> Self {
        Self {
            root,
            mounts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Drive {
        &self.root
    }

    /// Returns true when an existing mount was replaced
    pub fn register<S: Into<String>>(&mut self, name: S, store: Arc<dyn BackingStore>) -> bool {
        self.mounts.insert(name.into(), Drive::new(store)).is_some()
    }

    /// Returns true when a mount was removed
    pub fn unregister(&mut self, name: &str) -> bool {
        self.mounts.remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Drive> {
        self.mounts.get(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.mounts.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Drive)> {
        self.mounts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Route a unified path. `None` means the path names an unregistered
    /// mount, which callers report exactly like a missing path.
    #[must_use]
    pub fn resolve(&self, unified: &str) -> Option<Resolved> {
        match path::split_mount(unified) {
            None => Some(Resolved::Drive {
                drive: self.root.clone(),
                path: path::normalize(unified),
                mount: None,
            }),
            Some(MountPath::Namespace) => Some(Resolved::Namespace),
            Some(MountPath::Mount { name, rest }) => self.mounts.get(name).map(|drive| Resolved::Drive {
                drive: drive.clone(),
                path: rest,
                mount: Some(name.to_string()),
            }),
        }
    }

    /// Virtual listing of `/mnt`: one folder stub per mount
    #[must_use]
    pub fn list_mounts(&self) -> ShallowFolder {
        ShallowFolder {
            name: path::MOUNT_ROOT.to_string(),
            items: self
                .mounts
                .keys()
                .map(|name| {
                    (
                        name.clone(),
                        StubItem::Folder(StubFolder { name: name.clone() }),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn table() -> MountTable {
        MountTable::new(Drive::new(Arc::new(MemoryStore::new("root"))))
    }

    fn resolved_path(resolved: Option<Resolved>) -> Option<(String, Option<String>)> {
        match resolved? {
            Resolved::Drive { path, mount, .. } => Some((path, mount)),
            Resolved::Namespace => Some(("<namespace>".to_string(), None)),
        }
    }

    #[test]
    fn test_resolve_root_paths_unchanged() {
        let table = table();
        assert_eq!(
            resolved_path(table.resolve("/user//docs/")),
            Some(("/user/docs".to_string(), None))
        );
    }

    #[test]
    fn test_resolve_mount_paths() {
        let mut table = table();
        assert!(!table.register("drive1", Arc::new(MemoryStore::new("d1"))));

        assert_eq!(
            resolved_path(table.resolve("/mnt/drive1/a/b.txt")),
            Some(("/a/b.txt".to_string(), Some("drive1".to_string())))
        );
        assert_eq!(
            resolved_path(table.resolve("/mnt")),
            Some(("<namespace>".to_string(), None))
        );
        assert!(table.resolve("/mnt/nope/x").is_none());
    }

    #[test]
    fn test_synthetic_locations() {
        let mut table = table();
        let _ = table.register("drive1", Arc::new(MemoryStore::new("d1")));
        assert!(table.resolve("/mnt").unwrap().is_synthetic());
        assert!(table.resolve("/mnt/drive1").unwrap().is_synthetic());
        assert!(!table.resolve("/mnt/drive1/x").unwrap().is_synthetic());
        assert!(!table.resolve("/").unwrap().is_synthetic());
    }

    #[test]
    fn test_register_replaces_and_unregister() {
        let mut table = table();
        let _ = table.register("a", Arc::new(MemoryStore::new("1")));
        assert!(table.register("a", Arc::new(MemoryStore::new("2"))));
        assert_eq!(table.len(), 1);
        assert!(table.unregister("a"));
        assert!(!table.unregister("a"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_list_mounts() {
        let mut table = table();
        let _ = table.register("b", Arc::new(MemoryStore::new("b")));
        let _ = table.register("a", Arc::new(MemoryStore::new("a")));
        let listing = table.list_mounts();
        assert_eq!(listing.name, "mnt");
        assert_eq!(listing.items.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(listing.items["a"], StubItem::Folder(_)));
    }
}
