// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Depth-aware tree operations over a single backing store.

use crate::error::{Error, Result};
use crate::item::{
    Content, DeepFile, DeepFolder, DeepItem, Depth, File, Folder, Item, ItemKind, ShallowFolder,
    StubFile, StubFolder, StubItem,
};
use crate::path;
use crate::store::{BackingStore, StoreEntry};
use diagnostics::*;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Turns flat store primitives into shallow/deep reads and tree mutations.
///
/// Reads report a missing path as `Ok(None)`. A store whose grant was
/// revoked also reads as missing; mutations against it still fail with
/// `PermissionDenied` so the caller can ask for access again.
#[derive(Clone)]
pub struct Drive {
    store: Arc<dyn BackingStore>,
}

impl std::fmt::Debug for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Drive({})", self.store.describe())
    }
}

/// Map the "cannot see it" family onto `None`
fn fail_closed<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::NotFound(_)) => Ok(None),
        Err(Error::PermissionDenied(what)) => {
            warn!("read failed closed: {what}", what: what.as_str());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl Drive {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    async fn stat(&self, path: &str) -> Result<Option<StoreEntry>> {
        Ok(fail_closed(self.store.stat(path).await)?.flatten())
    }

    pub async fn get_folder(&self, path: &str, depth: Depth) -> Result<Option<Folder>> {
        path::validate(path)?;
        let path = path::normalize(path);
        match self.stat(&path).await? {
            Some(entry) if entry.kind == ItemKind::Directory => {}
            _ => return Ok(None),
        }
        match depth {
            Depth::Shallow => Ok(fail_closed(self.read_shallow(&path).await)?.map(Folder::Shallow)),
            Depth::Deep => Ok(fail_closed(self.read_deep_folder(&path).await)?.map(Folder::Deep)),
        }
    }

    pub async fn get_file(&self, path: &str, depth: Depth) -> Result<Option<File>> {
        path::validate(path)?;
        let path = path::normalize(path);
        let entry = match self.stat(&path).await? {
            Some(entry) if entry.kind == ItemKind::File => entry,
            _ => return Ok(None),
        };
        match depth {
            Depth::Shallow => Ok(Some(File::Stub(StubFile {
                name: entry.name,
                last_modified: entry.last_modified,
            }))),
            Depth::Deep => Ok(fail_closed(self.store.read(&path).await)?.map(|bytes| {
                File::Deep(DeepFile {
                    name: entry.name,
                    last_modified: entry.last_modified,
                    content: Content::from_bytes(bytes),
                })
            })),
        }
    }

    /// Whatever lives at `path`: a file first, otherwise a folder
    pub async fn get_item(&self, path: &str, depth: Depth) -> Result<Option<Item>> {
        if let Some(file) = self.get_file(path, depth).await? {
            return Ok(Some(Item::File(file)));
        }
        Ok(self.get_folder(path, depth).await?.map(Item::Folder))
    }

    /// The fully materialized item at `path`, if any
    pub async fn read_deep(&self, path: &str) -> Result<Option<DeepItem>> {
        Ok(match self.get_item(path, Depth::Deep).await? {
            Some(Item::File(file)) => file.into_deep().map(DeepItem::File),
            Some(Item::Folder(folder)) => folder.into_deep().map(DeepItem::Folder),
            None => None,
        })
    }

    pub async fn write_file<C: AsRef<[u8]>>(&self, path: &str, content: C) -> Result<()> {
        self.store.create_file(&path::normalize(path), content.as_ref()).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<()> {
        self.store.create_folder(&path::normalize(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.store.delete(&path::normalize(path)).await
    }

    /// Writes a not-yet-persisted tree at `path`. Existing leaves with the
    /// same names are overwritten.
    pub async fn insert(&self, path: &str, item: &DeepItem) -> Result<()> {
        self.insert_recursive(path::normalize(path), item).await
    }

    fn insert_recursive<'a>(
        &'a self,
        path: String,
        item: &'a DeepItem,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match item {
                DeepItem::File(file) => self.store.create_file(&path, file.content.as_bytes()).await,
                DeepItem::Folder(folder) => {
                    self.store.create_folder(&path).await?;
                    for (name, child) in &folder.items {
                        self.insert_recursive(path::join(&path, name), child).await?;
                    }
                    Ok(())
                }
            }
        })
    }

    /// Moves the item at `old` to `new`.
    ///
    /// A native rename is used when the store has one and `new` is free.
    /// Otherwise the subtree is copied and the source deleted afterwards;
    /// leaves already present at the destination are overwritten.
    pub async fn move_item(&self, old: &str, new: &str) -> Result<()> {
        path::validate(old)?;
        path::validate(new)?;
        let old = path::normalize(old);
        let new = path::normalize(new);
        if path::is_root(&old) {
            return Err(Error::invalid_path(&old));
        }
        if path::is_root(&new) || path::is_descendant(&old, &new) {
            return Err(Error::invalid_path(&new));
        }
        if old == new {
            return Ok(());
        }
        if self.store.get_item(&old).await?.is_none() {
            return Err(Error::not_found(&old));
        }

        if self.store.supports_rename() && self.store.get_item(&new).await?.is_none() {
            let (parent, _) = path::parent_and_name(&new)?;
            self.store.create_folder(&parent).await?;
            debug!("rename {old} -> {new}", old: old.as_str(), new: new.as_str());
            return self.store.rename(&old, &new).await;
        }

        let item = self
            .read_deep(&old)
            .await?
            .ok_or_else(|| Error::not_found(&old))?;
        debug!("copy {old} -> {new} ({count} items)", old: old.as_str(), new: new.as_str(), count: item.count());
        self.insert(&new, &item).await?;
        self.delete(&old).await
    }

    /// A name under `parent` that does not collide with an existing child:
    /// `name`, else `stem_1.ext`, `stem_2.ext`, ...
    pub async fn unique_name(&self, parent: &str, name: &str) -> Result<String> {
        let taken: Vec<String> = match fail_closed(self.store.enumerate(&path::normalize(parent)).await)? {
            Some(entries) => entries.into_iter().map(|e| e.name).collect(),
            None => return Ok(name.to_string()),
        };
        if !taken.iter().any(|t| t == name) {
            return Ok(name.to_string());
        }
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name, ""),
        };
        let mut n = 1;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn read_shallow(&self, path: &str) -> Result<ShallowFolder> {
        let items = self
            .store
            .enumerate(path)
            .await?
            .into_iter()
            .map(|entry| {
                let stub = match entry.kind {
                    ItemKind::File => StubItem::File(StubFile {
                        name: entry.name.clone(),
                        last_modified: entry.last_modified,
                    }),
                    ItemKind::Directory => StubItem::Folder(StubFolder {
                        name: entry.name.clone(),
                    }),
                };
                (entry.name, stub)
            })
            .collect();
        Ok(ShallowFolder {
            name: path::basename(path).unwrap_or_default().to_string(),
            items,
        })
    }

    fn read_deep_folder<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<DeepFolder>> + Send + 'a>> {
        Box::pin(async move {
            let mut items = BTreeMap::new();
            for entry in self.store.enumerate(path).await? {
                let child = path::join(path, &entry.name);
                let item = match entry.kind {
                    ItemKind::File => DeepItem::File(DeepFile {
                        content: Content::from_bytes(self.store.read(&child).await?),
                        name: entry.name.clone(),
                        last_modified: entry.last_modified,
                    }),
                    ItemKind::Directory => DeepItem::Folder(self.read_deep_folder(&child).await?),
                };
                let _ = items.insert(entry.name, item);
            }
            Ok(DeepFolder {
                name: path::basename(path).unwrap_or_default().to_string(),
                items,
            })
        })
    }
}
