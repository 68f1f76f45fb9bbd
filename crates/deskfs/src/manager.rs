// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The unified tree: one root drive plus named mounts under `/mnt`.
//!
//! `FsManager` is what applications talk to. It routes every path through
//! the mount table, synthesizes the `/mnt` namespace, bootstraps a fresh
//! root (legacy migration, default directories, interrupted moves) and owns
//! the polling caches.

use crate::cache::{CacheKey, PollingCache, Subscription};
use crate::config::FsConfig;
use crate::drive::Drive;
use crate::error::{Error, Result};
use crate::item::{DeepFolder, DeepItem, Depth, File, Folder, Item, StubFolder, StubItem};
use crate::journal::{Journal, MoveIntent, RecoveryResult};
use crate::kv::{FileKeyValue, KeyValueStore};
use crate::legacy::LegacyMigrator;
use crate::mount::{MountTable, Resolved};
use crate::path;
use crate::store::{BackingStore, HostStore, StoreHandle};
use diagnostics::*;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key under which mount handles are persisted
pub const MOUNTS_KEY: &str = "mounts";

pub const DEFAULT_DIRECTORIES: [&str; 3] = ["/system", "/system/programs", "/user"];

pub const REGISTRY_FILE: &str = "/system/registry.json";

/// Where a mutation lands: the drive, the store path and the mount name
type Target = (Drive, String, Option<String>);

/// Outcome of replaying one journaled move
enum Replay {
    Resumed,
    Dropped,
}

pub struct FsManager {
    root: Drive,
    mounts: Arc<RwLock<MountTable>>,
    kv: Arc<dyn KeyValueStore>,
    config: FsConfig,
    journal: Journal,
    folders: PollingCache<Folder>,
    files: PollingCache<File>,
}

impl std::fmt::Debug for FsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsManager")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FsManager {
    /// Build a manager over `root`, reload persisted mounts and bootstrap
    pub async fn new(
        root: Arc<dyn BackingStore>,
        kv: Arc<dyn KeyValueStore>,
        config: FsConfig,
    ) -> Result<Self> {
        let root = Drive::new(root);
        let manager = Self {
            mounts: Arc::new(RwLock::new(MountTable::new(root.clone()))),
            journal: Journal::new(root.clone()),
            folders: PollingCache::new(config.poll_interval),
            files: PollingCache::new(config.poll_interval),
            root,
            kv,
            config,
        };
        manager.load_persisted_mounts().await?;
        manager.bootstrap().await?;
        Ok(manager)
    }

    /// Host-backed root at `config.root`, state in `config.state_dir`
    pub async fn open(config: FsConfig) -> Result<Self> {
        let root = HostStore::open(&config.root).await?;
        let kv = FileKeyValue::new(config.state_dir.clone());
        info!("opening {root}", root: config.root.display().to_string());
        Self::new(Arc::new(root), Arc::new(kv), config).await
    }

    #[must_use]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The root drive, bypassing the mount namespace
    #[must_use]
    pub fn root(&self) -> &Drive {
        &self.root
    }

    #[must_use]
    pub fn folder_cache(&self) -> &PollingCache<Folder> {
        &self.folders
    }

    #[must_use]
    pub fn file_cache(&self) -> &PollingCache<File> {
        &self.files
    }

    async fn bootstrap(&self) -> Result<()> {
        if !self.has_system_data().await? {
            let _ = self.migrate_legacy().await?;
        }
        self.setup_default_directories().await?;
        let recovery = self.resume_moves().await?;
        if recovery.was_needed() {
            info!(
                "move recovery: {resumed} resumed, {dropped} dropped, {deferred} deferred",
                resumed: recovery.resumed,
                dropped: recovery.dropped,
                deferred: recovery.deferred
            );
        }
        Ok(())
    }

    /// True once the root has been set up
    pub async fn has_system_data(&self) -> Result<bool> {
        Ok(self
            .root
            .get_folder(DEFAULT_DIRECTORIES[0], Depth::Shallow)
            .await?
            .is_some())
    }

    /// Insert the legacy tree at `/` if there is one left to migrate.
    /// Returns whether anything was migrated.
    pub async fn migrate_legacy(&self) -> Result<bool> {
        let migrator = LegacyMigrator::new(self.kv.clone(), self.config.legacy_key.as_str());
        let Some(tree) = migrator.load().await? else {
            return Ok(false);
        };
        info!("migrating legacy tree with {count} items", count: tree.items.len());
        self.root.insert("/", &DeepItem::Folder(tree)).await?;
        // Flag flips only after the insert; a crash in between repeats an
        // overwriting insert
        migrator.mark_migrated().await?;
        Ok(true)
    }

    /// Create whatever default directories and files are missing
    pub async fn setup_default_directories(&self) -> Result<()> {
        for dir in DEFAULT_DIRECTORIES {
            if self.root.get_folder(dir, Depth::Shallow).await?.is_none() {
                debug!("creating {dir}", dir: dir);
                self.root.create_folder(dir).await?;
            }
        }
        if self
            .root
            .get_file(REGISTRY_FILE, Depth::Shallow)
            .await?
            .is_none()
        {
            self.root.write_file(REGISTRY_FILE, "{}").await?;
        }
        Ok(())
    }

    /// Replay cross-store moves that were interrupted.
    ///
    /// An intent that cannot be replayed right now (unknown mount, revoked
    /// store, destination in the way) stays in the journal for a later start.
    pub async fn resume_moves(&self) -> Result<RecoveryResult> {
        let mut result = RecoveryResult::default();
        for (id, intent) in self.journal.pending().await? {
            match self.replay(&intent).await {
                Ok(Replay::Resumed) => result.resumed += 1,
                Ok(Replay::Dropped) => result.dropped += 1,
                Err(e) => {
                    warn!("deferring move {id}: {reason}", id: id.as_str(), reason: e.to_string());
                    result.deferred += 1;
                    continue;
                }
            }
            self.journal.finish(&id).await?;
        }
        Ok(result)
    }

    async fn replay(&self, intent: &MoveIntent) -> Result<Replay> {
        let (src, src_path, _) = self.movable(&intent.from).await?;
        let (dst, dst_path, _) = self.movable(&intent.to).await?;
        // Ask the store itself: drive reads turn a revoked grant into "missing"
        if src.store().stat(&src_path).await?.is_none() {
            debug!("move {from} already completed", from: intent.from.as_str());
            return Ok(Replay::Dropped);
        }
        let item = src
            .read_deep(&src_path)
            .await?
            .ok_or_else(|| Error::permission_denied(&intent.from))?;
        info!("resuming move {from} -> {to}", from: intent.from.as_str(), to: intent.to.as_str());
        dst.insert(&dst_path, &item).await?;
        src.delete(&src_path).await?;
        Ok(Replay::Resumed)
    }

    pub async fn get_folder(&self, path: &str, depth: Depth) -> Result<Option<Folder>> {
        read_folder(&self.mounts, path, depth).await
    }

    pub async fn get_file(&self, path: &str, depth: Depth) -> Result<Option<File>> {
        read_file(&self.mounts, path, depth).await
    }

    /// A file if there is one at `path`, otherwise a folder
    pub async fn get_item(&self, path: &str, depth: Depth) -> Result<Option<Item>> {
        if let Some(file) = self.get_file(path, depth).await? {
            return Ok(Some(Item::File(file)));
        }
        Ok(self.get_folder(path, depth).await?.map(Item::Folder))
    }

    /// Polled view of the folder at `path`
    pub fn get_cached_folder(&self, path: &str, depth: Depth) -> Subscription<Folder> {
        let key = CacheKey::new(path, depth);
        let mounts = self.mounts.clone();
        let target = key.path.clone();
        self.folders.subscribe(key, move || {
            let mounts = mounts.clone();
            let target = target.clone();
            async move { read_folder(&mounts, &target, depth).await }
        })
    }

    /// Polled view of the file at `path`
    pub fn get_cached_file(&self, path: &str, depth: Depth) -> Subscription<File> {
        let key = CacheKey::new(path, depth);
        let mounts = self.mounts.clone();
        let target = key.path.clone();
        self.files.subscribe(key, move || {
            let mounts = mounts.clone();
            let target = target.clone();
            async move { read_file(&mounts, &target, depth).await }
        })
    }

    pub async fn write_file<C: AsRef<[u8]>>(&self, path: &str, content: C) -> Result<()> {
        match self.writable(path).await? {
            Some((drive, inner, _)) if !path::is_root(&inner) => drive.write_file(&inner, content).await,
            _ => Err(Error::invalid_path(path)),
        }
    }

    /// Creates every missing segment. A no-op on `/mnt` and mount roots.
    pub async fn create_folder(&self, path: &str) -> Result<()> {
        match self.writable(path).await? {
            Some((drive, inner, _)) => drive.create_folder(&inner).await,
            None => Ok(()),
        }
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        match self.writable(path).await? {
            Some((drive, inner, _)) if !path::is_root(&inner) => drive.delete(&inner).await,
            _ => Err(Error::invalid_path(path)),
        }
    }

    /// Write a materialized tree at `path`. A folder may be inserted at a
    /// drive root, which merges its children in.
    pub async fn insert(&self, path: &str, item: &DeepItem) -> Result<()> {
        path::validate(path)?;
        let resolved = self.mounts.read().await.resolve(path);
        match resolved {
            None => Err(Error::not_found(path::normalize(path))),
            Some(Resolved::Namespace) => Err(Error::invalid_path(path)),
            Some(Resolved::Drive { drive, path: inner, .. }) => {
                if path::is_root(&inner) && matches!(item, DeepItem::File(_)) {
                    return Err(Error::invalid_path(path));
                }
                drive.insert(&inner, item).await
            }
        }
    }

    /// Move `old` to `new`, within a drive or across drives.
    ///
    /// Within one drive this is `Drive::move_item`. Across drives the subtree
    /// is copied and the source deleted under a journal entry, so an
    /// interrupted move is finished on the next start.
    pub async fn move_item(&self, old: &str, new: &str) -> Result<()> {
        path::validate(old)?;
        path::validate(new)?;
        let old = path::normalize(old);
        let new = path::normalize(new);
        if old == new {
            return Ok(());
        }
        let (src, src_path, src_mount) = self.movable(&old).await?;
        if path::is_descendant(&old, &new) {
            return Err(Error::invalid_path(&new));
        }
        let (dst, dst_path, dst_mount) = self.movable(&new).await?;
        if src_mount == dst_mount {
            return src.move_item(&src_path, &dst_path).await;
        }

        let item = src
            .read_deep(&src_path)
            .await?
            .ok_or_else(|| Error::not_found(&old))?;
        let id = self.journal.begin(&old, &new).await?;
        if let Err(e) = dst.insert(&dst_path, &item).await {
            // Source is untouched, so there is nothing left to resume
            self.journal.finish(&id).await?;
            return Err(e);
        }
        src.delete(&src_path).await?;
        self.journal.finish(&id).await?;
        info!("moved {old} -> {new} across stores", old: old.as_str(), new: new.as_str());
        Ok(())
    }

    /// A child name under `parent` that is not taken yet
    pub async fn unique_name(&self, parent: &str, name: &str) -> Result<String> {
        path::validate(parent)?;
        let resolved = self.mounts.read().await.resolve(parent);
        match resolved {
            Some(Resolved::Drive { drive, path: inner, .. }) => drive.unique_name(&inner, name).await,
            _ => Ok(name.to_string()),
        }
    }

    /// Mount a host directory under `/mnt/<name>` and remember it across
    /// restarts. An existing mount with that name is replaced.
    pub async fn mount(&self, name: &str, handle: StoreHandle) -> Result<()> {
        check_mount_name(name)?;
        let store = Arc::new(HostStore::new(handle.clone()));
        let _ = self.mounts.write().await.register(name, store);
        let mut persisted = self.persisted_mounts().await?;
        let _ = persisted.insert(name.to_string(), handle);
        self.save_mounts(&persisted).await?;
        info!("mounted {name}", name: name);
        Ok(())
    }

    /// Mount any store for the lifetime of this manager only
    pub async fn mount_store(&self, name: &str, store: Arc<dyn BackingStore>) -> Result<()> {
        check_mount_name(name)?;
        let _ = self.mounts.write().await.register(name, store);
        let mut persisted = self.persisted_mounts().await?;
        if persisted.remove(name).is_some() {
            self.save_mounts(&persisted).await?;
        }
        debug!("mounted store {name}", name: name);
        Ok(())
    }

    /// Returns whether a mount by that name existed
    pub async fn unmount(&self, name: &str) -> Result<bool> {
        let removed = self.mounts.write().await.unregister(name);
        let mut persisted = self.persisted_mounts().await?;
        if persisted.remove(name).is_some() {
            self.save_mounts(&persisted).await?;
        }
        if removed {
            info!("unmounted {name}", name: name);
        }
        Ok(removed)
    }

    pub async fn mounts(&self) -> Vec<String> {
        self.mounts.read().await.names()
    }

    /// Mount handles saved by earlier `mount` calls
    pub async fn persisted_mounts(&self) -> Result<BTreeMap<String, StoreHandle>> {
        match self.kv.get(MOUNTS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save_mounts(&self, mounts: &BTreeMap<String, StoreHandle>) -> Result<()> {
        self.kv.set(MOUNTS_KEY, &serde_json::to_string(mounts)?).await
    }

    async fn load_persisted_mounts(&self) -> Result<()> {
        let persisted = self.persisted_mounts().await?;
        let mut table = self.mounts.write().await;
        for (name, handle) in persisted {
            debug!("restoring mount {name} at {root}", name: name.as_str(), root: handle.root().display().to_string());
            let _ = table.register(name, Arc::new(HostStore::new(handle)));
        }
        Ok(())
    }

    /// Resolve a path some mutation applies to. `None` for `/mnt` and mount
    /// roots; an unregistered mount is `NotFound`.
    async fn writable(&self, path: &str) -> Result<Option<Target>> {
        path::validate(path)?;
        let resolved = self.mounts.read().await.resolve(path);
        let resolved = resolved.ok_or_else(|| Error::not_found(path::normalize(path)))?;
        if resolved.is_synthetic() {
            return Ok(None);
        }
        match resolved {
            Resolved::Drive { drive, path, mount } => Ok(Some((drive, path, mount))),
            Resolved::Namespace => Ok(None),
        }
    }

    /// Like `writable`, but a location that cannot be moved is an error
    async fn movable(&self, path: &str) -> Result<Target> {
        match self.writable(path).await? {
            Some(target) if !path::is_root(&target.1) => Ok(target),
            _ => Err(Error::invalid_path(path)),
        }
    }
}

fn check_mount_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(Error::invalid_path(name));
    }
    Ok(())
}

async fn read_file(mounts: &RwLock<MountTable>, path: &str, depth: Depth) -> Result<Option<File>> {
    path::validate(path)?;
    let resolved = mounts.read().await.resolve(path);
    match resolved {
        Some(Resolved::Drive { drive, path: inner, .. }) => drive.get_file(&inner, depth).await,
        _ => Ok(None),
    }
}

async fn read_folder(mounts: &RwLock<MountTable>, path: &str, depth: Depth) -> Result<Option<Folder>> {
    path::validate(path)?;
    let resolved = mounts.read().await.resolve(path);
    let Some(resolved) = resolved else {
        return Ok(None);
    };
    let (drive, inner, mount) = match resolved {
        Resolved::Namespace => return Ok(Some(read_namespace(mounts, depth).await?)),
        Resolved::Drive { drive, path, mount } => (drive, path, mount),
    };
    let Some(folder) = drive.get_folder(&inner, depth).await? else {
        return Ok(None);
    };
    if !path::is_root(&inner) {
        return Ok(Some(folder));
    }
    match mount {
        Some(name) => Ok(Some(renamed(folder, &name))),
        None => with_namespace(mounts, folder, depth).await.map(Some),
    }
}

/// `/mnt`: stubs for each mount, or every mount's full tree
async fn read_namespace(mounts: &RwLock<MountTable>, depth: Depth) -> Result<Folder> {
    if depth == Depth::Shallow {
        return Ok(Folder::Shallow(mounts.read().await.list_mounts()));
    }
    let drives: Vec<(String, Drive)> = mounts
        .read()
        .await
        .iter()
        .map(|(name, drive)| (name.clone(), drive.clone()))
        .collect();
    let loads = drives.into_iter().map(|(name, drive)| async move {
        let folder = drive.get_folder("/", Depth::Deep).await?;
        Ok::<_, Error>(folder.and_then(Folder::into_deep).map(|f| (name, f)))
    });
    let mut namespace = DeepFolder::new(path::MOUNT_ROOT);
    // A revoked mount drops out of the listing
    for (name, folder) in try_join_all(loads).await?.into_iter().flatten() {
        let _ = namespace.items.insert(
            name.clone(),
            DeepItem::Folder(DeepFolder {
                name,
                items: folder.items,
            }),
        );
    }
    Ok(Folder::Deep(namespace))
}

/// The root listing with the virtual `mnt` folder, when anything is mounted
async fn with_namespace(mounts: &RwLock<MountTable>, folder: Folder, depth: Depth) -> Result<Folder> {
    if mounts.read().await.is_empty() {
        return Ok(folder);
    }
    let name = path::MOUNT_ROOT.to_string();
    Ok(match folder {
        Folder::Shallow(mut shallow) => {
            let _ = shallow.items.insert(
                name.clone(),
                StubItem::Folder(StubFolder { name }),
            );
            Folder::Shallow(shallow)
        }
        Folder::Deep(mut deep) => {
            if let Folder::Deep(namespace) = read_namespace(mounts, depth).await? {
                let _ = deep.items.insert(name, DeepItem::Folder(namespace));
            }
            Folder::Deep(deep)
        }
    })
}

fn renamed(folder: Folder, name: &str) -> Folder {
    match folder {
        Folder::Shallow(mut shallow) => {
            shallow.name = name.to_string();
            Folder::Shallow(shallow)
        }
        Folder::Deep(mut deep) => {
            deep.name = name.to_string();
            Folder::Deep(deep)
        }
    }
}
