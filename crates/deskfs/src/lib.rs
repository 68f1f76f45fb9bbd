//! DeskFS - a hierarchical file store for desktop-style applications
//!
//! One root drive holds the tree; secondary stores appear under
//! `/mnt/<name>`. Reads come in two depths (`Shallow` metadata, `Deep`
//! content), and `FsManager` ties the pieces together.
//!
//! Set DESKFS_LOG to control logging:
//! - DESKFS_LOG=off (default) - silent
//! - DESKFS_LOG=info - basic operations
//! - DESKFS_LOG=debug - detailed diagnostics

// Error types
pub mod error;

/// Path normalization and mount-namespace parsing
pub mod path;

/// Item shapes at both depths and their JSON form
pub mod item;

/// Backing store trait with host and in-memory implementations
pub mod store;

/// Depth-aware operations over one store
pub mod drive;

/// Mount table and unified-path resolution
pub mod mount;

// Key/value persistence for state outside the tree
pub mod kv;

// Legacy tree upgrade
pub mod legacy;

// Cross-store move journal
pub mod journal;

// Polling cache
pub mod cache;

pub mod config;

pub mod manager;

#[cfg(test)]
mod tests;

pub use cache::{CacheKey, CachedValue, PollingCache, Subscription};
pub use config::FsConfig;
pub use drive::Drive;
pub use error::{Error, Result};
pub use item::{
    Content, DeepFile, DeepFolder, DeepItem, Depth, File, Folder, Item, ItemKind, ShallowFolder,
    StubFile, StubFolder, StubItem,
};
pub use journal::{MoveIntent, RecoveryResult};
pub use kv::{FileKeyValue, KeyValueStore, MemoryKeyValue};
pub use legacy::LegacyMigrator;
pub use manager::FsManager;
pub use mount::{MountTable, Resolved};
pub use store::{BackingStore, HostStore, MemoryStore, StoreEntry, StoreHandle};
