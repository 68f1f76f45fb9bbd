mod manager;

use crate::config::FsConfig;
use crate::kv::MemoryKeyValue;
use crate::manager::FsManager;
use crate::store::MemoryStore;
use std::sync::Arc;

/// A manager over in-memory root and state, keeping handles to both so
/// tests can inspect them or build a second manager over the same data
pub(crate) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub kv: Arc<MemoryKeyValue>,
    pub fs: FsManager,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_kv(Arc::new(MemoryKeyValue::new())).await
    }

    pub async fn with_kv(kv: Arc<MemoryKeyValue>) -> Self {
        let store = Arc::new(MemoryStore::new("root"));
        let fs = FsManager::new(store.clone(), kv.clone(), FsConfig::default())
            .await
            .expect("bootstrap");
        Self { store, kv, fs }
    }

    /// A fresh manager over the same root and state, as after a restart
    pub async fn reopen(&self) -> FsManager {
        FsManager::new(self.store.clone(), self.kv.clone(), FsConfig::default())
            .await
            .expect("bootstrap after restart")
    }
}
