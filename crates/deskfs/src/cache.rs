//! Reference-counted polling cache keyed by `(path, depth)`.
//!
//! The first subscriber for a key starts a task that loads the value right
//! away and then once per interval, publishing through a `watch` channel
//! whenever the loaded value differs from the last one. Further subscribers
//! share that task. When the last subscription for a key is dropped the task
//! is aborted and the entry removed, so nothing keeps polling in the
//! background.
//!
//! Writes never notify the cache. A change becomes visible on the next poll.

use crate::error::Result;
use crate::item::Depth;
use crate::path;
use diagnostics::*;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub depth: Depth,
}

impl CacheKey {
    pub fn new(path: &str, depth: Depth) -> Self {
        Self {
            path: path::normalize(path),
            depth,
        }
    }
}

/// What a subscriber currently sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue<T> {
    /// The first load has not finished yet
    Pending,
    /// Result of the latest successful load; `None` means nothing is there
    Ready(Option<T>),
}

impl<T> CachedValue<T> {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, CachedValue::Pending)
    }

    #[must_use]
    pub fn ready(self) -> Option<Option<T>> {
        match self {
            CachedValue::Pending => None,
            CachedValue::Ready(value) => Some(value),
        }
    }
}

struct Entry<T> {
    receiver: watch::Receiver<CachedValue<T>>,
    subscribers: usize,
    task: JoinHandle<()>,
}

struct Registry<T> {
    interval: Duration,
    entries: Mutex<HashMap<CacheKey, Entry<T>>>,
}

impl<T> Registry<T> {
    // The lock is never held across an await, so a poisoned map is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct PollingCache<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for PollingCache<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T> PollingCache<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(interval: Duration) -> Self {
        Self {
            registry: Arc::new(Registry {
                interval,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to `key`. `loader` is only used when this is the first live
    /// subscription for the key. Must be called from within a tokio runtime.
    pub fn subscribe<F, Fut>(&self, key: CacheKey, loader: F) -> Subscription<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        let mut entries = self.registry.lock();
        let receiver = match entries.get_mut(&key) {
            Some(entry) => {
                entry.subscribers += 1;
                entry.receiver.clone()
            }
            None => {
                let (sender, receiver) = watch::channel(CachedValue::Pending);
                let task = tokio::spawn(poll(
                    key.clone(),
                    self.registry.interval,
                    loader,
                    sender,
                ));
                debug!("cache start {path} ({depth})", path: key.path.as_str(), depth: key.depth.as_str());
                let _ = entries.insert(
                    key.clone(),
                    Entry {
                        receiver: receiver.clone(),
                        subscribers: 1,
                        task,
                    },
                );
                receiver
            }
        };
        Subscription {
            key,
            receiver,
            registry: self.registry.clone(),
        }
    }

    /// Number of keys with a live poller
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn subscribers(&self, key: &CacheKey) -> usize {
        self.registry
            .lock()
            .get(key)
            .map_or(0, |entry| entry.subscribers)
    }
}

async fn poll<T, F, Fut>(
    key: CacheKey,
    interval: Duration,
    loader: F,
    sender: watch::Sender<CachedValue<T>>,
) where
    T: PartialEq,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let _ = ticker.tick().await;
        match loader().await {
            Ok(value) => {
                let next = CachedValue::Ready(value);
                let _ = sender.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
            }
            Err(e) => {
                warn!("cache load of {path} failed: {reason}", path: key.path.as_str(), reason: e.to_string());
            }
        }
    }
}

/// A live interest in one cache key. Cloning adds a subscriber; dropping the
/// last one stops the poller.
pub struct Subscription<T> {
    key: CacheKey,
    receiver: watch::Receiver<CachedValue<T>>,
    registry: Arc<Registry<T>>,
}

impl<T: Clone> Subscription<T> {
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The latest published value, without waiting
    #[must_use]
    pub fn current(&self) -> CachedValue<T> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published value. `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<CachedValue<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        if let Some(entry) = self.registry.lock().get_mut(&self.key) {
            entry.subscribers += 1;
        }
        Self {
            key: self.key.clone(),
            receiver: self.receiver.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut entries = self.registry.lock();
        let Some(entry) = entries.get_mut(&self.key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            if let Some(entry) = entries.remove(&self.key) {
                entry.task.abort();
            }
            debug!("cache evict {path} ({depth})", path: self.key.path.as_str(), depth: self.key.depth.as_str());
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
