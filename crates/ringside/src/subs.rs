//! Keyed registry of listener teardown thunks.
//!
//! Keys follow a hierarchical `:`-separated convention (`track:{id}:mute`,
//! `selected_param:value`), which makes "drop everything for track X" a
//! prefix operation instead of a full teardown. That is the difference
//! between O(ring width) churn and O(all tracks) churn when the window moves
//! by one.

use std::collections::HashMap;

use futures::future::join_all;
use ringproto::ListenerHandle;
use tracing::{debug, warn};

/// Named group of keyed subscriptions.
pub struct SubscriptionGroup {
    name: &'static str,
    entries: HashMap<String, ListenerHandle>,
}

impl SubscriptionGroup {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    /// Store a handle under `key`. If the key is already present the prior
    /// handle is unlistened first: a duplicated key is a re-subscribe, not a
    /// second listener. Teardown errors are swallowed and logged.
    pub async fn add(&mut self, key: impl Into<String>, handle: ListenerHandle) {
        let key = key.into();
        if let Some(prior) = self.entries.remove(&key) {
            debug!("{}: re-subscribing {}", self.name, key);
            if let Err(e) = prior.unlisten().await {
                warn!("{}: unsubscribe of stale {} failed: {:#}", self.name, key, e);
            }
        }
        self.entries.insert(key, handle);
    }

    /// Unlisten and drop one key. No-op if absent.
    pub async fn remove(&mut self, key: &str) {
        if let Some(handle) = self.entries.remove(key) {
            if let Err(e) = handle.unlisten().await {
                warn!("{}: unsubscribe of {} failed: {:#}", self.name, key, e);
            }
        }
    }

    /// Unlisten and drop every key starting with `prefix`.
    pub async fn remove_by_prefix(&mut self, prefix: &str) {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in keys {
            self.remove(&key).await;
        }
    }

    /// Tear everything down. The map is cleared synchronously (concurrent
    /// `has`/`size` observers see an empty group immediately), then every
    /// handle is unlistened concurrently.
    pub async fn clear(&mut self) {
        let drained: Vec<(String, ListenerHandle)> = self.entries.drain().collect();
        if drained.is_empty() {
            return;
        }
        debug!("{}: clearing {} subscriptions", self.name, drained.len());
        let name = self.name;
        join_all(drained.into_iter().map(|(key, handle)| async move {
            if let Err(e) = handle.unlisten().await {
                warn!("{}: unsubscribe of {} failed: {:#}", name, key, e);
            }
        }))
        .await;
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys currently registered, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

impl std::fmt::Debug for SubscriptionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGroup")
            .field("name", &self.name)
            .field("size", &self.entries.len())
            .finish()
    }
}
