//! Per-client resource cache
//!
//! Entries are keyed by [`ResourceKind`] and the request key (the path,
//! relative to the API base, including any query string). Values are
//! resources or collections, possibly still pending. Nothing is ever evicted
//! automatically; callers invalidate with [`ResourceCache::clear`].

use super::lazy::Resource;
use super::pagination::Collection;
use super::registry::{Entity, ResourceKind};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Something the cache can hold: a single resource or a collection
pub trait CacheEntry: Any + Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// True once every resource in the entry has its data
    fn is_resolved(&self) -> bool;

    /// Resolve every pending resource in the entry
    fn resolve_entry(&self) -> BoxFuture<'_, Result<()>>;

    /// Export the entry if it is resolved
    fn export_entry(&self) -> Option<Result<Value>>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Entity> CacheEntry for Resource<T> {
    fn kind(&self) -> ResourceKind {
        T::KIND
    }

    fn is_resolved(&self) -> bool {
        Resource::is_resolved(self)
    }

    fn resolve_entry(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.resolve().await.map(|_| ()) })
    }

    fn export_entry(&self) -> Option<Result<Value>> {
        self.peek().map(Entity::export)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: Entity> CacheEntry for Collection<T> {
    fn kind(&self) -> ResourceKind {
        T::KIND
    }

    fn is_resolved(&self) -> bool {
        self.iter().all(|item| item.is_resolved())
    }

    fn resolve_entry(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            for item in self.iter() {
                item.resolve().await?;
            }
            Ok(())
        })
    }

    fn export_entry(&self) -> Option<Result<Value>> {
        self.iter()
            .map(|item| item.peek().map(Entity::export))
            .collect::<Option<Result<Vec<_>>>>()
            .map(|records| records.map(Value::Array))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type Entries = HashMap<ResourceKind, HashMap<String, Arc<dyn CacheEntry>>>;

/// Lookup/store for resources, owned by one client.
///
/// A disabled cache stores nothing and every lookup misses.
pub struct ResourceCache {
    entries: Option<Mutex<Entries>>,
}

impl ResourceCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: enabled.then(|| Mutex::new(HashMap::new())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Typed lookup. An entry of a different shape under the same key misses.
    pub fn get<V: CacheEntry>(&self, kind: ResourceKind, key: &str) -> Option<Arc<V>> {
        let entry = self.get_entry(kind, key)?;
        let hit = entry.into_any().downcast::<V>().ok();
        if hit.is_some() {
            tracing::trace!(%kind, key, "cache hit");
        }
        hit
    }

    pub fn get_entry(&self, kind: ResourceKind, key: &str) -> Option<Arc<dyn CacheEntry>> {
        let entries = self.entries.as_ref()?.lock();
        entries.get(&kind)?.get(key).cloned()
    }

    /// Return the cached entry for (kind, key), or create and store one.
    ///
    /// Lookup and insert happen under one lock, so two callers asking for the
    /// same key always receive the same object.
    pub fn get_or_insert_with<V, F>(&self, kind: ResourceKind, key: &str, create: F) -> Arc<V>
    where
        V: CacheEntry,
        F: FnOnce() -> Arc<V>,
    {
        let Some(entries) = &self.entries else {
            return create();
        };
        let mut entries = entries.lock();
        let slot = entries.entry(kind).or_default();
        if let Some(existing) = slot.get(key) {
            if let Ok(hit) = existing.clone().into_any().downcast::<V>() {
                tracing::trace!(%kind, key, "cache hit");
                return hit;
            }
        }
        let created = create();
        slot.insert(key.to_string(), created.clone());
        created
    }

    /// Insert or overwrite an entry
    pub fn put(&self, kind: ResourceKind, key: impl Into<String>, entry: Arc<dyn CacheEntry>) {
        if let Some(entries) = &self.entries {
            entries.lock().entry(kind).or_default().insert(key.into(), entry);
        }
    }

    /// Remove everything, everything of one kind, or one key.
    ///
    /// A key without a kind removes that key under every kind.
    pub fn clear(&self, kind: Option<ResourceKind>, key: Option<&str>) {
        let Some(entries) = &self.entries else {
            return;
        };
        let mut entries = entries.lock();
        match (kind, key) {
            (None, None) => entries.clear(),
            (Some(kind), None) => {
                entries.remove(&kind);
            }
            (Some(kind), Some(key)) => {
                if let Some(slot) = entries.get_mut(&kind) {
                    slot.remove(key);
                }
            }
            (None, Some(key)) => {
                for slot in entries.values_mut() {
                    slot.remove(key);
                }
            }
        }
    }

    /// Number of cached entries across all kinds
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full contents of the cache, optionally resolving every pending entry
    /// first. Fails with a configuration error when caching is disabled.
    pub async fn snapshot(&self, force_resolve: bool) -> Result<CacheSnapshot> {
        let Some(entries) = &self.entries else {
            return Err(Error::configuration("cache is turned off for this client"));
        };

        // Copy out under the lock, resolve without it
        let mut snapshot = BTreeMap::new();
        for (kind, slot) in entries.lock().iter() {
            let slot: BTreeMap<String, Arc<dyn CacheEntry>> =
                slot.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            snapshot.insert(*kind, slot);
        }

        if force_resolve {
            for slot in snapshot.values() {
                for entry in slot.values() {
                    entry.resolve_entry().await?;
                }
            }
        }

        Ok(CacheSnapshot { entries: snapshot })
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Point-in-time copy of a cache's entries
pub struct CacheSnapshot {
    entries: BTreeMap<ResourceKind, BTreeMap<String, Arc<dyn CacheEntry>>>,
}

impl CacheSnapshot {
    pub fn entries(&self) -> &BTreeMap<ResourceKind, BTreeMap<String, Arc<dyn CacheEntry>>> {
        &self.entries
    }

    pub fn get(&self, kind: ResourceKind, key: &str) -> Option<&Arc<dyn CacheEntry>> {
        self.entries.get(&kind)?.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export as `{kind: {key: record}}`. Entries still pending are skipped.
    pub fn export(&self) -> Result<Value> {
        let mut kinds = Map::new();
        for (kind, slot) in &self.entries {
            let mut records = Map::new();
            for (key, entry) in slot {
                if let Some(record) = entry.export_entry() {
                    records.insert(key.clone(), record?);
                }
            }
            kinds.insert(kind.as_str().to_string(), Value::Object(records));
        }
        Ok(Value::Object(kinds))
    }
}
