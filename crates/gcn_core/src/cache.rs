//! Per-type tables mapping cache keys to live object handles.

use crate::cache_key::CacheKey;
use crate::object::Handle;
use crate::types::ObjectKind;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Cache table for one object type.
///
/// One handle may sit under several keys (original id, localized id, ...).
/// A secondary index from handle to keys makes removing every alias of a
/// handle proportional to its own key count.
pub struct ConstructorCache {
    kind: ObjectKind,
    entries: HashMap<CacheKey, Handle>,
    index: HashMap<u64, HashSet<CacheKey>>,
}

impl ConstructorCache {
    /// Creates an empty table for `kind`.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Object type of this table.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Number of keys in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True without entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The handle stored under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Handle> {
        self.entries.get(key).cloned()
    }

    /// Stores `handle` under `key`, replacing whatever was there.
    pub fn set(&mut self, key: CacheKey, handle: &Handle) {
        if let Some(previous) = self.entries.insert(key.clone(), handle.clone()) {
            if !previous.ptr_eq(handle) {
                self.unindex(previous.serial(), &key);
            }
        }
        self.index.entry(handle.serial()).or_default().insert(key);
    }

    /// Removes the entry under `key`.
    pub fn delete(&mut self, key: &CacheKey) -> Option<Handle> {
        let removed = self.entries.remove(key)?;
        self.unindex(removed.serial(), key);
        Some(removed)
    }

    /// Stores the same handle under every key.
    pub fn add_references(&mut self, keys: &[CacheKey], handle: &Handle) {
        for key in keys {
            self.set(key.clone(), handle);
        }
    }

    /// Removes the entry under the handle's own key, if it holds this very handle.
    ///
    /// Other keys aliasing the handle stay in place; see [`remove_all`](Self::remove_all).
    pub fn decache(&mut self, handle: &Handle) -> bool {
        let key = handle.hash();
        match self.entries.get(&key) {
            Some(current) if current.ptr_eq(handle) => {
                self.delete(&key);
                true
            }
            _ => false,
        }
    }

    /// Removes every key under which the handle is stored. Returns how many.
    pub fn remove_all(&mut self, handle: &Handle) -> usize {
        let keys = self.index.remove(&handle.serial()).unwrap_or_default();
        let mut removed = 0;
        for key in keys {
            if self.entries.get(&key).is_some_and(|h| h.ptr_eq(handle)) {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Every key the handle is stored under.
    pub fn keys_of(&self, handle: &Handle) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .index
            .get(&handle.serial())
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn unindex(&mut self, serial: u64, key: &CacheKey) {
        if let Some(keys) = self.index.get_mut(&serial) {
            keys.remove(key);
            if keys.is_empty() {
                self.index.remove(&serial);
            }
        }
    }
}

/// All cache tables of one client context, one per object type.
///
/// Methods borrow the tables only for their own duration and never call out,
/// so they are safe to use from any callback.
#[derive(Default)]
pub struct CacheRegistry {
    tables: RefCell<HashMap<ObjectKind, ConstructorCache>>,
}

impl CacheRegistry {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(&self, kind: ObjectKind, f: impl FnOnce(&mut ConstructorCache) -> R) -> R {
        let mut tables = self.tables.borrow_mut();
        let table = tables
            .entry(kind)
            .or_insert_with(|| ConstructorCache::new(kind));
        f(table)
    }

    /// The handle stored under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<Handle> {
        self.with_table(key.kind(), |t| t.get(key))
    }

    /// Stores `handle` under `key`.
    pub fn set(&self, key: CacheKey, handle: &Handle) {
        trace!(%key, "cache set");
        self.with_table(key.kind(), |t| t.set(key, handle))
    }

    /// Removes the entry under `key`.
    pub fn delete(&self, key: &CacheKey) -> Option<Handle> {
        self.with_table(key.kind(), |t| t.delete(key))
    }

    /// Stores the handle under every key.
    pub fn add_references(&self, keys: &[CacheKey], handle: &Handle) {
        self.with_table(handle.kind(), |t| t.add_references(keys, handle))
    }

    /// Removes the handle from under its own key.
    pub fn decache(&self, handle: &Handle) -> bool {
        self.with_table(handle.kind(), |t| t.decache(handle))
    }

    /// Removes the handle from under every key.
    pub fn remove_all(&self, handle: &Handle) -> usize {
        self.with_table(handle.kind(), |t| t.remove_all(handle))
    }

    /// Keys under which the handle is stored.
    pub fn keys_of(&self, handle: &Handle) -> Vec<CacheKey> {
        self.with_table(handle.kind(), |t| t.keys_of(handle))
    }

    /// Number of keys in one type's table.
    pub fn len(&self, kind: ObjectKind) -> usize {
        self.with_table(kind, |t| t.len())
    }

    /// Empties one type's table, leaving all others intact.
    pub fn clear_table(&self, kind: ObjectKind) {
        self.with_table(kind, |t| t.clear())
    }

    /// Empties every table.
    pub fn clear(&self) {
        self.tables.borrow_mut().clear();
    }
}
