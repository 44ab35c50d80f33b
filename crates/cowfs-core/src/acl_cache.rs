// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Process-wide ACL cache keyed by object handle
//!
//! Entries live in one ordered index guarded by a single mutex. Each entry's
//! ACE sequence sits behind its own `RwLock`; writers only take it while
//! holding the index lock, and readers copy the whole sequence out, so a
//! reader sees either the old or the new sequence and never a mix.
//!
//! Entries are never evicted. Whoever destroys the object must call
//! [`AclCache::release`].

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::error::CoreResult;
use crate::types::{Ace, Acl, CacheKey};

static GLOBAL_ACL_CACHE: OnceLock<AclCache> = OnceLock::new();

/// Cached ACL state of one object
#[derive(Debug)]
pub struct AclEntry {
    key: CacheKey,
    aces: RwLock<Vec<Ace>>,
}

impl AclEntry {
    fn new(key: CacheKey) -> Self {
        Self {
            key,
            aces: RwLock::new(Vec::new()),
        }
    }
}

/// Shared reference to a cache entry
#[derive(Clone, Debug)]
pub struct AclEntryHandle(Arc<AclEntry>);

impl AclEntryHandle {
    pub fn key(&self) -> &CacheKey {
        &self.0.key
    }

    pub fn naces(&self) -> usize {
        self.0.aces.read().len()
    }

    /// Deep copy of the current ACE sequence
    pub fn copy_aces(&self) -> Vec<Ace> {
        self.0.aces.read().clone()
    }

    /// Whether both handles refer to the same cache entry
    pub fn same_entry(&self, other: &AclEntryHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // Callers must hold the index lock.
    fn replace(&self, aces: Vec<Ace>) -> Vec<Ace> {
        std::mem::replace(&mut *self.0.aces.write(), aces)
    }
}

/// Outcome of [`AclCache::insert_or_get`]
#[derive(Debug)]
pub enum Insertion {
    /// The candidate is now the canonical entry
    Inserted(AclEntryHandle),
    /// Another entry already held the key; the candidate was dropped
    Collided(AclEntryHandle),
}

impl Insertion {
    pub fn into_handle(self) -> AclEntryHandle {
        match self {
            Insertion::Inserted(h) | Insertion::Collided(h) => h,
        }
    }
}

type Index = BTreeMap<CacheKey, Arc<AclEntry>>;

/// Ordered index from cache key to cached ACL
#[derive(Debug, Default)]
pub struct AclCache {
    index: Mutex<Index>,
}

impl AclCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up the process-wide cache. Later calls return the same instance.
    pub fn initialize() -> &'static AclCache {
        GLOBAL_ACL_CACHE.get_or_init(|| {
            tracing::debug!("initializing process-wide acl cache");
            AclCache::new()
        })
    }

    /// The process-wide cache, initializing it on first use
    pub fn global() -> &'static AclCache {
        Self::initialize()
    }

    fn insert_or_get(index: &mut Index, candidate: AclEntry) -> Insertion {
        use std::collections::btree_map::Entry;

        match index.entry(candidate.key.clone()) {
            Entry::Occupied(existing) => Insertion::Collided(AclEntryHandle(existing.get().clone())),
            Entry::Vacant(slot) => {
                let entry = Arc::new(candidate);
                slot.insert(entry.clone());
                Insertion::Inserted(AclEntryHandle(entry))
            }
        }
    }

    fn lookup(index: &Index, key: &CacheKey) -> Option<AclEntryHandle> {
        index.get(key).cloned().map(AclEntryHandle)
    }

    /// Find the entry for `key`, creating an empty one if there is none.
    ///
    /// The candidate entry is built outside the index lock. If another thread
    /// inserted the key in the meantime, the candidate is discarded and the
    /// winner's entry returned.
    pub fn locate_or_create(&self, key: &CacheKey) -> CoreResult<AclEntryHandle> {
        if let Some(found) = Self::lookup(&self.index.lock(), key) {
            tracing::trace!(key = ?key, "acl entry found");
            return Ok(found);
        }

        tracing::trace!(key = ?key, "acl entry create");
        let candidate = AclEntry::new(key.try_clone()?);
        match Self::insert_or_get(&mut self.index.lock(), candidate) {
            Insertion::Inserted(handle) => Ok(handle),
            Insertion::Collided(winner) => {
                tracing::debug!(key = ?key, "lost acl entry insert race");
                Ok(winner)
            }
        }
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn release(&self, key: &CacheKey) -> bool {
        let removed = self.index.lock().remove(key).is_some();
        if removed {
            tracing::trace!(key = ?key, "acl entry released");
        }
        removed
    }

    /// Drop every entry, e.g. when the owning export goes away
    pub fn release_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.index.lock());
        tracing::debug!(count = drained.len(), "released all acl entries");
        drained.len()
    }

    /// Copy of the cached ACL. `None` if the key is absent or holds no ACEs.
    pub fn get_acl(&self, key: &CacheKey) -> Option<Acl> {
        let index = self.index.lock();
        let entry = index.get(key)?;
        let aces = entry.aces.read();
        if aces.is_empty() {
            None
        } else {
            Some(Acl::new(aces.clone()))
        }
    }

    /// Replace the entry's ACE sequence wholesale, creating the entry if needed.
    pub fn set_acl(&self, key: &CacheKey, aces: Vec<Ace>) -> CoreResult<()> {
        let mut index = self.index.lock();
        let entry = match Self::lookup(&index, key) {
            Some(entry) => entry,
            None => Self::insert_or_get(&mut index, AclEntry::new(key.try_clone()?)).into_handle(),
        };
        let naces = aces.len();
        let previous = entry.replace(aces);
        tracing::trace!(key = ?key, naces, previous = previous.len(), "acl replaced");
        Ok(())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.index.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }
}
