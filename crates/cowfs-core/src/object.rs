// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! CoWFS object handle

use crate::acl_cache::AclCache;
use crate::attrs::ObjectHandle;
use crate::error::CoreResult;
use crate::id_manager::IdManager;
use crate::types::{CacheKey, FileId};

/// In-memory handle of one filesystem object
///
/// The ACL cache key is the object's encoded [`FileId`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CowObject {
    id: FileId,
    mode: u32,
}

impl CowObject {
    /// Create a new object, taking a fresh identity from `ids`.
    pub fn create(ids: &IdManager, mode: u32) -> CoreResult<Self> {
        let id = ids.generate_identifier()?;
        tracing::debug!(id = %id, mode = %format!("{mode:o}"), "created object");
        Ok(Self { id, mode })
    }

    /// Handle for an identifier that was already allocated, e.g. one taken from a batch
    pub fn with_id(id: FileId, mode: u32) -> Self {
        Self { id, mode }
    }

    pub fn root(mode: u32) -> Self {
        Self::with_id(FileId::ROOT, mode)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Tear the object down, dropping its cached ACL.
    pub fn destroy(self, cache: &AclCache) {
        if cache.release(&self.handle_to_key()) {
            tracing::debug!(id = %self.id, "released cached acl on destroy");
        }
    }
}

impl ObjectHandle for CowObject {
    fn handle_to_key(&self) -> CacheKey {
        CacheKey::from(self.id)
    }

    fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdConfig;
    use crate::store::InMemoryStore;
    use crate::types::{Ace, AceWho};
    use std::sync::Arc;

    #[test]
    fn created_objects_get_distinct_keys() {
        let ids = IdManager::initialize(Arc::new(InMemoryStore::new()), &IdConfig::default())
            .unwrap();
        let a = CowObject::create(&ids, 0o644).unwrap();
        let b = CowObject::create(&ids, 0o644).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.handle_to_key(), b.handle_to_key());
        assert_eq!(a.handle_to_key().as_bytes(), &a.id().to_bytes()[..]);
        assert_ne!(CowObject::root(0o755).handle_to_key(), a.handle_to_key());
    }

    #[test]
    fn destroy_releases_cache_entry() {
        let cache = AclCache::new();
        let obj = CowObject::with_id(FileId::new(0, 77), 0o600);
        cache
            .set_acl(&obj.handle_to_key(), vec![Ace::allow(AceWho::Owner, 1)])
            .unwrap();
        let key = obj.handle_to_key();
        obj.destroy(&cache);
        assert!(!cache.contains(&key));
    }
}
