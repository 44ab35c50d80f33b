// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute get/set bridge between the ACL cache and generic attribute lists

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::acl_cache::AclCache;
use crate::error::{AclStatus, CoreError, CoreResult};
use crate::types::{Ace, Acl, CacheKey};

/// Attribute bitmask
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AttrMask(u64);

impl AttrMask {
    pub const TYPE: AttrMask = AttrMask(1 << 0);
    pub const SIZE: AttrMask = AttrMask(1 << 1);
    pub const FILEID: AttrMask = AttrMask(1 << 2);
    pub const MODE: AttrMask = AttrMask(1 << 3);
    pub const OWNER: AttrMask = AttrMask(1 << 4);
    pub const GROUP: AttrMask = AttrMask(1 << 5);
    pub const ATIME: AttrMask = AttrMask(1 << 6);
    pub const MTIME: AttrMask = AttrMask(1 << 7);
    pub const CTIME: AttrMask = AttrMask(1 << 8);
    pub const ACL: AttrMask = AttrMask(1 << 9);

    pub const fn empty() -> Self {
        AttrMask(0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: AttrMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: AttrMask) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: AttrMask) {
        self.0 &= !other.0;
    }
}

impl BitOr for AttrMask {
    type Output = AttrMask;

    fn bitor(self, rhs: AttrMask) -> AttrMask {
        AttrMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for AttrMask {
    fn bitor_assign(&mut self, rhs: AttrMask) {
        self.insert(rhs);
    }
}

/// ACL object owned by the attribute layer's registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredAcl(Arc<Acl>);

impl RegisteredAcl {
    pub fn aces(&self) -> &[Ace] {
        &self.0.aces
    }

    pub fn naces(&self) -> usize {
        self.0.naces()
    }

    pub fn acl(&self) -> &Acl {
        &self.0
    }
}

/// Registry of ACL objects handed to attribute consumers
#[cfg_attr(test, mockall::automock)]
pub trait AclRegistry: Send + Sync {
    fn new_entry(&self, aces: Vec<Ace>) -> Result<RegisteredAcl, AclStatus>;

    fn release_entry(&self, acl: RegisteredAcl) -> Result<(), AclStatus>;
}

/// Registry that interns identical ACLs and reference-counts them
#[derive(Default)]
pub struct SharedAclRegistry {
    entries: Mutex<HashMap<Acl, (Arc<Acl>, usize)>>,
}

impl SharedAclRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ACLs currently registered
    pub fn live_entries(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn ref_count(&self, acl: &Acl) -> usize {
        self.entries.lock().get(acl).map(|(_, refs)| *refs).unwrap_or(0)
    }
}

impl AclRegistry for SharedAclRegistry {
    fn new_entry(&self, aces: Vec<Ace>) -> Result<RegisteredAcl, AclStatus> {
        let acl = Acl::new(aces);
        let mut entries = self.entries.lock();
        let (shared, refs) = entries
            .entry(acl.clone())
            .or_insert_with(|| (Arc::new(acl), 0));
        *refs += 1;
        Ok(RegisteredAcl(shared.clone()))
    }

    fn release_entry(&self, acl: RegisteredAcl) -> Result<(), AclStatus> {
        let mut entries = self.entries.lock();
        let (_, refs) = entries.get_mut(acl.acl()).ok_or(AclStatus::NotFound)?;
        *refs -= 1;
        if *refs == 0 {
            entries.remove(acl.acl());
        }
        Ok(())
    }
}

/// Filesystem object as seen by the bridge
pub trait ObjectHandle {
    /// Opaque key identifying the object within the process
    fn handle_to_key(&self) -> CacheKey;

    fn set_mode(&mut self, mode: u32);
}

/// Generic attribute list exchanged with the dispatch layer
#[derive(Clone, Debug, Default)]
pub struct AttrList {
    pub mask: AttrMask,
    pub mode: u32,
    pub acl: Option<RegisteredAcl>,
}

/// Moves ACLs between the cache and attribute lists
pub struct AttrBridge<'a> {
    cache: &'a AclCache,
    registry: &'a dyn AclRegistry,
}

impl<'a> AttrBridge<'a> {
    pub fn new(cache: &'a AclCache, registry: &'a dyn AclRegistry) -> Self {
        Self { cache, registry }
    }

    /// Attach a copy of the object's cached ACL to `attrs`.
    ///
    /// An object with no cached ACEs gets the ACL bit cleared and nothing
    /// attached. A registry rejection fails the call with
    /// [`CoreError::AclConstruction`]; the cache is unaffected.
    pub fn fetch_into<O>(
        &self,
        obj: &O,
        request_mask: AttrMask,
        attrs: &mut AttrList,
    ) -> CoreResult<()>
    where
        O: ObjectHandle + ?Sized,
    {
        if let Some(stale) = attrs.acl.take() {
            // An attached ACL must not leak.
            if let Err(status) = self.registry.release_entry(stale) {
                tracing::error!(%status, "failed to release previously attached acl");
            }
        }

        let key = obj.handle_to_key();
        let entry = self.cache.locate_or_create(&key)?;
        let aces = entry.copy_aces();
        if aces.is_empty() {
            attrs.mask.remove(AttrMask::ACL);
            return Ok(());
        }

        tracing::trace!(key = ?key, request = ?request_mask, naces = aces.len(), "fetching acl");
        let acl = self.registry.new_entry(aces).map_err(|status| {
            tracing::warn!(key = ?key, %status, "acl registry rejected cached acl");
            CoreError::AclConstruction(status)
        })?;
        attrs.acl = Some(acl);
        attrs.mask.insert(AttrMask::ACL);
        Ok(())
    }

    /// Replace the object's cached ACL with the one carried by `attrs`.
    ///
    /// No-op unless `request_mask` asks for the ACL and `attrs` carries one.
    pub fn store_from<O>(
        &self,
        obj: &mut O,
        request_mask: AttrMask,
        attrs: &mut AttrList,
    ) -> CoreResult<()>
    where
        O: ObjectHandle + ?Sized,
    {
        if !request_mask.contains(AttrMask::ACL) {
            return Ok(());
        }
        let Some(acl) = attrs.acl.as_ref() else {
            return Ok(());
        };

        let key = obj.handle_to_key();
        tracing::trace!(key = ?key, naces = acl.naces(), "storing acl");
        self.cache.set_acl(&key, acl.aces().to_vec())?;

        if attrs.mask.contains(AttrMask::MODE) {
            obj.set_mode(attrs.mode);
        }
        attrs.mask.insert(AttrMask::ACL);
        Ok(())
    }
}
