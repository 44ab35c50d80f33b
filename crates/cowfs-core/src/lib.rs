// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! CoWFS Core: file identity allocation and the ACL attribute cache
//!
//! - [`IdManager`] hands out 128-bit [`FileId`]s backed by a [`KvStore`].
//! - [`AclCache`] keeps per-object ACLs keyed by an opaque [`CacheKey`].
//! - [`AttrBridge`] moves ACLs between the cache and [`AttrList`]s.

pub mod acl_cache;
pub mod attrs;
pub mod config;
pub mod error;
pub mod id_manager;
pub mod object;
pub mod store;
pub mod testing;
pub mod types;

#[cfg(test)]
mod test_scenarios;

pub use acl_cache::{AclCache, AclEntryHandle, Insertion};
pub use attrs::{
    AclRegistry, AttrBridge, AttrList, AttrMask, ObjectHandle, RegisteredAcl, SharedAclRegistry,
};
pub use config::{CoreConfig, IdConfig, LoggingConfig, StoreConfig};
pub use error::{AclStatus, CoreError, CoreResult, StoreError, StoreResult};
pub use id_manager::{IdBatch, IdManager};
pub use object::CowObject;
pub use store::{create_store, InMemoryStore, KvStore, SqliteStore};
pub use types::{id_to_string, Ace, AceType, AceWho, Acl, CacheKey, FileId, FILE_ID_LEN};
