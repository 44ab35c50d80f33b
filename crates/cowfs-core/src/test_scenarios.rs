// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::sync::Arc;

use crate::config::DEFAULT_COUNTER_KEY;
use crate::store::encode_counter;
use crate::{
    create_store, Ace, AceWho, Acl, AclCache, AclRegistry, AttrBridge, AttrList, AttrMask,
    CacheKey, CoreConfig, CowObject, FileId, IdConfig, IdManager, InMemoryStore, KvStore,
    ObjectHandle, SharedAclRegistry, StoreConfig,
};

#[test]
fn test_counter_and_batch_allocation() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(DEFAULT_COUNTER_KEY.as_bytes(), &encode_counter(0))
        .unwrap();
    let ids = IdManager::initialize(store, &IdConfig::default()).unwrap();

    let id1 = ids.generate_identifier().unwrap();
    assert_eq!(id1, FileId::NULL.successor());
    assert_eq!(ids.current_counter().unwrap().as_u128(), 1);

    let id2 = ids.allocate_batch(5).unwrap();
    assert_eq!(id2, id1.successor());
    assert_eq!(ids.current_counter().unwrap().as_u128(), 6);

    // The reserved range id2..=id2+4 is never handed out again
    let next = ids.generate_identifier().unwrap();
    assert_eq!(next.as_u128(), 7);
}

#[test]
fn test_acl_entry_lifecycle() {
    let cache = AclCache::new();
    let key = CacheKey::from("objA");
    let ace1 = Ace::allow(AceWho::Owner, 0x1);
    let ace2 = Ace::deny(AceWho::Everyone, 0x2);

    let entry = cache.locate_or_create(&key).unwrap();
    assert_eq!(entry.naces(), 0);
    assert_eq!(cache.get_acl(&key), None);

    cache.set_acl(&key, vec![ace1, ace2]).unwrap();
    assert_eq!(cache.get_acl(&key), Some(Acl::new(vec![ace1, ace2])));

    cache.release(&key);
    let fresh = cache.locate_or_create(&key).unwrap();
    assert_eq!(fresh.naces(), 0);
    assert!(!fresh.same_entry(&entry));
}

#[test]
fn test_objects_on_sqlite_store_through_bridge() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = CoreConfig::from_toml_str(&format!(
        "[store]\nmode = \"sqlite\"\npath = \"{}\"\n",
        temp_dir.path().join("ids.db").display()
    ))
    .unwrap();
    assert!(matches!(config.store, StoreConfig::Sqlite { .. }));

    let store = create_store(&config.store).unwrap();
    let ids = IdManager::initialize(store, &config.ids).unwrap();
    let cache = AclCache::new();
    let registry = SharedAclRegistry::new();
    let bridge = AttrBridge::new(&cache, &registry);

    let mut objects: Vec<CowObject> = (0..4)
        .map(|_| CowObject::create(&ids, 0o644).unwrap())
        .collect();
    let aces = vec![Ace::allow(AceWho::User(1000), 0x1f)];

    for obj in objects.iter_mut() {
        let mut incoming = AttrList {
            mask: AttrMask::MODE,
            mode: 0o640,
            acl: Some(registry.new_entry(aces.clone()).unwrap()),
        };
        bridge.store_from(obj, AttrMask::ACL, &mut incoming).unwrap();
        registry.release_entry(incoming.acl.take().unwrap()).unwrap();
        assert_eq!(obj.mode(), 0o640);
    }
    assert_eq!(cache.len(), objects.len());

    let mut fetched = Vec::new();
    for obj in &objects {
        let mut out = AttrList::default();
        bridge.fetch_into(obj, AttrMask::ACL, &mut out).unwrap();
        assert!(out.mask.contains(AttrMask::ACL));
        fetched.push(out.acl.take().unwrap());
    }
    // Identical ACLs share one registry object
    assert_eq!(registry.live_entries(), 1);
    for acl in fetched {
        registry.release_entry(acl).unwrap();
    }
    assert_eq!(registry.live_entries(), 0);

    let victim = objects.remove(0);
    let victim_key = victim.handle_to_key();
    victim.destroy(&cache);
    assert!(!cache.contains(&victim_key));
    assert_eq!(cache.len(), objects.len());

    // A second manager over the same database continues after the last identifier
    let reopened = IdManager::initialize(create_store(&config.store).unwrap(), &config.ids)
        .unwrap();
    let last = objects.iter().map(CowObject::id).max().unwrap();
    assert_eq!(reopened.generate_identifier().unwrap(), last.successor());
}

#[test]
fn test_batch_feeds_object_creation() {
    let ids = IdManager::initialize(Arc::new(InMemoryStore::new()), &IdConfig::default())
        .unwrap();
    let cache = AclCache::new();

    let objects: Vec<CowObject> = ids
        .reserve(16)
        .unwrap()
        .map(|id| CowObject::with_id(id, 0o600))
        .collect();
    for obj in &objects {
        cache.locate_or_create(&obj.handle_to_key()).unwrap();
    }
    assert_eq!(cache.len(), 16);

    let single = CowObject::create(&ids, 0o600).unwrap();
    assert!(objects.iter().all(|o| o.id() != single.id()));
}
