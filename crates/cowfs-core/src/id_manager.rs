// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File identifier allocation against a persistent key-value store
//!
//! The store holds one counter recording the highest identifier handed out
//! so far. It starts at zero, so the null identifier is never produced.
//! Every allocation, single or batched, is exactly one
//! [`KvStore::atomic_increment`] round-trip.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::IdConfig;
use crate::error::{CoreError, CoreResult, StoreError};
use crate::store::{decode_counter, KvStore};
use crate::types::{FileId, FILE_ID_LEN};

/// Allocates file identifiers
pub struct IdManager {
    store: Arc<dyn KvStore>,
    counter_key: Vec<u8>,
    // Serializes allocations issued from this process. Cross-process
    // atomicity comes from the store.
    alloc_lock: Mutex<()>,
}

impl IdManager {
    /// Bind to `store`, creating the allocation counter if it does not exist yet.
    pub fn initialize(store: Arc<dyn KvStore>, config: &IdConfig) -> CoreResult<Self> {
        let manager = Self {
            store,
            counter_key: config.counter_key.as_bytes().to_vec(),
            alloc_lock: Mutex::new(()),
        };
        manager.reinitialize()?;
        Ok(manager)
    }

    /// Re-check the counter. An existing valid counter is left untouched.
    ///
    /// The counter is created by a zero increment, so managers in other
    /// processes racing on a fresh store can never reset it.
    pub fn reinitialize(&self) -> CoreResult<()> {
        let _guard = self.alloc_lock.lock();
        let current = self
            .store
            .atomic_increment(&self.counter_key, 0)
            .inspect_err(|e| {
                tracing::warn!(
                    key = %String::from_utf8_lossy(&self.counter_key),
                    error = %e,
                    "identifier counter is unreadable"
                );
            })?;
        tracing::debug!(
            key = %String::from_utf8_lossy(&self.counter_key),
            counter = %FileId::from_u128(current),
            "identifier counter ready"
        );
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Highest identifier handed out so far (null before the first allocation)
    ///
    /// A value at or above [`FileId::ROOT`] means the identifier space is
    /// exhausted; nothing at or above root was ever handed out.
    pub fn current_counter(&self) -> CoreResult<FileId> {
        let raw = self.store.get(&self.counter_key)?;
        let value = decode_counter(&self.counter_key, raw.as_deref())?;
        Ok(FileId::from_u128(value))
    }

    /// Allocate one identifier
    pub fn generate_identifier(&self) -> CoreResult<FileId> {
        self.reserve(1).map(|batch| batch.first())
    }

    /// Allocate one identifier in its encoded form
    pub fn generate_file_id(&self) -> CoreResult<[u8; FILE_ID_LEN]> {
        self.generate_identifier().map(FileId::to_bytes)
    }

    /// The reserved root identifier. Does not touch the store.
    pub fn get_root_identifier(&self) -> FileId {
        FileId::ROOT
    }

    /// Reserve `n` consecutive identifiers in one store update and return the first.
    ///
    /// `n == 0` is rejected with [`CoreError::ContractViolation`].
    pub fn allocate_batch(&self, n: u64) -> CoreResult<FileId> {
        self.reserve(n).map(|batch| batch.first())
    }

    /// Like [`allocate_batch`](Self::allocate_batch) but hands back the whole range.
    pub fn reserve(&self, n: u64) -> CoreResult<IdBatch> {
        if n == 0 {
            return Err(CoreError::contract("batch size must be positive"));
        }

        let old = {
            let _guard = self.alloc_lock.lock();
            match self.store.atomic_increment(&self.counter_key, u128::from(n)) {
                Ok(old) => old,
                Err(StoreError::CounterOverflow { .. }) => {
                    tracing::error!(count = n, "identifier space exhausted");
                    return Err(CoreError::IdSpaceExhausted);
                }
                Err(e) => return Err(e.into()),
            }
        };

        // The last identifier of the batch must stay below root. Exhaustion
        // is sticky: the counter has already moved past the usable range.
        let last = match old.checked_add(u128::from(n)) {
            Some(last) if last < FileId::ROOT.as_u128() => last,
            _ => {
                tracing::error!(count = n, "identifier space exhausted");
                return Err(CoreError::IdSpaceExhausted);
            }
        };

        let batch = IdBatch {
            next: old + 1,
            end: last + 1,
        };
        tracing::debug!(first = %batch.first(), count = n, "reserved identifiers");
        Ok(batch)
    }
}

/// A reserved run of consecutive identifiers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdBatch {
    next: u128,
    end: u128,
}

impl IdBatch {
    /// Next identifier the batch will yield
    pub fn first(&self) -> FileId {
        FileId::from_u128(self.next)
    }

    pub fn remaining(&self) -> u128 {
        self.end - self.next
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.end
    }
}

impl Iterator for IdBatch {
    type Item = FileId;

    fn next(&mut self) -> Option<FileId> {
        if self.is_exhausted() {
            return None;
        }
        let id = FileId::from_u128(self.next);
        self.next += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (n, usize::try_from(self.remaining()).ok())
    }
}
