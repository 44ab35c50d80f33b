// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fault-injecting key-value store for exercising store error paths
//!
//! [`MockStore`] forwards every call to an inner [`KvStore`], counts calls per
//! operation (`"get"`, `"put"`, `"atomic_increment"`) and fails them according
//! to a [`FailureBehavior`].

use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;
use libc::EIO;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

pub type ErrorFn = Arc<dyn Fn() -> StoreError + Send + Sync>;

/// Predicate receiving `(operation, zero-based call index)`
pub type FaultPredicate = Arc<dyn Fn(&str, u64) -> Option<StoreError> + Send + Sync>;

#[derive(Default)]
pub enum FailureBehavior {
    #[default]
    AlwaysSucceed,

    /// Let `count` calls of `op` through, fail every later one
    FailAfter {
        op: &'static str,
        count: u64,
        error_fn: ErrorFn,
    },

    /// Fail the first `count` calls of `op`
    FailFor {
        op: &'static str,
        count: u64,
        error_fn: ErrorFn,
    },

    AlwaysFail {
        op: &'static str,
        error_fn: ErrorFn,
    },

    Custom(FaultPredicate),
}

pub struct MockStore {
    inner: Arc<dyn KvStore>,
    behavior: Mutex<FailureBehavior>,
    call_counts: Mutex<HashMap<&'static str, u64>>,
}

impl MockStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self::with_behavior(inner, FailureBehavior::AlwaysSucceed)
    }

    pub fn with_behavior(inner: Arc<dyn KvStore>, behavior: FailureBehavior) -> Self {
        Self {
            inner,
            behavior: Mutex::new(behavior),
            call_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_behavior(&self, behavior: FailureBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn call_count(&self, op: &str) -> u64 {
        self.call_counts.lock().get(op).copied().unwrap_or(0)
    }

    pub fn reset_counters(&self) {
        self.call_counts.lock().clear();
    }

    fn check_fault(&self, op: &'static str) -> StoreResult<()> {
        let index = {
            let mut counts = self.call_counts.lock();
            let counter = counts.entry(op).or_insert(0);
            let index = *counter;
            *counter += 1;
            index
        };

        let failure = match &*self.behavior.lock() {
            FailureBehavior::AlwaysSucceed => None,
            FailureBehavior::FailAfter {
                op: target,
                count,
                error_fn,
            } => (op == *target && index >= *count).then(|| error_fn()),
            FailureBehavior::FailFor {
                op: target,
                count,
                error_fn,
            } => (op == *target && index < *count).then(|| error_fn()),
            FailureBehavior::AlwaysFail {
                op: target,
                error_fn,
            } => (op == *target).then(|| error_fn()),
            FailureBehavior::Custom(predicate) => predicate(op, index),
        };

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl KvStore for MockStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check_fault("get")?;
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_fault("put")?;
        self.inner.put(key, value)
    }

    fn atomic_increment(&self, key: &[u8], delta: u128) -> StoreResult<u128> {
        self.check_fault("atomic_increment")?;
        self.inner.atomic_increment(key, delta)
    }
}

pub fn eio_error() -> StoreError {
    StoreError::Io(io::Error::from_raw_os_error(EIO))
}

pub fn unreachable_error() -> StoreError {
    StoreError::Unreachable("injected".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn base() -> Arc<dyn KvStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn counts_calls_per_operation() {
        let mock = MockStore::new(base());
        mock.put(b"k", b"v").unwrap();
        mock.get(b"k").unwrap();
        mock.get(b"k").unwrap();
        assert_eq!(mock.call_count("put"), 1);
        assert_eq!(mock.call_count("get"), 2);
        assert_eq!(mock.call_count("atomic_increment"), 0);

        mock.reset_counters();
        assert_eq!(mock.call_count("get"), 0);
    }

    #[test]
    fn fail_after_lets_leading_calls_through() {
        let mock = MockStore::with_behavior(
            base(),
            FailureBehavior::FailAfter {
                op: "atomic_increment",
                count: 2,
                error_fn: Arc::new(eio_error),
            },
        );
        assert_eq!(mock.atomic_increment(b"c", 1).unwrap(), 0);
        assert_eq!(mock.atomic_increment(b"c", 1).unwrap(), 1);
        assert!(matches!(
            mock.atomic_increment(b"c", 1),
            Err(StoreError::Io(_))
        ));
        // Failed increments never reached the inner store
        assert_eq!(mock.inner.atomic_increment(b"c", 0).unwrap(), 2);
    }

    #[test]
    fn custom_predicate_and_runtime_change() {
        let mock = MockStore::with_behavior(
            base(),
            FailureBehavior::Custom(Arc::new(|op: &str, index: u64| {
                (op == "get" && index % 2 == 1).then(unreachable_error)
            })),
        );
        assert!(mock.get(b"k").is_ok());
        assert!(matches!(mock.get(b"k"), Err(StoreError::Unreachable(_))));
        assert!(mock.get(b"k").is_ok());

        mock.set_behavior(FailureBehavior::AlwaysFail {
            op: "put",
            error_fn: Arc::new(unreachable_error),
        });
        assert!(mock.put(b"k", b"v").is_err());
        assert!(mock.get(b"k").is_ok());
    }
}
