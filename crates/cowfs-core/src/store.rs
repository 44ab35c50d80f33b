// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Key-value store backends for CoWFS Core

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::{CoreResult, StoreError, StoreResult};

/// Width of a counter value as stored
pub const COUNTER_LEN: usize = 16;

/// Backing key-value store consumed by the identity manager
///
/// Counter values are 16-byte big-endian integers. An absent key reads as 0.
#[cfg_attr(test, mockall::automock)]
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Add `delta` to the counter under `key` and return the previous value.
    ///
    /// Must be atomic with respect to every other caller sharing the store.
    /// An absent key is created, so a zero `delta` creates a missing counter
    /// without disturbing an existing one. Fails with
    /// [`StoreError::CounterOverflow`] instead of wrapping.
    fn atomic_increment(&self, key: &[u8], delta: u128) -> StoreResult<u128>;
}

/// Decode a stored counter value. `None` means the key is absent.
pub fn decode_counter(key: &[u8], value: Option<&[u8]>) -> StoreResult<u128> {
    match value {
        None => Ok(0),
        Some(bytes) => {
            let raw: [u8; COUNTER_LEN] = bytes.try_into().map_err(|_| {
                StoreError::corrupt(
                    key,
                    format!("counter is {} bytes, expected {COUNTER_LEN}", bytes.len()),
                )
            })?;
            Ok(u128::from_be_bytes(raw))
        }
    }
}

pub fn encode_counter(value: u128) -> [u8; COUNTER_LEN] {
    value.to_be_bytes()
}

fn advance(key: &[u8], old: u128, delta: u128) -> StoreResult<u128> {
    old.checked_add(delta).ok_or_else(|| StoreError::CounterOverflow {
        key: String::from_utf8_lossy(key).into_owned(),
    })
}

/// In-memory store implementation
pub struct InMemoryStore {
    data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.data.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn atomic_increment(&self, key: &[u8], delta: u128) -> StoreResult<u128> {
        let mut data = self.data.lock();
        let old = decode_counter(key, data.get(key).map(Vec::as_slice))?;
        let new = advance(key, old, delta)?;
        data.insert(key.to_vec(), encode_counter(new).to_vec());
        Ok(old)
    }
}

/// SQLite-backed store
///
/// Increments run inside an IMMEDIATE transaction, so every process sharing
/// the database file serializes on SQLite's write lock.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   BLOB PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            );",
        )?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn atomic_increment(&self, key: &[u8], delta: u128) -> StoreResult<u128> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<Vec<u8>> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        let old = decode_counter(key, current.as_deref())?;
        let new = advance(key, old, delta)?;
        tx.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, &encode_counter(new)[..]],
        )?;
        tx.commit()?;
        Ok(old)
    }
}

/// Create a store instance from configuration
pub fn create_store(config: &StoreConfig) -> CoreResult<Arc<dyn KvStore>> {
    match config {
        StoreConfig::InMemory => Ok(Arc::new(InMemoryStore::new())),
        StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}
