// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for CoWFS Core

use std::io;

/// Failures reported by a backing key-value store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("corrupt value under key {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("counter under key {key} would overflow")]
    CounterOverflow { key: String },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub(crate) fn corrupt(key: &[u8], reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Status codes returned by the attribute layer's ACL registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AclStatus {
    /// Generic rejection
    Error,
    /// The registry's internal state is inconsistent
    InternalError,
    /// The interned entry could not be recorded
    HashSetError,
    /// The registry could not build the ACL object
    InitEntryFailed,
    /// The released ACL is not registered
    NotFound,
}

impl std::fmt::Display for AclStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AclStatus::Error => "error",
            AclStatus::InternalError => "internal error",
            AclStatus::HashSetError => "hash set error",
            AclStatus::InitEntryFailed => "init entry failed",
            AclStatus::NotFound => "not found",
        };
        f.write_str(s)
    }
}

/// Core error type
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("allocation failed: {0}")]
    Allocation(String),
    #[error("acl registry rejected entry: {0}")]
    AclConstruction(AclStatus),
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("identifier space exhausted")]
    IdSpaceExhausted,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        CoreError::ContractViolation(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
