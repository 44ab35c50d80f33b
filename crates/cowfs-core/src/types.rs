// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for CoWFS

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult};

/// Width of an encoded [`FileId`] in bytes
pub const FILE_ID_LEN: usize = 16;

/// 128-bit file identifier
///
/// Ordering and equality follow the numeric value of `(hi, lo)`. The encoded
/// form is always 16 bytes: big-endian `hi` followed by big-endian `lo`,
/// regardless of host byte order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub hi: u64,
    pub lo: u64,
}

impl FileId {
    /// The invalid identifier. Never handed out by the allocator.
    pub const NULL: FileId = FileId { hi: 0, lo: 0 };

    /// Reserved identifier of the filesystem root.
    pub const ROOT: FileId = FileId {
        hi: u64::MAX,
        lo: u64::MAX,
    };

    pub const fn new(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }

    pub const fn from_u128(value: u128) -> Self {
        Self {
            hi: (value >> 64) as u64,
            lo: value as u64,
        }
    }

    pub const fn as_u128(self) -> u128 {
        ((self.hi as u128) << 64) | self.lo as u128
    }

    pub const fn is_null(self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    pub const fn is_root(self) -> bool {
        self.hi == Self::ROOT.hi && self.lo == Self::ROOT.lo
    }

    /// Next identifier in allocation order.
    ///
    /// Carries from `lo` into `hi`. Wraps past `u128::MAX`; the allocator
    /// refuses to get anywhere near that point.
    pub const fn successor(self) -> Self {
        Self::from_u128(self.as_u128().wrapping_add(1))
    }

    pub fn checked_add(self, n: u128) -> Option<Self> {
        self.as_u128().checked_add(n).map(Self::from_u128)
    }

    pub fn to_bytes(self) -> [u8; FILE_ID_LEN] {
        let mut buf = [0u8; FILE_ID_LEN];
        buf[..8].copy_from_slice(&self.hi.to_be_bytes());
        buf[8..].copy_from_slice(&self.lo.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; FILE_ID_LEN]) -> Self {
        let mut hi = [0u8; 8];
        let mut lo = [0u8; 8];
        hi.copy_from_slice(&buf[..8]);
        lo.copy_from_slice(&buf[8..]);
        Self {
            hi: u64::from_be_bytes(hi),
            lo: u64::from_be_bytes(lo),
        }
    }

    /// Encode into the first 16 bytes of `buf`.
    pub fn serialize_into(self, buf: &mut [u8]) -> CoreResult<()> {
        let len = buf.len();
        let dst = buf.get_mut(..FILE_ID_LEN).ok_or_else(|| short_buffer(len))?;
        dst.copy_from_slice(&self.to_bytes());
        Ok(())
    }

    /// Decode from the first 16 bytes of `buf`.
    pub fn deserialize(buf: &[u8]) -> CoreResult<Self> {
        let src: &[u8; FILE_ID_LEN] = buf
            .get(..FILE_ID_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| short_buffer(buf.len()))?;
        Ok(Self::from_bytes(src))
    }

    /// Lower 64 bits of an encoded identifier
    pub fn lower_half(buf: &[u8]) -> CoreResult<u64> {
        Self::deserialize(buf).map(|id| id.lo)
    }

    /// Upper 64 bits of an encoded identifier
    pub fn upper_half(buf: &[u8]) -> CoreResult<u64> {
        Self::deserialize(buf).map(|id| id.hi)
    }

    /// Base-10 rendering, for logs and operators. Not meant to be parsed back.
    pub fn to_display_string(self) -> String {
        self.to_string()
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> CoreResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CoreError::contract(format!("invalid hex identifier: {e}")))?;
        if bytes.len() != FILE_ID_LEN {
            return Err(CoreError::contract(format!(
                "identifier must be {FILE_ID_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Self::deserialize(&bytes)
    }
}

fn short_buffer(len: usize) -> CoreError {
    CoreError::contract(format!(
        "identifier buffer holds {len} bytes, need {FILE_ID_LEN}"
    ))
}

/// Base-10 rendering of an encoded identifier buffer
pub fn id_to_string(buf: &[u8]) -> CoreResult<String> {
    FileId::deserialize(buf).map(FileId::to_display_string)
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u128())
    }
}

impl std::fmt::Debug for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileId({:016x}:{:016x})", self.hi, self.lo)
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Opaque ACL cache key derived from an object handle
///
/// Keys order by length first and then byte-wise. The order only balances
/// the index; it says nothing about how objects relate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<u8>);

impl CacheKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Copy `bytes` into a new key, reporting allocation failure instead of aborting.
    pub fn try_from_slice(bytes: &[u8]) -> CoreResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes.len())
            .map_err(|e| CoreError::Allocation(format!("cache key of {} bytes: {e}", bytes.len())))?;
        buf.extend_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn try_clone(&self) -> CoreResult<Self> {
        Self::try_from_slice(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheKey({})", hex::encode(&self.0))
    }
}

impl From<&[u8]> for CacheKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for CacheKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<FileId> for CacheKey {
    fn from(id: FileId) -> Self {
        Self(id.to_bytes().to_vec())
    }
}

/// ACE type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AceType {
    Allow,
    Deny,
    Audit,
    Alarm,
}

/// Principal an ACE applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AceWho {
    Owner,
    OwningGroup,
    Everyone,
    User(u32),
    Group(u32),
}

/// Access control entry. Opaque to the core beyond copying and counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ace {
    pub ace_type: AceType,
    pub flags: u32,
    pub perm: u32,
    pub who: AceWho,
}

impl Ace {
    pub fn allow(who: AceWho, perm: u32) -> Self {
        Self {
            ace_type: AceType::Allow,
            flags: 0,
            perm,
            who,
        }
    }

    pub fn deny(who: AceWho, perm: u32) -> Self {
        Self {
            ace_type: AceType::Deny,
            flags: 0,
            perm,
            who,
        }
    }
}

/// Ordered ACE sequence
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    pub aces: Vec<Ace>,
}

impl Acl {
    pub fn new(aces: Vec<Ace>) -> Self {
        Self { aces }
    }

    pub fn naces(&self) -> usize {
        self.aces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aces.is_empty()
    }
}

impl From<Vec<Ace>> for Acl {
    fn from(aces: Vec<Ace>) -> Self {
        Self::new(aces)
    }
}
