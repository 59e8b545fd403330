// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage
//!
//! Two seams sit here:
//!
//! - [`SharedStore`]: atomic fixed-window counters and TTL'd cache entries,
//!   used for rate limiting, broadcast idempotency and the balance cache.
//! - [`KeyVault`]: encrypted key envelopes by wallet address.
//!
//! Both are implemented by [`RedbStore`], an embedded redb database. Every
//! primitive runs in a single serializable write transaction, so concurrent
//! requests coordinate through the database rather than through locks held
//! by the application.
//!
//! ## Key Namespaces
//!
//! | Key | Use |
//! |-----|-----|
//! | `rate:broadcast` | global broadcast ceiling |
//! | `rate:transfer:{address}` | per-sender transfer ceiling |
//! | `rate:balance:{address}` | per-address balance reads |
//! | `idempotency:{key}` | cached broadcast result |
//! | `balance:{address}` | cached balance response |

pub mod database;
pub mod janitor;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::blockchain::Pubkey;
use crate::crypto::EncryptedKeyEnvelope;

pub use database::{RedbStore, StoreError, StoreResult};
pub use janitor::StoreJanitor;

/// Cross-request coordination primitives.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Count one event for `subject` in the current fixed window of length
    /// `window`. Returns `false`, without counting, once `ceiling` events were
    /// already recorded in this window.
    async fn try_increment(
        &self,
        subject: &str,
        window: Duration,
        ceiling: u64,
    ) -> StoreResult<bool>;

    /// Unexpired cache entry, if any.
    async fn get_cached(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    async fn set_cached(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()>;

    /// Store `value` under `key` for `ttl` only if no unexpired entry exists.
    /// Returns `None` when stored, otherwise the entry that holds the key.
    /// Exactly one of several concurrent callers stores its value.
    async fn insert_cached_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> StoreResult<Option<Vec<u8>>>;

    /// Write/read round trip used by readiness checks.
    async fn ping(&self) -> StoreResult<()>;
}

impl dyn SharedStore {
    /// Cached entry decoded from JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_cached(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Cache `value` as JSON.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set_cached(key, &bytes, ttl).await
    }

    /// JSON form of [`SharedStore::insert_cached_if_absent`]: `None` when
    /// `value` was stored, otherwise the current holder of `key`.
    pub async fn claim_json<T: Serialize + DeserializeOwned + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StoreResult<Option<T>> {
        let bytes = serde_json::to_vec(value)?;
        match self.insert_cached_if_absent(key, &bytes, ttl).await? {
            Some(existing) => Ok(Some(serde_json::from_slice(&existing)?)),
            None => Ok(None),
        }
    }
}

/// A custodial wallet as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWallet {
    pub address: Pubkey,
    /// Encrypted 64-byte keypair
    pub envelope: EncryptedKeyEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredWallet {
    pub fn new(address: Pubkey, envelope: EncryptedKeyEnvelope) -> Self {
        let now = Utc::now();
        Self {
            address,
            envelope,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Encrypted key storage.
#[async_trait]
pub trait KeyVault: Send + Sync {
    /// Persist a new wallet. Fails with [`StoreError::Conflict`] if the
    /// address already exists; existing envelopes are never overwritten.
    async fn put(&self, wallet: StoredWallet) -> StoreResult<()>;

    async fn get_by_address(&self, address: &Pubkey) -> StoreResult<Option<StoredWallet>>;
}
