// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Broadcast Orchestrator
//!
//! Submits a client-signed transaction at most once per idempotency key and
//! follows it to a terminal state.
//!
//! ## Flow
//!
//! 1. Global rate limit (`rate:broadcast`).
//! 2. Base64 decode.
//! 3. Idempotency lookup under `idempotency:{key}`; a hit is returned as-is.
//!    The key is the caller's, or the hex SHA-256 of the transaction bytes.
//! 4. Structural decode and signature verification.
//! 5. Claim the key with a provisional `pending` record in one atomic store
//!    write. A request that loses the claim returns the holder's record and
//!    never submits, so concurrent or retried requests submit at most once.
//! 6. Submit. A rejected submission is a terminal `failed` result.
//! 7. Poll the signature status every `poll_interval` until the transaction
//!    fails, reaches the required commitment, or the deadline passes.
//! 8. Overwrite the claim with the final result for `idempotency_ttl`.
//!
//! A timeout is not an error: the result is `pending` and the caller can look
//! the signature up later. Cancellation (client gone, server shutting down)
//! ends polling the same way.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::rate_limit;
use crate::blockchain::{decode_transaction, Commitment, Signature, SolanaRpc};
use crate::error::WalletError;
use crate::storage::SharedStore;

/// Tunables for submission and polling.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    pub poll_interval: Duration,
    /// Polling deadline measured from submission
    pub timeout: Duration,
    /// Commitment at which a transaction counts as confirmed
    pub required_commitment: Commitment,
    /// Retention of idempotency records
    pub idempotency_ttl: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            required_commitment: Commitment::Finalized,
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Outcome returned to the caller and cached under the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    pub signature: String,
    pub status: BroadcastStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lifecycle of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastState {
    Submitted,
    Polling,
    Confirmed { slot: u64 },
    Failed { reason: String },
    TimedOutPending,
}

impl BroadcastState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BroadcastState::Submitted | BroadcastState::Polling)
    }

    pub fn to_result(&self, signature: &Signature) -> BroadcastResult {
        let (status, slot, error) = match self {
            BroadcastState::Confirmed { slot } => (BroadcastStatus::Confirmed, Some(*slot), None),
            BroadcastState::Failed { reason } => {
                (BroadcastStatus::Failed, None, Some(reason.clone()))
            }
            BroadcastState::Submitted
            | BroadcastState::Polling
            | BroadcastState::TimedOutPending => (BroadcastStatus::Pending, None, None),
        };
        BroadcastResult {
            signature: signature.to_string(),
            status,
            slot,
            error,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    /// Signed transaction in standard base64
    pub signed_tx_base64: String,
    /// Defaults to the hex SHA-256 of the transaction bytes
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Effective idempotency key for a submission.
pub fn effective_key(explicit: Option<&str>, tx_bytes: &[u8]) -> String {
    match explicit.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => hex::encode(Sha256::digest(tx_bytes)),
    }
}

pub struct BroadcastService {
    store: Arc<dyn SharedStore>,
    rpc: Arc<dyn SolanaRpc>,
    settings: BroadcastSettings,
}

impl BroadcastService {
    pub fn new(
        store: Arc<dyn SharedStore>,
        rpc: Arc<dyn SolanaRpc>,
        settings: BroadcastSettings,
    ) -> Self {
        Self {
            store,
            rpc,
            settings,
        }
    }

    pub fn settings(&self) -> &BroadcastSettings {
        &self.settings
    }

    pub async fn broadcast(
        &self,
        signed_tx_base64: &str,
        idempotency_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<BroadcastResult, WalletError> {
        rate_limit::BROADCAST
            .check(self.store.as_ref(), None)
            .await?;

        let tx_bytes = Base64::decode_vec(signed_tx_base64.trim())
            .map_err(|_| WalletError::Validation("invalid base64 encoding".into()))?;

        let cache_key = format!("idempotency:{}", effective_key(idempotency_key, &tx_bytes));
        if let Some(cached) = self.store.get_json::<BroadcastResult>(&cache_key).await? {
            debug!(signature = %cached.signature, "Returning recorded broadcast result");
            return Ok(cached);
        }

        let tx = decode_transaction(&tx_bytes)
            .map_err(|e| WalletError::MalformedTransaction(e.to_string()))?;
        let signature = tx.signatures.first().copied().ok_or_else(|| {
            WalletError::MalformedTransaction("transaction carries no signature".into())
        })?;

        let mut state = BroadcastState::Submitted;
        if let Some(holder) = self
            .store
            .claim_json(
                &cache_key,
                &state.to_result(&signature),
                self.settings.idempotency_ttl,
            )
            .await?
        {
            debug!(signature = %holder.signature, "Idempotency key already claimed");
            return Ok(holder);
        }
        debug!(signature = %signature, state = ?state, "Submitting transaction");

        if let Err(e) = self.rpc.send_transaction(&tx).await {
            error!(signature = %signature, error = %e, "Broadcast failed");
            state = BroadcastState::Failed {
                reason: format!("broadcast failed: {e}"),
            };
            let result = state.to_result(&signature);
            self.record(&cache_key, &result).await;
            return Ok(result);
        }

        state = BroadcastState::Polling;
        debug!(signature = %signature, state = ?state, "Transaction accepted");
        state = self.poll(&signature, &cancel).await;

        let result = state.to_result(&signature);
        self.record(&cache_key, &result).await;

        info!(
            signature = %signature,
            status = ?result.status,
            slot = ?result.slot,
            "Transaction broadcast"
        );

        Ok(result)
    }

    /// Poll until a terminal state. Never returns `Submitted` or `Polling`.
    async fn poll(&self, signature: &Signature, cancel: &CancellationToken) -> BroadcastState {
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            let lookup = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(signature = %signature, "Polling cancelled, result pending");
                    return BroadcastState::TimedOutPending;
                }
                lookup = tokio::time::timeout_at(deadline, self.rpc.get_signature_status(signature)) => lookup,
            };

            match lookup {
                Err(_) => break,
                Ok(Err(e)) => {
                    warn!(signature = %signature, error = %e, "Signature status lookup failed, retrying");
                }
                Ok(Ok(None)) => {}
                Ok(Ok(Some(status))) => {
                    if let Some(err) = status.error {
                        return BroadcastState::Failed {
                            reason: format!("tx failed: {err}"),
                        };
                    }
                    if status
                        .confirmation
                        .is_some_and(|c| c >= self.settings.required_commitment)
                    {
                        return BroadcastState::Confirmed { slot: status.slot };
                    }
                    debug!(signature = %signature, confirmation = ?status.confirmation, "Awaiting commitment");
                }
            }

            let next = (Instant::now() + self.settings.poll_interval).min(deadline);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(signature = %signature, "Polling cancelled, result pending");
                    return BroadcastState::TimedOutPending;
                }
                _ = tokio::time::sleep_until(next) => {}
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        info!(signature = %signature, "Confirmation deadline passed, result pending");
        BroadcastState::TimedOutPending
    }

    /// Replace the claim with an outcome. The submission already happened,
    /// so a failed write is logged rather than surfaced; the claim then
    /// stays `pending`.
    async fn record(&self, cache_key: &str, result: &BroadcastResult) {
        if let Err(e) = self
            .store
            .set_json(cache_key, result, self.settings.idempotency_ttl)
            .await
        {
            warn!(key = %cache_key, error = %e, "Failed to record broadcast result");
        }
    }
}
