// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet services.
//!
//! Each service owns the `Arc`-shared collaborators it needs (key vault,
//! shared store, RPC client, envelope cipher) and exposes one async entry
//! point per operation. HTTP handlers are thin wrappers around these.

pub mod balance;
pub mod broadcast;
pub mod history;
pub mod rate_limit;
pub mod transfer;
pub mod wallets;

#[cfg(test)]
pub(crate) mod testing;

use zeroize::Zeroizing;

use crate::crypto::{EncryptedKeyEnvelope, EnvelopeCipher};
use crate::error::WalletError;

pub use balance::{BalanceResponse, BalanceService, TokenBalance};
pub use broadcast::{
    BroadcastRequest, BroadcastResult, BroadcastService, BroadcastSettings, BroadcastState,
    BroadcastStatus,
};
pub use history::{HistoryResponse, HistoryService};
pub use transfer::{TransferRequest, TransferResponse, TransferService};
pub use wallets::{WalletCreated, WalletService};

/// Seal key material on the blocking pool; scrypt is deliberately slow.
pub(crate) async fn seal(
    cipher: &EnvelopeCipher,
    plaintext: Zeroizing<Vec<u8>>,
) -> Result<EncryptedKeyEnvelope, WalletError> {
    let cipher = cipher.clone();
    tokio::task::spawn_blocking(move || cipher.encrypt(&plaintext))
        .await
        .map_err(|e| WalletError::Internal(format!("encryption task failed: {e}")))?
        .map_err(WalletError::from)
}

/// Open an envelope on the blocking pool.
pub(crate) async fn open(
    cipher: &EnvelopeCipher,
    envelope: EncryptedKeyEnvelope,
) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let cipher = cipher.clone();
    tokio::task::spawn_blocking(move || cipher.decrypt(&envelope))
        .await
        .map_err(|e| WalletError::Internal(format!("decryption task failed: {e}")))?
        .map_err(WalletError::from)
}
