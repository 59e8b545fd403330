// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles shared by the service and API tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use solana_keypair::Keypair;
use solana_transaction::versioned::VersionedTransaction;

use crate::blockchain::signing::address_of;
use crate::blockchain::transactions::build_native_transfer;
use crate::blockchain::*;
use crate::crypto::{EnvelopeCipher, MasterKey};
use crate::storage::RedbStore;

pub fn temp_store() -> (Arc<RedbStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(&dir.path().join("services.redb")).unwrap();
    (Arc::new(store), dir)
}

/// Low-cost cipher; same envelope layout as production.
pub fn test_cipher() -> EnvelopeCipher {
    EnvelopeCipher::with_cost(MasterKey::new("test master key"), 10).unwrap()
}

/// Wire bytes of a signed native transfer from `key`.
pub fn signed_transfer_bytes(key: &Keypair, lamports: u64) -> Vec<u8> {
    build_native_transfer(
        &address_of(key),
        &Pubkey::new_from_array([3; 32]),
        lamports,
        Hash::new_from_array([1; 32]),
        &[key],
    )
    .unwrap()
    .wire
}

/// `jsonParsed` token account as returned by `getTokenAccountsByOwner`.
pub fn token_account(pubkey: Pubkey, mint: &str, amount: u64, decimals: u8) -> RawTokenAccount {
    RawTokenAccount {
        pubkey: pubkey.to_string(),
        account: json!({
            "data": {
                "program": "spl-token",
                "parsed": {
                    "type": "account",
                    "info": {
                        "mint": mint,
                        "tokenAmount": { "amount": amount.to_string(), "decimals": decimals }
                    }
                }
            }
        }),
    }
}

/// Scriptable [`SolanaRpc`] that counts every call.
#[derive(Default)]
pub struct MockRpc {
    /// `None` makes `get_balance` fail
    pub balance: Option<u64>,
    /// `None` makes `get_token_accounts` fail
    pub token_accounts: Option<Vec<RawTokenAccount>>,
    pub send_fails: bool,
    /// Latency of every submission
    pub send_delay: Option<Duration>,
    /// Popped per status lookup; `Err(())` is a transient failure. Empty
    /// means the node has not seen the signature.
    pub statuses: Mutex<VecDeque<Result<Option<SignatureStatus>, ()>>>,
    pub history: Vec<SignatureInfo>,

    pub calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl MockRpc {
    pub fn with_statuses(statuses: Vec<Result<Option<SignatureStatus>, ()>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn down() -> RpcError {
    RpcError::Request("connection refused".into())
}

#[async_trait]
impl SolanaRpc for MockRpc {
    async fn get_balance(&self, _address: &Pubkey) -> Result<u64, RpcError> {
        self.record();
        self.balance.ok_or_else(down)
    }

    async fn get_token_accounts(
        &self,
        _owner: &Pubkey,
        mint: Option<&Pubkey>,
    ) -> Result<Vec<RawTokenAccount>, RpcError> {
        self.record();
        let accounts = self.token_accounts.clone().ok_or_else(down)?;
        Ok(match mint {
            Some(mint) => accounts
                .into_iter()
                .filter(|a| {
                    a.parse_holding()
                        .map(|h| h.mint == *mint)
                        .unwrap_or(false)
                })
                .collect(),
            None => accounts,
        })
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.record();
        Ok(Hash::new_from_array([7; 32]))
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError> {
        self.record();
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.send_fails {
            return Err(RpcError::Request(
                "RPC response error -32002: Transaction simulation failed: insufficient funds"
                    .into(),
            ));
        }
        tx.signatures
            .first()
            .copied()
            .ok_or_else(|| RpcError::InvalidResponse("unsigned transaction".into()))
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        self.record();
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None));
        next.map_err(|_| down())
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Pubkey,
        limit: usize,
        _before: Option<&Signature>,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.record();
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn get_health(&self) -> Result<(), RpcError> {
        self.record();
        Ok(())
    }
}
