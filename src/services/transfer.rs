// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Build and sign transfers from custodied wallets.
//!
//! Signing only: the signed transaction is returned to the caller, who
//! submits it through the broadcast endpoint.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::rate_limit::{self, RateLimitRule};
use crate::blockchain::signing::{address_of, keypair_from_bytes};
use crate::blockchain::transactions::{build_native_transfer, build_token_transfer};
use crate::blockchain::{DecimalAmount, Pubkey, SolanaRpc, TokenTransfer, NATIVE_DECIMALS};
use crate::crypto::EnvelopeCipher;
use crate::error::WalletError;
use crate::storage::{KeyVault, SharedStore};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Custodied sender address
    pub from_address: String,
    pub to_address: String,
    /// Decimal amount in whole units (SOL, or the token's units)
    pub amount: String,
    /// SPL token mint; omitted for native SOL
    #[serde(default)]
    pub mint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    /// Transaction id
    pub signature: String,
    pub signed_tx_base64: String,
    pub fee_payer: String,
}

pub struct TransferService {
    vault: Arc<dyn KeyVault>,
    store: Arc<dyn SharedStore>,
    rpc: Arc<dyn SolanaRpc>,
    cipher: EnvelopeCipher,
    rate_limit: RateLimitRule,
}

/// What is being moved, resolved from the request before any lookups.
enum Asset {
    /// Lamports
    Native(u64),
    /// The amount is scaled once the mint's decimals are known
    Token { mint: Pubkey, amount: DecimalAmount },
}

fn parse_address(field: &str, raw: &str) -> Result<Pubkey, WalletError> {
    raw.trim()
        .parse()
        .map_err(|_| WalletError::Validation(format!("invalid {field}")))
}

impl TransferService {
    pub fn new(
        vault: Arc<dyn KeyVault>,
        store: Arc<dyn SharedStore>,
        rpc: Arc<dyn SolanaRpc>,
        cipher: EnvelopeCipher,
    ) -> Self {
        Self {
            vault,
            store,
            rpc,
            cipher,
            rate_limit: rate_limit::TRANSFER,
        }
    }

    /// Replace the per-sender transfer limit.
    pub fn with_rate_limit(mut self, rule: RateLimitRule) -> Self {
        self.rate_limit = rule;
        self
    }

    pub async fn transfer(&self, req: &TransferRequest) -> Result<TransferResponse, WalletError> {
        let from = parse_address("fromAddress", &req.from_address)?;
        let to = parse_address("toAddress", &req.to_address)?;
        let amount = DecimalAmount::parse(req.amount.trim())?;
        let asset = match req.mint.as_deref().map(str::trim) {
            Some(mint) if !mint.is_empty() => Asset::Token {
                mint: parse_address("mint", mint)?,
                amount,
            },
            _ => Asset::Native(amount.to_base_units(NATIVE_DECIMALS)?),
        };

        self.rate_limit
            .check(self.store.as_ref(), Some(&from.to_string()))
            .await?;

        let stored = self
            .vault
            .get_by_address(&from)
            .await?
            .ok_or(WalletError::WalletNotFound)?;
        let key_bytes = super::open(&self.cipher, stored.envelope).await?;
        let keypair = keypair_from_bytes(&key_bytes)?;
        if address_of(&keypair) != from {
            return Err(WalletError::Internal(format!(
                "stored key does not match wallet {from}"
            )));
        }

        let (signed, mint) = match asset {
            Asset::Token { mint, amount } => {
                let holding = self
                    .rpc
                    .get_token_accounts(&from, Some(&mint))
                    .await?
                    .iter()
                    .find_map(|raw| raw.parse_holding())
                    .ok_or_else(|| {
                        WalletError::Validation(format!("no token account for mint {mint}"))
                    })?;
                let transfer = TokenTransfer {
                    mint,
                    source_account: holding.token_account,
                    amount: amount.to_base_units(holding.decimals)?,
                    decimals: holding.decimals,
                };
                let blockhash = self.rpc.get_latest_blockhash().await?;
                let signed =
                    build_token_transfer(&from, &to, &transfer, blockhash, &[&keypair])?;
                (signed, Some(mint))
            }
            Asset::Native(lamports) => {
                let blockhash = self.rpc.get_latest_blockhash().await?;
                let signed =
                    build_native_transfer(&from, &to, lamports, blockhash, &[&keypair])?;
                (signed, None)
            }
        };

        info!(
            from = %from,
            to = %to,
            mint = ?mint.map(|m| m.to_string()),
            signature = %signed.signature,
            "Transfer signed"
        );

        Ok(TransferResponse {
            signature: signed.signature.to_string(),
            signed_tx_base64: signed.to_base64(),
            fee_payer: signed.fee_payer.to_string(),
        })
    }
}
