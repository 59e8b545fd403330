// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-through balance cache.
//!
//! A miss queries the native balance (required) and the token holdings
//! (best effort). Holdings that fail to parse are skipped one by one, and a
//! failing holdings query degrades to a native-only response.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::rate_limit;
use crate::blockchain::{format_amount, token_metadata, Pubkey, SolanaRpc, NATIVE_DECIMALS};
use crate::error::WalletError;
use crate::storage::SharedStore;

/// How long a balance response is served from cache.
pub const BALANCE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub mint: String,
    pub token_account: String,
    pub symbol: String,
    pub name: String,
    /// Raw amount in base units
    pub amount: String,
    pub decimals: u8,
    /// Amount scaled by `decimals`
    pub ui_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    pub lamports: u64,
    /// Native balance in SOL
    pub sol: String,
    pub tokens: Vec<TokenBalance>,
}

pub struct BalanceService {
    store: Arc<dyn SharedStore>,
    rpc: Arc<dyn SolanaRpc>,
}

impl BalanceService {
    pub fn new(store: Arc<dyn SharedStore>, rpc: Arc<dyn SolanaRpc>) -> Self {
        Self { store, rpc }
    }

    pub async fn get_balance(&self, address: &str) -> Result<BalanceResponse, WalletError> {
        let owner: Pubkey = address
            .parse()
            .map_err(|_| WalletError::Validation("invalid address".into()))?;
        let address = owner.to_string();

        rate_limit::BALANCE
            .check(self.store.as_ref(), Some(&address))
            .await?;

        let cache_key = format!("balance:{address}");
        match self.store.get_json::<BalanceResponse>(&cache_key).await {
            Ok(Some(cached)) => {
                debug!(address = %address, "Balance served from cache");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(address = %address, error = %e, "Balance cache read failed"),
        }

        let response = self.fetch(&owner).await?;

        if let Err(e) = self
            .store
            .set_json(&cache_key, &response, BALANCE_CACHE_TTL)
            .await
        {
            warn!(address = %address, error = %e, "Failed to cache balance");
        }

        Ok(response)
    }

    async fn fetch(&self, owner: &Pubkey) -> Result<BalanceResponse, WalletError> {
        let lamports = self.rpc.get_balance(owner).await?;

        let tokens = match self.rpc.get_token_accounts(owner, None).await {
            Ok(accounts) => accounts
                .iter()
                .filter_map(|raw| {
                    let holding = raw.parse_holding();
                    if holding.is_none() {
                        debug!(token_account = %raw.pubkey, "Skipping unparseable token account");
                    }
                    holding
                })
                .map(|h| {
                    let mint = h.mint.to_string();
                    let (symbol, name) = token_metadata(&mint);
                    TokenBalance {
                        token_account: h.token_account.to_string(),
                        symbol: symbol.to_string(),
                        name: name.to_string(),
                        amount: h.amount.to_string(),
                        decimals: h.decimals,
                        ui_amount: format_amount(h.amount, h.decimals),
                        mint,
                    }
                })
                .collect(),
            Err(e) => {
                warn!(address = %owner, error = %e, "Token holdings unavailable, returning native balance only");
                Vec::new()
            }
        };

        Ok(BalanceResponse {
            address: owner.to_string(),
            lamports,
            sol: format_amount(lamports, NATIVE_DECIMALS),
            tokens,
        })
    }
}
