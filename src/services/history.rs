// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signature history for an address, newest first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Pubkey, Signature, SignatureInfo, SolanaRpc};
use crate::error::WalletError;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub address: String,
    pub items: Vec<SignatureInfo>,
}

pub struct HistoryService {
    rpc: Arc<dyn SolanaRpc>,
}

impl HistoryService {
    pub fn new(rpc: Arc<dyn SolanaRpc>) -> Self {
        Self { rpc }
    }

    /// Page through signatures touching `address`. `before` is the last
    /// signature of the previous page.
    pub async fn history(
        &self,
        address: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<HistoryResponse, WalletError> {
        let address: Pubkey = address
            .parse()
            .map_err(|_| WalletError::Validation("invalid address".into()))?;

        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(WalletError::Validation(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }

        let before: Option<Signature> = before
            .filter(|b| !b.is_empty())
            .map(|b| {
                b.parse()
                    .map_err(|_| WalletError::Validation("invalid before signature".into()))
            })
            .transpose()?;

        let items = self
            .rpc
            .get_signatures_for_address(&address, limit, before.as_ref())
            .await?;

        Ok(HistoryResponse {
            address: address.to_string(),
            items,
        })
    }
}
