// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana RPC client.
//!
//! [`SolanaRpc`] is the seam the services talk to; [`RpcClient`] implements
//! it with the nonblocking `solana-rpc-client`. Every method is a single
//! request: retries belong to the caller.

use std::time::Duration;

use async_trait::async_trait;
use solana_commitment_config::CommitmentConfig;
use solana_rpc_client::nonblocking::rpc_client::RpcClient as NodeClient;
use solana_rpc_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_rpc_client_api::client_error::Error as ClientError;
use solana_rpc_client_api::request::TokenAccountsFilter;
use solana_transaction::versioned::VersionedTransaction;
use solana_transaction_status_client_types::TransactionConfirmationStatus;

use super::types::*;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors talking to the RPC node. All of them are retryable from the
/// caller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC request failed: {0}")]
    Request(String),

    #[error("RPC response was invalid: {0}")]
    InvalidResponse(String),
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        RpcError::Request(err.to_string())
    }
}

/// Operations the wallet needs from a Solana node.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Native balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// SPL token accounts owned by `owner`, optionally restricted to one mint,
    /// in `jsonParsed` form.
    async fn get_token_accounts(
        &self,
        owner: &Pubkey,
        mint: Option<&Pubkey>,
    ) -> Result<Vec<RawTokenAccount>, RpcError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Submit a signed transaction; returns its signature.
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError>;

    /// `None` while the node has not seen the signature.
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;

    /// Most recent signatures involving `address`, newest first.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
        before: Option<&Signature>,
    ) -> Result<Vec<SignatureInfo>, RpcError>;

    async fn get_health(&self) -> Result<(), RpcError>;
}

fn commitment_of(status: TransactionConfirmationStatus) -> Commitment {
    match status {
        TransactionConfirmationStatus::Processed => Commitment::Processed,
        TransactionConfirmationStatus::Confirmed => Commitment::Confirmed,
        TransactionConfirmationStatus::Finalized => Commitment::Finalized,
    }
}

/// JSON-RPC over HTTP.
///
/// Reads and blockhashes use `finalized`; preflight simulation on submit
/// uses the same commitment.
pub struct RpcClient {
    endpoint: url::Url,
    node: NodeClient,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Result<Self, RpcError> {
        let endpoint: url::Url = endpoint
            .parse()
            .map_err(|e: url::ParseError| RpcError::InvalidRpcUrl(e.to_string()))?;

        let node = NodeClient::new_with_timeout_and_commitment(
            endpoint.to_string(),
            REQUEST_TIMEOUT,
            CommitmentConfig::finalized(),
        );

        Ok(Self { endpoint, node })
    }

    /// Client for a cluster's default public endpoint.
    pub fn for_network(network: &NetworkConfig) -> Result<Self, RpcError> {
        Self::new(network.rpc_url)
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl SolanaRpc for RpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.node.get_balance(address).await?)
    }

    async fn get_token_accounts(
        &self,
        owner: &Pubkey,
        mint: Option<&Pubkey>,
    ) -> Result<Vec<RawTokenAccount>, RpcError> {
        let filter = match mint {
            Some(mint) => TokenAccountsFilter::Mint(*mint),
            None => TokenAccountsFilter::ProgramId(spl_token::ID),
        };
        let accounts = self.node.get_token_accounts_by_owner(owner, filter).await?;

        accounts
            .into_iter()
            .map(|keyed| {
                let account = serde_json::to_value(&keyed.account)
                    .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
                Ok(RawTokenAccount {
                    pubkey: keyed.pubkey,
                    account,
                })
            })
            .collect()
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
        Ok(self.node.get_latest_blockhash().await?)
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError> {
        Ok(self.node.send_transaction(tx).await?)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let response = self
            .node
            .get_signature_statuses_with_history(&[*signature])
            .await?;

        Ok(response.value.into_iter().next().flatten().map(|status| {
            SignatureStatus {
                slot: status.slot,
                confirmation: status.confirmation_status.map(commitment_of),
                error: status.err.map(|e| e.to_string()),
            }
        }))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
        before: Option<&Signature>,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: before.copied(),
            until: None,
            limit: Some(limit),
            commitment: Some(CommitmentConfig::finalized()),
        };
        let entries = self
            .node
            .get_signatures_for_address_with_config(address, config)
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| SignatureInfo {
                signature: entry.signature,
                slot: entry.slot,
                confirmation_status: entry
                    .confirmation_status
                    .map(|c| commitment_of(c).as_str().to_string()),
                error: entry.err.map(|e| e.to_string()),
                block_time: entry.block_time,
            })
            .collect())
    }

    async fn get_health(&self) -> Result<(), RpcError> {
        Ok(self.node.get_health().await?)
    }
}
