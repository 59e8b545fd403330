// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use solana_hash::Hash;
pub use solana_pubkey::Pubkey;
pub use solana_signature::Signature;

/// Decimal places of the native asset (1 SOL = 10^9 lamports).
pub const NATIVE_DECIMALS: u8 = 9;

/// Solana cluster configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Cluster name as used by explorers (`devnet`, `testnet`, `mainnet-beta`)
    pub name: &'static str,
    /// Default JSON-RPC endpoint
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

pub const SOLANA_DEVNET: NetworkConfig = NetworkConfig {
    name: "devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com/?cluster=devnet",
};

pub const SOLANA_TESTNET: NetworkConfig = NetworkConfig {
    name: "testnet",
    rpc_url: "https://api.testnet.solana.com",
    explorer_url: "https://explorer.solana.com/?cluster=testnet",
};

pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "mainnet-beta",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

/// Resolve a cluster name to its configuration.
pub fn network_by_name(raw: &str) -> Result<NetworkConfig, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "devnet" => Ok(SOLANA_DEVNET),
        "testnet" => Ok(SOLANA_TESTNET),
        "mainnet" | "mainnet-beta" => Ok(SOLANA_MAINNET),
        other => Err(format!(
            "Unknown Solana network `{other}` (expected devnet, testnet or mainnet-beta)"
        )),
    }
}

/// Commitment levels, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Status of a submitted signature as reported by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// Highest commitment reached, if reported.
    pub confirmation: Option<Commitment>,
    /// Transaction-level error rendered as text.
    pub error: Option<String>,
}

/// Entry of a signature history listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

/// Token account as returned by the provider, before parsing.
#[derive(Debug, Clone)]
pub struct RawTokenAccount {
    /// Token account address (base58)
    pub pubkey: String,
    /// `jsonParsed` account payload
    pub account: serde_json::Value,
}

/// Token holding extracted from a parsed token account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHolding {
    pub token_account: Pubkey,
    pub mint: Pubkey,
    /// Amount in base units
    pub amount: u64,
    pub decimals: u8,
}

impl RawTokenAccount {
    /// Extract the holding from a `jsonParsed` SPL token account.
    ///
    /// Returns `None` for anything that does not look like a token account so
    /// callers can skip it.
    pub fn parse_holding(&self) -> Option<TokenHolding> {
        let info = self
            .account
            .get("data")?
            .get("parsed")?
            .get("info")?;
        let token_amount = info.get("tokenAmount")?;

        Some(TokenHolding {
            token_account: self.pubkey.parse().ok()?,
            mint: info.get("mint")?.as_str()?.parse().ok()?,
            amount: token_amount.get("amount")?.as_str()?.parse().ok()?,
            decimals: u8::try_from(token_amount.get("decimals")?.as_u64()?).ok()?,
        })
    }
}

/// Display metadata for well-known mints.
#[derive(Debug, Clone)]
pub struct KnownToken {
    pub mint: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const KNOWN_TOKENS: &[KnownToken] = &[
    KnownToken {
        mint: "So11111111111111111111111111111111111111112",
        symbol: "SOL",
        name: "Wrapped SOL",
    },
    KnownToken {
        mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyK9u7u",
        symbol: "USDC",
        name: "USD Coin",
    },
];

/// Symbol and name for a mint, `UNKNOWN` when not in [`KNOWN_TOKENS`].
pub fn token_metadata(mint: &str) -> (&'static str, &'static str) {
    KNOWN_TOKENS
        .iter()
        .find(|t| t.mint == mint)
        .map(|t| (t.symbol, t.name))
        .unwrap_or(("UNKNOWN", "Unknown Token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pubkey_rejects_wrong_length_and_alphabet() {
        assert!("abc".parse::<Pubkey>().is_err());
        assert!("0OIl".parse::<Pubkey>().is_err());
        let ok: Pubkey = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".parse().unwrap();
        assert_eq!(ok, spl_token::ID);
    }

    #[test]
    fn network_lookup() {
        assert_eq!(network_by_name("Devnet").unwrap().name, "devnet");
        assert_eq!(network_by_name("mainnet").unwrap().name, "mainnet-beta");
        assert!(network_by_name("localnet").is_err());
    }

    #[test]
    fn commitment_ordering() {
        assert!(Commitment::Finalized > Commitment::Confirmed);
        assert!(Commitment::Confirmed > Commitment::Processed);
    }

    #[test]
    fn parse_holding_from_json_parsed_account() {
        let raw = RawTokenAccount {
            pubkey: spl_token::ID.to_string(),
            account: json!({
                "data": {
                    "parsed": {
                        "info": {
                            "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyK9u7u",
                            "tokenAmount": { "amount": "1500000", "decimals": 6, "uiAmountString": "1.5" }
                        },
                        "type": "account"
                    },
                    "program": "spl-token"
                }
            }),
        };

        let holding = raw.parse_holding().unwrap();
        assert_eq!(holding.amount, 1_500_000);
        assert_eq!(holding.decimals, 6);
        assert_eq!(
            holding.mint.to_string(),
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyK9u7u"
        );
    }

    #[test]
    fn parse_holding_skips_garbage() {
        let raw = RawTokenAccount {
            pubkey: "not-base58!".to_string(),
            account: json!({ "data": ["AAAA", "base64"] }),
        };
        assert!(raw.parse_holding().is_none());
    }

    #[test]
    fn token_metadata_falls_back_to_unknown() {
        assert_eq!(
            token_metadata("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyK9u7u").0,
            "USDC"
        );
        assert_eq!(token_metadata("whatever"), ("UNKNOWN", "Unknown Token"));
    }
}
