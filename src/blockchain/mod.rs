// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana integration.
//!
//! This module provides:
//! - Keypair generation and key material encodings
//! - Native and SPL token transfer building, signing and decoding
//! - The RPC collaborator used for reads and submission

pub mod client;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{RpcClient, RpcError, SolanaRpc};
pub use transactions::{
    decode_transaction, format_amount, parse_amount, DecimalAmount, SignedTransfer,
    TokenTransfer, TxBuildError, TxDecodeError,
};
pub use types::*;
