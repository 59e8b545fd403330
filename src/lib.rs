// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Custody - Custodial Solana Wallet Service
//!
//! Generates keypairs, keeps private keys envelope-encrypted at rest, signs
//! transfers on behalf of their owners and broadcasts signed transactions
//! with idempotency and confirmation tracking.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - Solana keys, transfer building and RPC client
//! - `crypto` - Key envelope encryption (scrypt + AES-256-GCM)
//! - `services` - Wallet, transfer, broadcast, balance and history operations
//! - `storage` - Shared store and key vault (redb)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod services;
pub mod state;
pub mod storage;
