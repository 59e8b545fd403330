// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance query endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::ApiError, services::BalanceResponse, state::AppState};

/// Get the native and SPL token balances of an address.
///
/// Responses are cached for five minutes per address.
#[utoipa::path(
    get,
    path = "/v1/wallets/{address}/balance",
    tag = "Wallets",
    params(
        ("address" = String, Path, description = "Base58 account address")
    ),
    responses(
        (status = 200, description = "Balance retrieved", body = BalanceResponse),
        (status = 400, description = "Invalid address", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorBody),
        (status = 503, description = "Solana RPC unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.get_balance(&address).await?;
    Ok(Json(balance))
}
