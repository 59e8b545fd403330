// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet creation endpoint.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::ApiError, services::WalletCreated, state::AppState};

/// Request to create a new custodial wallet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    /// Also return a 12-word recovery phrase and the private key. The key
    /// material is shown only in this response.
    #[serde(default)]
    pub return_private_key: bool,
}

/// Create a wallet.
///
/// The keypair is generated server-side, encrypted under the master key and
/// stored. By default only the address is returned.
#[utoipa::path(
    post,
    path = "/v1/wallets",
    tag = "Wallets",
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created", body = WalletCreated),
        (status = 400, description = "Invalid request body"),
        (status = 500, description = "Key generation or storage failed", body = crate::error::ErrorBody)
    )
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<WalletCreated>), ApiError> {
    let created = state
        .wallets
        .create_wallet(request.return_private_key)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
