// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction endpoints: sign a transfer, broadcast a signed transaction,
//! list an address's history.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    services::{
        BroadcastRequest, BroadcastResult, HistoryResponse, TransferRequest, TransferResponse,
    },
    state::AppState,
};

/// Build and sign a transfer from a custodied wallet.
///
/// The transaction is signed but not submitted; pass `signedTxBase64` to the
/// broadcast endpoint.
#[utoipa::path(
    post,
    path = "/v1/transactions/transfer",
    tag = "Transactions",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer signed", body = TransferResponse),
        (status = 400, description = "Invalid address, amount or mint", body = crate::error::ErrorBody),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorBody),
        (status = 503, description = "Solana RPC unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let response = state.transfers.transfer(&request).await?;
    Ok(Json(response))
}

/// Submit a signed transaction and wait for finalization.
///
/// Submissions are idempotent per `idempotencyKey` (default: SHA-256 of the
/// transaction bytes). A transaction not finalized within the deadline is
/// reported as `pending`.
#[utoipa::path(
    post,
    path = "/v1/transactions/broadcast",
    tag = "Transactions",
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Broadcast outcome", body = BroadcastResult),
        (status = 400, description = "Invalid encoding or malformed transaction", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorBody)
    )
)]
pub async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResult>, ApiError> {
    // Polling ends with the server. A dropped connection drops this future;
    // the key is claimed before submission, so a retry gets the recorded result.
    let cancel = state.shutdown.child_token();
    let result = state
        .broadcasts
        .broadcast(
            &request.signed_tx_base64,
            request.idempotency_key.as_deref(),
            cancel,
        )
        .await?;
    Ok(Json(result))
}

/// Query parameters for history listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Page size, 1 to 1000
    #[param(default = 20)]
    pub limit: Option<usize>,
    /// Return signatures older than this one
    pub before: Option<String>,
}

/// List recent transaction signatures for an address, newest first.
#[utoipa::path(
    get,
    path = "/v1/transactions/{address}/history",
    tag = "Transactions",
    params(
        ("address" = String, Path, description = "Base58 account address"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Signature history", body = HistoryResponse),
        (status = 400, description = "Invalid address, limit or cursor", body = crate::error::ErrorBody),
        (status = 503, description = "Solana RPC unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let response = state
        .history
        .history(&address, query.limit, query.before.as_deref())
        .await?;
    Ok(Json(response))
}
