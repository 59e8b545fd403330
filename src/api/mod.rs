// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::SignatureInfo,
    error::ErrorBody,
    services::{
        balance::TokenBalance,
        wallets::{WalletAddressOnly, WalletWithRecovery},
        BalanceResponse, BroadcastRequest, BroadcastResult, BroadcastStatus, HistoryResponse,
        TransferRequest, TransferResponse, WalletCreated,
    },
    state::AppState,
};

pub mod balance;
pub mod health;
pub mod transactions;
pub mod wallets;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallets", post(wallets::create_wallet))
        .route(
            "/wallets/{address}/balance",
            get(balance::get_wallet_balance),
        )
        .route("/transactions/transfer", post(transactions::transfer))
        .route("/transactions/broadcast", post(transactions::broadcast))
        .route(
            "/transactions/{address}/history",
            get(transactions::history),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        wallets::create_wallet,
        balance::get_wallet_balance,
        transactions::transfer,
        transactions::broadcast,
        transactions::history
    ),
    components(
        schemas(
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            wallets::CreateWalletRequest,
            WalletCreated,
            WalletAddressOnly,
            WalletWithRecovery,
            BalanceResponse,
            TokenBalance,
            TransferRequest,
            TransferResponse,
            BroadcastRequest,
            BroadcastResult,
            BroadcastStatus,
            HistoryResponse,
            SignatureInfo
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Wallets", description = "Custodial wallet creation and balances"),
        (name = "Transactions", description = "Transfer signing, broadcast and history")
    )
)]
struct ApiDoc;
