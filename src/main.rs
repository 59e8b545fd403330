// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relational_custody::{
    api::router,
    blockchain::RpcClient,
    config::{Config, LogFormat},
    crypto::EnvelopeCipher,
    state::AppState,
    storage::{RedbStore, StoreJanitor},
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_address();
    let settings = config.broadcast_settings();
    let store = Arc::new(RedbStore::open(&config.database_path())?);
    let rpc = Arc::new(RpcClient::new(&config.rpc_url)?);
    let cipher = EnvelopeCipher::new(config.master_key)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(StoreJanitor::new(store.as_ref().clone()).run(shutdown.clone()));

    let state = AppState::new(
        store,
        rpc,
        cipher,
        settings,
        config.network.clone(),
        shutdown.clone(),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        network = config.network.name,
        rpc = %config.rpc_url,
        "Relational Custody listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
