// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Store Janitor
//!
//! Background task that periodically deletes expired cache entries and rate
//! counters. Readers already ignore expired rows; this only reclaims space.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, the same
//! token that stops in-flight broadcast polls.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RedbStore;

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct StoreJanitor {
    store: RedbStore,
    sweep_interval: Duration,
}

impl StoreJanitor {
    pub fn new(store: RedbStore) -> Self {
        Self {
            store,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(StoreJanitor::new(store.clone()).run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Store janitor starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Store janitor shutting down");
                    return;
                }
            }

            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.purge_expired()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => debug!(removed, "Store janitor purged expired entries"),
            Ok(Err(e)) => warn!(error = %e, "Store janitor sweep failed"),
            Err(e) => warn!(error = %e, "Store janitor task panicked"),
        }
    }
}
