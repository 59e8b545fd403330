// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::blockchain::{NetworkConfig, SolanaRpc};
use crate::crypto::EnvelopeCipher;
use crate::services::{
    BalanceService, BroadcastService, BroadcastSettings, HistoryService, TransferService,
    WalletService,
};
use crate::storage::{RedbStore, SharedStore};

#[derive(Clone)]
pub struct AppState {
    pub wallets: Arc<WalletService>,
    pub transfers: Arc<TransferService>,
    pub broadcasts: Arc<BroadcastService>,
    pub balances: Arc<BalanceService>,
    pub history: Arc<HistoryService>,
    /// Used directly by readiness checks
    pub store: Arc<dyn SharedStore>,
    pub rpc: Arc<dyn SolanaRpc>,
    pub network: NetworkConfig,
    /// Server shutdown; long-running requests derive child tokens from it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<RedbStore>,
        rpc: Arc<dyn SolanaRpc>,
        cipher: EnvelopeCipher,
        settings: BroadcastSettings,
        network: NetworkConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            wallets: Arc::new(WalletService::new(store.clone(), cipher.clone())),
            transfers: Arc::new(TransferService::new(
                store.clone(),
                store.clone(),
                rpc.clone(),
                cipher,
            )),
            broadcasts: Arc::new(BroadcastService::new(store.clone(), rpc.clone(), settings)),
            balances: Arc::new(BalanceService::new(store.clone(), rpc.clone())),
            history: Arc::new(HistoryService::new(rpc.clone())),
            store,
            rpc,
            network,
            shutdown,
        }
    }
}
