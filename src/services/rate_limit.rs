// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window rate limits per operation class.

use std::time::Duration;

use crate::error::WalletError;
use crate::storage::SharedStore;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    /// Subject prefix in the shared store
    pub prefix: &'static str,
    /// Events allowed per window
    pub ceiling: u64,
    pub window: Duration,
}

/// Global broadcast ceiling.
pub const BROADCAST: RateLimitRule = RateLimitRule {
    prefix: "rate:broadcast",
    ceiling: 5,
    window: Duration::from_secs(1),
};

/// Per-sender transfer ceiling.
pub const TRANSFER: RateLimitRule = RateLimitRule {
    prefix: "rate:transfer",
    ceiling: 1,
    window: Duration::from_secs(1),
};

/// Per-address balance reads.
pub const BALANCE: RateLimitRule = RateLimitRule {
    prefix: "rate:balance",
    ceiling: 10,
    window: Duration::from_secs(1),
};

impl RateLimitRule {
    pub fn subject(&self, scope: Option<&str>) -> String {
        match scope {
            Some(scope) => format!("{}:{scope}", self.prefix),
            None => self.prefix.to_string(),
        }
    }

    /// Count one event, failing with [`WalletError::RateLimited`] once the
    /// ceiling is reached.
    pub async fn check(
        &self,
        store: &dyn SharedStore,
        scope: Option<&str>,
    ) -> Result<(), WalletError> {
        let subject = self.subject(scope);
        if store.try_increment(&subject, self.window, self.ceiling).await? {
            Ok(())
        } else {
            tracing::debug!(subject = %subject, "Rate limit exceeded");
            Err(WalletError::RateLimited)
        }
    }
}
