// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MASTER_KEY` | Passphrase protecting stored key envelopes | Required |
//! | `DATA_DIR` | Directory holding the redb database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SOLANA_NETWORK` | `devnet`, `testnet` or `mainnet-beta` | `devnet` |
//! | `SOLANA_RPC_URL` | JSON-RPC endpoint override | Network default |
//! | `BROADCAST_POLL_INTERVAL_MS` | Confirmation poll interval | `2000` |
//! | `BROADCAST_TIMEOUT_SECS` | Confirmation poll deadline | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::{network_by_name, NetworkConfig, SOLANA_DEVNET};
use crate::crypto::MasterKey;
use crate::services::broadcast::BroadcastSettings;

pub const MASTER_KEY_ENV: &str = "MASTER_KEY";

/// Directory for the embedded database.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "custody.redb";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

pub const SOLANA_NETWORK_ENV: &str = "SOLANA_NETWORK";
pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";

pub const BROADCAST_POLL_INTERVAL_MS_ENV: &str = "BROADCAST_POLL_INTERVAL_MS";
pub const BROADCAST_TIMEOUT_SECS_ENV: &str = "BROADCAST_TIMEOUT_SECS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug)]
pub struct Config {
    pub master_key: MasterKey,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub poll_interval: Duration,
    pub broadcast_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let master_key = get(MASTER_KEY_ENV)
            .map(MasterKey::new)
            .ok_or(ConfigError::Missing(MASTER_KEY_ENV))?;

        let network = match get(SOLANA_NETWORK_ENV) {
            Some(name) => network_by_name(&name).map_err(|reason| ConfigError::Invalid {
                var: SOLANA_NETWORK_ENV,
                reason,
            })?,
            None => SOLANA_DEVNET,
        };

        let rpc_url = get(SOLANA_RPC_URL_ENV).unwrap_or_else(|| network.rpc_url.to_string());
        url::Url::parse(&rpc_url).map_err(|e| ConfigError::Invalid {
            var: SOLANA_RPC_URL_ENV,
            reason: e.to_string(),
        })?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            master_key,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_number(&get, PORT_ENV, 8080)?,
            network,
            rpc_url,
            poll_interval: Duration::from_millis(parse_number(
                &get,
                BROADCAST_POLL_INTERVAL_MS_ENV,
                2_000,
            )?),
            broadcast_timeout: Duration::from_secs(parse_number(
                &get,
                BROADCAST_TIMEOUT_SECS_ENV,
                30,
            )?),
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            poll_interval: self.poll_interval,
            timeout: self.broadcast_timeout,
            ..BroadcastSettings::default()
        }
    }
}

fn parse_number<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_master_key() {
        let cfg = config(&[("MASTER_KEY", "secret")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.network.name, "devnet");
        assert_eq!(cfg.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.broadcast_timeout, Duration::from_secs(30));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.database_path(), PathBuf::from("./data/custody.redb"));
    }

    #[test]
    fn master_key_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("MASTER_KEY"))));
        assert!(matches!(
            config(&[("MASTER_KEY", "  ")]),
            Err(ConfigError::Missing("MASTER_KEY"))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("MASTER_KEY", "secret"),
            ("SOLANA_NETWORK", "mainnet-beta"),
            ("SOLANA_RPC_URL", "http://127.0.0.1:8899"),
            ("PORT", "9000"),
            ("BROADCAST_POLL_INTERVAL_MS", "250"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.network.name, "mainnet-beta");
        assert_eq!(cfg.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(cfg.bind_address(), "0.0.0.0:9000");
        assert_eq!(cfg.broadcast_settings().poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("MASTER_KEY", "k"), ("PORT", "http")]).is_err());
        assert!(config(&[("MASTER_KEY", "k"), ("SOLANA_NETWORK", "localnet")]).is_err());
        assert!(config(&[("MASTER_KEY", "k"), ("SOLANA_RPC_URL", "not a url")]).is_err());
        assert!(config(&[("MASTER_KEY", "k"), ("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn debug_redacts_master_key() {
        let cfg = config(&[("MASTER_KEY", "hunter2")]).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
