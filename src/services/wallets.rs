// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet creation.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::blockchain::signing::{
    address_of, generate_keypair, generate_recoverable_keypair, keypair_bytes,
    private_key_base58,
};
use crate::crypto::EnvelopeCipher;
use crate::error::WalletError;
use crate::storage::{KeyVault, StoredWallet};

/// Custodial result: the service keeps the only copy of the key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletAddressOnly {
    /// Base58 account address
    pub address: String,
}

/// Result when the caller asked for the key material.
#[derive(Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletWithRecovery {
    pub address: String,
    /// 12-word BIP-39 phrase
    pub seed_phrase: String,
    /// Base58 64-byte keypair
    pub private_key: String,
}

impl std::fmt::Debug for WalletWithRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletWithRecovery")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum WalletCreated {
    AddressOnly(WalletAddressOnly),
    WithRecovery(WalletWithRecovery),
}

impl WalletCreated {
    pub fn address(&self) -> &str {
        match self {
            WalletCreated::AddressOnly(w) => &w.address,
            WalletCreated::WithRecovery(w) => &w.address,
        }
    }
}

pub struct WalletService {
    vault: Arc<dyn KeyVault>,
    cipher: EnvelopeCipher,
}

impl WalletService {
    pub fn new(vault: Arc<dyn KeyVault>, cipher: EnvelopeCipher) -> Self {
        Self { vault, cipher }
    }

    /// Generate, encrypt and store a new keypair.
    ///
    /// With `return_private_key` the key is derived from a fresh mnemonic and
    /// both are returned once; otherwise only the address leaves the service.
    pub async fn create_wallet(
        &self,
        return_private_key: bool,
    ) -> Result<WalletCreated, WalletError> {
        let (keypair, mnemonic) = if return_private_key {
            let generated = generate_recoverable_keypair()?;
            (generated.keypair, Some(generated.mnemonic))
        } else {
            (generate_keypair()?, None)
        };
        let address = address_of(&keypair);

        let plaintext = Zeroizing::new(keypair_bytes(&keypair).to_vec());
        let envelope = super::seal(&self.cipher, plaintext).await?;
        self.vault.put(StoredWallet::new(address, envelope)).await?;

        info!(address = %address, recoverable = mnemonic.is_some(), "Wallet created");

        Ok(match mnemonic {
            Some(mnemonic) => WalletCreated::WithRecovery(WalletWithRecovery {
                address: address.to_string(),
                seed_phrase: mnemonic.to_string(),
                private_key: private_key_base58(&keypair).to_string(),
            }),
            None => WalletCreated::AddressOnly(WalletAddressOnly {
                address: address.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::keypair_from_bytes;
    use crate::blockchain::Pubkey;
    use crate::services::testing::{temp_store, test_cipher};

    #[tokio::test]
    async fn custodial_creation_returns_only_address() {
        let (store, _dir) = temp_store();
        let service = WalletService::new(store.clone(), test_cipher());

        let created = service.create_wallet(false).await.unwrap();
        let WalletCreated::AddressOnly(wallet) = &created else {
            panic!("expected address-only result");
        };

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["address"], wallet.address);

        let address: Pubkey = wallet.address.parse().unwrap();
        assert!(store.get_by_address(&address).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn two_creations_differ() {
        let (store, _dir) = temp_store();
        let service = WalletService::new(store, test_cipher());

        let a = service.create_wallet(false).await.unwrap();
        let b = service.create_wallet(false).await.unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[tokio::test]
    async fn recovery_creation_returns_phrase_and_matching_key() {
        let (store, _dir) = temp_store();
        let cipher = test_cipher();
        let service = WalletService::new(store.clone(), cipher.clone());

        let WalletCreated::WithRecovery(wallet) = service.create_wallet(true).await.unwrap()
        else {
            panic!("expected recovery result");
        };
        assert_eq!(wallet.seed_phrase.split_whitespace().count(), 12);

        let exported = bs58::decode(&wallet.private_key).into_vec().unwrap();
        assert_eq!(exported.len(), 64);
        let exported_key = keypair_from_bytes(&exported).unwrap();
        assert_eq!(address_of(&exported_key).to_string(), wallet.address);

        // The stored envelope opens to the same keypair.
        let stored = store
            .get_by_address(&wallet.address.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        let opened = cipher.decrypt(&stored.envelope).unwrap();
        assert_eq!(opened.as_slice(), exported.as_slice());

        assert!(!format!("{wallet:?}").contains(&wallet.seed_phrase));
    }
}
