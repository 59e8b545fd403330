// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keypair generation and key material conversions.
//!
//! Keys are ed25519. The persisted form is the 64-byte keypair encoding
//! (`secret seed || public key`), which is also what wallets import as the
//! base58 "private key".

use bip39::Mnemonic;
use ring::rand::{SecureRandom, SystemRandom};
use solana_keypair::Keypair;
use solana_signer::Signer;
use zeroize::Zeroizing;

use super::types::Pubkey;

/// Entropy for a 12-word recovery phrase.
const MNEMONIC_ENTROPY_LEN: usize = 16;

/// Length of the keypair encoding.
pub const KEYPAIR_LEN: usize = 64;

const SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("secure random source unavailable")]
    Randomness,

    #[error("mnemonic generation failed: {0}")]
    Mnemonic(String),

    #[error("invalid keypair bytes")]
    InvalidKeypair,
}

/// Freshly generated key plus its recovery phrase.
pub struct RecoverableKeypair {
    pub keypair: Keypair,
    pub mnemonic: Zeroizing<String>,
}

fn random_seed() -> Result<Zeroizing<[u8; SECRET_LEN]>, SigningError> {
    let mut seed = Zeroizing::new([0u8; SECRET_LEN]);
    SystemRandom::new()
        .fill(seed.as_mut())
        .map_err(|_| SigningError::Randomness)?;
    Ok(seed)
}

/// Generate a keypair from 32 bytes of system randomness.
pub fn generate_keypair() -> Result<Keypair, SigningError> {
    let seed = random_seed()?;
    Ok(Keypair::new_from_array(*seed))
}

/// Generate a keypair together with a 12-word BIP-39 phrase.
///
/// The ed25519 seed is the first 32 bytes of the BIP-39 seed (empty
/// passphrase). This is not SLIP-10 derivation, so the phrase restores the
/// same address only in tools that use the same convention.
pub fn generate_recoverable_keypair() -> Result<RecoverableKeypair, SigningError> {
    let mut entropy = Zeroizing::new([0u8; MNEMONIC_ENTROPY_LEN]);
    SystemRandom::new()
        .fill(entropy.as_mut())
        .map_err(|_| SigningError::Randomness)?;

    let mnemonic = Mnemonic::from_entropy(entropy.as_ref())
        .map_err(|e| SigningError::Mnemonic(e.to_string()))?;
    let keypair = keypair_from_mnemonic(&mnemonic);

    Ok(RecoverableKeypair {
        keypair,
        mnemonic: Zeroizing::new(mnemonic.to_string()),
    })
}

fn keypair_from_mnemonic(mnemonic: &Mnemonic) -> Keypair {
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    secret.copy_from_slice(&seed[..SECRET_LEN]);
    Keypair::new_from_array(*secret)
}

/// Rebuild a key from its 64-byte keypair encoding.
///
/// Fails when the public half does not match the secret half.
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, SigningError> {
    if bytes.len() != KEYPAIR_LEN {
        return Err(SigningError::InvalidKeypair);
    }
    let (secret_half, public_half) = bytes.split_at(SECRET_LEN);

    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    secret.copy_from_slice(secret_half);
    let keypair = Keypair::new_from_array(*secret);

    if keypair.pubkey().as_ref() != public_half {
        return Err(SigningError::InvalidKeypair);
    }
    Ok(keypair)
}

/// 64-byte keypair encoding, wiped on drop.
pub fn keypair_bytes(key: &Keypair) -> Zeroizing<[u8; KEYPAIR_LEN]> {
    Zeroizing::new(key.to_bytes())
}

/// Base58 keypair encoding as imported by wallet software.
pub fn private_key_base58(key: &Keypair) -> Zeroizing<String> {
    Zeroizing::new(bs58::encode(keypair_bytes(key).as_ref()).into_string())
}

/// Account address of a key.
pub fn address_of(key: &Keypair) -> Pubkey {
    key.pubkey()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keypairs_differ() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();
        assert_ne!(address_of(&a), address_of(&b));
    }

    #[test]
    fn recoverable_keypair_has_twelve_words_and_restores() {
        let generated = generate_recoverable_keypair().unwrap();
        assert_eq!(generated.mnemonic.split_whitespace().count(), 12);

        let mnemonic = Mnemonic::parse_normalized(generated.mnemonic.as_str()).unwrap();
        let restored = keypair_from_mnemonic(&mnemonic);
        assert_eq!(address_of(&restored), address_of(&generated.keypair));
    }

    #[test]
    fn keypair_bytes_round_trip() {
        let key = generate_keypair().unwrap();
        let bytes = keypair_bytes(&key);
        let restored = keypair_from_bytes(bytes.as_ref()).unwrap();
        assert_eq!(address_of(&restored), address_of(&key));
    }

    #[test]
    fn keypair_from_bytes_rejects_mismatched_halves() {
        let key = generate_keypair().unwrap();
        let mut bytes = *keypair_bytes(&key);
        bytes[40] ^= 0xff;
        assert!(keypair_from_bytes(&bytes).is_err());
        assert!(keypair_from_bytes(&bytes[..32]).is_err());
    }

    #[test]
    fn private_key_is_base58_of_keypair() {
        let key = generate_keypair().unwrap();
        let encoded = private_key_base58(&key);
        let decoded = bs58::decode(encoded.as_str()).into_vec().unwrap();
        assert_eq!(decoded.as_slice(), keypair_bytes(&key).as_ref());
    }
}
