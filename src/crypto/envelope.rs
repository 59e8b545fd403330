// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope encryption for private key material.
//!
//! ## Envelope Layout
//!
//! ```text
//! [salt (8)][nonce (12)][ciphertext || GCM tag (16)]
//! ```
//!
//! The layout is persisted as-is by the key vault and must stay bit-exact:
//! envelopes written by earlier deployments have to keep opening.
//!
//! ## Key Derivation
//!
//! The AES-256-GCM key is derived from the master passphrase with scrypt
//! (N = 32768, r = 8, p = 1). A fresh salt and nonce are drawn from the
//! system RNG for every envelope, so two envelopes of the same key never
//! share ciphertext.

use std::fmt;
use std::sync::Arc;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 8;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Minimum envelope size (salt + nonce).
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// scrypt cost: log2(N) = 15, i.e. N = 32768.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Errors produced by envelope encryption.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Tag mismatch, wrong master key, or truncated envelope.
    #[error("envelope authentication failed")]
    Authentication,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("secure random source unavailable")]
    Randomness,

    #[error("cipher initialisation failed")]
    Cipher,
}

/// Encrypted private key exactly as it is persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedKeyEnvelope(Vec<u8>);

impl EncryptedKeyEnvelope {
    /// Wrap persisted envelope bytes. No validation happens until decryption.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptedKeyEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedKeyEnvelope({} bytes)", self.0.len())
    }
}

/// Process-wide master passphrase.
///
/// Loaded once at startup and injected into [`EnvelopeCipher`]. The backing
/// memory is wiped on drop and the value never appears in `Debug` output.
pub struct MasterKey(Zeroizing<String>);

impl MasterKey {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }

    fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Derive the 32-byte envelope key from a passphrase and salt using the
/// production scrypt parameters.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError> {
    let params = scrypt_params(SCRYPT_LOG_N)?;
    derive_with(passphrase, salt, &params)
}

fn scrypt_params(log_n: u8) -> Result<scrypt::Params, EnvelopeError> {
    scrypt::Params::new(log_n, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| EnvelopeError::KeyDerivation(e.to_string()))
}

fn derive_with(
    passphrase: &[u8],
    salt: &[u8],
    params: &scrypt::Params,
) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase, salt, params, key.as_mut())
        .map_err(|e| EnvelopeError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, EnvelopeError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| EnvelopeError::Cipher)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypts and decrypts key envelopes under the injected master key.
///
/// Cheap to clone; every clone shares the same master key.
#[derive(Clone)]
pub struct EnvelopeCipher {
    master_key: Arc<MasterKey>,
    params: scrypt::Params,
}

impl EnvelopeCipher {
    /// Cipher with the production scrypt cost.
    pub fn new(master_key: MasterKey) -> Result<Self, EnvelopeError> {
        Self::with_cost(master_key, SCRYPT_LOG_N)
    }

    /// Cipher with a custom scrypt cost (`log2(N)`).
    ///
    /// The cost is not recorded in the envelope: envelopes sealed with a
    /// non-default cost only open under a cipher built with the same cost.
    /// Intended for tests.
    pub fn with_cost(master_key: MasterKey, log_n: u8) -> Result<Self, EnvelopeError> {
        Ok(Self {
            master_key: Arc::new(master_key),
            params: scrypt_params(log_n)?,
        })
    }

    /// Seal `plaintext` into a new envelope with fresh salt and nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKeyEnvelope, EnvelopeError> {
        let rng = SystemRandom::new();

        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt).map_err(|_| EnvelopeError::Randomness)?;
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce).map_err(|_| EnvelopeError::Randomness)?;

        let key = derive_with(self.master_key.expose(), &salt, &self.params)?;
        let cipher = aead_key(&key)?;

        let mut sealed = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);

        let mut in_out = plaintext.to_vec();
        let sealed_result = cipher.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::empty(),
            &mut in_out,
        );
        if sealed_result.is_err() {
            zeroize::Zeroize::zeroize(&mut in_out);
            return Err(EnvelopeError::Cipher);
        }
        sealed.extend_from_slice(&in_out);

        Ok(EncryptedKeyEnvelope(sealed))
    }

    /// Open an envelope. Any failure (short input, wrong key, tampering) is
    /// reported as [`EnvelopeError::Authentication`] and yields no plaintext.
    pub fn decrypt(
        &self,
        envelope: &EncryptedKeyEnvelope,
    ) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
        let bytes = envelope.as_bytes();
        if bytes.len() < HEADER_LEN {
            return Err(EnvelopeError::Authentication);
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| EnvelopeError::Authentication)?;

        let key = derive_with(self.master_key.expose(), salt, &self.params)?;
        let cipher = aead_key(&key)?;

        let mut buffer = Zeroizing::new(sealed.to_vec());
        let plaintext_len = cipher
            .open_in_place(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                buffer.as_mut_slice(),
            )
            .map_err(|_| EnvelopeError::Authentication)?
            .len();
        buffer.truncate(plaintext_len);

        Ok(buffer)
    }
}

impl fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("master_key", &self.master_key)
            .field("log_n", &self.params.log_n())
            .finish()
    }
}
