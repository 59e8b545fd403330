// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cryptography for keys at rest.
//!
//! Private keys never touch storage in plaintext: they are sealed into an
//! [`EncryptedKeyEnvelope`] under the process master key before the key
//! vault sees them.

pub mod envelope;

pub use envelope::{
    derive_key, EncryptedKeyEnvelope, EnvelopeCipher, EnvelopeError, MasterKey, HEADER_LEN,
};
