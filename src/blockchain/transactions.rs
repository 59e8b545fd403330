// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer construction, signing and decoding.
//!
//! Builds native SOL and SPL token transfers, signs them with the held key
//! and returns the wire encoding. Nothing here touches the network: the
//! caller supplies the recent blockhash and any token account lookups.

use std::str::FromStr;

use base64ct::{Base64, Encoding};
use bincode::Options;
use solana_instruction::Instruction;
use solana_keypair::Keypair;
use solana_message::Message;
use solana_packet::PACKET_DATA_SIZE;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use solana_transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use super::types::{Hash, Pubkey, Signature};

#[derive(Debug, thiserror::Error)]
pub enum TxBuildError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no held key matches required signer {0}")]
    MissingSigner(Pubkey),

    #[error("Failed to build instruction: {0}")]
    Instruction(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Failed to encode transaction: {0}")]
    Encoding(String),

    #[error("transaction is {0} bytes, limit is {PACKET_DATA_SIZE}")]
    TooLarge(usize),
}

/// Why submitted bytes are not a usable signed transaction.
#[derive(Debug, thiserror::Error)]
pub enum TxDecodeError {
    #[error("not a transaction: {0}")]
    Encoding(String),

    #[error("invalid transaction layout: {0}")]
    Sanitize(String),

    #[error("signature {0} does not verify")]
    BadSignature(usize),
}

/// A signed, not yet broadcast transaction.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    /// Primary signature (transaction id)
    pub signature: Signature,
    /// Wire encoding
    pub wire: Vec<u8>,
    pub fee_payer: Pubkey,
}

impl SignedTransfer {
    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.wire)
    }
}

/// SPL token transfer parameters resolved by the caller.
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    pub mint: Pubkey,
    /// Sender's token account holding `mint`
    pub source_account: Pubkey,
    /// Amount in base units
    pub amount: u64,
    pub decimals: u8,
}

/// Native transfer paid and signed by `from`.
pub fn build_native_transfer(
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    recent_blockhash: Hash,
    signers: &[&Keypair],
) -> Result<SignedTransfer, TxBuildError> {
    let instructions = [solana_system_interface::instruction::transfer(
        from, to, lamports,
    )];
    sign_and_encode(&instructions, from, recent_blockhash, signers)
}

/// Token transfer from `owner`'s token account to the recipient's associated
/// token account, creating the latter if it does not exist yet.
pub fn build_token_transfer(
    owner: &Pubkey,
    recipient: &Pubkey,
    transfer: &TokenTransfer,
    recent_blockhash: Hash,
    signers: &[&Keypair],
) -> Result<SignedTransfer, TxBuildError> {
    let destination = get_associated_token_address(recipient, &transfer.mint);

    let instructions = [
        create_associated_token_account_idempotent(
            owner,
            recipient,
            &transfer.mint,
            &spl_token::ID,
        ),
        spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &transfer.source_account,
            &transfer.mint,
            &destination,
            owner,
            &[],
            transfer.amount,
            transfer.decimals,
        )
        .map_err(|e| TxBuildError::Instruction(e.to_string()))?,
    ];
    sign_and_encode(&instructions, owner, recent_blockhash, signers)
}

fn sign_and_encode(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    recent_blockhash: Hash,
    signers: &[&Keypair],
) -> Result<SignedTransfer, TxBuildError> {
    let message = Message::new_with_blockhash(instructions, Some(fee_payer), &recent_blockhash);

    let required = usize::from(message.header.num_required_signatures);
    if let Some(missing) = message.account_keys[..required]
        .iter()
        .find(|key| !signers.iter().any(|s| s.pubkey() == **key))
    {
        return Err(TxBuildError::MissingSigner(*missing));
    }

    let mut tx = Transaction::new_unsigned(message);
    tx.try_sign(signers, recent_blockhash)
        .map_err(|e| TxBuildError::Signing(e.to_string()))?;

    let wire = bincode::serialize(&tx).map_err(|e| TxBuildError::Encoding(e.to_string()))?;
    if wire.len() > PACKET_DATA_SIZE {
        return Err(TxBuildError::TooLarge(wire.len()));
    }

    Ok(SignedTransfer {
        signature: tx.signatures[0],
        wire,
        fee_payer: *fee_payer,
    })
}

/// Decode submitted wire bytes into a legacy or v0 transaction.
///
/// The bytes must fit one packet with nothing trailing, the message must
/// sanitize and every required signature must verify against its signer.
pub fn decode_transaction(wire: &[u8]) -> Result<VersionedTransaction, TxDecodeError> {
    let tx: VersionedTransaction = bincode::options()
        .with_limit(PACKET_DATA_SIZE as u64)
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(wire)
        .map_err(|e| TxDecodeError::Encoding(e.to_string()))?;

    tx.sanitize()
        .map_err(|e| TxDecodeError::Sanitize(e.to_string()))?;

    let message = tx.message.serialize();
    for (index, (signature, signer)) in tx
        .signatures
        .iter()
        .zip(tx.message.static_account_keys())
        .enumerate()
    {
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&signer.to_bytes())
            .map_err(|_| TxDecodeError::BadSignature(index))?;
        let raw: [u8; 64] = signature
            .as_ref()
            .try_into()
            .map_err(|_| TxDecodeError::BadSignature(index))?;
        verifying_key
            .verify_strict(&message, &ed25519_dalek::Signature::from_bytes(&raw))
            .map_err(|_| TxDecodeError::BadSignature(index))?;
    }

    Ok(tx)
}

/// A decimal amount that passed syntax checks but is not yet scaled.
///
/// Parsing needs no knowledge of the asset, so callers can reject bad input
/// before looking up the mint's decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount {
    raw: String,
    whole: String,
    fraction: String,
}

impl DecimalAmount {
    /// Check syntax and reject zero.
    ///
    /// Rejects signs, exponents, whitespace and empty integer or fraction
    /// parts.
    pub fn parse(amount: &str) -> Result<Self, TxBuildError> {
        let (whole, fraction) = match amount.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (amount, None),
        };

        let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || fraction.is_some_and(|f| !is_digits(f)) {
            return Err(invalid(amount, "not a non-negative decimal number"));
        }

        let fraction = fraction.unwrap_or("");
        if whole.bytes().chain(fraction.bytes()).all(|b| b == b'0') {
            return Err(invalid(amount, "amount must be greater than zero"));
        }

        Ok(Self {
            raw: amount.to_string(),
            whole: whole.to_string(),
            fraction: fraction.to_string(),
        })
    }

    /// Scale to base units of an asset with `decimals` places.
    ///
    /// Exact integer arithmetic: `"0.1"` with 9 decimals is `100_000_000`.
    pub fn to_base_units(&self, decimals: u8) -> Result<u64, TxBuildError> {
        let width = usize::from(decimals);
        if self.fraction.len() > width {
            return Err(invalid(
                &self.raw,
                &format!("more than {decimals} decimal places"),
            ));
        }

        let overflow = || invalid(&self.raw, "amount too large");
        let scale = 10u128
            .checked_pow(u32::from(decimals))
            .ok_or_else(overflow)?;
        let whole: u128 = self.whole.parse().map_err(|_| overflow())?;
        let fraction_units: u128 = if self.fraction.is_empty() {
            0
        } else {
            format!("{:0<width$}", self.fraction)
                .parse()
                .map_err(|_| overflow())?
        };

        let total = whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction_units))
            .ok_or_else(overflow)?;
        u64::try_from(total).map_err(|_| overflow())
    }
}

impl FromStr for DecimalAmount {
    type Err = TxBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn invalid(amount: &str, reason: &str) -> TxBuildError {
    TxBuildError::InvalidAmount(format!("{reason}: `{amount}`"))
}

/// Parse a human-readable amount into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<u64, TxBuildError> {
    DecimalAmount::parse(amount)?.to_base_units(decimals)
}

/// Format base units as a decimal string without trailing zeros.
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let digits = format!("{amount:0>width$}", width = usize::from(decimals) + 1);
    let (whole, fraction) = digits.split_at(digits.len() - usize::from(decimals));
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::{address_of, generate_keypair};

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyK9u7u";

    fn signed_native(lamports: u64) -> (Keypair, SignedTransfer) {
        let key = generate_keypair().unwrap();
        let from = address_of(&key);
        let signed = build_native_transfer(
            &from,
            &Pubkey::new_from_array([5; 32]),
            lamports,
            Hash::new_from_array([1; 32]),
            &[&key],
        )
        .unwrap();
        (key, signed)
    }

    #[test]
    fn test_parse_amount_fractional_sol() {
        assert_eq!(parse_amount("0.1", 9).unwrap(), 100_000_000);
        assert_eq!(parse_amount("1", 9).unwrap(), 1_000_000_000);
        assert_eq!(parse_amount("0.000000001", 9).unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_usdc() {
        assert_eq!(parse_amount("1.5", 6).unwrap(), 1_500_000);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for input in ["0", "0.0", "abc", "-1", "+1", "", ".", "1.", ".5", "1e9", " 1", "1.2.3"] {
            assert!(
                matches!(parse_amount(input, 9), Err(TxBuildError::InvalidAmount(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_amount_precision_and_overflow() {
        assert!(parse_amount("0.0000000001", 9).is_err());
        assert!(parse_amount("18446744074", 9).is_err());
        assert_eq!(
            parse_amount("18446744073.709551615", 9).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn decimal_syntax_is_checked_without_decimals() {
        assert!(DecimalAmount::parse("0.000").is_err());
        assert!(DecimalAmount::parse("1,5").is_err());

        // Precision depends on the asset, so it is only checked when scaling.
        let amount: DecimalAmount = "0.0000001".parse().unwrap();
        assert!(amount.to_base_units(6).is_err());
        assert_eq!(amount.to_base_units(9).unwrap(), 100);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000_000, 9), "1.5");
        assert_eq!(format_amount(1_000_000, 6), "1");
        assert_eq!(format_amount(1, 9), "0.000000001");
        assert_eq!(format_amount(0, 9), "0");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn native_transfer_is_signed_by_sender() {
        let (key, signed) = signed_native(100_000_000);
        assert_eq!(signed.fee_payer, address_of(&key));

        let decoded = decode_transaction(&signed.wire).unwrap();
        assert_eq!(decoded.signatures[0], signed.signature);

        let instructions = decoded.message.instructions();
        assert_eq!(instructions.len(), 1);
        assert_eq!(&instructions[0].data[..4], &2u32.to_le_bytes());
        assert_eq!(&instructions[0].data[4..], &100_000_000u64.to_le_bytes());
    }

    #[test]
    fn native_transfer_with_wrong_key_is_missing_signer() {
        let held = generate_keypair().unwrap();
        let from = Pubkey::new_from_array([6; 32]);

        let err = build_native_transfer(
            &from,
            &Pubkey::new_from_array([7; 32]),
            1,
            Hash::default(),
            &[&held],
        )
        .unwrap_err();
        assert!(matches!(err, TxBuildError::MissingSigner(k) if k == from));
    }

    #[test]
    fn token_transfer_creates_destination_account_first() {
        let key = generate_keypair().unwrap();
        let owner = address_of(&key);
        let recipient = Pubkey::new_from_array([9; 32]);
        let transfer = TokenTransfer {
            mint: USDC.parse().unwrap(),
            source_account: Pubkey::new_from_array([8; 32]),
            amount: 2_500_000,
            decimals: 6,
        };

        let signed = build_token_transfer(
            &owner,
            &recipient,
            &transfer,
            Hash::new_from_array([2; 32]),
            &[&key],
        )
        .unwrap();
        let decoded = decode_transaction(&signed.wire).unwrap();
        let keys = decoded.message.static_account_keys();
        let instructions = decoded.message.instructions();

        assert_eq!(instructions.len(), 2);
        assert_eq!(
            keys[usize::from(instructions[0].program_id_index)],
            spl_associated_token_account::ID
        );
        assert_eq!(instructions[0].data, vec![1]);

        let token_ix = &instructions[1];
        assert_eq!(keys[usize::from(token_ix.program_id_index)], spl_token::ID);
        assert_eq!(token_ix.data[0], 12);
        assert_eq!(&token_ix.data[1..9], &2_500_000u64.to_le_bytes());
        assert_eq!(token_ix.data[9], 6);

        // The created account and the transfer destination are the same ATA.
        let destination = get_associated_token_address(&recipient, &transfer.mint);
        assert_eq!(keys[usize::from(instructions[0].accounts[1])], destination);
        assert_eq!(keys[usize::from(token_ix.accounts[2])], destination);
        assert_eq!(decoded.message.header().num_required_signatures, 1);
    }

    #[test]
    fn decode_rejects_tampered_truncated_and_trailing_bytes() {
        let (_, signed) = signed_native(5);

        let mut tampered = signed.wire.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(decode_transaction(&tampered).is_err());

        assert!(decode_transaction(&signed.wire[..signed.wire.len() - 3]).is_err());

        let mut trailing = signed.wire.clone();
        trailing.push(0);
        assert!(matches!(
            decode_transaction(&trailing),
            Err(TxDecodeError::Encoding(_))
        ));

        assert!(decode_transaction(&[]).is_err());
    }

    #[test]
    fn decode_rejects_wrong_signature() {
        let (_, signed) = signed_native(5);
        let mut wire = signed.wire.clone();
        // First signature starts after the one-byte signature count.
        wire[1] ^= 0x01;
        assert!(matches!(
            decode_transaction(&wire),
            Err(TxDecodeError::BadSignature(0))
        ));
    }

    #[test]
    fn base64_output_decodes_to_wire() {
        let (_, signed) = signed_native(5);
        let decoded = Base64::decode_vec(&signed.to_base64()).unwrap();
        assert_eq!(decoded, signed.wire);
    }
}
