// Pending value transfers. The pool only admits transactions that carry a positive
// amount and a signature; checking that the signature belongs to the sender is the
// wallet's job, not this layer's.

use crate::error::{NodeError, Result};
use crate::utils::{current_timestamp, sha256_hex};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Base units per coin.
pub const UNITS_PER_COIN: u64 = 100_000_000;

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: String,
    sender: String,
    receiver: String,
    amount: u64,
    fee: u64,
    timestamp: i64,
    signature: Option<String>,
}

impl Transaction {
    /// Build an unsigned transaction stamped with the current time.
    pub fn new(sender: &str, receiver: &str, amount: u64, fee: u64) -> Result<Transaction> {
        Ok(Self::with_timestamp(
            sender,
            receiver,
            amount,
            fee,
            current_timestamp()?,
        ))
    }

    pub fn with_timestamp(
        sender: &str,
        receiver: &str,
        amount: u64,
        fee: u64,
        timestamp: i64,
    ) -> Transaction {
        Transaction {
            id: Self::generate_id(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            fee,
            timestamp,
            signature: None,
        }
    }

    // Ids are opaque: a digest of a random UUID, not of the transaction body.
    fn generate_id() -> String {
        sha256_hex(Uuid::new_v4().to_string().as_bytes())
    }

    /// Bytes the wallet signs. Excludes the signature itself.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}{}{}",
            self.id, self.sender, self.receiver, self.amount, self.fee, self.timestamp
        )
        .into_bytes()
    }

    pub fn set_signature(&mut self, signature: String) {
        self.signature = Some(signature);
    }

    /// Pool admission rule: positive amount and a non-empty signature.
    pub fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(NodeError::InvalidTransaction(format!(
                "transaction {} has a zero amount",
                self.id
            )));
        }
        match self.signature.as_deref() {
            Some(sig) if !sig.is_empty() => Ok(()),
            _ => Err(NodeError::InvalidTransaction(format!(
                "transaction {} is not signed",
                self.id
            ))),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Canonical text folded into the block hash.
    pub fn canonical_text(&self) -> String {
        format!(
            "Transaction(txid={}, sender={}, receiver={}, amount={}, fee={}, timestamp={}, signature={})",
            self.id,
            self.sender,
            self.receiver,
            self.amount,
            self.fee,
            self.timestamp,
            self.signature.as_deref().unwrap_or("")
        )
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_receiver(&self) -> &str {
        self.receiver.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_fee(&self) -> u64 {
        self.fee
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {}.{:08} (fee {}.{:08}) [{}]",
            self.sender,
            self.receiver,
            self.amount / UNITS_PER_COIN,
            self.amount % UNITS_PER_COIN,
            self.fee / UNITS_PER_COIN,
            self.fee % UNITS_PER_COIN,
            self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const BOB: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

    #[test]
    fn test_ids_are_unique_hex() {
        let a = Transaction::with_timestamp(ALICE, BOB, 50, 1, 1_234_567_890);
        let b = Transaction::with_timestamp(ALICE, BOB, 50, 1, 1_234_567_890);
        assert_ne!(a.get_id(), b.get_id());
        assert_eq!(a.get_id().len(), 64);
        assert!(a.get_id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unsigned_transaction_is_invalid() {
        let tx = Transaction::with_timestamp(ALICE, BOB, 50, 1, 1_234_567_890);
        assert!(matches!(
            tx.validate(),
            Err(NodeError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_zero_amount_is_invalid_even_when_signed() {
        let mut tx = Transaction::with_timestamp(ALICE, BOB, 0, 1, 1_234_567_890);
        tx.set_signature("signed".to_string());
        assert!(!tx.is_valid());
    }

    #[test]
    fn test_empty_signature_is_invalid() {
        let mut tx = Transaction::with_timestamp(ALICE, BOB, 10, 0, 1_234_567_890);
        tx.set_signature(String::new());
        assert!(!tx.is_valid());
    }

    #[test]
    fn test_signed_positive_transaction_is_valid() {
        let mut tx = Transaction::with_timestamp(ALICE, BOB, 10, 0, 1_234_567_890);
        tx.set_signature("signed".to_string());
        assert!(tx.is_valid());
        assert_eq!(tx.get_signature(), Some("signed"));
    }

    #[test]
    fn test_signing_payload_ignores_signature() {
        let mut tx = Transaction::with_timestamp(ALICE, BOB, 10, 0, 1_234_567_890);
        let before = tx.signing_payload();
        tx.set_signature("sig".to_string());
        assert_eq!(before, tx.signing_payload());
    }

    #[test]
    fn test_canonical_text_changes_with_signature() {
        let mut tx = Transaction::with_timestamp(ALICE, BOB, 10, 0, 1_234_567_890);
        let unsigned = tx.canonical_text();
        tx.set_signature("sig".to_string());
        assert_ne!(unsigned, tx.canonical_text());
    }

    #[test]
    fn test_display_formats_coins() {
        let tx = Transaction::with_timestamp(ALICE, BOB, 150_000_000, 1_000, 0);
        let text = tx.to_string();
        assert!(text.contains(": 1.50000000 "));
        assert!(text.contains("(fee 0.00001000)"));
    }
}
