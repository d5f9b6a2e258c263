//! Wallets: key generation, addresses and signing
//!
//! The node core never looks inside a wallet. It only receives a signed
//! transaction or a reward address produced here.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_from_pub_key_hash, hash_pub_key, validate_address, verify, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::{Wallets, WALLET_FILE};
