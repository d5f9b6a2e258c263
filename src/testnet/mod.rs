//! Helpers for isolated ledgers, signed transactions and fake peers in tests.

pub mod test_utils;

pub use test_utils::*;
