//! # redeem-store
//!
//! SQLite persistence for redeem-code orders. The crate exposes a
//! synchronous [`Database`] handle wrapping a `rusqlite::Connection` with
//! typed helpers for every domain model, plus the issuance core:
//!
//! - [`KeyVault`]: one symmetric key per order, optionally wrapped with a
//!   master key before it touches disk
//! - the stock ledger: atomic stock mutation with an append-only audit trail
//! - order review: `pending_payment -> verified | rejected`, each transition
//!   applied inside a single `IMMEDIATE` transaction
//! - the redeem code reader: owner-only decryption of issued codes

pub mod database;
pub mod ledger;
pub mod migrations;
pub mod models;
pub mod orders;
pub mod products;
pub mod reader;
pub mod redeem_codes;
pub mod users;
pub mod vault;
pub mod verification;

mod error;
mod rows;

#[cfg(test)]
mod test_support;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use vault::KeyVault;
pub use verification::ReviewDecision;
