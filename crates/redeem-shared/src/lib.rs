//! # redeem-shared
//!
//! Vocabulary shared by the store and the HTTP server: the redeem-code
//! cipher, vault key wrapping, roles and statuses, and the notification
//! templates.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod notification;
pub mod types;

pub use error::{CryptoError, ParseEnumError};
