use redeem_shared::types::OrderStatus;
use redeem_shared::CryptoError;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// Cipher or key-wrapping failure. Always an integrity problem.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The principal does not own the resource.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The principal lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Expected exactly {expected} redeem codes, got {actual}")]
    QuantityMismatch { expected: i64, actual: usize },

    #[error("A rejection reason is required")]
    MissingReason,

    #[error("Stock cannot be negative: product {product_id} has {current}, change {delta}")]
    NegativeStock {
        product_id: Uuid,
        current: i64,
        delta: i64,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A second key was offered for an order that already has one.
    #[error("Encryption key already exists for order {0}")]
    DuplicateKey(Uuid),

    #[error("Order {order_id} is already {status}")]
    AlreadyFinalized { order_id: Uuid, status: OrderStatus },

    #[error("Encryption key not found for order {0}")]
    KeyNotFound(Uuid),

    #[error("Redeem codes for order {order_id} are not available while it is {status}")]
    NotReady { order_id: Uuid, status: OrderStatus },

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

impl StoreError {
    /// Data-integrity failures: never downgraded, never retried.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            StoreError::Crypto(_) | StoreError::KeyNotFound(_) | StoreError::Integrity(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
