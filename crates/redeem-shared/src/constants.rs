/// Application name
pub const APP_NAME: &str = "Redeem Vault";

/// Secret-box nonce size in bytes (XSalsa20 / XChaCha20)
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Random bytes in a freshly issued API token
pub const TOKEN_BYTES: usize = 32;

/// Maximum payment proof size in bytes (5 MiB)
pub const MAX_PROOF_SIZE: usize = 5 * 1024 * 1024;

/// Content types accepted as payment proof
pub const ALLOWED_PROOF_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Ledger reason recorded for a product's opening stock
pub const INITIAL_STOCK_REASON: &str = "Initial stock";

/// Length of the order id prefix shown in notifications
pub const SHORT_ORDER_ID_LEN: usize = 8;
