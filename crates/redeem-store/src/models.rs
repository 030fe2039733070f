//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer. Ciphertext and key material never appear in a serialized model.

use chrono::{DateTime, Utc};
use redeem_shared::types::{OrderStatus, Role, UserStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A principal that can call the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Admin-side change of a user's role or status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Unit price in whole currency units.
    pub price: i64,
    /// Current stock; only ever changed through the ledger.
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub total_price: i64,
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
    pub payment_proof_url: Option<String>,
    /// Staff member who moved the order to a terminal state.
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An order joined with the names a reviewer or customer needs to see.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub product_name: String,
    pub customer_email: String,
}

// ---------------------------------------------------------------------------
// Redeem code
// ---------------------------------------------------------------------------

/// A sealed redeem code. The plaintext is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemCode {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Position in the list the reviewer supplied.
    pub seq: i64,
    /// `base64(nonce || secretbox)`.
    pub ciphertext: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

/// Decrypted codes for a verified order, in issuance order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DecryptedCodes {
    pub order_id: Uuid,
    pub codes: Vec<String>,
    pub quantity: i64,
    pub product_name: String,
    pub order_date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Stock ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLogEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity_change: i64,
    pub reason: String,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StockLogView {
    #[serde(flatten)]
    pub entry: StockLogEntry,
    pub product_name: String,
    pub changed_by_name: String,
}

/// Result of one ledger write.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StockAdjustment {
    pub entry: StockLogEntry,
    pub new_stock: i64,
}

/// Current stock compared against the sum of its ledger deltas.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StockReconciliation {
    pub product_id: Uuid,
    pub stock: i64,
    pub ledger_total: i64,
    pub consistent: bool,
}

// ---------------------------------------------------------------------------
// Review outcomes
// ---------------------------------------------------------------------------

/// Everything a verification committed, for the caller to report and notify.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub order: Order,
    pub product_name: String,
    pub customer_email: String,
    pub codes_issued: usize,
    pub stock: StockAdjustment,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectionOutcome {
    pub order: Order,
    pub customer_email: String,
}

/// Result of [`Database::review_order`](crate::Database::review_order).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Verified(VerificationOutcome),
    Rejected(RejectionOutcome),
}

impl ReviewOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReviewOutcome::Verified(v) => &v.order,
            ReviewOutcome::Rejected(r) => &r.order,
        }
    }
}
