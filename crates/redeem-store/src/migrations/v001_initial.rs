//! v001 -- Initial schema creation.
//!
//! Creates `users`, `products`, `orders`, `redeem_codes`, `encryption_keys`
//! and the append-only `stock_logs` ledger.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (principals)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL CHECK (role IN ('customer', 'staff', 'admin')),
    status      TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'suspended')),
    token_hash  TEXT NOT NULL UNIQUE,         -- BLAKE3 hex of the bearer token
    created_at  TEXT NOT NULL                 -- RFC-3339
);

-- ----------------------------------------------------------------
-- Products
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price       INTEGER NOT NULL CHECK (price >= 0),
    stock       INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),  -- ledger projection
    is_active   INTEGER NOT NULL DEFAULT 1,   -- boolean 0/1
    created_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Orders
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS orders (
    id                TEXT PRIMARY KEY NOT NULL,
    user_id           TEXT NOT NULL,
    product_id        TEXT NOT NULL,
    quantity          INTEGER NOT NULL CHECK (quantity > 0),
    total_price       INTEGER NOT NULL CHECK (total_price >= 0),
    status            TEXT NOT NULL DEFAULT 'pending_payment'
                      CHECK (status IN ('pending_payment', 'verified', 'rejected')),
    rejection_reason  TEXT,
    payment_proof_url TEXT,
    reviewed_by       TEXT,
    reviewed_at       TEXT,
    created_at        TEXT NOT NULL,

    FOREIGN KEY (user_id)     REFERENCES users(id),
    FOREIGN KEY (product_id)  REFERENCES products(id),
    FOREIGN KEY (reviewed_by) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_orders_user   ON orders(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status, created_at);

-- ----------------------------------------------------------------
-- Redeem codes (ciphertext only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS redeem_codes (
    id         TEXT PRIMARY KEY NOT NULL,
    order_id   TEXT NOT NULL,
    seq        INTEGER NOT NULL,              -- position in the issued list
    code       TEXT NOT NULL,                 -- base64(nonce || secretbox)
    is_used    INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,

    UNIQUE (order_id, seq),
    FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Per-order key vault
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS encryption_keys (
    id         TEXT PRIMARY KEY NOT NULL,
    order_id   TEXT NOT NULL UNIQUE,          -- at most one key per order
    key_data   TEXT NOT NULL,                 -- base64, see `wrapped`
    wrapped    INTEGER NOT NULL DEFAULT 0,    -- 1 = sealed with the master key
    created_at TEXT NOT NULL,

    FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Stock ledger (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS stock_logs (
    id              TEXT PRIMARY KEY NOT NULL,
    product_id      TEXT NOT NULL,
    quantity_change INTEGER NOT NULL CHECK (quantity_change <> 0),
    reason          TEXT NOT NULL,
    changed_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL,

    FOREIGN KEY (product_id) REFERENCES products(id),
    FOREIGN KEY (changed_by) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_stock_logs_product
    ON stock_logs(product_id, created_at DESC);

CREATE TRIGGER IF NOT EXISTS stock_logs_no_update
    BEFORE UPDATE ON stock_logs
BEGIN
    SELECT RAISE(ABORT, 'stock_logs is append-only');
END;

CREATE TRIGGER IF NOT EXISTS stock_logs_no_delete
    BEFORE DELETE ON stock_logs
BEGIN
    SELECT RAISE(ABORT, 'stock_logs is append-only');
END;
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
