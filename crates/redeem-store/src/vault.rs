//! Per-order key vault.
//!
//! Each verified order owns exactly one 32-byte key, generated at
//! verification time and stored in `encryption_keys`. With a master key
//! configured the stored form is wrapped (XChaCha20-Poly1305, order id as
//! associated data); without one it is plain base64 and the `wrapped` flag
//! stays 0. A wrapped row is never silently treated as plain.

use std::fmt;

use redeem_shared::crypto::{self, SymmetricKey};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{is_unique_violation, now, ts};

#[derive(Clone, Default)]
pub struct KeyVault {
    master: Option<SymmetricKey>,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("wrapping", &self.is_wrapping())
            .finish()
    }
}

impl KeyVault {
    pub fn new(master: Option<SymmetricKey>) -> Self {
        Self { master }
    }

    pub fn is_wrapping(&self) -> bool {
        self.master.is_some()
    }

    /// Store the key for `order_id`. A second key for the same order fails
    /// with [`StoreError::DuplicateKey`] and leaves the first untouched.
    pub(crate) fn store_key(
        &self,
        conn: &Connection,
        order_id: Uuid,
        key: &SymmetricKey,
    ) -> Result<()> {
        let (key_data, wrapped) = match &self.master {
            Some(master) => (crypto::wrap_key(master, &order_id, key)?, true),
            None => (crypto::encode_key(key), false),
        };

        conn.execute(
            "INSERT INTO encryption_keys (id, order_id, key_data, wrapped, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                order_id.to_string(),
                key_data,
                wrapped as i32,
                ts(&now()),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey(order_id)
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        Ok(())
    }

    /// Fetch the key for `order_id`, or [`StoreError::KeyNotFound`].
    pub(crate) fn retrieve_key(&self, conn: &Connection, order_id: Uuid) -> Result<SymmetricKey> {
        let row: Option<(String, bool)> = conn
            .query_row(
                "SELECT key_data, wrapped FROM encryption_keys WHERE order_id = ?1",
                params![order_id.to_string()],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()?;

        let (key_data, wrapped) = row.ok_or(StoreError::KeyNotFound(order_id))?;

        match (wrapped, &self.master) {
            (true, Some(master)) => Ok(crypto::unwrap_key(master, &order_id, &key_data)?),
            (true, None) => Err(StoreError::Integrity(format!(
                "key for order {order_id} is wrapped but no master key is configured"
            ))),
            (false, _) => Ok(crypto::decode_key(&key_data)?),
        }
    }
}

impl Database {
    pub fn key_exists(&self, order_id: Uuid) -> Result<bool> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM encryption_keys WHERE order_id = ?1",
            params![order_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}
