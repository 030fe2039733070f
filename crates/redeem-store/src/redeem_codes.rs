//! Storage for sealed redeem codes.
//!
//! Rows are written only by order verification and only ever hold
//! ciphertext. `seq` preserves the order the reviewer supplied the codes in.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::RedeemCode;
use crate::rows::{bool_col, now, ts, ts_col, uuid_col};

pub(crate) fn insert_code(
    conn: &Connection,
    order_id: Uuid,
    seq: i64,
    ciphertext: &str,
) -> Result<RedeemCode> {
    let code = RedeemCode {
        id: Uuid::new_v4(),
        order_id,
        seq,
        ciphertext: ciphertext.to_string(),
        is_used: false,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO redeem_codes (id, order_id, seq, code, is_used, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            code.id.to_string(),
            code.order_id.to_string(),
            code.seq,
            code.ciphertext,
            ts(&code.created_at),
        ],
    )?;

    Ok(code)
}

/// All codes of an order in issuance order.
pub(crate) fn codes_for_order(conn: &Connection, order_id: Uuid) -> Result<Vec<RedeemCode>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, seq, code, is_used, created_at
         FROM redeem_codes
         WHERE order_id = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![order_id.to_string()], row_to_code)?;

    let mut codes = Vec::new();
    for row in rows {
        codes.push(row?);
    }
    Ok(codes)
}

impl Database {
    /// Sealed codes of an order. Nothing here decrypts.
    pub fn redeem_codes_for_order(&self, order_id: Uuid) -> Result<Vec<RedeemCode>> {
        codes_for_order(self.conn(), order_id)
    }

    pub fn count_redeem_codes(&self, order_id: Uuid) -> Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM redeem_codes WHERE order_id = ?1",
            params![order_id.to_string()],
            |row| row.get(0),
        )?)
    }
}

fn row_to_code(row: &rusqlite::Row<'_>) -> rusqlite::Result<RedeemCode> {
    Ok(RedeemCode {
        id: uuid_col(row, 0)?,
        order_id: uuid_col(row, 1)?,
        seq: row.get(2)?,
        ciphertext: row.get(3)?,
        is_used: bool_col(row, 4)?,
        created_at: ts_col(row, 5)?,
    })
}
