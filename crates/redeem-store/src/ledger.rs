//! Stock ledger.
//!
//! A product's `stock` column is a projection of its `stock_logs` rows: every
//! change is a conditional in-place update plus one appended log entry,
//! written together in the caller's transaction. The conditional update
//! (`stock + delta >= 0`) is what serializes concurrent adjustments: SQLite
//! applies it atomically, so two writers can never both act on a stale read.

use redeem_shared::types::Role;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{StockAdjustment, StockLogEntry, StockLogView, StockReconciliation};
use crate::rows::{now, ts, ts_col, uuid_col};
use crate::users::require_role;

/// Apply `delta` to a product's stock and append the matching log entry.
///
/// Fails with [`StoreError::NegativeStock`] without touching anything if the
/// result would drop below zero.
pub(crate) fn apply(
    conn: &Connection,
    product_id: Uuid,
    delta: i64,
    reason: &str,
    actor: Uuid,
) -> Result<StockAdjustment> {
    let updated = conn.execute(
        "UPDATE products SET stock = stock + ?1 WHERE id = ?2 AND stock + ?1 >= 0",
        params![delta, product_id.to_string()],
    )?;

    if updated == 0 {
        let current: Option<i64> = conn
            .query_row(
                "SELECT stock FROM products WHERE id = ?1",
                params![product_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        return Err(match current {
            None => StoreError::NotFound("product"),
            Some(current) => StoreError::NegativeStock {
                product_id,
                current,
                delta,
            },
        });
    }

    let new_stock: i64 = conn.query_row(
        "SELECT stock FROM products WHERE id = ?1",
        params![product_id.to_string()],
        |row| row.get(0),
    )?;

    let entry = StockLogEntry {
        id: Uuid::new_v4(),
        product_id,
        quantity_change: delta,
        reason: reason.to_string(),
        changed_by: actor,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO stock_logs (id, product_id, quantity_change, reason, changed_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.to_string(),
            entry.product_id.to_string(),
            entry.quantity_change,
            entry.reason,
            entry.changed_by.to_string(),
            ts(&entry.created_at),
        ],
    )?;

    tracing::debug!(
        product_id = %product_id,
        delta,
        new_stock,
        "stock adjusted"
    );

    Ok(StockAdjustment { entry, new_stock })
}

impl Database {
    /// Manual stock adjustment by an admin.
    pub fn adjust_stock(
        &mut self,
        product_id: Uuid,
        delta: i64,
        reason: &str,
        actor: Uuid,
    ) -> Result<StockAdjustment> {
        let reason = reason.trim();
        if delta == 0 {
            return Err(StoreError::Validation("quantity change must not be zero".into()));
        }
        if reason.is_empty() {
            return Err(StoreError::Validation("a reason is required".into()));
        }

        let tx = self.write_tx()?;
        require_role(&tx, actor, Role::is_admin, "adjust stock")?;
        let adjustment = apply(&tx, product_id, delta, reason, actor)?;
        tx.commit()?;

        Ok(adjustment)
    }

    /// Ledger entries, newest first, optionally for one product.
    pub fn list_stock_logs(&self, product_id: Option<Uuid>) -> Result<Vec<StockLogView>> {
        let mut stmt = self.conn().prepare(
            "SELECT l.id, l.product_id, l.quantity_change, l.reason, l.changed_by, l.created_at,
                    p.name, u.name
             FROM stock_logs l
             JOIN products p ON p.id = l.product_id
             JOIN users u ON u.id = l.changed_by
             WHERE ?1 IS NULL OR l.product_id = ?1
             ORDER BY l.created_at DESC, l.rowid DESC",
        )?;

        let rows = stmt.query_map(params![product_id.map(|id| id.to_string())], |row| {
            Ok(StockLogView {
                entry: row_to_entry(row)?,
                product_name: row.get(6)?,
                changed_by_name: row.get(7)?,
            })
        })?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }

    /// Compare a product's stock with the sum of its ledger deltas.
    pub fn reconcile_stock(&mut self, product_id: Uuid) -> Result<StockReconciliation> {
        let tx = self.read_tx()?;
        let stock: i64 = tx
            .query_row(
                "SELECT stock FROM products WHERE id = ?1",
                params![product_id.to_string()],
                |row| row.get(0),
            )
            .map_err(crate::rows::or_not_found("product"))?;
        let ledger_total: i64 = tx.query_row(
            "SELECT COALESCE(SUM(quantity_change), 0) FROM stock_logs WHERE product_id = ?1",
            params![product_id.to_string()],
            |row| row.get(0),
        )?;
        tx.commit()?;

        if stock != ledger_total {
            tracing::error!(
                product_id = %product_id,
                stock,
                ledger_total,
                "stock does not match ledger"
            );
        }

        Ok(StockReconciliation {
            product_id,
            stock,
            ledger_total,
            consistent: stock == ledger_total,
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StockLogEntry> {
    Ok(StockLogEntry {
        id: uuid_col(row, 0)?,
        product_id: uuid_col(row, 1)?,
        quantity_change: row.get(2)?,
        reason: row.get(3)?,
        changed_by: uuid_col(row, 4)?,
        created_at: ts_col(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn adjust_appends_one_entry() {
        let mut fx = Fixture::new(10);
        let (pid, admin) = (fx.product.id, fx.admin.id);

        let adj = fx.db.adjust_stock(pid, 5, "restock", admin).unwrap();
        assert_eq!(adj.new_stock, 15);
        assert_eq!(adj.entry.quantity_change, 5);
        assert_eq!(adj.entry.reason, "restock");
        assert_eq!(adj.entry.changed_by, admin);

        let logs = fx.db.list_stock_logs(Some(pid)).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].entry, adj.entry);
        assert_eq!(logs[0].changed_by_name, fx.admin.name);
        assert!(fx.db.reconcile_stock(pid).unwrap().consistent);
    }

    #[test]
    fn negative_stock_is_refused() {
        let mut fx = Fixture::new(3);
        let (pid, admin) = (fx.product.id, fx.admin.id);

        let err = fx.db.adjust_stock(pid, -4, "shrinkage", admin).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NegativeStock { current: 3, delta: -4, .. }
        ));
        assert_eq!(fx.db.get_product(pid).unwrap().stock, 3);
        assert_eq!(fx.db.list_stock_logs(Some(pid)).unwrap().len(), 1);

        // Exactly down to zero is allowed.
        assert_eq!(fx.db.adjust_stock(pid, -3, "sold out", admin).unwrap().new_stock, 0);
    }

    #[test]
    fn validation_and_role_checked_before_writing() {
        let mut fx = Fixture::new(3);
        let (pid, admin, staff) = (fx.product.id, fx.admin.id, fx.staff.id);

        assert!(matches!(
            fx.db.adjust_stock(pid, 0, "noop", admin).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            fx.db.adjust_stock(pid, 1, "   ", admin).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            fx.db.adjust_stock(pid, 1, "restock", staff).unwrap_err(),
            StoreError::Forbidden(_)
        ));
        assert!(matches!(
            fx.db.adjust_stock(Uuid::new_v4(), 1, "restock", admin).unwrap_err(),
            StoreError::NotFound("product")
        ));
        assert_eq!(fx.db.get_product(pid).unwrap().stock, 3);
    }

    #[test]
    fn ledger_rows_cannot_be_rewritten() {
        let fx = Fixture::new(3);
        let res = fx
            .db
            .conn()
            .execute("UPDATE stock_logs SET quantity_change = 100", []);
        assert!(res.is_err());
        let res = fx.db.conn().execute("DELETE FROM stock_logs", []);
        assert!(res.is_err());
    }

    #[test]
    fn concurrent_adjustments_do_not_lose_updates() {
        const WORKERS: usize = 8;

        let fx = Fixture::new(WORKERS as i64 / 2);
        let path = fx.db.path().unwrap();
        let (pid, admin) = (fx.product.id, fx.admin.id);
        let barrier = Arc::new(Barrier::new(WORKERS));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut db = Database::open_at(&path).unwrap();
                    barrier.wait();
                    db.adjust_stock(pid, -1, "sale", admin)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::NegativeStock { .. })))
            .count();

        assert_eq!(ok, WORKERS / 2);
        assert_eq!(refused, WORKERS / 2);

        let mut db = Database::open_at(&path).unwrap();
        assert_eq!(db.get_product(pid).unwrap().stock, 0);
        let rec = db.reconcile_stock(pid).unwrap();
        assert!(rec.consistent);
        assert_eq!(rec.ledger_total, 0);
    }
}
