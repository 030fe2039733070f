//! CRUD operations for [`Product`] records.
//!
//! Stock is deliberately absent from every write here: opening stock is
//! booked through the ledger and later changes go through
//! [`Database::adjust_stock`] or order verification.

use redeem_shared::constants::INITIAL_STOCK_REASON;
use redeem_shared::types::Role;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::ledger;
use crate::models::{NewProduct, Product, ProductUpdate};
use crate::rows::{bool_col, now, or_not_found, ts, ts_col, uuid_col};
use crate::users::require_role;

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, is_active, created_at";

impl Database {
    /// Create a product. A positive `initial_stock` becomes the first ledger
    /// entry so stock and ledger agree from the start.
    pub fn create_product(&mut self, new: &NewProduct, actor: Uuid) -> Result<Product> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("product name must not be empty".into()));
        }
        if new.price < 0 {
            return Err(StoreError::Validation("price must not be negative".into()));
        }
        if new.initial_stock < 0 {
            return Err(StoreError::Validation("initial stock must not be negative".into()));
        }

        let tx = self.write_tx()?;
        require_role(&tx, actor, Role::is_admin, "create products")?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO products (id, name, description, price, stock, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 1, ?5)",
            params![
                id.to_string(),
                name,
                new.description.trim(),
                new.price,
                ts(&now()),
            ],
        )?;

        if new.initial_stock > 0 {
            ledger::apply(&tx, id, new.initial_stock, INITIAL_STOCK_REASON, actor)?;
        }

        let product = load_product(&tx, id)?;
        tx.commit()?;

        tracing::debug!(product_id = %product.id, stock = product.stock, "product created");
        Ok(product)
    }

    pub fn get_product(&self, id: Uuid) -> Result<Product> {
        load_product(self.conn(), id)
    }

    /// List all products, newest first.
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_product)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Update catalog metadata. Stock is not updatable here.
    pub fn update_product(
        &mut self,
        id: Uuid,
        update: &ProductUpdate,
        actor: Uuid,
    ) -> Result<Product> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(StoreError::Validation("product name must not be empty".into()));
            }
        }
        if matches!(update.price, Some(p) if p < 0) {
            return Err(StoreError::Validation("price must not be negative".into()));
        }

        let tx = self.write_tx()?;
        require_role(&tx, actor, Role::is_admin, "update products")?;
        let current = load_product(&tx, id)?;

        tx.execute(
            "UPDATE products SET name = ?1, description = ?2, price = ?3, is_active = ?4
             WHERE id = ?5",
            params![
                update.name.as_deref().map(str::trim).unwrap_or(&current.name),
                update
                    .description
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or(&current.description),
                update.price.unwrap_or(current.price),
                update.is_active.unwrap_or(current.is_active) as i32,
                id.to_string(),
            ],
        )?;

        let product = load_product(&tx, id)?;
        tx.commit()?;
        Ok(product)
    }
}

pub(crate) fn load_product(conn: &Connection, id: Uuid) -> Result<Product> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        params![id.to_string()],
        row_to_product,
    )
    .map_err(or_not_found("product"))
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        stock: row.get(4)?,
        is_active: bool_col(row, 5)?,
        created_at: ts_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn opening_stock_is_booked_in_ledger() {
        let mut fx = Fixture::new(10);
        let product = fx.product.clone();

        assert_eq!(product.stock, 10);
        let logs = fx.db.list_stock_logs(Some(product.id)).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].entry.quantity_change, 10);
        assert_eq!(logs[0].entry.reason, INITIAL_STOCK_REASON);

        let zero = fx
            .db
            .create_product(
                &NewProduct {
                    name: "Empty".into(),
                    description: String::new(),
                    price: 1,
                    initial_stock: 0,
                },
                fx.admin.id,
            )
            .unwrap();
        assert_eq!(zero.stock, 0);
        assert!(fx.db.list_stock_logs(Some(zero.id)).unwrap().is_empty());
    }

    #[test]
    fn only_admin_creates_products() {
        let mut fx = Fixture::new(1);
        let staff = fx.staff.id;
        let err = fx
            .db
            .create_product(
                &NewProduct {
                    name: "Nope".into(),
                    description: String::new(),
                    price: 1,
                    initial_stock: 5,
                },
                staff,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert_eq!(fx.db.list_products().unwrap().len(), 1);
    }

    #[test]
    fn update_keeps_stock() {
        let mut fx = Fixture::new(4);
        let (id, admin) = (fx.product.id, fx.admin.id);

        let updated = fx
            .db
            .update_product(
                id,
                &ProductUpdate {
                    price: Some(2_000),
                    is_active: Some(false),
                    ..Default::default()
                },
                admin,
            )
            .unwrap();

        assert_eq!(updated.price, 2_000);
        assert!(!updated.is_active);
        assert_eq!(updated.stock, 4);
        assert_eq!(updated.name, fx.product.name);
    }

    #[test]
    fn negative_price_rejected() {
        let mut fx = Fixture::new(1);
        let (id, admin) = (fx.product.id, fx.admin.id);
        let err = fx
            .db
            .update_product(
                id,
                &ProductUpdate {
                    price: Some(-1),
                    ..Default::default()
                },
                admin,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
