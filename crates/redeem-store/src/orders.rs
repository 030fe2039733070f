//! Checkout and order queries.

use redeem_shared::types::{OrderStatus, UserStatus};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Order, OrderSummary, Product};
use crate::products::load_product;
use crate::rows::{enum_col, now, opt_ts_col, opt_uuid_col, or_not_found, ts, ts_col, uuid_col};
use crate::users::load_user;

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.product_id, o.quantity, o.total_price, o.status,
     o.rejection_reason, o.payment_proof_url, o.reviewed_by, o.reviewed_at, o.created_at";

impl Database {
    /// Place an order for `quantity` units. Stock is checked here but only
    /// deducted when the payment is verified.
    pub fn create_order(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<(Order, Product)> {
        if quantity <= 0 {
            return Err(StoreError::Validation("quantity must be positive".into()));
        }

        let tx = self.write_tx()?;
        let user = load_user(&tx, user_id)?;
        if user.status != UserStatus::Active {
            return Err(StoreError::Forbidden("suspended users may not order".into()));
        }

        let product = load_product(&tx, product_id)?;
        if !product.is_active {
            return Err(StoreError::Validation(format!(
                "product {} is not available",
                product.name
            )));
        }
        if quantity > product.stock {
            return Err(StoreError::Validation(format!(
                "only {} left in stock",
                product.stock
            )));
        }
        let total_price = product
            .price
            .checked_mul(quantity)
            .ok_or_else(|| StoreError::Validation("order total overflows".into()))?;

        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            total_price,
            status: OrderStatus::PendingPayment,
            rejection_reason: None,
            payment_proof_url: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now(),
        };

        tx.execute(
            "INSERT INTO orders (id, user_id, product_id, quantity, total_price, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order.id.to_string(),
                order.user_id.to_string(),
                order.product_id.to_string(),
                order.quantity,
                order.total_price,
                order.status.as_str(),
                ts(&order.created_at),
            ],
        )?;
        tx.commit()?;

        tracing::info!(order_id = %order.id, quantity, total_price, "order placed");
        Ok((order, product))
    }

    pub fn get_order(&self, id: Uuid) -> Result<Order> {
        load_order(self.conn(), id)
    }

    /// Order plus product name and customer email.
    pub fn get_order_summary(&self, id: Uuid) -> Result<OrderSummary> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {ORDER_COLUMNS}, p.name, u.email
                     FROM orders o
                     JOIN products p ON p.id = o.product_id
                     JOIN users u ON u.id = o.user_id
                     WHERE o.id = ?1"
                ),
                params![id.to_string()],
                row_to_summary,
            )
            .map_err(or_not_found("order"))
    }

    /// A customer's orders, newest first.
    pub fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderSummary>> {
        self.query_summaries(
            "WHERE o.user_id = ?1 ORDER BY o.created_at DESC, o.rowid DESC",
            Some(user_id),
        )
    }

    /// Review queue: orders awaiting payment verification, oldest first.
    pub fn list_pending_orders(&self) -> Result<Vec<OrderSummary>> {
        self.query_summaries(
            "WHERE o.status = 'pending_payment' ORDER BY o.created_at ASC, o.rowid ASC",
            None,
        )
    }

    /// Record where the customer's payment proof was stored.
    pub fn attach_payment_proof(&mut self, order_id: Uuid, user_id: Uuid, url: &str) -> Result<Order> {
        let tx = self.write_tx()?;
        let order = load_order(&tx, order_id)?;
        if order.user_id != user_id {
            return Err(StoreError::Unauthorized(format!(
                "order {order_id} belongs to another customer"
            )));
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(StoreError::AlreadyFinalized {
                order_id,
                status: order.status,
            });
        }

        tx.execute(
            "UPDATE orders SET payment_proof_url = ?1 WHERE id = ?2",
            params![url, order_id.to_string()],
        )?;
        let order = load_order(&tx, order_id)?;
        tx.commit()?;
        Ok(order)
    }

    fn query_summaries(&self, tail: &str, user_id: Option<Uuid>) -> Result<Vec<OrderSummary>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ORDER_COLUMNS}, p.name, u.email
             FROM orders o
             JOIN products p ON p.id = o.product_id
             JOIN users u ON u.id = o.user_id
             {tail}"
        ))?;

        let rows = match user_id {
            Some(id) => stmt.query_map(params![id.to_string()], row_to_summary)?,
            None => stmt.query_map([], row_to_summary)?,
        };

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }
}

pub(crate) fn load_order(conn: &Connection, id: Uuid) -> Result<Order> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1"),
        params![id.to_string()],
        row_to_order,
    )
    .map_err(or_not_found("order"))
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        product_id: uuid_col(row, 2)?,
        quantity: row.get(3)?,
        total_price: row.get(4)?,
        status: enum_col(row, 5)?,
        rejection_reason: row.get(6)?,
        payment_proof_url: row.get(7)?,
        reviewed_by: opt_uuid_col(row, 8)?,
        reviewed_at: opt_ts_col(row, 9)?,
        created_at: ts_col(row, 10)?,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderSummary> {
    Ok(OrderSummary {
        order: row_to_order(row)?,
        product_name: row.get(11)?,
        customer_email: row.get(12)?,
    })
}
