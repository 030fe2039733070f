//! Order review: the `pending_payment -> verified | rejected` state machine.
//!
//! A verification is one `IMMEDIATE` transaction covering the key, every
//! sealed code, the stock decrement with its ledger entry and the status
//! change. The reviewer's role and the order's status are re-read inside
//! that transaction, so a second reviewer racing on the same order blocks on
//! the write lock and then sees a terminal status.

use redeem_shared::crypto::{encrypt_code, generate_key};
use redeem_shared::types::{OrderStatus, Role};
use rusqlite::{params, Connection};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::ledger;
use crate::models::{Order, RejectionOutcome, ReviewOutcome, VerificationOutcome};
use crate::orders::load_order;
use crate::redeem_codes::insert_code;
use crate::rows::{now, ts};
use crate::users::require_role;
use crate::vault::KeyVault;

/// What a reviewer decided about a payment proof.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewDecision {
    Verified { codes: Vec<String> },
    Rejected { reason: String },
}

impl ReviewDecision {
    pub fn target(&self) -> OrderStatus {
        match self {
            ReviewDecision::Verified { .. } => OrderStatus::Verified,
            ReviewDecision::Rejected { .. } => OrderStatus::Rejected,
        }
    }
}

/// Only `pending_payment` moves, and only to a terminal state.
fn check_transition(order: &Order, to: OrderStatus) -> Result<()> {
    if order.status.is_terminal() {
        return Err(StoreError::AlreadyFinalized {
            order_id: order.id,
            status: order.status,
        });
    }
    if !to.is_terminal() {
        return Err(StoreError::Validation(format!(
            "cannot move order {} to {to}",
            order.id
        )));
    }
    Ok(())
}

pub(crate) fn verified_reason(order_id: Uuid) -> String {
    format!("Order #{order_id} verified")
}

impl Database {
    pub fn review_order(
        &mut self,
        vault: &KeyVault,
        order_id: Uuid,
        actor: Uuid,
        decision: &ReviewDecision,
    ) -> Result<ReviewOutcome> {
        match decision {
            ReviewDecision::Verified { codes } => self
                .verify_order(vault, order_id, actor, codes)
                .map(ReviewOutcome::Verified),
            ReviewDecision::Rejected { reason } => self
                .reject_order(order_id, actor, reason)
                .map(ReviewOutcome::Rejected),
        }
    }

    /// Issue `codes` for a pending order.
    ///
    /// Exactly `order.quantity` non-blank codes are required. On any error
    /// the transaction rolls back and the order stays `pending_payment` with
    /// no key, no codes and its stock untouched.
    pub fn verify_order(
        &mut self,
        vault: &KeyVault,
        order_id: Uuid,
        actor: Uuid,
        codes: &[String],
    ) -> Result<VerificationOutcome> {
        if codes.iter().any(|c| c.trim().is_empty()) {
            return Err(StoreError::Validation("redeem codes must not be blank".into()));
        }

        let tx = self.write_tx()?;
        require_role(&tx, actor, Role::can_review, "verify payments")?;

        let order = load_order(&tx, order_id)?;
        check_transition(&order, OrderStatus::Verified)?;
        if codes.len() as i64 != order.quantity {
            return Err(StoreError::QuantityMismatch {
                expected: order.quantity,
                actual: codes.len(),
            });
        }

        let key = generate_key();
        for (seq, code) in codes.iter().enumerate() {
            let sealed = encrypt_code(code, &key)?;
            insert_code(&tx, order_id, seq as i64, &sealed)?;
        }
        vault.store_key(&tx, order_id, &key)?;

        let stock = ledger::apply(
            &tx,
            order.product_id,
            -order.quantity,
            &verified_reason(order_id),
            actor,
        )?;

        finalize(&tx, order_id, OrderStatus::Verified, None, actor)?;

        let order = load_order(&tx, order_id)?;
        let (product_name, customer_email) = names(&tx, &order)?;
        tx.commit()?;

        tracing::info!(
            order_id = %order_id,
            reviewer = %actor,
            codes = codes.len(),
            new_stock = stock.new_stock,
            "order verified"
        );

        Ok(VerificationOutcome {
            order,
            product_name,
            customer_email,
            codes_issued: codes.len(),
            stock,
        })
    }

    /// Reject a pending order. Nothing but the order row changes.
    pub fn reject_order(
        &mut self,
        order_id: Uuid,
        actor: Uuid,
        reason: &str,
    ) -> Result<RejectionOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StoreError::MissingReason);
        }

        let tx = self.write_tx()?;
        require_role(&tx, actor, Role::can_review, "reject payments")?;

        let order = load_order(&tx, order_id)?;
        check_transition(&order, OrderStatus::Rejected)?;
        finalize(&tx, order_id, OrderStatus::Rejected, Some(reason), actor)?;

        let order = load_order(&tx, order_id)?;
        let (_, customer_email) = names(&tx, &order)?;
        tx.commit()?;

        tracing::info!(order_id = %order_id, reviewer = %actor, "order rejected");
        Ok(RejectionOutcome {
            order,
            customer_email,
        })
    }
}

/// Conditional status write. Zero rows means someone else got there first.
fn finalize(
    conn: &Connection,
    order_id: Uuid,
    status: OrderStatus,
    reason: Option<&str>,
    actor: Uuid,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE orders
         SET status = ?1, rejection_reason = ?2, reviewed_by = ?3, reviewed_at = ?4
         WHERE id = ?5 AND status = 'pending_payment'",
        params![
            status.as_str(),
            reason,
            actor.to_string(),
            ts(&now()),
            order_id.to_string(),
        ],
    )?;
    if updated == 0 {
        let current = load_order(conn, order_id)?;
        return Err(StoreError::AlreadyFinalized {
            order_id,
            status: current.status,
        });
    }
    Ok(())
}

fn names(conn: &Connection, order: &Order) -> Result<(String, String)> {
    Ok(conn.query_row(
        "SELECT p.name, u.email FROM products p, users u WHERE p.id = ?1 AND u.id = ?2",
        params![order.product_id.to_string(), order.user_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::test_support::Fixture;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn issued_rows(db: &Database, order_id: Uuid) -> (i64, bool) {
        (
            db.count_redeem_codes(order_id).unwrap(),
            db.key_exists(order_id).unwrap(),
        )
    }

    #[test]
    fn verify_issues_codes_and_decrements_stock() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(3);
        let (staff, pid) = (fx.staff.id, fx.product.id);
        let vault = KeyVault::default();

        let outcome = fx
            .db
            .verify_order(&vault, order.id, staff, &codes(&["A1", "B2", "C3"]))
            .unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Verified);
        assert_eq!(outcome.order.reviewed_by, Some(staff));
        assert_eq!(outcome.codes_issued, 3);
        assert_eq!(outcome.stock.new_stock, 7);
        assert_eq!(outcome.customer_email, fx.customer.email);
        assert_eq!(fx.db.get_product(pid).unwrap().stock, 7);
        assert_eq!(issued_rows(&fx.db, order.id), (3, true));

        let logs = fx.db.list_stock_logs(Some(pid)).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].entry.quantity_change, -3);
        assert_eq!(logs[0].entry.reason, format!("Order #{} verified", order.id));
        assert_eq!(logs[0].entry.changed_by, staff);

        // Nothing readable at rest.
        for row in fx.db.redeem_codes_for_order(order.id).unwrap() {
            assert!(!["A1", "B2", "C3"].contains(&row.ciphertext.as_str()));
        }
    }

    #[test]
    fn reject_touches_only_the_order() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(3);
        let (staff, pid) = (fx.staff.id, fx.product.id);

        let outcome = fx
            .db
            .reject_order(order.id, staff, "proof unreadable")
            .unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Rejected);
        assert_eq!(
            outcome.order.rejection_reason.as_deref(),
            Some("proof unreadable")
        );
        assert_eq!(fx.db.get_product(pid).unwrap().stock, 10);
        assert_eq!(issued_rows(&fx.db, order.id), (0, false));
    }

    #[test]
    fn reject_requires_reason() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(1);
        let staff = fx.staff.id;

        let err = fx.db.reject_order(order.id, staff, "  ").unwrap_err();
        assert!(matches!(err, StoreError::MissingReason));
        assert_eq!(
            fx.db.get_order(order.id).unwrap().status,
            OrderStatus::PendingPayment
        );
    }

    #[test]
    fn quantity_mismatch_leaves_no_trace() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(3);
        let (staff, pid) = (fx.staff.id, fx.product.id);

        for list in [&["A1", "B2"][..], &["A1", "B2", "C3", "D4"][..], &[][..]] {
            let err = fx
                .db
                .verify_order(&KeyVault::default(), order.id, staff, &codes(list))
                .unwrap_err();
            assert!(matches!(
                err,
                StoreError::QuantityMismatch { expected: 3, .. }
            ));
        }

        assert_eq!(
            fx.db.get_order(order.id).unwrap().status,
            OrderStatus::PendingPayment
        );
        assert_eq!(fx.db.get_product(pid).unwrap().stock, 10);
        assert_eq!(issued_rows(&fx.db, order.id), (0, false));
    }

    #[test]
    fn blank_code_rejected() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(2);
        let staff = fx.staff.id;
        let err = fx
            .db
            .verify_order(&KeyVault::default(), order.id, staff, &codes(&["A1", " "]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn customers_cannot_review() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(1);
        let customer = fx.customer.id;

        let err = fx
            .db
            .verify_order(&KeyVault::default(), order.id, customer, &codes(&["A1"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        let err = fx.db.reject_order(order.id, customer, "nope").unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert_eq!(issued_rows(&fx.db, order.id), (0, false));
    }

    #[test]
    fn terminal_orders_do_not_move() {
        let mut fx = Fixture::new(10);
        let staff = fx.staff.id;
        let vault = KeyVault::default();

        let verified = fx.pending_order(1);
        fx.db
            .verify_order(&vault, verified.id, staff, &codes(&["A1"]))
            .unwrap();
        let err = fx
            .db
            .verify_order(&vault, verified.id, staff, &codes(&["Z9"]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyFinalized { status: OrderStatus::Verified, .. }
        ));
        let err = fx.db.reject_order(verified.id, staff, "late").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyFinalized { .. }));

        let rejected = fx.pending_order(1);
        fx.db.reject_order(rejected.id, staff, "blurry").unwrap();
        let err = fx
            .db
            .verify_order(&vault, rejected.id, staff, &codes(&["A1"]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyFinalized { status: OrderStatus::Rejected, .. }
        ));

        assert_eq!(issued_rows(&fx.db, verified.id), (1, true));
        assert_eq!(issued_rows(&fx.db, rejected.id), (0, false));
        assert_eq!(fx.db.get_product(fx.product.id).unwrap().stock, 9);
    }

    #[test]
    fn insufficient_stock_rolls_back_issuance() {
        let mut fx = Fixture::new(3);
        let first = fx.pending_order(3);
        let second = fx.pending_order(3);
        let staff = fx.staff.id;
        let vault = KeyVault::default();

        fx.db
            .verify_order(&vault, first.id, staff, &codes(&["A", "B", "C"]))
            .unwrap();
        let err = fx
            .db
            .verify_order(&vault, second.id, staff, &codes(&["D", "E", "F"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::NegativeStock { current: 0, delta: -3, .. }));

        assert_eq!(
            fx.db.get_order(second.id).unwrap().status,
            OrderStatus::PendingPayment
        );
        assert_eq!(issued_rows(&fx.db, second.id), (0, false));
        assert!(fx.db.reconcile_stock(fx.product.id).unwrap().consistent);
    }

    #[test]
    fn review_decision_dispatches() {
        let mut fx = Fixture::new(10);
        let order = fx.pending_order(1);
        let staff = fx.staff.id;

        let decision: ReviewDecision =
            serde_json::from_str(r#"{"status":"rejected","reason":"wrong amount"}"#).unwrap();
        assert_eq!(decision.target(), OrderStatus::Rejected);

        let outcome = fx
            .db
            .review_order(&KeyVault::default(), order.id, staff, &decision)
            .unwrap();
        assert!(matches!(outcome, ReviewOutcome::Rejected(_)));
        assert_eq!(outcome.order().status, OrderStatus::Rejected);
    }

    #[test]
    fn concurrent_verification_issues_once() {
        const REVIEWERS: usize = 4;

        let mut fx = Fixture::new(10);
        let order = fx.pending_order(2);
        let path = fx.db.path().unwrap();
        let (staff, admin) = (fx.staff.id, fx.admin.id);
        let barrier = Arc::new(Barrier::new(REVIEWERS));

        let handles: Vec<_> = (0..REVIEWERS)
            .map(|i| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                let actor = if i % 2 == 0 { staff } else { admin };
                std::thread::spawn(move || {
                    let mut db = Database::open_at(&path).unwrap();
                    let list = vec![format!("X{i}"), format!("Y{i}")];
                    barrier.wait();
                    db.verify_order(&KeyVault::default(), order.id, actor, &list)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
            r,
            Err(StoreError::AlreadyFinalized { status: OrderStatus::Verified, .. })
        )));

        assert_eq!(issued_rows(&fx.db, order.id), (2, true));
        assert_eq!(fx.db.get_product(fx.product.id).unwrap().stock, 8);
        let debits = fx
            .db
            .list_stock_logs(Some(fx.product.id))
            .unwrap()
            .into_iter()
            .filter(|l| l.entry.quantity_change < 0)
            .count();
        assert_eq!(debits, 1);
    }
}
