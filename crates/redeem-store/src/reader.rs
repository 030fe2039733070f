//! Redeem code reader: owner-only decryption of issued codes.

use redeem_shared::crypto::decrypt_code;
use redeem_shared::types::OrderStatus;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::DecryptedCodes;
use crate::orders::load_order;
use crate::products::load_product;
use crate::redeem_codes::codes_for_order;
use crate::vault::KeyVault;

impl Database {
    /// Decrypt the codes of a verified order for its owner.
    ///
    /// Any missing key or failed decryption aborts the whole call; a
    /// partial list is never returned.
    pub fn list_codes(
        &mut self,
        vault: &KeyVault,
        order_id: Uuid,
        requester: Uuid,
    ) -> Result<DecryptedCodes> {
        let tx = self.read_tx()?;

        let order = load_order(&tx, order_id)?;
        if order.user_id != requester {
            return Err(StoreError::Unauthorized(format!(
                "order {order_id} belongs to another customer"
            )));
        }
        if order.status != OrderStatus::Verified {
            return Err(StoreError::NotReady {
                order_id,
                status: order.status,
            });
        }

        let product = load_product(&tx, order.product_id)?;
        let rows = codes_for_order(&tx, order_id)?;

        let mut codes = Vec::with_capacity(rows.len());
        if !rows.is_empty() {
            let key = vault.retrieve_key(&tx, order_id).map_err(|e| match e {
                StoreError::KeyNotFound(id) => {
                    StoreError::Integrity(format!("verified order {id} has codes but no key"))
                }
                other => other,
            });
            let key = match key {
                Ok(key) => key,
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "cannot load order key");
                    return Err(e);
                }
            };

            for row in &rows {
                match decrypt_code(&row.ciphertext, &key) {
                    Ok(code) => codes.push(code),
                    Err(e) => {
                        tracing::error!(
                            order_id = %order_id,
                            seq = row.seq,
                            "redeem code failed to decrypt"
                        );
                        return Err(e.into());
                    }
                }
            }
        } else {
            tracing::warn!(order_id = %order_id, "verified order has no redeem codes");
        }
        tx.commit()?;

        Ok(DecryptedCodes {
            order_id,
            codes,
            quantity: order.quantity,
            product_name: product.name,
            order_date: order.created_at,
        })
    }
}
