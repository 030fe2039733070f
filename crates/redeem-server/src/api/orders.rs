use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use redeem_shared::notification::{short_order_id, Notification};
use redeem_shared::types::OrderStatus;
use redeem_store::{
    DecryptedCodes, Order, OrderSummary, ReviewDecision, ReviewOutcome, StoreError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::auth::Authenticated;
use crate::error::ServerError;
use crate::notifier::dispatch;

#[derive(Deserialize)]
pub(super) struct CreateOrderRequest {
    product_id: Uuid,
    quantity: i64,
}

pub(super) async fn create_order(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ServerError> {
    let user_id = auth.id();
    let (order, product) = state
        .with_db(move |db, _| db.create_order(user_id, req.product_id, req.quantity))
        .await?;

    dispatch(
        state.notifier.clone(),
        auth.0.email.clone(),
        Notification::order_received(&order.id, &product.name, order.total_price),
    );

    Ok((StatusCode::CREATED, Json(order)))
}

pub(super) async fn list_my_orders(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Vec<OrderSummary>>, ServerError> {
    let user_id = auth.id();
    let orders = state
        .with_db(move |db, _| db.list_orders_for_user(user_id))
        .await?;
    Ok(Json(orders))
}

pub(super) async fn list_pending(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Vec<OrderSummary>>, ServerError> {
    auth.require_reviewer()?;
    let orders = state.with_db(|db, _| db.list_pending_orders()).await?;
    Ok(Json(orders))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderSummary>, ServerError> {
    let summary = state.with_db(move |db, _| db.get_order_summary(id)).await?;
    if !auth.0.owns(&summary.order.user_id) && !auth.0.role.can_review() {
        return Err(StoreError::Unauthorized(format!(
            "order {id} belongs to another customer"
        ))
        .into());
    }
    Ok(Json(summary))
}

pub(super) async fn upload_proof(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Order>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;

        let stored = state.blob_store.store_proof(&content_type, &data).await?;

        let user_id = auth.id();
        let url = stored.url.clone();
        let attached = state
            .with_db(move |db, _| db.attach_payment_proof(id, user_id, &url))
            .await;

        return match attached {
            Ok(order) => {
                info!(order_id = %id, size = stored.size, "Payment proof uploaded");
                Ok(Json(order))
            }
            Err(e) => {
                if let Err(cleanup) = state.blob_store.remove_proof(&stored.name).await {
                    warn!(error = %cleanup, name = %stored.name, "orphaned proof left on disk");
                }
                Err(e)
            }
        };
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

#[derive(Deserialize)]
pub(super) struct VerifyPaymentRequest {
    status: OrderStatus,
    #[serde(default)]
    codes: Vec<String>,
    #[serde(default)]
    rejection_reason: Option<String>,
}

impl VerifyPaymentRequest {
    fn into_decision(self) -> Result<ReviewDecision, ServerError> {
        match self.status {
            OrderStatus::Verified => Ok(ReviewDecision::Verified { codes: self.codes }),
            OrderStatus::Rejected => Ok(ReviewDecision::Rejected {
                reason: self.rejection_reason.unwrap_or_default(),
            }),
            OrderStatus::PendingPayment => Err(ServerError::BadRequest(
                "status must be verified or rejected".to_string(),
            )),
        }
    }
}

#[derive(Serialize)]
pub(super) struct VerifyPaymentResponse {
    success: bool,
    message: String,
}

pub(super) async fn verify_payment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ServerError> {
    auth.require_reviewer()?;
    let decision = req.into_decision()?;
    let target = decision.target();

    let actor = auth.id();
    let outcome = state
        .with_db(move |db, vault| db.review_order(vault, id, actor, &decision))
        .await?;

    match &outcome {
        ReviewOutcome::Verified(v) => dispatch(
            state.notifier.clone(),
            v.customer_email.clone(),
            Notification::payment_verified(&v.order.id, &v.product_name),
        ),
        ReviewOutcome::Rejected(r) => dispatch(
            state.notifier.clone(),
            r.customer_email.clone(),
            Notification::payment_rejected(
                &r.order.id,
                r.order.rejection_reason.as_deref().unwrap_or_default(),
            ),
        ),
    }

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message: format!("Order {target} successfully"),
    }))
}

async fn load_codes(
    state: &AppState,
    auth: &Authenticated,
    id: Uuid,
) -> Result<DecryptedCodes, ServerError> {
    let requester = auth.id();
    state
        .with_db(move |db, vault| db.list_codes(vault, id, requester))
        .await
}

pub(super) async fn redeem_codes(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<DecryptedCodes>, ServerError> {
    Ok(Json(load_codes(&state, &auth, id).await?))
}

pub(super) async fn export_codes(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServerError> {
    let codes = load_codes(&state, &auth, id).await?;

    let mut body = codes.codes.join("\n");
    body.push('\n');
    let disposition = format!(
        "attachment; filename=\"redeem-codes-{}.txt\"",
        short_order_id(&id)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
