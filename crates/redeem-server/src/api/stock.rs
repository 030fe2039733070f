use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use redeem_store::{StockAdjustment, StockLogView};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::auth::Authenticated;
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct AdjustStockRequest {
    product_id: Uuid,
    quantity_change: i64,
    reason: String,
}

pub(super) async fn adjust_stock(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(req): Json<AdjustStockRequest>,
) -> Result<(StatusCode, Json<StockAdjustment>), ServerError> {
    auth.require_admin()?;
    let actor = auth.id();
    let adjustment = state
        .with_db(move |db, _| {
            db.adjust_stock(req.product_id, req.quantity_change, &req.reason, actor)
        })
        .await?;

    tracing::info!(
        product_id = %adjustment.entry.product_id,
        delta = adjustment.entry.quantity_change,
        new_stock = adjustment.new_stock,
        "Manual stock adjustment"
    );
    Ok((StatusCode::CREATED, Json(adjustment)))
}

#[derive(Deserialize)]
pub(super) struct StockLogQuery {
    product_id: Option<Uuid>,
}

pub(super) async fn list_stock_logs(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<StockLogQuery>,
) -> Result<Json<Vec<StockLogView>>, ServerError> {
    auth.require_reviewer()?;
    let logs = state
        .with_db(move |db, _| db.list_stock_logs(query.product_id))
        .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::TestApp;

    #[tokio::test]
    async fn test_manual_adjustment() {
        let app = TestApp::new(5).await;
        let pid = app.product.id;

        let (status, body) = app
            .json(
                "POST",
                "/stock-logs",
                Some(&app.admin),
                Some(json!({ "product_id": pid, "quantity_change": -2, "reason": "damaged" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["new_stock"], 3);
        assert_eq!(body["entry"]["quantity_change"], -2);

        let (status, body) = app
            .json(
                "POST",
                "/stock-logs",
                Some(&app.admin),
                Some(json!({ "product_id": pid, "quantity_change": -4, "reason": "oops" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("negative"));

        let (status, _) = app
            .json(
                "POST",
                "/stock-logs",
                Some(&app.staff),
                Some(json!({ "product_id": pid, "quantity_change": 1, "reason": "found one" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, logs) = app
            .json(
                "GET",
                &format!("/stock-logs?product_id={pid}"),
                Some(&app.staff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["reason"], "damaged");
        assert_eq!(logs[0]["product_name"], "Steam Wallet 50k");
        assert_eq!(logs[1]["reason"], "Initial stock");

        let (status, _) = app.json("GET", "/stock-logs", Some(&app.customer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
