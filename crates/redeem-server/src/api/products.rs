use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use redeem_store::{NewProduct, Product, ProductUpdate, StockReconciliation};
use uuid::Uuid;

use super::AppState;
use crate::auth::Authenticated;
use crate::error::ServerError;

pub(super) async fn list_products(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<Vec<Product>>, ServerError> {
    let products = state.with_db(|db, _| db.list_products()).await?;
    Ok(Json(products))
}

pub(super) async fn create_product(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ServerError> {
    auth.require_admin()?;
    let actor = auth.id();
    let product = state
        .with_db(move |db, _| db.create_product(&new, actor))
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub(super) async fn update_product(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, ServerError> {
    auth.require_admin()?;
    let actor = auth.id();
    let product = state
        .with_db(move |db, _| db.update_product(id, &update, actor))
        .await?;
    Ok(Json(product))
}

pub(super) async fn reconcile(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<StockReconciliation>, ServerError> {
    auth.require_reviewer()?;
    let report = state.with_db(move |db, _| db.reconcile_stock(id)).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::TestApp;

    #[tokio::test]
    async fn test_admin_manages_catalog() {
        let app = TestApp::new(5).await;

        let (status, created) = app
            .json(
                "POST",
                "/products",
                Some(&app.admin),
                Some(json!({ "name": "Google Play 100k", "price": 100000, "initial_stock": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["stock"], 4);
        let id = created["id"].as_str().unwrap();

        let (status, updated) = app
            .json(
                "PATCH",
                &format!("/products/{id}"),
                Some(&app.admin),
                Some(json!({ "price": 95000, "stock": 999 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 95000);
        assert_eq!(updated["stock"], 4);

        let (status, report) = app
            .json("GET", &format!("/products/{id}/reconcile"), Some(&app.staff), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["ledger_total"], 4);
        assert_eq!(report["consistent"], true);
    }

    #[tokio::test]
    async fn test_catalog_writes_need_admin() {
        let app = TestApp::new(5).await;
        let body = json!({ "name": "X", "price": 1 });

        for token in [&app.staff, &app.customer] {
            let (status, _) = app
                .json("POST", "/products", Some(token), Some(body.clone()))
                .await;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (status, _) = app
            .json(
                "GET",
                &format!("/products/{}/reconcile", app.product.id),
                Some(&app.customer),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
