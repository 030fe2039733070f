//! HTTP surface.

mod orders;
mod products;
mod stock;
mod users;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, Method},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use redeem_store::{Database, KeyVault};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::blob_store::BlobStore;
use crate::error::ServerError;
use crate::notifier::Notifier;

/// Multipart framing allowance on top of the proof itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub vault: Arc<KeyVault>,
    pub notifier: Arc<dyn Notifier>,
    pub blob_store: Arc<BlobStore>,
}

impl AppState {
    /// Run a store call on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database, &KeyVault) -> redeem_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let vault = Arc::clone(&self.vault);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|e| ServerError::Internal(format!("database mutex poisoned: {e}")))?;
            f(&mut guard, &vault).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("spawn_blocking failed: {e}")))?
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.blob_store.max_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/:id", patch(users::update_user))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/:id", patch(products::update_product))
        .route("/products/:id/reconcile", get(products::reconcile))
        .route("/orders", post(orders::create_order).get(orders::list_my_orders))
        .route("/orders/pending", get(orders::list_pending))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/proof", post(orders::upload_proof))
        .route("/orders/:id/verify-payment", post(orders::verify_payment))
        .route("/orders/:id/redeem-codes", get(orders::redeem_codes))
        .route("/orders/:id/redeem-codes/export", get(orders::export_codes))
        .route(
            "/stock-logs",
            post(stock::adjust_stock).get(stock::list_stock_logs),
        )
        .route("/uploads/:name", get(serve_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let (content_type, data) = state.blob_store.get_proof(&name).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::test_support::TestApp;

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new(1).await;
        let (status, body) = app.json("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_authentication_required() {
        let app = TestApp::new(1).await;

        let (status, body) = app.json("GET", "/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = app.json("GET", "/products", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .json("GET", "/products", Some(&app.customer), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_upload_is_404() {
        let app = TestApp::new(1).await;
        let (status, _) = app.json("GET", "/uploads/nothing.png", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
