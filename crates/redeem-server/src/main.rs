//! # redeem-server
//!
//! HTTP server for selling digital redeem codes.
//!
//! This binary provides:
//! - **Checkout** with stock checks and payment proof upload
//! - **Payment review** where staff verify an order by issuing its codes,
//!   or reject it with a reason
//! - **Sealed code storage**: every order gets its own key, kept in a vault
//!   optionally wrapped with a master key
//! - **Stock ledger** with an append-only audit trail and reconciliation
//! - **Notifications** to customers through a webhook or the log

mod api;
mod auth;
mod blob_store;
mod config;
mod error;
mod notifier;

use std::sync::{Arc, Mutex};

use redeem_store::{Database, KeyVault};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,redeem_server=debug,redeem_store=debug")
        }))
        .init();

    info!("Starting redeem server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database and seed the first admin
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    if let Some((email, token)) = &config.bootstrap_admin {
        let admin = db.ensure_admin(email, token)?;
        info!(user_id = %admin.id, email = %admin.email, "Bootstrap admin ready");
    }

    // -----------------------------------------------------------------------
    // 4. Initialize subsystems
    // -----------------------------------------------------------------------
    if config.master_key.is_none() {
        warn!("MASTER_ENCRYPTION_KEY not set, order keys are stored unwrapped");
    }
    let vault = Arc::new(KeyVault::new(config.master_key));

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };

    // Creates the upload directory if missing
    let blob_store = Arc::new(
        BlobStore::new(
            config.upload_dir.clone(),
            config.public_base_url.clone(),
            config.max_proof_size,
        )
        .await?,
    );

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        vault,
        notifier,
        blob_store,
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
