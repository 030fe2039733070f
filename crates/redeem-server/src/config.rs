//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use redeem_shared::constants::{DEFAULT_HTTP_PORT, MAX_PROOF_SIZE, SYMMETRIC_KEY_SIZE};
use redeem_shared::crypto::SymmetricKey;

#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./redeem.db`
    pub database_path: PathBuf,

    /// Directory payment proofs are written to.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Prefix for the URLs handed back for stored proofs.
    /// Env: `PUBLIC_BASE_URL`
    pub public_base_url: String,

    /// Env: `MAX_PROOF_SIZE`
    pub max_proof_size: usize,

    /// Key-encryption key for the vault (64 hex chars).
    /// Env: `MASTER_ENCRYPTION_KEY`
    /// Default: none, vault keys are stored unwrapped.
    pub master_key: Option<SymmetricKey>,

    /// Env: `NOTIFY_WEBHOOK_URL`
    /// Default: none, notifications are only logged.
    pub notify_webhook_url: Option<String>,

    /// Admin seeded at startup when both are set.
    /// Env: `BOOTSTRAP_ADMIN_EMAIL`, `BOOTSTRAP_ADMIN_TOKEN`
    pub bootstrap_admin: Option<(String, String)>,
}

// Secrets stay out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("upload_dir", &self.upload_dir)
            .field("public_base_url", &self.public_base_url)
            .field("max_proof_size", &self.max_proof_size)
            .field("master_key", &self.master_key.map(|_| "<set>"))
            .field("notify_webhook_url", &self.notify_webhook_url)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|(email, _)| email),
            )
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./redeem.db"),
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            max_proof_size: MAX_PROOF_SIZE,
            master_key: None,
            notify_webhook_url: None,
            bootstrap_admin: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Some(url) = var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = var("MAX_PROOF_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_proof_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_PROOF_SIZE, using default"),
            }
        }

        if let Some(hex_key) = var("MASTER_ENCRYPTION_KEY") {
            match parse_master_key(&hex_key) {
                Ok(key) => config.master_key = Some(key),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Invalid MASTER_ENCRYPTION_KEY, vault keys will be stored unwrapped"
                ),
            }
        }

        config.notify_webhook_url = var("NOTIFY_WEBHOOK_URL").filter(|u| !u.is_empty());

        if let (Some(email), Some(token)) =
            (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_TOKEN"))
        {
            if !email.is_empty() && !token.is_empty() {
                config.bootstrap_admin = Some((email, token));
            }
        }

        config
    }
}

/// Parse a 64-character hex string into a 32-byte key.
fn parse_master_key(input: &str) -> Result<SymmetricKey, String> {
    let input = input.trim();
    if input.len() != SYMMETRIC_KEY_SIZE * 2 {
        return Err(format!(
            "expected {} hex chars, got {}",
            SYMMETRIC_KEY_SIZE * 2,
            input.len()
        ));
    }
    let bytes = hex::decode(input).map_err(|e| format!("invalid hex: {e}"))?;
    bytes
        .try_into()
        .map_err(|_| "invalid key length".to_string())
}
