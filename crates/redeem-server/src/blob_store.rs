//! Payment proof storage on the local filesystem.
//!
//! Proofs are written under a server-chosen name (`<uuid>.<ext>`), so a
//! client never controls a path. Reads validate the name before touching
//! the disk.

use std::path::{Component, Path, PathBuf};

use redeem_shared::constants::ALLOWED_PROOF_TYPES;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Route prefix proofs are served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Resolve `name` inside `base`, rejecting anything but a single plain
/// file name.
fn ensure_within(base: &Path, name: &str) -> Result<PathBuf, ServerError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == name => Ok(base.join(c)),
        _ => Err(ServerError::BadRequest("Invalid file name".to_string())),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A proof written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProof {
    pub name: String,
    pub url: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    public_base_url: String,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(
        base_path: PathBuf,
        public_base_url: String,
        max_size: usize,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::BlobStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            public_base_url,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate and write one proof, returning its public URL.
    pub async fn store_proof(
        &self,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredProof, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::ProofTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }
        let ext = extension_for(content_type).ok_or_else(|| {
            ServerError::BadRequest(format!(
                "Unsupported file type {content_type}, expected one of {}",
                ALLOWED_PROOF_TYPES.join(", ")
            ))
        })?;

        let name = format!("{}.{ext}", Uuid::new_v4());
        let path = ensure_within(&self.base_path, &name)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::BlobStorage(format!("Failed to write {name}: {e}")))?;

        debug!(name = %name, size = data.len(), "Stored proof");
        Ok(StoredProof {
            url: format!("{}{UPLOADS_ROUTE}/{name}", self.public_base_url),
            name,
            size: data.len(),
        })
    }

    /// Read a stored proof back with its content type.
    pub async fn get_proof(&self, name: &str) -> Result<(&'static str, Vec<u8>), ServerError> {
        let path = ensure_within(&self.base_path, name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("File {name}")));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| ServerError::BlobStorage(format!("Failed to read {name}: {e}")))?;

        debug!(name = %name, size = data.len(), "Retrieved proof");
        Ok((content_type_for(name), data))
    }

    /// Delete a proof that was never attached to an order.
    pub async fn remove_proof(&self, name: &str) -> Result<(), ServerError> {
        let path = ensure_within(&self.base_path, name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| ServerError::BlobStorage(format!("Failed to delete {name}: {e}")))?;
        debug!(name = %name, "Removed proof");
        Ok(())
    }
}
