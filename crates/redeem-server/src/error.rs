use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use redeem_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Proof too large: {size} bytes (max {max})")]
    ProofTooLarge { size: usize, max: usize },

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServerError::ProofTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BlobStorage(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Store(e) => match e {
                StoreError::Unauthorized(_) | StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                StoreError::Validation(_)
                | StoreError::QuantityMismatch { .. }
                | StoreError::MissingReason
                | StoreError::NegativeStock { .. }
                | StoreError::NotReady { .. } => StatusCode::BAD_REQUEST,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_)
                | StoreError::DuplicateKey(_)
                | StoreError::AlreadyFinalized { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            match &self {
                ServerError::Store(e) if e.is_integrity() => {
                    tracing::error!(error = %self, "data integrity failure");
                }
                _ => tracing::error!(error = %self, "request failed"),
            }
            match &self {
                ServerError::BlobStorage(_) => "Blob storage error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use redeem_shared::types::OrderStatus;
    use redeem_shared::CryptoError;
    use uuid::Uuid;

    use super::*;

    fn status_of(e: impl Into<ServerError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn test_store_taxonomy_mapping() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(ServerError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(StoreError::Unauthorized("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(StoreError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(StoreError::QuantityMismatch { expected: 3, actual: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(StoreError::MissingReason), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(StoreError::NotReady { order_id: id, status: OrderStatus::Rejected }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(StoreError::NotFound("order")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(StoreError::DuplicateKey(id)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::AlreadyFinalized { order_id: id, status: OrderStatus::Verified }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Crypto(CryptoError::DecryptionFailed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ServerError::ProofTooLarge { size: 10, max: 5 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
