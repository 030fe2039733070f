//! Bearer-token authentication.
//!
//! The token is resolved to a user by its hash on every request. Role checks
//! here only fail fast; the store re-reads the actor inside each write
//! transaction.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use redeem_shared::types::{Principal, UserStatus};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ServerError;

/// The caller of a protected route.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<Authenticated>() {
            return Ok(auth.clone());
        }

        let Some(token) = bearer_token(parts).map(str::to_string) else {
            tracing::debug!(uri = %parts.uri, "missing bearer token");
            return Err(ServerError::Unauthenticated);
        };

        let user = state
            .with_db(move |db, _| db.find_user_by_token(&token))
            .await?;

        let Some(user) = user else {
            tracing::warn!(uri = %parts.uri, "unknown bearer token");
            return Err(ServerError::Unauthenticated);
        };
        if user.status != UserStatus::Active {
            tracing::warn!(user_id = %user.id, "suspended user rejected");
            return Err(ServerError::Unauthenticated);
        }

        let auth = Authenticated(Principal {
            user_id: user.id,
            email: user.email,
            role: user.role,
        });
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

impl Authenticated {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }

    pub fn require_reviewer(&self) -> Result<(), ServerError> {
        if self.0.role.can_review() {
            Ok(())
        } else {
            Err(ServerError::Forbidden("Only staff/admin can do this".into()))
        }
    }

    pub fn require_admin(&self) -> Result<(), ServerError> {
        if self.0.role.is_admin() {
            Ok(())
        } else {
            Err(ServerError::Forbidden("Only admins can do this".into()))
        }
    }
}
