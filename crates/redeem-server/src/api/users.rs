use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use redeem_store::{NewUser, User, UserUpdate};
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::auth::Authenticated;
use crate::error::ServerError;

#[derive(Serialize)]
pub(super) struct CreatedUser {
    #[serde(flatten)]
    user: User,
    /// Shown once; only its hash is stored.
    token: String,
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(new): Json<NewUser>,
) -> Result<(StatusCode, Json<CreatedUser>), ServerError> {
    auth.require_admin()?;
    let (user, token) = state.with_db(move |db, _| db.create_user(&new)).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(CreatedUser { user, token })))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<Vec<User>>, ServerError> {
    auth.require_admin()?;
    let users = state.with_db(|db, _| db.list_users()).await?;
    Ok(Json(users))
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ServerError> {
    auth.require_admin()?;
    let user = state
        .with_db(move |db, _| db.update_user(id, &update))
        .await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::TestApp;

    #[tokio::test]
    async fn test_issued_token_authenticates() {
        let app = TestApp::new(1).await;

        let (status, created) = app
            .json(
                "POST",
                "/users",
                Some(&app.admin),
                Some(json!({ "email": "new@example.com", "name": "New", "role": "staff" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = created["token"].as_str().unwrap().to_string();

        let (status, _) = app.json("GET", "/orders/pending", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .json(
                "POST",
                "/users",
                Some(&app.admin),
                Some(json!({ "email": "NEW@example.com", "name": "Dup", "role": "customer" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_suspension_revokes_access() {
        let app = TestApp::new(1).await;

        let (_, users) = app.json("GET", "/users", Some(&app.admin), None).await;
        let staff_id = users
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["role"] == "staff")
            .map(|u| u["id"].as_str().unwrap().to_string())
            .unwrap();

        let (status, updated) = app
            .json(
                "PATCH",
                &format!("/users/{staff_id}"),
                Some(&app.admin),
                Some(json!({ "status": "suspended" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "suspended");

        let (status, _) = app
            .json("GET", "/orders/pending", Some(&app.staff), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_admin_is_admin_only() {
        let app = TestApp::new(1).await;
        let (status, _) = app.json("GET", "/users", Some(&app.staff), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
