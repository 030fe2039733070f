//! CRUD operations for [`User`] records and role checks.

use redeem_shared::crypto::{generate_token, hash_token};
use redeem_shared::types::{Role, UserStatus};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewUser, User, UserUpdate};
use crate::rows::{enum_col, is_unique_violation, now, or_not_found, ts, ts_col, uuid_col};

const USER_COLUMNS: &str = "id, email, name, role, status, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user and return it with its freshly issued bearer token.
    ///
    /// The token is returned exactly once; only its hash is stored.
    pub fn create_user(&self, new: &NewUser) -> Result<(User, String)> {
        let token = generate_token();
        let user = insert_user(self.conn(), new, &token)?;
        tracing::debug!(user_id = %user.id, role = %user.role, "user created");
        Ok((user, token))
    }

    /// Make sure an admin with `email` exists, registering it with `token`
    /// if it does not. An existing user is returned unchanged.
    pub fn ensure_admin(&self, email: &str, token: &str) -> Result<User> {
        if let Some(existing) = self.find_user_by_email(email)? {
            return Ok(existing);
        }
        let new = NewUser {
            email: email.to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
        };
        insert_user(self.conn(), &new, token)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        load_user(self.conn(), id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?)
    }

    /// Resolve a bearer token to its user, if any.
    pub fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE token_hash = ?1"),
                params![hash_token(token)],
                row_to_user,
            )
            .optional()?)
    }

    /// List all users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        if let Some(role) = update.role {
            self.conn().execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                params![role.as_str(), id.to_string()],
            )?;
        }
        if let Some(status) = update.status {
            self.conn().execute(
                "UPDATE users SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )?;
        }
        self.get_user(id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_user(conn: &Connection, new: &NewUser, token: &str) -> Result<User> {
    let email = new.email.trim().to_lowercase();
    let name = new.name.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(StoreError::Validation("a valid email is required".into()));
    }
    if name.is_empty() {
        return Err(StoreError::Validation("name must not be empty".into()));
    }

    let user = User {
        id: Uuid::new_v4(),
        email,
        name,
        role: new.role,
        status: UserStatus::Active,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO users (id, email, name, role, status, token_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id.to_string(),
            user.email,
            user.name,
            user.role.as_str(),
            user.status.as_str(),
            hash_token(token),
            ts(&user.created_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict(format!("email {} is already registered", user.email))
        } else {
            StoreError::Sqlite(e)
        }
    })?;

    Ok(user)
}

pub(crate) fn load_user(conn: &Connection, id: Uuid) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        row_to_user,
    )
    .map_err(or_not_found("user"))
}

/// Re-read the actor inside the caller's transaction and check its role.
///
/// Called by every mutating operation so that a role revoked between
/// authentication and the write is honoured.
pub(crate) fn require_role(
    conn: &Connection,
    actor: Uuid,
    allowed: fn(&Role) -> bool,
    action: &str,
) -> Result<User> {
    let user = load_user(conn, actor).map_err(|e| match e {
        StoreError::NotFound(_) => StoreError::Forbidden(format!("unknown actor may not {action}")),
        other => other,
    })?;
    if user.status != UserStatus::Active || !allowed(&user.role) {
        return Err(StoreError::Forbidden(format!(
            "{} may not {action}",
            user.role
        )));
    }
    Ok(user)
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: enum_col(row, 3)?,
        status: enum_col(row, 4)?,
        created_at: ts_col(row, 5)?,
    })
}
