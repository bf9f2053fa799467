use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::web::{
    AppState, FlashQuery,
    auth::{self, Role},
    compose_flash_message, render_register_page,
};

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

#[derive(Debug)]
pub enum RegisterError {
    DuplicateUsername,
    Hash(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::DuplicateUsername => write!(f, "username already exists"),
            RegisterError::Hash(message) => write!(f, "failed to hash password: {message}"),
            RegisterError::Database(err) => write!(f, "failed to insert user: {err}"),
        }
    }
}

impl std::error::Error for RegisterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegisterError::Database(err) => Some(err),
            _ => None,
        }
    }
}

/// Inserts a new account. An existing username is never modified.
pub async fn insert_user(pool: &SqlitePool, user: NewUser<'_>) -> Result<i64, RegisterError> {
    let password_hash =
        auth::hash_password(user.password).map_err(|err| RegisterError::Hash(err.to_string()))?;
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, role, email, phone, created_at, updated_at, last_updated_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.username)
    .bind(password_hash)
    .bind(user.role.as_str())
    .bind(user.email)
    .bind(user.phone)
    .bind(now)
    .bind(now)
    .bind(user.username)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(RegisterError::DuplicateUsername)
        }
        Err(err) => Err(RegisterError::Database(err)),
    }
}

/// Roles offered on the public registration form.
pub fn registrable_roles(allow_admin: bool) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|role| allow_admin || *role != Role::Admin)
        .collect()
}

pub async fn register_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    if auth::resolve_session(&state, &jar).await.is_some() {
        return Err(Redirect::to("/"));
    }

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let roles = registrable_roles(state.config().allow_admin_registration);
    Ok(Html(render_register_page(&flash, &roles)))
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() || form.role.trim().is_empty() {
        return Redirect::to("/register?error=missing_fields");
    }

    let allowed_roles = registrable_roles(state.config().allow_admin_registration);
    let Some(role) = Role::parse(&form.role).filter(|role| allowed_roles.contains(role)) else {
        return Redirect::to("/register?error=invalid_role");
    };

    let email = optional_field(form.email.as_deref());
    let phone = optional_field(form.phone.as_deref());

    let result = insert_user(
        state.pool_ref(),
        NewUser {
            username,
            password: &form.password,
            role,
            email,
            phone,
        },
    )
    .await;

    match result {
        Ok(user_id) => {
            info!(user_id, role = role.as_str(), "registered new user");
            Redirect::to("/login?status=registered")
        }
        Err(RegisterError::DuplicateUsername) => Redirect::to("/register?error=duplicate_username"),
        Err(err) => {
            error!(?err, "failed to register user");
            Redirect::to("/register?error=unknown")
        }
    }
}

fn optional_field(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_username_leaves_existing_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::in_memory(dir.path()).await;

        let first = NewUser {
            username: "alice",
            password: "first-pass",
            role: Role::Trainer,
            email: Some("alice@example.com"),
            phone: None,
        };
        insert_user(state.pool_ref(), first).await.unwrap();

        let second = NewUser {
            username: "alice",
            password: "second-pass",
            role: Role::Student,
            email: None,
            phone: Some("555-0100"),
        };
        let err = insert_user(state.pool_ref(), second).await.unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateUsername));

        let (role, email, hash): (String, Option<String>, String) =
            sqlx::query_as("SELECT role, email, password_hash FROM users WHERE username = 'alice'")
                .fetch_one(state.pool_ref())
                .await
                .unwrap();
        assert_eq!(role, "trainer");
        assert_eq!(email.as_deref(), Some("alice@example.com"));
        assert!(auth::verify_password("first-pass", &hash));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(state.pool_ref())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn admin_role_is_hidden_unless_enabled() {
        assert_eq!(registrable_roles(false), vec![Role::Trainer, Role::Student]);
        assert!(registrable_roles(true).contains(&Role::Admin));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        assert_eq!(optional_field(Some("   ")), None);
        assert_eq!(optional_field(Some(" a@b.c ")), Some("a@b.c"));
        assert_eq!(optional_field(None), None);
    }
}
