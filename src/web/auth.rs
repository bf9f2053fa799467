use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    async_trait,
    extract::{Form, FromRequestParts, Query, State},
    http::request::Parts,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::{AppState, FlashQuery, compose_flash_message, render_login_page};

pub const SESSION_COOKIE: &str = "training_session";

/// Account role; gates which routes a user may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Trainer,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Trainer, Role::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trainer => "trainer",
            Role::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Role::Admin),
            "trainer" => Some(Role::Trainer),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Trainer => "Trainer",
            Role::Student => "Student",
        }
    }

    /// Admins and trainers upload documents and author quizzes.
    pub fn can_manage_content(self) -> bool {
        matches!(self, Role::Admin | Role::Trainer)
    }
}

#[derive(Clone, sqlx::FromRow)]
pub struct DbUserAuth {
    pub id: i64,
    pub password_hash: String,
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    id: i64,
    username: String,
    role: String,
    email: Option<String>,
    phone: Option<String>,
}

/// Identity of the requester, resolved once per request from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CurrentUser {
    pub fn require_any(&self, roles: &[Role]) -> Result<(), Redirect> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        warn!(user_id = self.id, role = self.role.as_str(), "access denied");
        Err(Redirect::to("/?error=access_denied"))
    }

    pub fn require_content_manager(&self) -> Result<(), Redirect> {
        self.require_any(&[Role::Admin, Role::Trainer])
    }

    pub fn require_admin(&self) -> Result<(), Redirect> {
        self.require_any(&[Role::Admin])
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        resolve_session(state, &jar)
            .await
            .ok_or_else(|| Redirect::to("/login?status=login_required"))
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    if resolve_session(&state, &jar).await.is_some() {
        return Err(Redirect::to("/"));
    }

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_login_page(&flash)))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), Redirect> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(Redirect::to("/login?error=missing_credentials"));
    }

    let user = match fetch_user_by_username(state.pool_ref(), username).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(Redirect::to("/login?error=invalid_credentials")),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(Redirect::to("/login?error=unknown"));
        }
    };

    if !verify_password(&form.password, &user.password_hash) {
        warn!(%username, "rejected login attempt");
        return Err(Redirect::to("/login?error=invalid_credentials"));
    }

    let ttl_days = state.config().session_ttl_days;
    let session_token = match create_session(state.pool_ref(), user.id, ttl_days).await {
        Ok(token) => token,
        Err(err) => {
            error!(?err, "failed to create session");
            return Err(Redirect::to("/login?error=unknown"));
        }
    };

    let mut cookie = Cookie::new(SESSION_COOKIE, session_token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(ttl_days));

    info!(user_id = user.id, "user logged in");
    let jar = jar.add(cookie);
    Ok((jar, Redirect::to("/?status=logged_in")))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let mut jar = jar;

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(token.to_string())
                .execute(state.pool_ref())
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    jar = jar.remove(removal);

    (jar, Redirect::to("/login?status=logged_out"))
}

/// Looks up the session named by the cookie; any failure is treated as anonymous.
pub async fn resolve_session(state: &AppState, jar: &CookieJar) -> Option<CurrentUser> {
    let token_cookie = jar.get(SESSION_COOKIE)?;
    let token = Uuid::parse_str(token_cookie.value()).ok()?;

    match fetch_user_by_session(state.pool_ref(), token).await {
        Ok(user) => user,
        Err(err) => {
            error!(?err, "failed to validate session");
            None
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn fetch_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>("SELECT id, password_hash FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl_days: i64) -> sqlx::Result<Uuid> {
    let token = Uuid::new_v4();
    let now = Utc::now();
    let expires_at = now + ChronoDuration::days(ttl_days);

    sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token.to_string())
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn fetch_user_by_session(
    pool: &SqlitePool,
    token: Uuid,
) -> sqlx::Result<Option<CurrentUser>> {
    let row = sqlx::query_as::<_, SessionUserRow>(
        "SELECT users.id, users.username, users.role, users.email, users.phone
         FROM sessions JOIN users ON users.id = sessions.user_id
         WHERE sessions.id = ? AND sessions.expires_at > ?",
    )
    .bind(token.to_string())
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|row| {
        let Some(role) = Role::parse(&row.role) else {
            error!(user_id = row.id, role = %row.role, "stored user has an unknown role");
            return None;
        };
        Some(CurrentUser {
            id: row.id,
            username: row.username,
            role,
            email: row.email,
            phone: row.phone,
        })
    }))
}

/// Removes sessions whose expiry has passed, returning how many were deleted.
pub async fn purge_expired_sessions(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::register::{NewUser, insert_user};

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("S3cret", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }

    #[test]
    fn only_admins_and_trainers_manage_content() {
        assert!(Role::Admin.can_manage_content());
        assert!(Role::Trainer.can_manage_content());
        assert!(!Role::Student.can_manage_content());
        assert_eq!(Role::parse(" trainer "), Some(Role::Trainer));
        assert_eq!(Role::parse("Admin"), None);
    }

    #[tokio::test]
    async fn sessions_resolve_until_expired() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::in_memory(dir.path()).await;
        let user_id = insert_user(
            state.pool_ref(),
            NewUser {
                username: "sam",
                password: "pw",
                role: Role::Student,
                email: Some("sam@example.com"),
                phone: None,
            },
        )
        .await
        .unwrap();

        let token = create_session(state.pool_ref(), user_id, 1).await.unwrap();
        let user = fetch_user_by_session(state.pool_ref(), token)
            .await
            .unwrap()
            .expect("live session");
        assert_eq!(user.username, "sam");
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.email.as_deref(), Some("sam@example.com"));

        sqlx::query("UPDATE sessions SET expires_at = ?")
            .bind(Utc::now() - ChronoDuration::minutes(1))
            .execute(state.pool_ref())
            .await
            .unwrap();

        assert!(
            fetch_user_by_session(state.pool_ref(), token)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(purge_expired_sessions(state.pool_ref()).await.unwrap(), 1);
    }
}
