use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    config::AppConfig,
    web::{
        auth::Role,
        register::{NewUser, insert_user},
    },
};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<AppConfig>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("invalid DATABASE_URL {}", config.database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("failed to open SQLite database")?;

        Self::from_pool(pool, config).await
    }

    async fn from_pool(pool: SqlitePool, config: AppConfig) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if has_admin {
            return Ok(());
        }

        let username = self.config.seed_admin_username.clone();
        insert_user(
            &self.pool,
            NewUser {
                username: &username,
                password: &self.config.seed_admin_password,
                role: Role::Admin,
                email: None,
                phone: None,
            },
        )
        .await
        .context("failed to insert seed admin user")?;

        info!(
            %username,
            "Seeded default admin account from SEED_ADMIN_USERNAME/SEED_ADMIN_PASSWORD. Change the password promptly."
        );

        Ok(())
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }
}

#[cfg(test)]
impl AppState {
    /// Single-connection in-memory database; the connection must never be recycled.
    pub async fn in_memory(upload_dir: &Path) -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("memory url")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .expect("open in-memory sqlite");

        let config = AppConfig {
            upload_dir: upload_dir.to_path_buf(),
            ..AppConfig::default()
        };

        Self::from_pool(pool, config)
            .await
            .expect("migrate in-memory sqlite")
    }
}
