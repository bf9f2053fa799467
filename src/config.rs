use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite://training.db";
const DEFAULT_UPLOAD_DIR: &str = "storage/uploads";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_DAYS: i64 = 7;
const MAX_SESSION_TTL_DAYS: i64 = 3650;
const DEFAULT_SEED_ADMIN_USERNAME: &str = "admin";
const DEFAULT_SEED_ADMIN_PASSWORD: &str = "change-me";

/// Runtime settings read from the process environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub session_ttl_days: i64,
    pub seed_admin_username: String,
    pub seed_admin_password: String,
    pub allow_admin_registration: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            port: DEFAULT_PORT,
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            seed_admin_username: DEFAULT_SEED_ADMIN_USERNAME.to_string(),
            seed_admin_password: DEFAULT_SEED_ADMIN_PASSWORD.to_string(),
            allow_admin_registration: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = non_empty(lookup("DATABASE_URL")).unwrap_or(defaults.database_url);
        let upload_dir = non_empty(lookup("UPLOAD_DIR"))
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);
        let seed_admin_username =
            non_empty(lookup("SEED_ADMIN_USERNAME")).unwrap_or(defaults.seed_admin_username);
        let seed_admin_password =
            non_empty(lookup("SEED_ADMIN_PASSWORD")).unwrap_or(defaults.seed_admin_password);

        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let max_connections =
            parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections);
        let session_ttl_days =
            parse_var(&lookup, "SESSION_TTL_DAYS")?.unwrap_or(defaults.session_ttl_days);
        let allow_admin_registration = non_empty(lookup("ALLOW_ADMIN_REGISTRATION"))
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.allow_admin_registration);

        anyhow::ensure!(max_connections > 0, "DATABASE_MAX_CONNECTIONS must be positive");
        anyhow::ensure!(
            (1..=MAX_SESSION_TTL_DAYS).contains(&session_ttl_days),
            "SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}"
        );

        Ok(Self {
            database_url,
            max_connections,
            upload_dir,
            port,
            session_ttl_days,
            seed_admin_username,
            seed_admin_password,
            allow_admin_registration,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty(lookup(key))
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite://training.db");
        assert_eq!(config.upload_dir, PathBuf::from("storage/uploads"));
        assert_eq!(config.port, 8080);
        assert!(!config.allow_admin_registration);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9090"),
            ("UPLOAD_DIR", "/tmp/docs"),
            ("SESSION_TTL_DAYS", "2"),
            ("ALLOW_ADMIN_REGISTRATION", "true"),
            ("SEED_ADMIN_USERNAME", "  "),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(config.session_ttl_days, 2);
        assert!(config.allow_admin_registration);
        assert_eq!(config.seed_admin_username, "admin");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(AppConfig::from_lookup(lookup_from(&[("DATABASE_MAX_CONNECTIONS", "0")])).is_err());
    }

    #[test]
    fn session_ttl_is_bounded() {
        let err = AppConfig::from_lookup(lookup_from(&[("SESSION_TTL_DAYS", "9999999999999")]))
            .unwrap_err();
        assert!(err.to_string().contains("SESSION_TTL_DAYS"));
        assert!(AppConfig::from_lookup(lookup_from(&[("SESSION_TTL_DAYS", "0")])).is_err());

        let config = AppConfig::from_lookup(lookup_from(&[("SESSION_TTL_DAYS", "3650")])).unwrap();
        assert_eq!(config.session_ttl_days, 3650);
    }
}
