//! Configuration loading.
//!
//! Layers: built-in defaults → `wafleet.toml` (if present) → environment
//! variables. Environment variables use the exact names the operator
//! already knows (`DATABASE_URL`, `DB_SSL`, `BOTCOUNT`, ...) rather than
//! a generic `WAFLEET_*` prefix, since they are part of this crate's
//! external contract.

pub mod secrets;
mod types;

pub use secrets::SecretString;
pub use types::{Config, ControlPlaneConfig, DatabaseConfig, DbSslMode, LoggingConfig, TenancyConfig};

use std::path::PathBuf;

use crate::error::FleetError;

/// Canonical base directory for runtime state (failure ledger, logs).
pub fn wafleet_home() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let p = home.join(".wafleet");
    if !p.exists() {
        let _ = std::fs::create_dir_all(&p);
    }
    p
}

/// Loads configuration from an optional TOML file plus the environment
/// variables named in the configuration surface, and validates the
/// startup invariants: `DATABASE_URL` must be present.
pub fn load(config_path: Option<&str>) -> Result<Config, FleetError> {
    let mut builder = config::Config::builder();

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    } else {
        let default_path = wafleet_home().join("wafleet.toml");
        builder = builder.add_source(
            config::File::from(default_path).required(false),
        );
    }

    let raw = builder
        .build()
        .map_err(|e| FleetError::StartupMisconfigured(format!("failed to read config: {e}")))?;

    let mut cfg: Config = raw
        .try_deserialize()
        .map_err(|e| FleetError::StartupMisconfigured(format!("invalid config: {e}")))?;

    apply_env_overrides(&mut cfg);

    if cfg.database.database_url.is_none() {
        return Err(FleetError::StartupMisconfigured(
            "DATABASE_URL is required".to_string(),
        ));
    }

    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        cfg.database.database_url = Some(SecretString::new(url));
    }
    if let Ok(ssl) = std::env::var("DB_SSL")
        && let Ok(mode) = ssl.parse()
    {
        cfg.database.ssl = Some(mode);
    }
    if let Ok(max_conn) = std::env::var("DB_MAX_CONNECTIONS")
        && let Ok(n) = max_conn.parse()
    {
        cfg.database.max_connections = n;
    }
    if let Ok(name) = std::env::var("RUNTIME_SERVER_NAME") {
        cfg.tenancy.runtime_server_name = Some(name);
    }
    if let Ok(name) = std::env::var("SERVER_NAME") {
        cfg.tenancy.server_name = Some(name);
    }
    if let Ok(count) = std::env::var("BOTCOUNT")
        && let Ok(n) = count.parse()
    {
        cfg.tenancy.default_bot_count = n;
    }
}

/// Resolves the effective `DB_SSL` posture: unset defaults to `prefer`
/// in development and `require` in production.
pub fn resolve_ssl_mode(cfg: &DatabaseConfig, production: bool) -> DbSslMode {
    cfg.ssl.unwrap_or(if production {
        DbSslMode::Require
    } else {
        DbSslMode::Prefer
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssl_mode_defaults_by_environment() {
        let cfg = DatabaseConfig {
            database_url: None,
            ssl: None,
            max_connections: 10,
        };
        assert_eq!(resolve_ssl_mode(&cfg, false), DbSslMode::Prefer);
        assert_eq!(resolve_ssl_mode(&cfg, true), DbSslMode::Require);
    }

    #[test]
    fn ssl_mode_explicit_overrides_environment_default() {
        let cfg = DatabaseConfig {
            database_url: None,
            ssl: Some(DbSslMode::Disable),
            max_connections: 10,
        };
        assert_eq!(resolve_ssl_mode(&cfg, true), DbSslMode::Disable);
    }
}
