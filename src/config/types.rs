//! Configuration types.
//!
//! Loaded via the `config` crate layered as: built-in defaults → TOML file
//! → environment variables (highest priority), using an aggregate
//! `Config` struct with `#[serde(default)]` on every field.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::secrets::SecretString;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tenancy: TenancyConfig,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
}

/// Relational store connection surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `DATABASE_URL`. Required; startup fails with a non-zero exit code
    /// if absent.
    #[serde(default)]
    pub database_url: Option<SecretString>,

    /// `DB_SSL`. Unset defaults to `prefer` in development, `require` in
    /// production (see `resolve_ssl_mode`, which reads `WAFLEET_ENV`).
    #[serde(default)]
    pub ssl: Option<DbSslMode>,

    /// `DB_MAX_CONNECTIONS`.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            ssl: None,
            max_connections: default_max_connections(),
        }
    }
}

/// TLS posture for the relational store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbSslMode {
    Disable,
    Prefer,
    Require,
    NoVerify,
}

impl std::str::FromStr for DbSslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" | "false" => Ok(DbSslMode::Disable),
            "prefer" => Ok(DbSslMode::Prefer),
            "require" => Ok(DbSslMode::Require),
            "no-verify" | "no_verify" | "noverify" => Ok(DbSslMode::NoVerify),
            other => Err(format!("unrecognized DB_SSL value: {other}")),
        }
    }
}

impl DbSslMode {
    pub fn to_sqlx_ssl_mode(self) -> sqlx::postgres::PgSslMode {
        match self {
            DbSslMode::Disable => sqlx::postgres::PgSslMode::Disable,
            DbSslMode::Prefer => sqlx::postgres::PgSslMode::Prefer,
            DbSslMode::Require => sqlx::postgres::PgSslMode::Require,
            DbSslMode::NoVerify => sqlx::postgres::PgSslMode::Allow,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

/// Tenant identity and default capacity (tenant name normalization,
/// `BOTCOUNT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// `RUNTIME_SERVER_NAME`. Highest priority; read at process start and
    /// treated as read-only thereafter.
    #[serde(default)]
    pub runtime_server_name: Option<String>,

    /// `SERVER_NAME`. Static identity, below the runtime override.
    #[serde(default)]
    pub server_name: Option<String>,

    /// `BOTCOUNT`. Default tenant capacity when a tenant row must be
    /// seeded at bootstrap.
    #[serde(default = "default_bot_count")]
    pub default_bot_count: u32,
}

fn default_bot_count() -> u32 {
    5
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            runtime_server_name: None,
            server_name: None,
            default_bot_count: default_bot_count(),
        }
    }
}

const DEFAULT_TENANT_NAME: &str = "DEFAULT";

impl TenancyConfig {
    /// Resolves the canonical (uppercase) tenant name: runtime env
    /// override > static override > default.
    ///
    /// A bootstrap tenant row loaded from the database still takes
    /// precedence over this default; this function only covers the
    /// config-level fallback and leaves that DB-row precedence to the
    /// caller.
    pub fn resolve_default_tenant_name(&self) -> String {
        self.runtime_server_name
            .as_deref()
            .or(self.server_name.as_deref())
            .unwrap_or(DEFAULT_TENANT_NAME)
            .trim()
            .to_ascii_uppercase()
    }
}

/// Minimal Control Plane bind surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8089
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_ssl_mode_parses_known_values() {
        assert_eq!("disable".parse::<DbSslMode>().unwrap(), DbSslMode::Disable);
        assert_eq!("require".parse::<DbSslMode>().unwrap(), DbSslMode::Require);
        assert_eq!(
            "no-verify".parse::<DbSslMode>().unwrap(),
            DbSslMode::NoVerify
        );
        assert!("bogus".parse::<DbSslMode>().is_err());
    }

    #[test]
    fn tenancy_precedence_runtime_over_static() {
        let cfg = TenancyConfig {
            runtime_server_name: Some("server2".to_string()),
            server_name: Some("server1".to_string()),
            default_bot_count: 5,
        };
        assert_eq!(cfg.resolve_default_tenant_name(), "SERVER2");
    }

    #[test]
    fn tenancy_falls_back_to_default() {
        let cfg = TenancyConfig {
            runtime_server_name: None,
            server_name: None,
            default_bot_count: 5,
        };
        assert_eq!(cfg.resolve_default_tenant_name(), DEFAULT_TENANT_NAME);
    }
}
