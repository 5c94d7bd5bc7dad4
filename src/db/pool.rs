//! Relational store connection pool.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;

use crate::config::{Config, DbSslMode};
use crate::error::FleetError;

/// Opens the pool from the configuration surface: `DATABASE_URL` is
/// required (already enforced by `config::load`), `DB_SSL` sets the
/// connection's TLS posture, `DB_MAX_CONNECTIONS` bounds the pool size.
pub async fn connect(cfg: &Config, production: bool) -> Result<PgPool, FleetError> {
    let url = cfg
        .database
        .database_url
        .as_ref()
        .ok_or_else(|| FleetError::StartupMisconfigured("DATABASE_URL is required".to_string()))?;

    let ssl_mode = crate::config::resolve_ssl_mode(&cfg.database, production);
    let mut connect_options = PgConnectOptions::from_str(url.expose_secret())
        .map_err(|e| FleetError::StartupMisconfigured(format!("invalid DATABASE_URL: {e}")))?;
    connect_options = connect_options.ssl_mode(ssl_mode.to_sqlx_ssl_mode());

    // `require`/`no-verify` with an unreachable TLS endpoint must fail
    // startup (exit codes), which sqlx surfaces naturally as a
    // connection error from `PgPoolOptions::connect_with`.
    if matches!(ssl_mode, DbSslMode::Disable) {
        connect_options = connect_options.ssl_mode(sqlx::postgres::PgSslMode::Disable);
    }

    PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect_with(connect_options)
        .await
        .map_err(FleetError::Database)
}
