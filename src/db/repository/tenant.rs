//! Tenant row access (Tenant, capacity).

use sqlx::{PgExecutor, PgPool};

use crate::db::models::Tenant;

pub async fn get<'e>(exec: impl PgExecutor<'e>, name: &str) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = $1")
        .bind(name)
        .fetch_optional(exec)
        .await
}

/// Locks the tenant row for the duration of the caller's transaction so
/// the capacity check is consistent, using the same `FOR UPDATE` pattern
/// as other per-row counter checks.
pub async fn get_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = $1 FOR UPDATE")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE status = 'active' ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Creates the tenant row at process bootstrap if absent (Tenant
/// lifecycle).
pub async fn ensure_exists(
    pool: &PgPool,
    name: &str,
    default_capacity: u32,
) -> Result<Tenant, sqlx::Error> {
    if let Some(tenant) = get(pool, name).await? {
        return Ok(tenant);
    }

    sqlx::query_as::<_, Tenant>(
        "INSERT INTO tenants (name, capacity, current_count, status)
         VALUES ($1, $2, 0, 'active')
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
         RETURNING *",
    )
    .bind(name)
    .bind(default_capacity as i32)
    .fetch_one(pool)
    .await
}

/// Bootstrap reconciliation: recomputes `current_count` from the bot
/// table and overwrites the counter column.
pub async fn reconcile_counts(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tenants t
         SET current_count = COALESCE((
             SELECT COUNT(*) FROM bots b WHERE b.tenant = t.name
         ), 0)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn increment_count(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET current_count = current_count + 1 WHERE name = $1")
        .bind(name)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn decrement_count(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tenants SET current_count = GREATEST(current_count - 1, 0) WHERE name = $1",
    )
    .bind(name)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
