//! Global phone registry, the "God Registry".

use sqlx::{PgExecutor, PgPool};

use crate::db::models::GlobalRegistryEntry;

pub async fn lookup<'e>(
    exec: impl PgExecutor<'e>,
    phone: &str,
) -> Result<Option<GlobalRegistryEntry>, sqlx::Error> {
    sqlx::query_as::<_, GlobalRegistryEntry>("SELECT * FROM global_registry WHERE phone = $1")
        .bind(phone)
        .fetch_optional(exec)
        .await
}

pub async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    phone: &str,
    tenant: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO global_registry (phone, tenant, created_at) VALUES ($1, $2, now())")
        .bind(phone)
        .bind(tenant)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn update_tenant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    phone: &str,
    tenant: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE global_registry SET tenant = $1 WHERE phone = $2")
        .bind(tenant)
        .bind(phone)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn remove(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    phone: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM global_registry WHERE phone = $1")
        .bind(phone)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
