//! Append-only activity log (Activity).

use sqlx::PgPool;
use uuid::Uuid;

pub struct NewActivity<'a> {
    pub activity_type: &'a str,
    pub description: &'a str,
    pub bot_id: Option<Uuid>,
    pub tenant: &'a str,
    pub phone: Option<&'a str>,
    pub remote_tenant: Option<&'a str>,
    pub remote_bot_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn record(
    exec: impl sqlx::PgExecutor<'_>,
    activity: NewActivity<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO activities (
            id, activity_type, description, bot_id, tenant, phone,
            remote_tenant, remote_bot_id, metadata, created_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())",
    )
    .bind(Uuid::new_v4())
    .bind(activity.activity_type)
    .bind(activity.description)
    .bind(activity.bot_id)
    .bind(activity.tenant)
    .bind(activity.phone)
    .bind(activity.remote_tenant)
    .bind(activity.remote_bot_id)
    .bind(activity.metadata)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn record_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    activity: NewActivity<'_>,
) -> Result<(), sqlx::Error> {
    record(&mut **tx, activity).await
}

pub async fn list_recent(
    pool: &PgPool,
    tenant: &str,
    limit: i64,
) -> Result<Vec<crate::db::models::Activity>, sqlx::Error> {
    sqlx::query_as::<_, crate::db::models::Activity>(
        "SELECT * FROM activities WHERE tenant = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(tenant)
    .bind(limit)
    .fetch_all(pool)
    .await
}
