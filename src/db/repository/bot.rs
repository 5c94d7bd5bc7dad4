//! Bot row access (Bot).

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::{ApprovalStatus, Bot, BotFeatures, BotStatus};

pub async fn get<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Bot>, sqlx::Error> {
    sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
}

pub async fn get_by_phone<'e>(
    exec: impl PgExecutor<'e>,
    phone: &str,
) -> Result<Option<Bot>, sqlx::Error> {
    sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE phone = $1")
        .bind(phone)
        .fetch_optional(exec)
        .await
}

pub async fn list_approved_for_tenant(
    pool: &PgPool,
    tenant: &str,
) -> Result<Vec<Bot>, sqlx::Error> {
    sqlx::query_as::<_, Bot>(
        "SELECT * FROM bots WHERE tenant = $1 AND approval_status = 'approved' ORDER BY created_at",
    )
    .bind(tenant)
    .fetch_all(pool)
    .await
}

pub async fn list_approved(pool: &PgPool) -> Result<Vec<Bot>, sqlx::Error> {
    sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE approval_status = 'approved' ORDER BY tenant, created_at")
        .fetch_all(pool)
        .await
}

/// Row shape for a new registration (step 5), prior to persistence.
pub struct NewBot {
    pub display_name: String,
    pub phone: String,
    pub credentials_blob: String,
    pub features: BotFeatures,
    pub tenant: String,
    pub is_guest: bool,
}

pub async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    new_bot: &NewBot,
) -> Result<Bot, sqlx::Error> {
    sqlx::query_as::<_, Bot>(
        "INSERT INTO bots (
            id, display_name, phone, credentials_blob,
            auto_like, auto_react, auto_view_status, chat_agent_enabled, typing_mode,
            message_count, command_count,
            status, approval_status, approval_date, expiration_months,
            tenant, is_guest, created_at, updated_at
         ) VALUES (
            $1, $2, $3, $4,
            $5, $6, $7, $8, $9,
            0, 0,
            'offline', 'pending', NULL, NULL,
            $10, $11, now(), now()
         ) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&new_bot.display_name)
    .bind(&new_bot.phone)
    .bind(&new_bot.credentials_blob)
    .bind(new_bot.features.auto_like)
    .bind(new_bot.features.auto_react)
    .bind(new_bot.features.auto_view_status)
    .bind(new_bot.features.chat_agent_enabled)
    .bind(new_bot.features.typing_mode)
    .bind(&new_bot.tenant)
    .bind(new_bot.is_guest)
    .fetch_one(&mut **tx)
    .await
}

pub async fn delete(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM bots WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: BotStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bots SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_approval(
    pool: &PgPool,
    id: Uuid,
    status: ApprovalStatus,
    approval_date: Option<DateTime<Utc>>,
    expiration_months: Option<i32>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bots SET approval_status = $1, approval_date = $2, expiration_months = $3,
         updated_at = now() WHERE id = $4",
    )
    .bind(status)
    .bind(approval_date)
    .bind(expiration_months)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_tenant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    tenant: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bots SET tenant = $1, updated_at = now() WHERE id = $2")
        .bind(tenant)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn update_credentials(
    pool: &PgPool,
    id: Uuid,
    credentials_blob: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bots SET credentials_blob = $1, updated_at = now() WHERE id = $2")
        .bind(credentials_blob)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
