//! Guest pairing sessions (Guest Pairing Session). TTL measured in
//! minutes, enforced by a `WHERE expires_at > now()` filter rather than a
//! background reaper — expired rows are simply invisible to lookups and
//! are swept opportunistically on insert.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::GuestPairingSession;

pub async fn create(
    pool: &PgPool,
    phone: &str,
    pairing_code: &str,
    session_id: Option<Uuid>,
    ttl_minutes: i64,
) -> Result<GuestPairingSession, sqlx::Error> {
    sqlx::query("DELETE FROM guest_pairing_sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;

    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    sqlx::query_as::<_, GuestPairingSession>(
        "INSERT INTO guest_pairing_sessions (phone, pairing_code, session_id, created_at, expires_at)
         VALUES ($1, $2, $3, now(), $4)
         ON CONFLICT (phone) DO UPDATE SET pairing_code = $2, session_id = $3, created_at = now(), expires_at = $4
         RETURNING *",
    )
    .bind(phone)
    .bind(pairing_code)
    .bind(session_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub async fn find(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<GuestPairingSession>, sqlx::Error> {
    sqlx::query_as::<_, GuestPairingSession>(
        "SELECT * FROM guest_pairing_sessions WHERE phone = $1 AND expires_at > now()",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await
}
