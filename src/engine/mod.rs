//! Registration Engine and Global Registry & Tenant Capacity.
//!
//! Built on a `create_bot`-handler-shaped transaction (`sqlx`
//! transaction, `FOR UPDATE` tenant-capacity check, insert-then-commit,
//! reject on capacity) generalized to this crate's full
//! registration/approval/migration/batch surface. Every mutation that
//! touches more than one row (bot + registry + tenant counter) runs
//! inside one transaction so a failure anywhere leaves no trace.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::credentials::{self, CredentialError};
use crate::container::ContainerStore;
use crate::db::models::{ApprovalStatus, Bot, BotFeatures};
use crate::db::repository::activity::{self, NewActivity};
use crate::db::repository::{bot as bot_repo, guest as guest_repo, registry, tenant as tenant_repo};
use crate::error::ErrorCode;
use crate::supervisor::Supervisor;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("tenant {0} is unknown or inactive")]
    TenantUnknown(String),

    #[error("tenant {0} is at capacity")]
    TenantFull(String),

    #[error("approval duration must be between 1 and 12 months")]
    BadDuration,

    #[error("bot is not approved")]
    NotApproved,

    #[error("bot has been rejected")]
    Rejected,

    #[error("bot is dormant")]
    Dormant,

    #[error("migration target equals the bot's current tenant")]
    MigrationSameTenant,

    #[error("bot is skipped in the failure ledger")]
    Skipped,

    #[error(transparent)]
    Container(#[from] crate::container::ContainerError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RegistrationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistrationError::Credential(e) => e.code(),
            RegistrationError::TenantUnknown(_) => ErrorCode::TenantUnknown,
            RegistrationError::TenantFull(_) => ErrorCode::TenantFull,
            RegistrationError::BadDuration => ErrorCode::BadDuration,
            RegistrationError::NotApproved => ErrorCode::NotApproved,
            RegistrationError::Rejected => ErrorCode::Rejected,
            RegistrationError::Dormant => ErrorCode::Dormant,
            RegistrationError::MigrationSameTenant => ErrorCode::MigrationSameTenant,
            RegistrationError::Skipped => ErrorCode::Skipped,
            RegistrationError::Container(e) => e.code(),
            RegistrationError::Database(_) => ErrorCode::DatabaseUnavailable,
        }
    }
}

fn validate_duration(months: i32) -> Result<(), RegistrationError> {
    if (1..=12).contains(&months) {
        Ok(())
    } else {
        Err(RegistrationError::BadDuration)
    }
}

/// `register({botName, phone, sessionString, features, targetTenant?})`.
pub struct RegisterRequest {
    pub display_name: String,
    pub wire_or_blob: String,
    pub caller_phone: Option<String>,
    pub target_tenant: Option<String>,
    pub features: BotFeatures,
    pub is_guest: bool,
    /// If the phone is already registered on the target tenant and this
    /// is set, return the existing row instead of rejecting.
    pub discover_existing: bool,
}

pub enum RegistrationOutcome {
    NewRegistration(Bot),
    ExistingBotFound(Bot),
}

/// `checkRegistration({phone})`.
pub struct RegistrationStatus {
    pub registered: bool,
    pub hosting_tenant: Option<String>,
    pub current_tenant: String,
    pub has_bot_here: bool,
    pub bot: Option<Bot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Start,
    Stop,
    Restart,
    Approve,
}

pub struct BatchResult {
    pub total: usize,
    pub completed: usize,
    pub failed: Vec<(Uuid, String)>,
}

pub struct Engine {
    pool: PgPool,
    containers: ContainerStore,
    supervisor: Arc<Supervisor>,
}

impl Engine {
    pub fn new(pool: PgPool, containers: ContainerStore, supervisor: Arc<Supervisor>) -> Self {
        Self {
            pool,
            containers,
            supervisor,
        }
    }

    /// Registers a new bot, or returns the caller's existing one when
    /// `discover_existing` permits it.
    pub async fn register(
        &self,
        current_tenant: &str,
        req: RegisterRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let normalized =
            credentials::validate_and_extract(&req.wire_or_blob, req.caller_phone.as_deref())?;

        let target_tenant = req
            .target_tenant
            .as_deref()
            .unwrap_or(current_tenant)
            .trim()
            .to_ascii_uppercase();

        let mut tx = self.pool.begin().await?;

        let tenant_row = tenant_repo::get_for_update(&mut tx, &target_tenant).await?;
        match &tenant_row {
            Some(t) if !t.is_active() => return Err(RegistrationError::TenantUnknown(target_tenant)),
            Some(t) if !t.has_capacity() => return Err(RegistrationError::TenantFull(target_tenant)),
            Some(_) => {}
            None => return Err(RegistrationError::TenantUnknown(target_tenant)),
        }

        match credentials::cross_check_registry(&self.pool, &normalized.phone, &target_tenant)
            .await?
        {
            credentials::RegistryCheck::Available => {}
            credentials::RegistryCheck::DuplicateOnThisTenant if req.discover_existing => {
                let existing = bot_repo::get_by_phone(&self.pool, &normalized.phone)
                    .await?
                    .ok_or(CredentialError::DuplicateOnThisTenant)?;
                return Ok(RegistrationOutcome::ExistingBotFound(existing));
            }
            credentials::RegistryCheck::DuplicateOnThisTenant => {
                return Err(CredentialError::DuplicateOnThisTenant.into());
            }
            credentials::RegistryCheck::DuplicateOnOtherTenant(other) => {
                return Err(CredentialError::DuplicateOnOtherTenant(other).into());
            }
            credentials::RegistryCheck::InconsistentLocalBot => {
                return Err(CredentialError::InconsistentLocalBot.into());
            }
        }

        let new_bot = bot_repo::NewBot {
            display_name: req.display_name,
            phone: normalized.phone.clone(),
            credentials_blob: normalized.blob.to_string(),
            features: req.features,
            tenant: target_tenant.clone(),
            is_guest: req.is_guest,
        };

        let bot = bot_repo::insert(&mut tx, &new_bot).await?;
        registry::insert(&mut tx, &normalized.phone, &target_tenant).await?;
        tenant_repo::increment_count(&mut tx, &target_tenant).await?;

        tx.commit().await?;

        self.record_activity(
            "creation",
            "bot registered",
            Some(bot.id),
            &target_tenant,
            Some(&normalized.phone),
            None,
            None,
        )
        .await;

        Ok(RegistrationOutcome::NewRegistration(bot))
    }

    /// `validateCredentials`. Pure pass-through to the Credential
    /// Validator; kept here so the Control Plane has one entry point per
    /// external operation.
    pub fn validate_credentials(
        &self,
        session_or_blob: &str,
        caller_phone: Option<&str>,
    ) -> Result<credentials::NormalizedCredential, CredentialError> {
        credentials::validate_and_extract(session_or_blob, caller_phone)
    }

    /// `checkRegistration({phone})`.
    pub async fn check_registration(
        &self,
        phone: &str,
        current_tenant: &str,
    ) -> Result<RegistrationStatus, RegistrationError> {
        let entry = registry::lookup(&self.pool, phone).await?;
        let bot = bot_repo::get_by_phone(&self.pool, phone).await?;
        let hosting_tenant = entry.map(|e| e.tenant);
        let has_bot_here = hosting_tenant.as_deref() == Some(current_tenant);

        Ok(RegistrationStatus {
            registered: hosting_tenant.is_some(),
            hosting_tenant,
            current_tenant: current_tenant.to_string(),
            has_bot_here,
            bot,
        })
    }

    /// `getGuestSession(phone)`.
    pub async fn guest_session(&self, phone: &str) -> Result<Option<Uuid>, RegistrationError> {
        let session = guest_repo::find(&self.pool, phone).await?;
        Ok(session.and_then(|s| s.session_id))
    }

    /// "Approval". `approve(id, m)`.
    pub async fn approve(&self, bot_id: Uuid, months: i32) -> Result<(), RegistrationError> {
        validate_duration(months)?;

        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };

        bot_repo::set_approval(
            &self.pool,
            bot_id,
            ApprovalStatus::Approved,
            Some(Utc::now()),
            Some(months),
        )
        .await?;

        self.record_activity(
            "approval",
            "bot approved",
            Some(bot_id),
            &row.tenant,
            Some(&row.phone),
            None,
            None,
        )
        .await;

        Ok(())
    }

    /// "Approval". `revoke(id)`.
    pub async fn revoke(&self, bot_id: Uuid) -> Result<(), RegistrationError> {
        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };

        bot_repo::set_approval(&self.pool, bot_id, ApprovalStatus::Pending, None, None).await?;

        self.record_activity(
            "revocation",
            "bot approval revoked",
            Some(bot_id),
            &row.tenant,
            Some(&row.phone),
            None,
            None,
        )
        .await;

        Ok(())
    }

    /// "Approval". `reject(id)` — also stops any worker.
    pub async fn reject(&self, bot_id: Uuid) -> Result<(), RegistrationError> {
        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };

        bot_repo::set_approval(&self.pool, bot_id, ApprovalStatus::Rejected, None, None).await?;
        self.supervisor.stop(bot_id).await;

        self.record_activity(
            "rejection",
            "bot rejected",
            Some(bot_id),
            &row.tenant,
            Some(&row.phone),
            None,
            None,
        )
        .await;

        Ok(())
    }

    /// "Expiration sweep". Runs periodically; per-bot failures are
    /// logged, not propagated, so one bad row never stalls the sweep.
    pub async fn sweep_expirations(&self) -> Result<(), RegistrationError> {
        let approved = bot_repo::list_approved(&self.pool).await?;
        let now = Utc::now();

        for row in approved {
            if !row.has_expired(now) {
                continue;
            }

            if let Err(e) = bot_repo::set_approval(
                &self.pool,
                row.id,
                ApprovalStatus::Dormant,
                row.approval_date,
                row.expiration_months,
            )
            .await
            {
                warn!(bot_id = %row.id, error = %e, "sweep_expirations: failed to mark dormant");
                continue;
            }

            self.supervisor.stop(row.id).await;
            self.record_activity(
                "expiration",
                "bot expired",
                Some(row.id),
                &row.tenant,
                Some(&row.phone),
                None,
                None,
            )
            .await;
        }

        Ok(())
    }

    /// "Migration". `migrate(botId, targetTenant)`.
    pub async fn migrate(&self, bot_id: Uuid, target_tenant: &str) -> Result<(), RegistrationError> {
        let target_tenant = target_tenant.trim().to_ascii_uppercase();

        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };
        let source_tenant = row.tenant.clone();

        if source_tenant == target_tenant {
            return Err(RegistrationError::MigrationSameTenant);
        }

        let mut tx = self.pool.begin().await?;

        let target_row = tenant_repo::get_for_update(&mut tx, &target_tenant).await?;
        match &target_row {
            Some(t) if t.has_capacity() => {}
            Some(_) => return Err(RegistrationError::TenantFull(target_tenant)),
            None => return Err(RegistrationError::TenantUnknown(target_tenant)),
        }

        self.supervisor.stop(bot_id).await;

        bot_repo::set_tenant(&mut tx, bot_id, &target_tenant).await?;
        registry::update_tenant(&mut tx, &row.phone, &target_tenant).await?;
        tenant_repo::decrement_count(&mut tx, &source_tenant).await?;
        tenant_repo::increment_count(&mut tx, &target_tenant).await?;

        tx.commit().await?;

        self.containers
            .migrate(&source_tenant, &target_tenant, bot_id)
            .await?;

        if row.eligible_for_auto_start() {
            if let Err(e) = self.supervisor.start(bot_id).await {
                warn!(%bot_id, error = %e, "migrate: failed to start worker on target tenant");
            }
        }

        self.record_activity(
            "migration",
            &format!("migrated to {target_tenant}"),
            Some(bot_id),
            &source_tenant,
            Some(&row.phone),
            Some(&target_tenant),
            Some(bot_id),
        )
        .await;
        self.record_activity(
            "migration",
            &format!("migrated from {source_tenant}"),
            Some(bot_id),
            &target_tenant,
            Some(&row.phone),
            Some(&source_tenant),
            Some(bot_id),
        )
        .await;

        Ok(())
    }

    /// `updateCredentials(botId, sessionString)`: replaces the
    /// credentials blob, stops and restarts the worker, preserves
    /// approval state.
    pub async fn update_credentials(
        &self,
        bot_id: Uuid,
        session_or_blob: &str,
    ) -> Result<(), RegistrationError> {
        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };

        let normalized = credentials::validate_and_extract(session_or_blob, Some(&row.phone))?;
        bot_repo::update_credentials(&self.pool, bot_id, &normalized.blob.to_string()).await?;

        self.supervisor.stop(bot_id).await;
        if row.eligible_for_auto_start() {
            self.supervisor.start(bot_id).await?;
        }

        self.record_activity(
            "credentials_update",
            "credentials updated",
            Some(bot_id),
            &row.tenant,
            Some(&row.phone),
            None,
            None,
        )
        .await;

        Ok(())
    }

    /// "Batch operations". Per-item transactional, not
    /// batch-atomic: one item's failure never aborts the rest.
    pub async fn batch(
        &self,
        operation: BatchOperation,
        bot_ids: &[Uuid],
        approve_months: Option<i32>,
    ) -> BatchResult {
        let total = bot_ids.len();
        let mut completed = 0;
        let mut failed = Vec::new();

        for &bot_id in bot_ids {
            let result: Result<(), String> = match operation {
                BatchOperation::Start => self
                    .supervisor
                    .start(bot_id)
                    .await
                    .map_err(|e| e.to_string()),
                BatchOperation::Stop => {
                    self.supervisor.stop(bot_id).await;
                    Ok(())
                }
                BatchOperation::Restart => self
                    .supervisor
                    .restart(bot_id)
                    .await
                    .map_err(|e| e.to_string()),
                BatchOperation::Approve => self
                    .approve(bot_id, approve_months.unwrap_or(1))
                    .await
                    .map_err(|e| e.to_string()),
            };

            match result {
                Ok(()) => completed += 1,
                Err(e) => failed.push((bot_id, e)),
            }
        }

        BatchResult {
            total,
            completed,
            failed,
        }
    }

    /// `listTenants()`.
    pub async fn list_tenants(&self) -> Result<Vec<crate::db::models::Tenant>, RegistrationError> {
        Ok(tenant_repo::list_all(&self.pool).await?)
    }

    /// `resumeTenant(name)`. Delegates to the Supervisor.
    pub async fn resume_tenant(&self, tenant: &str) {
        self.supervisor.resume_tenant(tenant).await;
    }

    async fn record_activity(
        &self,
        activity_type: &str,
        description: &str,
        bot_id: Option<Uuid>,
        tenant: &str,
        phone: Option<&str>,
        remote_tenant: Option<&str>,
        remote_bot_id: Option<Uuid>,
    ) {
        let _ = activity::record(
            &self.pool,
            NewActivity {
                activity_type,
                description,
                bot_id,
                tenant,
                phone,
                remote_tenant,
                remote_bot_id,
                metadata: None,
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_within_bounds_is_accepted() {
        assert!(validate_duration(1).is_ok());
        assert!(validate_duration(12).is_ok());
    }

    #[test]
    fn duration_outside_bounds_is_rejected() {
        assert!(matches!(
            validate_duration(0).unwrap_err(),
            RegistrationError::BadDuration
        ));
        assert!(matches!(
            validate_duration(13).unwrap_err(),
            RegistrationError::BadDuration
        ));
    }

    #[test]
    fn batch_result_counts_failures_independently() {
        let result = BatchResult {
            total: 3,
            completed: 2,
            failed: vec![(Uuid::new_v4(), "connect timeout".to_string())],
        };
        assert_eq!(result.total, 3);
        assert_eq!(result.completed, 2);
        assert_eq!(result.failed.len(), 1);
    }

    #[test]
    fn error_codes_map_to_taxonomy() {
        assert_eq!(
            RegistrationError::TenantFull("X".into()).code(),
            ErrorCode::TenantFull
        );
        assert_eq!(
            RegistrationError::MigrationSameTenant.code(),
            ErrorCode::MigrationSameTenant
        );
        assert_eq!(RegistrationError::Skipped.code(), ErrorCode::Skipped);
    }
}
