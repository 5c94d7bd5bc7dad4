//! Bot Supervisor.
//!
//! Owns the set of live workers; enforces "exactly one worker per bot
//! id"; provides lifecycle primitives; maintains the failure ledger;
//! resumes bots on process start. A registry-of-long-lived-handles
//! shape, generalized from a single static client holder to a map keyed
//! by bot id, each entry serialized behind its own lock so distinct bots
//! proceed independently.

pub mod ledger;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::container::{ContainerError, ContainerStore};
use crate::db::models::Bot as BotRow;
use crate::db::repository::{bot as bot_repo, registry, tenant as tenant_repo};
use crate::error::ErrorCode;
use crate::worker::{BotWorker, WorkerError};
use ledger::FailureLedger;

const STOP_DISCARD_QUIESCENCE: Duration = Duration::from_secs(2);
const RESTART_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SupervisorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SupervisorError::Worker(e) => e.code(),
            SupervisorError::Container(e) => e.code(),
            SupervisorError::Database(_) => ErrorCode::DatabaseUnavailable,
        }
    }
}

pub struct Supervisor {
    pool: PgPool,
    containers: ContainerStore,
    workers: RwLock<HashMap<Uuid, Arc<BotWorker>>>,
    locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    ledger: FailureLedger,
}

impl Supervisor {
    pub async fn new(
        pool: PgPool,
        containers: ContainerStore,
        ledger_path: std::path::PathBuf,
    ) -> Self {
        Self {
            pool,
            containers,
            workers: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
            ledger: FailureLedger::load(ledger_path).await,
        }
    }

    async fn lock_for(&self, bot_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&bot_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(bot_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// `start(botId)`. Automatic/resume path: respects the failure
    /// ledger's skip flag.
    pub async fn start(&self, bot_id: Uuid) -> Result<(), SupervisorError> {
        self.start_inner(bot_id, false).await
    }

    /// Operator-initiated start: clears the skip flag before attempting,
    /// so a bot the ledger gave up on can be retried on demand.
    pub async fn force_start(&self, bot_id: Uuid) -> Result<(), SupervisorError> {
        self.start_inner(bot_id, true).await
    }

    async fn start_inner(&self, bot_id: Uuid, force: bool) -> Result<(), SupervisorError> {
        let lock = self.lock_for(bot_id).await;
        let _guard = lock.lock().await;

        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            warn!(%bot_id, "start: bot row missing, skipping");
            return Ok(());
        };

        if !row.eligible_for_auto_start() {
            info!(%bot_id, "start: bot not approved, skipping");
            return Ok(());
        }

        if force {
            self.ledger.clear(bot_id).await;
        } else if self.ledger.is_skipped(bot_id).await {
            info!(%bot_id, "start: bot is skipped in the failure ledger, skipping");
            return Ok(());
        }

        if let Some(existing) = self.workers.read().await.get(&bot_id).cloned() {
            if existing.status().await == crate::db::models::BotStatus::Online {
                self.ledger.clear(bot_id).await;
                return Ok(());
            }
            existing.stop().await;
            tokio::time::sleep(STOP_DISCARD_QUIESCENCE).await;
            self.workers.write().await.remove(&bot_id);
        }

        // Reload to get the freshest credentials and settings.
        let Some(fresh_row) = bot_repo::get(&self.pool, bot_id).await? else {
            warn!(%bot_id, "start: bot row disappeared during reload, skipping");
            return Ok(());
        };

        let worker = Arc::new(BotWorker::new(
            self.pool.clone(),
            self.containers.clone(),
            fresh_row,
        ));

        match worker.start().await {
            Ok(()) => {
                self.ledger.clear(bot_id).await;
                self.workers.write().await.insert(bot_id, worker);
                Ok(())
            }
            Err(e) => {
                warn!(%bot_id, error = %e, "start: worker failed to connect");
                self.ledger.record_failure(bot_id).await;
                Err(e.into())
            }
        }
    }

    /// `stop(botId)`.
    pub async fn stop(&self, bot_id: Uuid) {
        let lock = self.lock_for(bot_id).await;
        let _guard = lock.lock().await;

        if let Some(worker) = self.workers.read().await.get(&bot_id).cloned() {
            worker.stop().await;
        }
    }

    /// `restart(botId)`. Must not wipe container material — it
    /// only stops the socket, never touches the container.
    pub async fn restart(&self, bot_id: Uuid) -> Result<(), SupervisorError> {
        self.stop(bot_id).await;
        tokio::time::sleep(RESTART_GRACE).await;
        self.start(bot_id).await
    }

    /// `destroy(botId)`. The only de-registration path: removes the bot
    /// row, the global registry entry, and decrements the tenant's
    /// current count inside one transaction before tearing down the
    /// container and in-memory worker.
    pub async fn destroy(&self, bot_id: Uuid) -> Result<(), SupervisorError> {
        let lock = self.lock_for(bot_id).await;
        let _guard = lock.lock().await;

        if let Some(worker) = self.workers.write().await.remove(&bot_id) {
            worker.stop().await;
        }

        let Some(row) = bot_repo::get(&self.pool, bot_id).await? else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        bot_repo::delete(&mut tx, bot_id).await?;
        registry::remove(&mut tx, &row.phone).await?;
        tenant_repo::decrement_count(&mut tx, &row.tenant).await?;
        tx.commit().await?;

        self.containers.destroy(&row.tenant, bot_id).await?;
        self.ledger.clear(bot_id).await;
        Ok(())
    }

    /// `updateRow(botId, row)`.
    pub async fn update_row(&self, bot_id: Uuid, row: BotRow) {
        if let Some(worker) = self.workers.read().await.get(&bot_id).cloned() {
            worker.update_bot_row(row).await;
        }
    }

    /// `sendMessage(botId, jid, text)`.
    pub async fn send_message(&self, bot_id: Uuid, jid: &str, text: &str) -> bool {
        let Some(worker) = self.workers.read().await.get(&bot_id).cloned() else {
            return false;
        };
        worker.send_direct(jid, text).await
    }

    /// `resumeTenant(tenant)`. Logs per-bot failures without
    /// aborting the batch.
    pub async fn resume_tenant(&self, tenant: &str) {
        let approved = match bot_repo::list_approved_for_tenant(&self.pool, tenant).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(tenant, error = %e, "resume_tenant: failed to list approved bots");
                return;
            }
        };

        for row in approved {
            if let Err(e) = self.start(row.id).await {
                warn!(bot_id = %row.id, tenant, error = %e, "resume_tenant: bot failed to start");
            }
        }
    }

    /// `stopAll()`.
    pub async fn stop_all(&self) {
        let workers: Vec<Arc<BotWorker>> = self.workers.read().await.values().cloned().collect();
        let stops = workers.into_iter().map(|w| async move { w.stop().await });
        futures::future::join_all(stops).await;
        self.workers.write().await.clear();
    }
}
