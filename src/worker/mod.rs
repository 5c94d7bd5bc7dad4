//! Bot Worker.
//!
//! Wraps exactly one WhatsApp socket for exactly one bot. Built on the
//! `Bot::builder()...on_event(...).build().await`, `bot.run().await`
//! join-handle pattern, generalized from a single static agent to one
//! instance per bot id.

pub mod state;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;
use wacore::types::events::Event;
use wacore_binary::jid::Jid;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use crate::container::ContainerStore;
use crate::db::models::{Bot as BotRow, BotStatus};
use crate::db::repository::activity::{self, NewActivity};
use crate::db::repository::bot as bot_repo;
use crate::error::ErrorCode;

pub use state::WorkerStatus;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("whatsapp socket build or connect failed: {0}")]
    BuildFailed(String),

    #[error("container I/O failed: {0}")]
    Container(#[from] crate::container::ContainerError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkerError::BuildFailed(_) => ErrorCode::ConnectTimeout,
            WorkerError::Container(_) => ErrorCode::ContainerIoFailed,
            WorkerError::Database(_) => ErrorCode::DatabaseUnavailable,
        }
    }
}

/// Owns exactly one socket for exactly one bot id (invariant: "no
/// two workers share a container directory").
pub struct BotWorker {
    tenant: String,
    bot_id: Uuid,
    pool: PgPool,
    containers: ContainerStore,
    status: WorkerStatus,
    row: Arc<Mutex<BotRow>>,
    client: Arc<Mutex<Option<Arc<Client>>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BotWorker {
    pub fn new(pool: PgPool, containers: ContainerStore, row: BotRow) -> Self {
        Self {
            tenant: row.tenant.clone(),
            bot_id: row.id,
            pool,
            containers,
            status: WorkerStatus::new(),
            row: Arc::new(Mutex::new(row)),
            client: Arc::new(Mutex::new(None)),
            handle: Mutex::new(None),
        }
    }

    pub fn bot_id(&self) -> Uuid {
        self.bot_id
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub async fn status(&self) -> BotStatus {
        self.status.get().await
    }

    /// Updates the in-memory status and persists it to the bot row so
    /// the socket state survives process restarts and is visible to
    /// the Control Plane.
    async fn set_status(&self, status: BotStatus) {
        self.status.set(status).await;
        if let Err(e) = bot_repo::set_status(&self.pool, self.bot_id, status).await {
            warn!(bot_id = %self.bot_id, error = %e, "failed to persist worker status");
        }
    }

    /// Connects the worker's socket. No-op if already `online`.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if self.status().await == BotStatus::Online {
            return Ok(());
        }

        let row = self.row.lock().await.clone();

        if !row.credentials_blob.trim().is_empty()
            && !self
                .containers
                .has_credentials(&self.tenant, self.bot_id)
                .await
        {
            if let Ok(blob) = serde_json::from_str::<serde_json::Value>(&row.credentials_blob) {
                self.containers
                    .materialize_if_absent(&self.tenant, self.bot_id, &blob)
                    .await?;
            }
        }

        self.set_status(BotStatus::Loading).await;
        self.record_activity("worker_start", "worker starting").await;

        let db_path = self
            .containers
            .bot_path(&self.tenant, self.bot_id)
            .join("store.db");
        let backend = Arc::new(
            SqliteStore::new(db_path.to_string_lossy().as_ref())
                .await
                .map_err(|e| WorkerError::BuildFailed(e.to_string()))?,
        );

        let status = self.status.clone();
        let client_slot = self.client.clone();
        let pool = self.pool.clone();
        let tenant = self.tenant.clone();
        let bot_id = self.bot_id;

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let status = status.clone();
                let client_slot = client_slot.clone();
                let pool = pool.clone();
                let tenant = tenant.clone();
                async move {
                    match event {
                        Event::Connected(_) => {
                            status.set(BotStatus::Online).await;
                            if let Err(e) = bot_repo::set_status(&pool, bot_id, BotStatus::Online).await
                            {
                                warn!(%bot_id, error = %e, "failed to persist worker status");
                            }
                            *client_slot.lock().await = Some(client.clone());
                            let _ = activity::record(
                                &pool,
                                NewActivity {
                                    activity_type: "worker_connected",
                                    description: "bot connected",
                                    bot_id: Some(bot_id),
                                    tenant: &tenant,
                                    phone: None,
                                    remote_tenant: None,
                                    remote_bot_id: None,
                                    metadata: None,
                                },
                            )
                            .await;
                        }
                        Event::Disconnected(reason) => {
                            let retriable = state::is_retriable_close(&format!("{reason:?}"));
                            let new_status = if retriable {
                                BotStatus::Loading
                            } else {
                                BotStatus::Error
                            };
                            status.set(new_status).await;
                            if let Err(e) = bot_repo::set_status(&pool, bot_id, new_status).await {
                                warn!(%bot_id, error = %e, "failed to persist worker status");
                            }
                            if !retriable {
                                *client_slot.lock().await = None;
                            }
                        }
                        Event::LoggedOut(_) => {
                            status.set(BotStatus::Error).await;
                            if let Err(e) = bot_repo::set_status(&pool, bot_id, BotStatus::Error).await
                            {
                                warn!(%bot_id, error = %e, "failed to persist worker status");
                            }
                            *client_slot.lock().await = None;
                        }
                        _ => {}
                    }
                }
            })
            .build()
            .await
            .map_err(|e| WorkerError::BuildFailed(e.to_string()))?;

        let join = bot
            .run()
            .await
            .map_err(|e| WorkerError::BuildFailed(e.to_string()))?;
        *self.handle.lock().await = Some(join);

        Ok(())
    }

    /// Graceful stop. No-op if already `offline`. Never deletes
    /// credentials — those are removed only when the bot is destroyed.
    pub async fn stop(&self) {
        if self.status().await == BotStatus::Offline {
            return;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
        *self.client.lock().await = None;
        self.set_status(BotStatus::Offline).await;
        self.record_activity("worker_stop", "worker stopped").await;
    }

    /// Pushes a new row into the cached view without restarting the worker.
    pub async fn update_bot_row(&self, row: BotRow) {
        *self.row.lock().await = row;
    }

    /// Sends a direct text message. Only when the worker reports
    /// `online`; else returns `false` (`sendMessage`).
    pub async fn send_direct(&self, jid: &str, text: &str) -> bool {
        if self.status().await != BotStatus::Online {
            return false;
        }

        let client = self.client.lock().await.clone();
        let Some(client) = client else {
            return false;
        };

        let Ok(target) = jid.parse::<Jid>() else {
            return false;
        };

        let message = waproto::whatsapp::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };

        client.send_message(target, message).await.is_ok()
    }

    async fn record_activity(&self, activity_type: &str, description: &str) {
        let _ = activity::record(
            &self.pool,
            NewActivity {
                activity_type,
                description,
                bot_id: Some(self.bot_id),
                tenant: &self.tenant,
                phone: None,
                remote_tenant: None,
                remote_bot_id: None,
                metadata: None,
            },
        )
        .await;
    }
}
