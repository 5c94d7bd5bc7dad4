//! Container Store.
//!
//! A hierarchical file area holding per-bot authentication material at
//! `auth/<tenant>/bot_<botId>/`, treated as an opaque directory the
//! WhatsApp socket library reads and writes. Uses `tokio::fs` for every
//! touch point since file I/O is a suspension point.

use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorCode;

const CREDS_FILE: &str = "creds.json";

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize credentials: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ContainerError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ContainerIoFailed
    }
}

/// Root directory for all bot containers, e.g. `<home>/auth`.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    root: PathBuf,
}

impl ContainerStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `auth/<tenant>/bot_<botId>/`.
    pub fn bot_path(&self, tenant: &str, bot_id: Uuid) -> PathBuf {
        self.root.join(tenant).join(format!("bot_{bot_id}"))
    }

    /// Whether the container already holds credential material.
    pub async fn has_credentials(&self, tenant: &str, bot_id: Uuid) -> bool {
        tokio::fs::metadata(self.bot_path(tenant, bot_id).join(CREDS_FILE))
            .await
            .is_ok()
    }

    /// Materializes `blob` into the container if it is not already
    /// present. Never overwrites existing credential material — per the
    /// contract, a worker only writes into an empty container.
    pub async fn materialize_if_absent(
        &self,
        tenant: &str,
        bot_id: Uuid,
        blob: &Value,
    ) -> Result<(), ContainerError> {
        if self.has_credentials(tenant, bot_id).await {
            return Ok(());
        }
        let dir = self.bot_path(tenant, bot_id);
        tokio::fs::create_dir_all(&dir).await?;
        let contents = serde_json::to_vec_pretty(blob)?;
        tokio::fs::write(dir.join(CREDS_FILE), contents).await?;
        Ok(())
    }

    /// Removes the container entirely. Only called on destroy — never on
    /// a graceful stop, since credentials are removed only when the bot
    /// is destroyed.
    pub async fn destroy(&self, tenant: &str, bot_id: Uuid) -> Result<(), ContainerError> {
        let dir = self.bot_path(tenant, bot_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Physically moves the container directory to the target tenant's path.
    pub async fn migrate(
        &self,
        from_tenant: &str,
        to_tenant: &str,
        bot_id: Uuid,
    ) -> Result<(), ContainerError> {
        let source = self.bot_path(from_tenant, bot_id);
        let dest = self.bot_path(to_tenant, bot_id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::metadata(&source).await.is_ok() {
            tokio::fs::rename(&source, &dest).await?;
        }
        Ok(())
    }

    /// Creates a fresh, uniquely-named temporary container for an
    /// ephemeral pairing request. Returns the directory path; the
    /// caller tears it down unconditionally once the pairing attempt
    /// resolves.
    pub async fn create_ephemeral(&self, request_id: Uuid) -> Result<PathBuf, ContainerError> {
        let dir = self.root.join("pairing").join(request_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Tears down an ephemeral pairing container, discarding any
    /// credentials accidentally written to it.
    pub async fn teardown_ephemeral(&self, dir: &Path) -> Result<(), ContainerError> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn materialize_then_has_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let bot_id = Uuid::new_v4();

        assert!(!store.has_credentials("SERVER1", bot_id).await);
        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"noiseKey": "x"}))
            .await
            .unwrap();
        assert!(store.has_credentials("SERVER1", bot_id).await);
    }

    #[tokio::test]
    async fn materialize_does_not_overwrite_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let bot_id = Uuid::new_v4();

        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"v": 1}))
            .await
            .unwrap();
        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"v": 2}))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(
            store.bot_path("SERVER1", bot_id).join(CREDS_FILE),
        )
        .await
        .unwrap();
        assert!(contents.contains('1'));
    }

    #[tokio::test]
    async fn migrate_moves_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let bot_id = Uuid::new_v4();

        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"v": 1}))
            .await
            .unwrap();
        store.migrate("SERVER1", "SERVER2", bot_id).await.unwrap();

        assert!(!store.has_credentials("SERVER1", bot_id).await);
        assert!(store.has_credentials("SERVER2", bot_id).await);
    }

    #[tokio::test]
    async fn migrate_roundtrip_restores_original_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let bot_id = Uuid::new_v4();

        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"v": 1}))
            .await
            .unwrap();
        store.migrate("SERVER1", "SERVER2", bot_id).await.unwrap();
        store.migrate("SERVER2", "SERVER1", bot_id).await.unwrap();

        assert!(store.has_credentials("SERVER1", bot_id).await);
        assert!(!store.has_credentials("SERVER2", bot_id).await);
    }

    #[tokio::test]
    async fn destroy_removes_container() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let bot_id = Uuid::new_v4();

        store
            .materialize_if_absent("SERVER1", bot_id, &json!({"v": 1}))
            .await
            .unwrap();
        store.destroy("SERVER1", bot_id).await.unwrap();
        assert!(!store.has_credentials("SERVER1", bot_id).await);
    }

    #[tokio::test]
    async fn ephemeral_teardown_removes_pairing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().to_path_buf());
        let request_id = Uuid::new_v4();

        let ephemeral = store.create_ephemeral(request_id).await.unwrap();
        assert!(tokio::fs::metadata(&ephemeral).await.is_ok());
        store.teardown_ephemeral(&ephemeral).await.unwrap();
        assert!(tokio::fs::metadata(&ephemeral).await.is_err());
    }
}
