//! Worker state machine.
//!
//! `offline → loading → online → (offline|error)`. Transitions are
//! idempotent: `start` on `online` is a no-op, `stop` on `offline` is a
//! no-op — enforced by the callers in `mod.rs`, not by this type itself.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::models::BotStatus;

#[derive(Clone)]
pub struct WorkerStatus(Arc<RwLock<BotStatus>>);

impl WorkerStatus {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(BotStatus::Offline)))
    }

    pub async fn get(&self) -> BotStatus {
        *self.0.read().await
    }

    pub async fn set(&self, status: BotStatus) {
        *self.0.write().await = status;
    }
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies a close/disconnect reason as retriable (worth a reconnect
/// attempt) or terminal.
pub fn is_retriable_close(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("logged_out") || lower.contains("401") || lower.contains("conflict") {
        return false;
    }
    lower.contains("stream")
        || lower.contains("restart")
        || lower.contains("timeout")
        || lower.contains("connection")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_offline() {
        let status = WorkerStatus::new();
        assert_eq!(status.get().await, BotStatus::Offline);
    }

    #[tokio::test]
    async fn transitions_are_observable() {
        let status = WorkerStatus::new();
        status.set(BotStatus::Loading).await;
        assert_eq!(status.get().await, BotStatus::Loading);
        status.set(BotStatus::Online).await;
        assert_eq!(status.get().await, BotStatus::Online);
    }

    #[test]
    fn stream_errors_are_retriable() {
        assert!(is_retriable_close("stream-error restart"));
    }

    #[test]
    fn logout_is_terminal() {
        assert!(!is_retriable_close("LoggedOut(Reason::Default)"));
    }
}
