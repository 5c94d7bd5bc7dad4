//! Failure ledger.
//!
//! Persisted as a JSON array of `{botId, failureCount, lastFailureAt,
//! skipped}` objects, rewritten whole-file after each mutation, matching
//! the conservative single-writer file-rewrite style used elsewhere in
//! this crate for on-disk state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entries reach `skipped` at this failure count.
const SKIP_THRESHOLD: u32 = 2;

#[derive(Debug, Clone)]
struct FailureEntry {
    count: u32,
    last_failure_at: DateTime<Utc>,
    skipped: bool,
}

/// On-disk row shape: one array element per bot with a recorded failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerRow {
    bot_id: Uuid,
    failure_count: u32,
    last_failure_at: DateTime<Utc>,
    skipped: bool,
}

pub struct FailureLedger {
    path: PathBuf,
    entries: tokio::sync::RwLock<HashMap<Uuid, FailureEntry>>,
}

impl FailureLedger {
    /// Loads the ledger from `path`, treating a missing or corrupt file
    /// as an empty ledger.
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let rows: Vec<LedgerRow> = serde_json::from_slice(&bytes).unwrap_or_default();
                rows.into_iter()
                    .map(|row| {
                        (
                            row.bot_id,
                            FailureEntry {
                                count: row.failure_count,
                                last_failure_at: row.last_failure_at,
                                skipped: row.skipped,
                            },
                        )
                    })
                    .collect()
            }
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: tokio::sync::RwLock::new(entries),
        }
    }

    pub async fn is_skipped(&self, bot_id: Uuid) -> bool {
        self.entries
            .read()
            .await
            .get(&bot_id)
            .map(|e| e.skipped)
            .unwrap_or(false)
    }

    /// Records a start failure, marking the entry `skipped` once the
    /// threshold is reached.
    pub async fn record_failure(&self, bot_id: Uuid) {
        {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(bot_id).or_insert(FailureEntry {
                count: 0,
                last_failure_at: Utc::now(),
                skipped: false,
            });
            entry.count += 1;
            entry.last_failure_at = Utc::now();
            entry.skipped = entry.count >= SKIP_THRESHOLD;
        }
        self.persist().await;
    }

    /// Clears the entry on successful start or explicit destroy.
    pub async fn clear(&self, bot_id: Uuid) {
        {
            let mut entries = self.entries.write().await;
            entries.remove(&bot_id);
        }
        self.persist().await;
    }

    async fn persist(&self) {
        let entries = self.entries.read().await;
        let rows: Vec<LedgerRow> = entries
            .iter()
            .map(|(bot_id, e)| LedgerRow {
                bot_id: *bot_id,
                failure_count: e.count,
                last_failure_at: e.last_failure_at,
                skipped: e.skipped,
            })
            .collect();
        if let Ok(json) = serde_json::to_vec_pretty(&rows) {
            let tmp_path = tmp_path_for(&self.path);
            if tokio::fs::write(&tmp_path, &json).await.is_ok() {
                let _ = tokio::fs::rename(&tmp_path, &self.path).await;
            }
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_skips_after_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = FailureLedger::load(path).await;
        let bot_id = Uuid::new_v4();

        assert!(!ledger.is_skipped(bot_id).await);
        ledger.record_failure(bot_id).await;
        assert!(!ledger.is_skipped(bot_id).await);
        ledger.record_failure(bot_id).await;
        assert!(ledger.is_skipped(bot_id).await);
    }

    #[tokio::test]
    async fn clear_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = FailureLedger::load(path).await;
        let bot_id = Uuid::new_v4();

        ledger.record_failure(bot_id).await;
        ledger.record_failure(bot_id).await;
        assert!(ledger.is_skipped(bot_id).await);

        ledger.clear(bot_id).await;
        assert!(!ledger.is_skipped(bot_id).await);
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let bot_id = Uuid::new_v4();

        {
            let ledger = FailureLedger::load(path.clone()).await;
            ledger.record_failure(bot_id).await;
        }

        let reloaded = FailureLedger::load(path).await;
        assert!(!reloaded.is_skipped(bot_id).await);
    }
}
