//! Relational entities (Data Model).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub capacity: i32,
    pub current_count: i32,
    pub status: TenantStatus,
    pub url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn has_capacity(&self) -> bool {
        self.current_count < self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BotStatus {
    Offline,
    Loading,
    Online,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Dormant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TypingMode {
    None,
    Typing,
    Recording,
}

/// Feature flags (Bot attributes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotFeatures {
    pub auto_like: bool,
    pub auto_react: bool,
    pub auto_view_status: bool,
    pub chat_agent_enabled: bool,
    pub typing_mode: TypingMode,
}

impl Default for BotFeatures {
    fn default() -> Self {
        Self {
            auto_like: false,
            auto_react: false,
            auto_view_status: false,
            chat_agent_enabled: false,
            typing_mode: TypingMode::None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Bot {
    pub id: Uuid,
    pub display_name: String,
    pub phone: String,
    pub credentials_blob: String,
    pub auto_like: bool,
    pub auto_react: bool,
    pub auto_view_status: bool,
    pub chat_agent_enabled: bool,
    pub typing_mode: TypingMode,
    pub message_count: i64,
    pub command_count: i64,
    pub status: BotStatus,
    pub approval_status: ApprovalStatus,
    pub approval_date: Option<DateTime<Utc>>,
    pub expiration_months: Option<i32>,
    pub tenant: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bot {
    pub fn features(&self) -> BotFeatures {
        BotFeatures {
            auto_like: self.auto_like,
            auto_react: self.auto_react,
            auto_view_status: self.auto_view_status,
            chat_agent_enabled: self.chat_agent_enabled,
            typing_mode: self.typing_mode,
        }
    }

    /// Only approved bots are eligible for auto-start (invariant).
    pub fn eligible_for_auto_start(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }

    /// Whether `now` is past the bot's approval window (expiration
    /// sweep). Returns `false` for bots without an approval date.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.approval_date, self.expiration_months) {
            (Some(approved_at), Some(months)) => {
                let expires_at = approved_at + chrono::Months::new(months as u32);
                now > expires_at
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct GlobalRegistryEntry {
    pub phone: String,
    pub tenant: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub activity_type: String,
    pub description: String,
    pub bot_id: Option<Uuid>,
    pub tenant: String,
    pub phone: Option<String>,
    pub remote_tenant: Option<String>,
    pub remote_bot_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct GuestPairingSession {
    pub phone: String,
    pub pairing_code: String,
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot_with(approval_date: Option<DateTime<Utc>>, months: Option<i32>) -> Bot {
        Bot {
            id: Uuid::new_v4(),
            display_name: "test".into(),
            phone: "254700000001".into(),
            credentials_blob: "{}".into(),
            auto_like: false,
            auto_react: false,
            auto_view_status: false,
            chat_agent_enabled: false,
            typing_mode: TypingMode::None,
            message_count: 0,
            command_count: 0,
            status: BotStatus::Offline,
            approval_status: ApprovalStatus::Approved,
            approval_date,
            expiration_months: months,
            tenant: "SERVER1".into(),
            is_guest: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn has_expired_true_past_window() {
        let approved_at = Utc::now() - chrono::Duration::days(32);
        let bot = bot_with(Some(approved_at), Some(1));
        assert!(bot.has_expired(Utc::now()));
    }

    #[test]
    fn has_expired_false_within_window() {
        let approved_at = Utc::now() - chrono::Duration::days(5);
        let bot = bot_with(Some(approved_at), Some(1));
        assert!(!bot.has_expired(Utc::now()));
    }

    #[test]
    fn has_expired_false_without_approval_date() {
        let bot = bot_with(None, None);
        assert!(!bot.has_expired(Utc::now()));
    }

    #[test]
    fn tenant_capacity() {
        let tenant = Tenant {
            name: "SERVER1".into(),
            capacity: 2,
            current_count: 2,
            status: TenantStatus::Active,
            url: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!tenant.has_capacity());
    }
}
