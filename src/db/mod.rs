//! Relational persistence layer.
//!
//! A Postgres pool holding the bot table, the global phone registry, the
//! tenant table, the activity log, and guest pairing sessions — the only
//! mutable state of record.

pub mod models;
pub mod pool;
pub mod repository;

pub use models::{
    Activity, ApprovalStatus, Bot, BotFeatures, BotStatus, GlobalRegistryEntry,
    GuestPairingSession, Tenant, TenantStatus, TypingMode,
};
pub use pool::connect;

/// Embedded schema migrations. Schema migrations of the relational store
/// are an explicit out-of-scope collaborator; this crate assumes the
/// tables below already exist and does not run migrations itself. The DDL
/// is recorded here only as the documented shape repository queries
/// depend on.
pub const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    name TEXT PRIMARY KEY,
    capacity INTEGER NOT NULL,
    current_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    url TEXT,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS bots (
    id UUID PRIMARY KEY,
    display_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    credentials_blob TEXT NOT NULL,
    auto_like BOOLEAN NOT NULL DEFAULT false,
    auto_react BOOLEAN NOT NULL DEFAULT false,
    auto_view_status BOOLEAN NOT NULL DEFAULT false,
    chat_agent_enabled BOOLEAN NOT NULL DEFAULT false,
    typing_mode TEXT NOT NULL DEFAULT 'none',
    message_count BIGINT NOT NULL DEFAULT 0,
    command_count BIGINT NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'offline',
    approval_status TEXT NOT NULL DEFAULT 'pending',
    approval_date TIMESTAMPTZ,
    expiration_months INTEGER,
    tenant TEXT NOT NULL REFERENCES tenants(name),
    is_guest BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS global_registry (
    phone TEXT PRIMARY KEY,
    tenant TEXT NOT NULL REFERENCES tenants(name),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS activities (
    id UUID PRIMARY KEY,
    activity_type TEXT NOT NULL,
    description TEXT NOT NULL,
    bot_id UUID,
    tenant TEXT NOT NULL,
    phone TEXT,
    remote_tenant TEXT,
    remote_bot_id UUID,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS guest_pairing_sessions (
    phone TEXT PRIMARY KEY,
    pairing_code TEXT NOT NULL,
    session_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ NOT NULL
);
"#;
