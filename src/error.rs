//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own `thiserror` enum; this module re-exports
//! an umbrella type plus a serializable `ErrorCode` for the Control Plane
//! boundary, mirroring the taxonomy in the design spec's error handling
//! section.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::engine::RegistrationError;
use crate::pairing::PairingError;
use crate::supervisor::SupervisorError;

/// Stable, serializable classification of an error, independent of its
/// human-readable message. Consumed by the Control Plane to decide HTTP
/// status codes and by operators to triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    BadEncoding,
    BadJson,
    MissingFields,
    NoPhone,
    PhoneMismatch,
    BadDuration,
    // Policy errors
    DuplicateOnThisTenant,
    DuplicateOnOtherTenant,
    InconsistentLocalBot,
    TenantUnknown,
    TenantFull,
    NotApproved,
    Rejected,
    Dormant,
    MigrationSameTenant,
    Skipped,
    // Transient errors
    ConnectTimeout,
    CloseRetriable,
    DatabaseUnavailable,
    // Fatal errors
    AuthFailed,
    BadSession,
    ContainerIoFailed,
    StartupMisconfigured,
}

/// Umbrella error type at the CLI / Control Plane boundary.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("startup misconfigured: {0}")]
    StartupMisconfigured(String),
}

impl FleetError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FleetError::Credential(e) => e.code(),
            FleetError::Registration(e) => e.code(),
            FleetError::Supervisor(e) => e.code(),
            FleetError::Pairing(e) => e.code(),
            FleetError::Database(_) => ErrorCode::DatabaseUnavailable,
            FleetError::StartupMisconfigured(_) => ErrorCode::StartupMisconfigured,
        }
    }
}
