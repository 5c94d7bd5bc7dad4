//! Pairing Service.
//!
//! Short-lived, single-shot worker that acquires a pairing code from the
//! WhatsApp library for a phone, then tears down. Each request gets its
//! own ephemeral container, its own socket, and its own event listeners
//! — no state is shared across concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::pair_code::PairCodeOptions;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use crate::container::ContainerStore;
use crate::error::ErrorCode;

const HARD_DEADLINE: Duration = Duration::from_secs(60);
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("phone was rejected by the WhatsApp library during pairing")]
    AuthFailed,

    #[error("pairing socket closed for a retriable reason")]
    ClosedRetriable,

    #[error("pairing exceeded the 60s hard deadline")]
    TimedOut,

    #[error("pairing produced an unusable session")]
    BadSession,

    #[error("pairing failed for an unclassified reason: {0}")]
    Unknown(String),

    #[error("container I/O failed during pairing: {0}")]
    Container(#[from] crate::container::ContainerError),
}

impl PairingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PairingError::AuthFailed => ErrorCode::AuthFailed,
            PairingError::ClosedRetriable => ErrorCode::CloseRetriable,
            PairingError::TimedOut => ErrorCode::ConnectTimeout,
            PairingError::BadSession => ErrorCode::BadSession,
            PairingError::Unknown(_) => ErrorCode::ContainerIoFailed,
            PairingError::Container(_) => ErrorCode::ContainerIoFailed,
        }
    }
}

/// Result of a successful pairing attempt (`generatePairingCode`).
#[derive(Debug, Clone)]
pub struct PairingOutcome {
    pub code: String,
    pub request_id: Uuid,
    pub phone: String,
}

/// Translates a library close/disconnect reason string into `PairingError`.
/// The library's reason strings are not a stable public contract, so
/// this is a best-effort classification rather than an exhaustive match.
fn classify_close_reason(reason: &str) -> PairingError {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("stream") || lower.contains("restart") || lower.contains("replaced") {
        PairingError::ClosedRetriable
    } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("conflict") {
        PairingError::AuthFailed
    } else if lower.contains("session") || lower.contains("decrypt") {
        PairingError::BadSession
    } else {
        PairingError::Unknown(reason.to_string())
    }
}

/// Requests a pairing code for `phone`, using a throwaway container and
/// socket that are discarded once the attempt resolves — on success,
/// failure, or the 60s hard deadline.
pub async fn generate_pairing_code(
    containers: &ContainerStore,
    phone: &str,
) -> Result<PairingOutcome, PairingError> {
    let request_id = Uuid::new_v4();
    let container_dir = containers.create_ephemeral(request_id).await?;

    let result = timeout(
        HARD_DEADLINE,
        run_pairing_attempt(&container_dir, phone, request_id),
    )
    .await;

    let outcome = match result {
        Ok(inner) => inner,
        Err(_elapsed) => Err(PairingError::TimedOut),
    };

    tokio::time::sleep(TEARDOWN_GRACE).await;
    let _ = containers.teardown_ephemeral(&container_dir).await;

    outcome
}

async fn run_pairing_attempt(
    container_dir: &std::path::Path,
    phone: &str,
    request_id: Uuid,
) -> Result<PairingOutcome, PairingError> {
    let db_path = container_dir.join("session.db");
    let backend = Arc::new(
        SqliteStore::new(db_path.to_string_lossy().as_ref())
            .await
            .map_err(|e| PairingError::Unknown(e.to_string()))?,
    );

    let (code_tx, mut code_rx) = mpsc::channel::<String>(1);
    let (close_tx, mut close_rx) = mpsc::channel::<String>(1);

    let mut bot = Bot::builder()
        .with_backend(backend)
        .with_transport_factory(TokioWebSocketTransportFactory::new())
        .with_http_client(UreqHttpClient::new())
        .with_pair_code(PairCodeOptions {
            phone_number: phone.to_string(),
            custom_code: None,
            ..Default::default()
        })
        .on_event(move |event, _client| {
            let code_tx = code_tx.clone();
            let close_tx = close_tx.clone();
            async move {
                match event {
                    Event::PairingCode { code, .. } => {
                        let _ = code_tx.send(code).await;
                    }
                    Event::Disconnected(reason) | Event::LoggedOut(reason) => {
                        let _ = close_tx.send(format!("{reason:?}")).await;
                    }
                    Event::StreamError(stream_error) => {
                        let _ = close_tx.send(format!("{stream_error:?}")).await;
                    }
                    _ => {}
                }
            }
        })
        .build()
        .await
        .map_err(|e| PairingError::Unknown(e.to_string()))?;

    let _handle = bot
        .run()
        .await
        .map_err(|e| PairingError::Unknown(e.to_string()))?;

    tokio::select! {
        Some(code) = code_rx.recv() => Ok(PairingOutcome {
            code,
            request_id,
            phone: phone.to_string(),
        }),
        Some(reason) = close_rx.recv() => Err(classify_close_reason(&reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_failures() {
        assert!(matches!(
            classify_close_reason("401 unauthorized"),
            PairingError::AuthFailed
        ));
    }

    #[test]
    fn classifies_retriable_stream_errors() {
        assert!(matches!(
            classify_close_reason("stream-error (conflict) restart required"),
            PairingError::ClosedRetriable
        ));
    }

    #[test]
    fn classifies_bad_session() {
        assert!(matches!(
            classify_close_reason("failed to decrypt session"),
            PairingError::BadSession
        ));
    }

    #[test]
    fn falls_back_to_unknown() {
        assert!(matches!(
            classify_close_reason("some unclassified network blip"),
            PairingError::Unknown(_)
        ));
    }

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(PairingError::AuthFailed.code(), ErrorCode::AuthFailed);
        assert_eq!(PairingError::ClosedRetriable.code(), ErrorCode::CloseRetriable);
        assert_eq!(PairingError::TimedOut.code(), ErrorCode::ConnectTimeout);
        assert_eq!(PairingError::BadSession.code(), ErrorCode::BadSession);
    }
}
