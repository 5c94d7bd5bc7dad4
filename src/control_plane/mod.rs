//! Control Plane HTTP surface.
//!
//! A single router built from a `tower_http::cors::CorsLayer` from an
//! allow-list, a `/health` check, and `axum::serve` over a bound
//! `TcpListener`. Exposes registration, lifecycle, migration, approval,
//! batch, tenancy, and pairing operations as JSON routes — nothing else.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::config::ControlPlaneConfig;
use crate::container::ContainerStore;
use crate::db::models::{Bot, BotFeatures};
use crate::engine::{BatchOperation, Engine, RegisterRequest, RegistrationOutcome};
use crate::error::ErrorCode;
use crate::pairing;
use crate::supervisor::Supervisor;

#[derive(Clone)]
pub struct ControlPlaneState {
    pub engine: Arc<Engine>,
    pub supervisor: Arc<Supervisor>,
    pub containers: ContainerStore,
    pub current_tenant: String,
}

/// Uniform error envelope surfaced to callers: a precise one-line
/// reason plus a stable code.
#[derive(Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

fn error_response(code: ErrorCode, message: impl ToString) -> axum::response::Response {
    let status = match code {
        ErrorCode::BadEncoding
        | ErrorCode::BadJson
        | ErrorCode::MissingFields
        | ErrorCode::NoPhone
        | ErrorCode::PhoneMismatch
        | ErrorCode::BadDuration => StatusCode::BAD_REQUEST,
        ErrorCode::DuplicateOnThisTenant
        | ErrorCode::DuplicateOnOtherTenant
        | ErrorCode::InconsistentLocalBot
        | ErrorCode::TenantUnknown
        | ErrorCode::TenantFull
        | ErrorCode::NotApproved
        | ErrorCode::Rejected
        | ErrorCode::Dormant
        | ErrorCode::MigrationSameTenant
        | ErrorCode::Skipped => StatusCode::CONFLICT,
        ErrorCode::ConnectTimeout | ErrorCode::CloseRetriable | ErrorCode::DatabaseUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorCode::AuthFailed
        | ErrorCode::BadSession
        | ErrorCode::ContainerIoFailed
        | ErrorCode::StartupMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            code,
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub fn build_router(state: ControlPlaneState, config: &ControlPlaneConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/bots", post(register_bot))
        .route("/credentials/validate", post(validate_credentials))
        .route("/registration/{phone}", get(check_registration))
        .route("/bots/{id}/start", post(start_bot))
        .route("/bots/{id}/stop", post(stop_bot))
        .route("/bots/{id}/restart", post(restart_bot))
        .route("/bots/{id}", delete(destroy_bot))
        .route("/bots/{id}/migrate", post(migrate_bot))
        .route("/bots/{id}/approve", post(approve_bot))
        .route("/bots/{id}/reject", post(reject_bot))
        .route("/bots/{id}/revoke", post(revoke_bot))
        .route("/bots/{id}/credentials", put(update_credentials))
        .route("/batch", post(batch))
        .route("/tenants", get(list_tenants))
        .route("/tenants/{name}/resume", post(resume_tenant))
        .route("/pairing-code", post(generate_pairing_code))
        .route("/guest-session/{phone}", get(guest_session))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: ControlPlaneState, config: &ControlPlaneConfig) -> anyhow::Result<()> {
    let app = build_router(state, config);
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    tracing::info!("Control Plane listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": crate::VERSION }))
}

#[derive(Deserialize)]
struct RegisterBody {
    bot_name: String,
    phone: Option<String>,
    session_string: String,
    #[serde(default)]
    features: BotFeatures,
    target_tenant: Option<String>,
    #[serde(default)]
    is_guest: bool,
    #[serde(default)]
    discover_existing: bool,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RegisterResponse {
    NewRegistration { bot: Bot },
    ExistingBotFound { bot: Bot },
}

async fn register_bot(
    State(state): State<ControlPlaneState>,
    Json(body): Json<RegisterBody>,
) -> axum::response::Response {
    let req = RegisterRequest {
        display_name: body.bot_name,
        wire_or_blob: body.session_string,
        caller_phone: body.phone,
        target_tenant: body.target_tenant,
        features: body.features,
        is_guest: body.is_guest,
        discover_existing: body.discover_existing,
    };

    match state.engine.register(&state.current_tenant, req).await {
        Ok(RegistrationOutcome::NewRegistration(bot)) => {
            Json(RegisterResponse::NewRegistration { bot }).into_response()
        }
        Ok(RegistrationOutcome::ExistingBotFound(bot)) => {
            Json(RegisterResponse::ExistingBotFound { bot }).into_response()
        }
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Deserialize)]
struct ValidateCredentialsBody {
    session_string: String,
    phone: Option<String>,
}

#[derive(Serialize)]
struct ValidateCredentialsResponse {
    valid: bool,
    phone: Option<String>,
    normalized_blob: Option<serde_json::Value>,
}

async fn validate_credentials(
    State(state): State<ControlPlaneState>,
    Json(body): Json<ValidateCredentialsBody>,
) -> axum::response::Response {
    match state
        .engine
        .validate_credentials(&body.session_string, body.phone.as_deref())
    {
        Ok(normalized) => Json(ValidateCredentialsResponse {
            valid: true,
            phone: Some(normalized.phone),
            normalized_blob: Some(normalized.blob),
        })
        .into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Serialize)]
struct CheckRegistrationResponse {
    registered: bool,
    hosting_tenant: Option<String>,
    current_tenant: String,
    has_bot_here: bool,
    bot: Option<Bot>,
}

async fn check_registration(
    State(state): State<ControlPlaneState>,
    Path(phone): Path<String>,
) -> axum::response::Response {
    match state
        .engine
        .check_registration(&phone, &state.current_tenant)
        .await
    {
        Ok(status) => Json(CheckRegistrationResponse {
            registered: status.registered,
            hosting_tenant: status.hosting_tenant,
            current_tenant: status.current_tenant,
            has_bot_here: status.has_bot_here,
            bot: status.bot,
        })
        .into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn start_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match state.supervisor.force_start(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn stop_bot(State(state): State<ControlPlaneState>, Path(id): Path<Uuid>) -> StatusCode {
    state.supervisor.stop(id).await;
    StatusCode::NO_CONTENT
}

async fn restart_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match state.supervisor.restart(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn destroy_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match state.supervisor.destroy(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Deserialize)]
struct MigrateBody {
    target_tenant: String,
}

async fn migrate_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MigrateBody>,
) -> axum::response::Response {
    match state.engine.migrate(id, &body.target_tenant).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Deserialize)]
struct ApproveBody {
    months: i32,
}

async fn approve_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> axum::response::Response {
    match state.engine.approve(id, body.months).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn reject_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match state.engine.reject(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn revoke_bot(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match state.engine.revoke(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Deserialize)]
struct UpdateCredentialsBody {
    session_string: String,
}

async fn update_credentials(
    State(state): State<ControlPlaneState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCredentialsBody>,
) -> axum::response::Response {
    match state
        .engine
        .update_credentials(id, &body.session_string)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Deserialize)]
struct BatchBody {
    operation: String,
    bot_ids: Vec<Uuid>,
    approve_months: Option<i32>,
}

#[derive(Serialize)]
struct BatchResponse {
    total: usize,
    completed: usize,
    failed: Vec<(Uuid, String)>,
}

async fn batch(
    State(state): State<ControlPlaneState>,
    Json(body): Json<BatchBody>,
) -> axum::response::Response {
    let operation = match body.operation.as_str() {
        "start" => BatchOperation::Start,
        "stop" => BatchOperation::Stop,
        "restart" => BatchOperation::Restart,
        "approve" => BatchOperation::Approve,
        other => {
            return error_response(
                ErrorCode::MissingFields,
                format!("unknown batch operation: {other}"),
            );
        }
    };

    let result = state
        .engine
        .batch(operation, &body.bot_ids, body.approve_months)
        .await;

    Json(BatchResponse {
        total: result.total,
        completed: result.completed,
        failed: result.failed,
    })
    .into_response()
}

async fn list_tenants(State(state): State<ControlPlaneState>) -> axum::response::Response {
    match state.engine.list_tenants().await {
        Ok(tenants) => Json(tenants).into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

async fn resume_tenant(State(state): State<ControlPlaneState>, Path(name): Path<String>) -> StatusCode {
    state.engine.resume_tenant(&name).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct PairingCodeBody {
    phone: String,
}

#[derive(Serialize)]
struct PairingCodeResponse {
    code: String,
    request_id: Uuid,
    phone: String,
}

async fn generate_pairing_code(
    State(state): State<ControlPlaneState>,
    Json(body): Json<PairingCodeBody>,
) -> axum::response::Response {
    match pairing::generate_pairing_code(&state.containers, &body.phone).await {
        Ok(outcome) => Json(PairingCodeResponse {
            code: outcome.code,
            request_id: outcome.request_id,
            phone: outcome.phone,
        })
        .into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[derive(Serialize)]
struct GuestSessionResponse {
    found: bool,
    session_id: Option<Uuid>,
}

async fn guest_session(
    State(state): State<ControlPlaneState>,
    Path(phone): Path<String>,
) -> axum::response::Response {
    match state.engine.guest_session(&phone).await {
        Ok(session_id) => Json(GuestSessionResponse {
            found: session_id.is_some(),
            session_id,
        })
        .into_response(),
        Err(e) => error_response(e.code(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> ControlPlaneConfig {
        ControlPlaneConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unknown_batch_operation_is_rejected_before_touching_the_engine() {
        let operation = "nonsense";
        let resolved = match operation {
            "start" => Some(BatchOperation::Start),
            "stop" => Some(BatchOperation::Stop),
            "restart" => Some(BatchOperation::Restart),
            "approve" => Some(BatchOperation::Approve),
            _ => None,
        };
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn health_check_responds_ok() {
        let resp = Router::new()
            .route("/health", get(health_check))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let _ = test_config();
    }
}
