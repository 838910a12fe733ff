//! REST endpoints for the onboarding wizard, its configuration, and the
//! admin user views.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, warn};
use uuid::Uuid;

use super::config::ConfigUpdate;
use super::controller::OnboardingController;
use super::model::{CredentialsRequest, SectionInput, UserPatch};
use crate::error::{AuthError, OnboardingError};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub controller: Arc<OnboardingController>,
}

/// Path of a user's wizard step, used for redirects.
pub fn step_path(user_id: Uuid, step: u8) -> String {
    format!("/api/users/{user_id}/onboarding/{step}")
}

impl OnboardingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) | Self::Validation(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ConfigVersionConflict { .. }
            | Self::AlreadyComplete
            | Self::UserModified { .. }
            | Self::UserExists => StatusCode::CONFLICT,
            Self::OutOfSequence { .. } => StatusCode::SEE_OTHER,
            Self::NotFound { .. } | Self::Auth(AuthError::UnknownEmail) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::IncorrectPassword) => StatusCode::UNAUTHORIZED,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Auth(AuthError::Hashing(_)) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            Self::Database(e) => error!(error = %e, "Storage failure"),
            Self::Auth(AuthError::Hashing(e)) => error!(error = %e, "Password hashing failure"),
            Self::Timeout { .. } => warn!(error = %message, "Request timed out"),
            _ => debug!(status = status.as_u16(), error = %message, "Client error"),
        }

        match self {
            Self::Validation(errors) => (
                status,
                Json(json!({ "message": "validation failed", "errors": errors })),
            )
                .into_response(),
            Self::OutOfSequence {
                user_id, current, ..
            } => (
                status,
                [(header::LOCATION, step_path(user_id, current))],
                Json(json!({
                    "message": format!("continue onboarding at step {current}"),
                    "currentStep": current,
                })),
            )
                .into_response(),
            Self::ConfigVersionConflict { found, .. } => (
                status,
                Json(json!({ "message": message, "currentVersion": found })),
            )
                .into_response(),
            Self::Database(_) | Self::Auth(AuthError::Hashing(_)) => (
                status,
                Json(json!({ "message": "internal server error" })),
            )
                .into_response(),
            _ => (status, Json(json!({ "message": message }))).into_response(),
        }
    }
}

/// Unwrap a JSON body, reporting a malformed one in the usual error shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, OnboardingError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| OnboardingError::InvalidRequest(rejection.body_text()))
}

fn parse_user_id(raw: &str) -> Result<Uuid, OnboardingError> {
    Uuid::parse_str(raw).map_err(|_| OnboardingError::InvalidRequest("invalid user id".into()))
}

fn parse_step(raw: &str) -> Result<u8, OnboardingError> {
    raw.parse()
        .map_err(|_| OnboardingError::InvalidRequest("invalid step".into()))
}

// ── Config ──────────────────────────────────────────────────────────

/// GET /api/config
async fn get_config(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    Ok(Json(state.controller.get_config().await?))
}

/// PUT /api/config
async fn put_config(
    State(state): State<OnboardingRouteState>,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, OnboardingError> {
    let candidate = body(payload)?;
    Ok(Json(state.controller.update_config(&candidate).await?))
}

// ── Users ───────────────────────────────────────────────────────────

/// POST /api/users
async fn register(
    State(state): State<OnboardingRouteState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, OnboardingError> {
    let request = body(payload)?;
    let summary = state.controller.register(&request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// POST /api/users/login
async fn login(
    State(state): State<OnboardingRouteState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, OnboardingError> {
    let request = body(payload)?;
    Ok(Json(state.controller.login(&request).await?))
}

/// GET /api/users
async fn list_users(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    Ok(Json(state.controller.list_users().await?))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, OnboardingError> {
    let id = parse_user_id(&id)?;
    Ok(Json(state.controller.get_user(id).await?))
}

/// PUT /api/users/{id}
async fn update_user(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<impl IntoResponse, OnboardingError> {
    let id = parse_user_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(state.controller.update_user(id, &patch).await?))
}

/// POST /api/users/clear-all
async fn clear_all_users(
    State(state): State<OnboardingRouteState>,
) -> Result<impl IntoResponse, OnboardingError> {
    let deleted = state.controller.clear_all_users().await?;
    Ok(Json(json!({
        "message": format!("deleted {deleted} users"),
        "deletedCount": deleted,
    })))
}

// ── Wizard steps ────────────────────────────────────────────────────

/// GET /api/users/{id}/onboarding/{step}
async fn get_step(
    State(state): State<OnboardingRouteState>,
    Path((id, step)): Path<(String, String)>,
) -> Result<impl IntoResponse, OnboardingError> {
    let id = parse_user_id(&id)?;
    let step = parse_step(&step)?;
    Ok(Json(state.controller.render_step(id, step).await?))
}

/// POST /api/users/{id}/onboarding/{step}
async fn submit_step(
    State(state): State<OnboardingRouteState>,
    Path((id, step)): Path<(String, String)>,
    payload: Result<Json<SectionInput>, JsonRejection>,
) -> Result<impl IntoResponse, OnboardingError> {
    let id = parse_user_id(&id)?;
    let step = parse_step(&step)?;
    let input = body(payload)?;
    Ok(Json(state.controller.submit_step(id, step, &input).await?))
}

// ── Liveness ────────────────────────────────────────────────────────

/// GET /api/ping, polled by clients waiting for a sleeping backend.
async fn ping() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "onboarding-wizard" }))
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/config", get(get_config).put(put_config))
        .route("/api/users", get(list_users).post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/clear-all", post(clear_all_users))
        .route("/api/users/{id}", get(get_user).put(update_user))
        .route(
            "/api/users/{id}/onboarding/{step}",
            get(get_step).post(submit_step),
        )
        .route("/api/ping", get(ping))
        .route("/health", get(health))
        .with_state(state)
}

/// The full application: routes plus CORS and request tracing.
pub fn app(controller: Arc<OnboardingController>) -> Router {
    onboarding_routes(OnboardingRouteState { controller })
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
