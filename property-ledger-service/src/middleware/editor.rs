//! Write protection for dashboard edits and the programmatic write endpoint.

use crate::startup::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use service_core::utils::token::{bearer_token, shared_secret_matches};

pub const GPT_TOKEN_HEADER: &str = "x-gpt-token";

/// Guard editor routes: read-only mode first, then `Authorization: Bearer`.
pub async fn editor_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let access = &state.config.access;

    if access.read_only {
        tracing::info!(path = %request.uri().path(), "Write rejected in read-only mode");
        return AppError::MethodNotAllowed(anyhow::anyhow!("Service is in read-only mode"))
            .into_response();
    }

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    match token {
        None => AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")).into_response(),
        Some(token) if shared_secret_matches(&access.editor_token, token) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!("Failed editor authentication attempt");
            AppError::Forbidden(anyhow::anyhow!("Invalid editor token")).into_response()
        }
    }
}

/// Guard the programmatic write endpoint: hidden unless enabled, then a
/// shared secret in `X-GPT-TOKEN`.
pub async fn programmatic_write_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let access = &state.config.access;

    if !access.programmatic_write_enabled {
        return AppError::NotFound(anyhow::anyhow!("Not found")).into_response();
    }

    let provided = headers
        .get(GPT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !shared_secret_matches(&access.programmatic_write_token, provided) {
        tracing::warn!("Failed programmatic write authentication attempt");
        return AppError::Forbidden(anyhow::anyhow!("Invalid token")).into_response();
    }

    next.run(request).await
}
