use crate::api::ApiError;
use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// API keys guarding `/api/*` and `/ws`.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Accepted keys. Empty disables auth.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Auth accepting any of `api_keys`.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// Whether any key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}

/// Query parameters read by [`auth_middleware`]. Unknown keys are ignored.
#[derive(Debug, Deserialize, Default)]
pub struct AuthQuery {
    /// Key passed as `?api_key=`.
    pub api_key: Option<String>,
}

/// Key presented by the client: a `Bearer` token, else `?api_key=`.
///
/// The web UI uses the query form for everything, since browsers cannot set
/// headers on WebSocket upgrades.
fn presented_key(headers: &HeaderMap, query: AuthQuery) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(query.api_key)
}

/// Rejects requests without an accepted key. Rejections use the API's
/// `{"error": ...}` body so the UI can show them like any other failure.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(request).await;
    }

    let reason = match presented_key(&headers, query) {
        Some(key) if auth.accepts(&key) => return next.run(request).await,
        Some(_) => "Invalid API key",
        None => "API key required",
    };
    warn!(path = %request.uri().path(), reason, "Rejected request");
    ApiError::Rejected(StatusCode::UNAUTHORIZED, reason.to_string()).into_response()
}
