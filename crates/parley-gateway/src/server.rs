use crate::api;
use crate::chat::ws_handler;
use crate::middleware::{auth_middleware, AuthConfig};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_mw,
    response::{Html, IntoResponse},
    routing::{get, post, put},
    Router,
};
use parley_agent::MessageDispatcher;
use parley_session::{ChatSettings, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Default cap on a multipart upload request body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared application state.
pub struct AppState {
    /// Runs chat turns.
    pub dispatcher: Arc<MessageDispatcher>,
    /// Live sessions.
    pub sessions: Arc<dyn SessionStore>,
    /// Settings every new session starts from.
    pub defaults: ChatSettings,
}

/// Knobs for [`GatewayServer::build_with_options`].
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// API-key auth; disabled when empty.
    pub auth: AuthConfig,
    /// Body limit of the upload route.
    pub max_upload_bytes: usize,
    /// Settings every new session starts from.
    pub defaults: ChatSettings,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            defaults: ChatSettings::default(),
        }
    }
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth and with default limits.
    pub fn build(dispatcher: Arc<MessageDispatcher>, sessions: Arc<dyn SessionStore>) -> Router {
        Self::build_with_options(dispatcher, sessions, GatewayOptions::default())
    }

    /// Build the gateway with auth, upload limit and session defaults.
    ///
    /// `/` and `/health` stay public; the API and the chat socket sit behind
    /// the auth middleware when keys are configured.
    pub fn build_with_options(
        dispatcher: Arc<MessageDispatcher>,
        sessions: Arc<dyn SessionStore>,
        options: GatewayOptions,
    ) -> Router {
        let state = Arc::new(AppState {
            dispatcher,
            sessions,
            defaults: options.defaults,
        });

        let upload = post(api::upload_files).layer(DefaultBodyLimit::max(options.max_upload_bytes));

        let protected = Router::new()
            .route("/api/models", get(api::list_models))
            .route("/api/sessions", post(api::create_session))
            .route("/api/sessions/{id}", get(api::get_session))
            .route("/api/sessions/{id}/settings", put(api::update_settings))
            .route("/api/sessions/{id}/files", upload)
            .route("/api/sessions/{id}/reset", post(api::reset_session))
            .route("/api/sessions/{id}/export", get(api::export_session))
            .route("/ws", get(ws_handler))
            .with_state(state);

        let protected = if options.auth.is_enabled() {
            protected.layer(axum_mw::from_fn_with_state(
                Arc::new(options.auth),
                auth_middleware,
            ))
        } else {
            protected
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .merge(protected)
    }
}

/// Start a background loop that drops sessions idle for `max_idle`.
///
/// Runs every `every`. Sessions with an open chat socket are never dropped.
pub fn spawn_session_sweeper(
    sessions: Arc<dyn SessionStore>,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(every);
        loop {
            timer.tick().await;
            let removed = sessions.remove_idle(max_idle).await;
            if removed > 0 {
                let remaining = sessions.count().await;
                info!(removed, remaining, "Expired idle sessions");
            }
        }
    })
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler() -> impl IntoResponse {
    serde_json::json!({"status": "ok", "service": "parley"}).to_string()
}
