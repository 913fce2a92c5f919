use crate::server::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use parley_core::{ModelChoice, ParleyError, TranscriptEntry};
use parley_ingest::{content_type_for_path, read_file, UploadedFile};
use parley_session::{export_file_name, render_markdown, ChatSession, ChatSettings, SharedSession};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error responses of the REST API, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// No session with this id (404).
    NotFound(Uuid),
    /// Invalid settings or an upload that failed to decode (422).
    Unprocessable(String),
    /// Server-side failure (500).
    Internal(String),
    /// A rejection that already carries its status (multipart parsing, body limit).
    Rejected(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("Session {id} not found")),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
            ApiError::Rejected(status, m) => (status, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Rejected(e.status(), e.body_text())
    }
}

pub(crate) async fn lookup(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state.sessions.get(id).await.ok_or(ApiError::NotFound(id))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One entry of `GET /api/models`.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    /// Menu label, also the serialized `ModelChoice`.
    pub label: &'static str,
    /// Id sent to the API.
    pub api_id: &'static str,
    /// Whether the thinking toggle applies.
    pub extended_thinking: bool,
}

/// What the UI needs to render a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session id.
    pub id: Uuid,
    /// Current selections.
    pub settings: ChatSettings,
    /// Visible transcript only.
    pub messages: Vec<TranscriptEntry>,
    /// Files whose text is waiting in the upload buffer.
    pub buffered_files: usize,
    /// Whether the buffer has already been sent.
    pub file_injected: bool,
}

impl SessionView {
    fn of(session: &ChatSession) -> Self {
        Self {
            id: session.id,
            settings: session.settings.clone(),
            messages: session.visible().to_vec(),
            buffered_files: session.file_context().len(),
            file_injected: session.is_file_injected(),
        }
    }
}

/// Result of a multipart upload.
#[derive(Debug, Default, Serialize)]
pub struct UploadReport {
    /// Names of files whose text was buffered.
    pub accepted: Vec<String>,
    /// Names of files of an unsupported type.
    pub ignored: Vec<String>,
    /// Files in the buffer after this upload.
    pub buffered_files: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/models`
pub async fn list_models() -> Json<Vec<ModelInfo>> {
    Json(
        ModelChoice::ALL
            .into_iter()
            .map(|m| ModelInfo {
                label: m.label(),
                api_id: m.api_id(),
                extended_thinking: m.supports_extended_thinking(),
            })
            .collect(),
    )
}

/// `POST /api/sessions`
pub async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionView>) {
    let shared = state
        .sessions
        .create(ChatSession::with_settings(state.defaults.clone()))
        .await;
    let session = shared.lock().await;
    info!(session_id = %session.id, "Session created");
    (StatusCode::CREATED, Json(SessionView::of(&session)))
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = lookup(&state, id).await?;
    let session = shared.lock().await;
    Ok(Json(SessionView::of(&session)))
}

/// `PUT /api/sessions/{id}/settings`
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(settings): Json<ChatSettings>,
) -> Result<Json<ChatSettings>, ApiError> {
    let shared = lookup(&state, id).await?;
    settings
        .validate()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    let mut session = shared.lock().await;
    session.settings = settings;
    info!(
        session_id = %id,
        model = session.settings.model.api_id(),
        style = session.settings.style.name(),
        thinking = session.settings.thinking_enabled(),
        "Settings updated"
    );
    Ok(Json(session.settings.clone()))
}

/// Ingests every part of a multipart body into the session's upload buffer.
///
/// Parts are processed in order; a part that fails to decode stops the
/// request with 422, and parts before it stay buffered.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, ApiError> {
    let shared = lookup(&state, id).await?;
    let mut report = UploadReport::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field
            .file_name()
            .or_else(|| field.name())
            .unwrap_or("upload")
            .to_string();
        let content_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => content_type_for_path(std::path::Path::new(&name)).to_string(),
        };
        let bytes = field.bytes().await?;
        let file = UploadedFile::new(name.clone(), content_type, bytes.to_vec());

        let text = tokio::task::spawn_blocking(move || read_file(&file))
            .await
            .map_err(|e| ApiError::Internal(format!("Ingest task failed: {e}")))?
            .map_err(|e| {
                warn!(session_id = %id, file = %name, error = %e, "Upload rejected");
                ApiError::Unprocessable(format!("{name}: {}", describe(&e)))
            })?;

        let mut session = shared.lock().await;
        if session.buffer_file_text(text) {
            report.accepted.push(name);
        } else {
            report.ignored.push(name);
        }
        report.buffered_files = session.file_context().len();
    }

    info!(
        session_id = %id,
        accepted = report.accepted.len(),
        ignored = report.ignored.len(),
        "Files uploaded"
    );
    Ok(Json(report))
}

/// `POST /api/sessions/{id}/reset`: start a new chat.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = lookup(&state, id).await?;
    let mut session = shared.lock().await;
    session.reset();
    info!(session_id = %id, "Session reset");
    Ok(Json(SessionView::of(&session)))
}

/// `GET /api/sessions/{id}/export`: the visible transcript as a markdown download.
pub async fn export_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let shared = lookup(&state, id).await?;
    let markdown = {
        let session = shared.lock().await;
        render_markdown(session.visible())
    };
    let file_name = export_file_name(Local::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        markdown,
    )
        .into_response())
}

fn describe(e: &ParleyError) -> String {
    match e {
        ParleyError::Utf8(_) => "file is not valid UTF-8 text".into(),
        ParleyError::Json(err) => format!("invalid JSON ({err})"),
        other => other.to_string(),
    }
}
