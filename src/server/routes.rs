//! HTTP route handlers for the chat API.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::{ServeDir, ServeFile};

use crate::chat::{
    Attachment, AttachmentSlot, ChatError, ChatId, ConversationController, ConversationSnapshot,
};
use crate::dispatch::ChatMode;

use super::state::AppState;

/// Upper bound on a message upload (text plus one image).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

type ApiError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/messages", post(send_message))
        .route("/api/preferences/dark-mode", get(get_dark_mode))
        .route("/api/preferences/dark-mode/toggle", post(toggle_dark_mode))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_service("/chat", ServeFile::new(static_dir.join("chat.html")))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "doctor-chat-bot",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Session creation request.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Route to the generative service instead of the prediction service.
    #[serde(default)]
    pub is_free_chat: bool,
}

/// Session creation response.
#[derive(Debug, Serialize)]
pub struct SessionCreated {
    /// New session identifier.
    pub id: ChatId,
    /// Fixed chat mode.
    pub mode: ChatMode,
}

/// Conversation view returned by the session endpoints.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub id: ChatId,
    /// Messages and loading state.
    #[serde(flatten)]
    pub snapshot: ConversationSnapshot,
}

/// Dark-mode preference response.
#[derive(Debug, Serialize)]
pub struct DarkModeView {
    /// Whether dark mode is enabled.
    pub dark_mode: bool,
}

fn chat_error(err: &ChatError) -> ApiError {
    let status = match err {
        ChatError::EmptySubmission => StatusCode::BAD_REQUEST,
        ChatError::UnknownSession(_) => StatusCode::NOT_FOUND,
    };
    (status, err.to_string())
}

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("Invalid upload: {err}"))
}

/// Start a conversation in the requested mode.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> (StatusCode, Json<SessionCreated>) {
    let (id, controller) = state
        .create_session(ChatMode::from_free_chat(request.is_free_chat))
        .await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            id,
            mode: controller.mode(),
        }),
    )
}

/// Render a conversation.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let (id, controller) = state.session(&id).await.map_err(|e| chat_error(&e))?;
    Ok(Json(view(id, &controller).await))
}

/// Submit a message (`message` text field, optional `file` part) and wait for it to settle.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let (id, controller) = state.session(&id).await.map_err(|e| chat_error(&e))?;

    let mut text = String::new();
    let mut slot = AttachmentSlot::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("message") => text = field.text().await.map_err(bad_request)?,
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(bad_request)?;
                if !bytes.is_empty() {
                    slot.select(Attachment::new(file_name, content_type, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    // Sends are never cancelled, even if the client goes away.
    let attachment = slot.take();
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit(&text, attachment).await })
    };
    task.await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Send task failed: {e}")))?
        .map_err(|e| chat_error(&e))?;

    Ok(Json(view(id, &controller).await))
}

/// Read the dark-mode preference.
async fn get_dark_mode(State(state): State<Arc<AppState>>) -> Json<DarkModeView> {
    let dark_mode = state.preferences.lock().await.dark_mode();
    Json(DarkModeView { dark_mode })
}

/// Flip the dark-mode preference.
async fn toggle_dark_mode(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DarkModeView>, ApiError> {
    let dark_mode = state
        .preferences
        .lock()
        .await
        .toggle_dark_mode()
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist dark mode: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Preference error: {e}"))
        })?;
    Ok(Json(DarkModeView { dark_mode }))
}

async fn view(id: ChatId, controller: &ConversationController) -> SessionView {
    SessionView {
        id,
        snapshot: controller.snapshot().await,
    }
}
