//! HTTP route handlers for the dataset builder API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::dataset::store::SaveOutcome;
use crate::dataset::{
    Conversation, ConversationForm, DatasetError, EditDraft, ExportArtifact, SessionPreferences,
    decompose_for_edit,
};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/api/conversations/clear", post(clear_conversations))
        .route(
            "/api/conversations/{id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route("/api/conversations/{id}/edit", get(edit_conversation))
        .route("/api/export", get(export_dataset))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Error returned to API clients, shaped like a flash notice.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    level: &'static str,
    message: String,
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Validation(message) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                level: "danger",
                message,
            },
            DatasetError::IndexOutOfRange { .. } => Self {
                status: StatusCode::NOT_FOUND,
                level: "danger",
                message: "Invalid conversation ID.".to_string(),
            },
            DatasetError::EmptyStore => Self {
                status: StatusCode::CONFLICT,
                level: "warning",
                message: "No conversations to export.".to_string(),
            },
            other if other.is_persistence() => {
                error!("dataset storage error: {other}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    level: "danger",
                    message: format!("Could not access the dataset file: {other}"),
                }
            }
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                level: "danger",
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "level": self.level,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "convo-dataset",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Conversation list response.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Every stored conversation, in id order.
    pub conversations: Vec<Conversation>,
    /// Number of conversations.
    pub count: usize,
    /// Preferences for a fresh form.
    pub preferences: SessionPreferences,
}

/// List all conversations.
async fn list_conversations(State(state): State<Arc<AppState>>) -> Json<ListResponse> {
    let store = state.store.read().await;
    let conversations = store.conversations().to_vec();
    Json(ListResponse {
        count: conversations.len(),
        conversations,
        preferences: state.default_preferences(),
    })
}

/// Create or update response.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    /// Id of the affected conversation.
    pub id: usize,
    /// The stored record.
    pub conversation: Conversation,
    /// Updated session preferences for the caller to keep.
    pub preferences: SessionPreferences,
    /// Whether the backing document reflects this change.
    pub persisted: bool,
    /// User-facing notice.
    pub message: String,
}

fn preferences_after(state: &AppState, form: &ConversationForm) -> SessionPreferences {
    SessionPreferences::after_submission(
        form.effective_system_message(&state.config.form),
        form.persist,
        &state.config.form.default_system_message,
    )
}

/// Validate a submission and append it.
async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ConversationForm>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let conversation = form.build(&state.config.form)?;

    let mut store = state.store.write().await;
    let id = store.append(conversation.clone());
    let persisted = store.last_save() != Some(SaveOutcome::Failed);
    drop(store);

    info!("Conversation {id} added with {} pairs", conversation.pair_count());
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            id,
            conversation,
            preferences: preferences_after(&state, &form),
            persisted,
            message: "Conversation added successfully!".to_string(),
        }),
    ))
}

/// Fetch one stored conversation.
async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
) -> Result<Json<Conversation>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.get(id)?.clone()))
}

/// Edit form response.
#[derive(Debug, Serialize)]
pub struct EditResponse {
    /// Conversation id.
    pub id: usize,
    /// Pre-filled form fields.
    #[serde(flatten)]
    pub draft: EditDraft,
    /// Whether the stored record already alternates user/assistant cleanly.
    pub well_formed: bool,
    /// Preferences derived from the stored system message.
    pub preferences: SessionPreferences,
}

/// Split a stored conversation into form fields.
async fn edit_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
) -> Result<Json<EditResponse>, ApiError> {
    let store = state.store.read().await;
    let conversation = store.get(id)?;
    let draft = decompose_for_edit(conversation);
    let well_formed = conversation.is_well_formed();
    drop(store);

    if !draft.is_clean() {
        debug!("conversation {id} has {} pairing anomalies", draft.anomalies.len());
    }
    if draft.is_clean() && !well_formed {
        debug!("conversation {id} has no complete pair");
    }

    let preferences = SessionPreferences::for_edit(
        &draft.system_message,
        &state.config.form.default_system_message,
    );
    Ok(Json(EditResponse {
        id,
        draft,
        well_formed,
        preferences,
    }))
}

/// Validate a submission and overwrite an existing conversation.
async fn update_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
    Json(form): Json<ConversationForm>,
) -> Result<Json<MutationResponse>, ApiError> {
    let mut store = state.store.write().await;
    store.get(id)?;
    let conversation = form.build(&state.config.form)?;
    store.replace(id, conversation.clone())?;
    let persisted = store.last_save() != Some(SaveOutcome::Failed);
    drop(store);

    info!("Conversation {id} updated");
    Ok(Json(MutationResponse {
        id,
        conversation,
        preferences: preferences_after(&state, &form),
        persisted,
        message: "Conversation updated successfully!".to_string(),
    }))
}

/// Delete or clear response.
#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    /// Conversations left in the store.
    pub count: usize,
    /// Whether the backing document reflects this change.
    pub persisted: bool,
    /// Preferences after the operation, when it resets them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<SessionPreferences>,
    /// User-facing notice.
    pub message: String,
}

/// Remove one conversation; later ids shift down.
async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let mut store = state.store.write().await;
    store.remove_at(id)?;
    let response = RemovalResponse {
        count: store.len(),
        persisted: store.last_save() != Some(SaveOutcome::Failed),
        preferences: None,
        message: format!("Conversation {} has been deleted.", id + 1),
    };
    drop(store);

    info!("Conversation {id} deleted");
    Ok(Json(response))
}

/// Remove every conversation and reset session preferences.
async fn clear_conversations(State(state): State<Arc<AppState>>) -> Json<RemovalResponse> {
    let mut store = state.store.write().await;
    store.clear();
    let persisted = store.last_save() != Some(SaveOutcome::Failed);
    drop(store);

    Json(RemovalResponse {
        count: 0,
        persisted,
        preferences: Some(state.default_preferences()),
        message: "All conversations have been cleared.".to_string(),
    })
}

/// Download the whole dataset as `dataset.jsonl`.
async fn export_dataset(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let store = state.store.read().await;
    let artifact = ExportArtifact::from_store(&store)?;
    drop(store);

    debug!("exporting {} conversations", artifact.line_count());
    let disposition = artifact.content_disposition();
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}
