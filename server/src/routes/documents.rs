//! Document store REST routes.
//!
//! Handlers translate HTTP into `services::document` calls. Errors become a
//! status code plus a JSON body `{code, message, retryable}`.

use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use canvas::document::{CollaboratorRequest, DocumentSnapshot, DocumentSummary, Notes, WhiteboardDocument};
use serde_json::json;
use tracing::error;

use crate::error::{ErrorCode, error_response};
use crate::services::document::{self, DocumentError};
use crate::state::AppState;

/// Header carrying the caller's identity.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

// =============================================================================
// IDENTITY
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("x-user-email header is required")]
pub struct MissingIdentity;

impl ErrorCode for MissingIdentity {
    fn error_code(&self) -> &'static str {
        "E_IDENTITY_REQUIRED"
    }
}

impl IntoResponse for MissingIdentity {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNAUTHORIZED, &self)
    }
}

/// Caller email from the `x-user-email` header, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerEmail(pub String);

impl<S> FromRequestParts<S> for CallerEmail
where
    S: Send + Sync,
{
    type Rejection = MissingIdentity;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(document::normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(MissingIdentity)?;
        Ok(Self(email))
    }
}

pub(crate) fn document_error_to_status(err: &DocumentError) -> StatusCode {
    match err {
        DocumentError::NotFound(_) => StatusCode::NOT_FOUND,
        DocumentError::Forbidden { .. } => StatusCode::FORBIDDEN,
        DocumentError::InvalidCollaborator(_) => StatusCode::BAD_REQUEST,
        DocumentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn document_error_response(err: DocumentError) -> Response {
    let status = document_error_to_status(&err);
    if status.is_server_error() {
        error!(error = %err, code = err.error_code(), "document request failed");
    }
    error_response(status, &err)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/documents`: documents owned by or shared with the caller.
pub async fn list_documents(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
) -> Result<Json<Vec<DocumentSummary>>, Response> {
    let rows = document::list_documents(&state.pool, &email)
        .await
        .map_err(document_error_response)?;
    Ok(Json(rows))
}

/// `POST /api/documents`: create under a new ID; the caller becomes the owner.
pub async fn create_document(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Json(body): Json<DocumentSnapshot>,
) -> Result<(StatusCode, Json<WhiteboardDocument>), Response> {
    let doc = document::create_document(&state.pool, &email, body)
        .await
        .map_err(document_error_response)?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// `GET /api/documents/:id`: fetch one document.
pub async fn get_document(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Path(id): Path<String>,
) -> Result<Json<WhiteboardDocument>, Response> {
    let doc = document::get_document(&state.pool, &id, &email)
        .await
        .map_err(document_error_response)?;
    Ok(Json(doc))
}

/// `PUT /api/documents/:id`: save a snapshot under the room's ID. Creates
/// the document (201) on first save, overwrites it (200) after that.
pub async fn update_document(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Path(id): Path<String>,
    Json(body): Json<DocumentSnapshot>,
) -> Result<(StatusCode, Json<WhiteboardDocument>), Response> {
    let (doc, created) = document::update_document(&state.pool, &id, &email, body)
        .await
        .map_err(document_error_response)?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(doc)))
}

/// `POST /api/documents/:id/collaborators`: share with another identity.
pub async fn add_collaborator(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Path(id): Path<String>,
    Json(body): Json<CollaboratorRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    document::add_collaborator(&state.pool, &id, &email, &body.email, body.role)
        .await
        .map_err(document_error_response)?;
    Ok(Json(json!({"ok": true})))
}

/// `GET /api/documents/:id/notes`
pub async fn get_notes(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Path(id): Path<String>,
) -> Result<Json<Notes>, Response> {
    let notes = document::get_notes(&state.pool, &id, &email)
        .await
        .map_err(document_error_response)?;
    Ok(Json(notes))
}

/// `PUT /api/documents/:id/notes`
pub async fn put_notes(
    State(state): State<AppState>,
    CallerEmail(email): CallerEmail,
    Path(id): Path<String>,
    Json(body): Json<Notes>,
) -> Result<Json<serde_json::Value>, Response> {
    document::put_notes(&state.pool, &id, &email, &body)
        .await
        .map_err(document_error_response)?;
    Ok(Json(json!({"ok": true})))
}
