//! Document service: whiteboard records, sharing roles, and notes.
//!
//! DESIGN
//! ======
//! A document row stores the last saved snapshot of a whiteboard. Saves are
//! full replacements with no concurrency token, so the last writer wins.
//! `text_boxes` and `shapes` are JSONB arrays; the camera is split into
//! scalar columns.
//!
//! Access is decided per call from the caller's email:
//!
//! - the creator is the owner;
//! - collaborators hold `editor` (the default) or `viewer`;
//! - anyone else gets [`DocumentError::Forbidden`].
//!
//! A document's ID is the ID of the whiteboard room it belongs to, so every
//! peer in a room saves to the same record. `PUT` creates the document on
//! first save with the caller as owner; `POST` mints a fresh ID for callers
//! that are not bound to a room.
//!
//! Unknown documents and malformed IDs both surface as
//! [`DocumentError::NotFound`], so IDs cannot be probed for existence.

use canvas::camera::Point;
use canvas::doc::{ShapeObject, TextBoxObject};
use canvas::document::{DocumentSnapshot, DocumentSummary, Notes, Role, WhiteboardDocument};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Name given to a document created without one.
pub const DEFAULT_DOCUMENT_NAME: &str = "Untitled Whiteboard";

/// Longest accepted document ID.
pub const MAX_ID_LEN: usize = 128;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("{email} may not {action} document {id}")]
    Forbidden { id: String, email: String, action: &'static str },
    #[error("invalid collaborator: {0}")]
    InvalidCollaborator(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for DocumentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DOCUMENT_NOT_FOUND",
            Self::Forbidden { .. } => "E_DOCUMENT_FORBIDDEN",
            Self::InvalidCollaborator(_) => "E_INVALID_COLLABORATOR",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// What a caller wants to do, checked against their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Edit,
    Manage,
}

impl Permission {
    fn allows(self, role: Role) -> bool {
        match self {
            Self::View => true,
            Self::Edit => role.can_edit(),
            Self::Manage => role.can_manage(),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Manage => "share",
        }
    }
}

type DocumentRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Json<Vec<TextBoxObject>>,
    Json<Vec<ShapeObject>>,
    f64,
    f64,
    f64,
    i64,
);

const DOCUMENT_COLUMNS: &str =
    "id, name, created_by, image_data, ink_data, text_boxes, shapes, canvas_x, canvas_y, zoom_level, timestamp_ms";

fn row_to_document(row: DocumentRow, shared_with: Vec<String>) -> WhiteboardDocument {
    let (id, name, created_by, image_data, ink_data, text_boxes, shapes, canvas_x, canvas_y, zoom_level, timestamp) =
        row;
    WhiteboardDocument {
        id,
        name,
        created_by,
        image_data,
        ink_data,
        text_boxes: text_boxes.0,
        shapes: shapes.0,
        canvas_position: Point::new(canvas_x, canvas_y),
        zoom_level,
        shared_with,
        timestamp,
    }
}

/// Canonical form of an email used as an identity key.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Validate a document ID: 1..=[`MAX_ID_LEN`] characters of ASCII
/// alphanumerics, `-`, `_` or `.`.
fn check_id(id: &str) -> Result<&str, DocumentError> {
    let trimmed = id.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_ID_LEN
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid { Ok(trimmed) } else { Err(DocumentError::NotFound(id.to_owned())) }
}

fn name_or_default(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| DEFAULT_DOCUMENT_NAME.to_owned(), str::to_owned)
}

/// Decide a caller's role from the owner and their collaborator row.
#[must_use]
pub fn resolve_role(created_by: &str, caller: &str, collaborator_role: Option<&str>) -> Option<Role> {
    if created_by == caller {
        return Some(Role::Owner);
    }
    collaborator_role.and_then(Role::parse).filter(|r| *r != Role::Owner)
}

// =============================================================================
// ACCESS
// =============================================================================

/// The role `email` holds on document `id`.
///
/// # Errors
///
/// Returns [`DocumentError::NotFound`] for unknown IDs and
/// [`DocumentError::Forbidden`] when the caller has no role.
pub async fn role_for(pool: &PgPool, id: &str, email: &str) -> Result<Role, DocumentError> {
    let doc_id = check_id(id)?;
    let row = sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT w.created_by, c.role
         FROM whiteboards w
         LEFT JOIN whiteboard_collaborators c ON c.whiteboard_id = w.id AND c.email = $2
         WHERE w.id = $1",
    )
    .bind(doc_id)
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DocumentError::NotFound(id.to_owned()))?;

    resolve_role(&row.0, email, row.1.as_deref()).ok_or_else(|| DocumentError::Forbidden {
        id: id.to_owned(),
        email: email.to_owned(),
        action: Permission::View.verb(),
    })
}

/// Require `permission` on `id` for `email`, returning the caller's role.
///
/// # Errors
///
/// As [`role_for`], plus [`DocumentError::Forbidden`] when the role is too
/// weak.
pub async fn ensure_permission(
    pool: &PgPool,
    id: &str,
    email: &str,
    permission: Permission,
) -> Result<Role, DocumentError> {
    let role = role_for(pool, id, email).await?;
    if !permission.allows(role) {
        return Err(DocumentError::Forbidden { id: id.to_owned(), email: email.to_owned(), action: permission.verb() });
    }
    Ok(role)
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a document owned by `owner` under a freshly minted ID.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_document(
    pool: &PgPool,
    owner: &str,
    snapshot: DocumentSnapshot,
) -> Result<WhiteboardDocument, DocumentError> {
    let id = Uuid::new_v4().to_string();
    insert_document(pool, &id, owner, &snapshot)
        .await?
        .ok_or(DocumentError::NotFound(id))
}

/// Fetch a document the caller may view.
///
/// # Errors
///
/// Returns not found, forbidden, or a database error.
pub async fn get_document(pool: &PgPool, id: &str, email: &str) -> Result<WhiteboardDocument, DocumentError> {
    ensure_permission(pool, id, email, Permission::View).await?;
    let doc_id = check_id(id)?;

    let row = sqlx::query_as::<_, DocumentRow>(&format!("SELECT {DOCUMENT_COLUMNS} FROM whiteboards WHERE id = $1"))
        .bind(doc_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DocumentError::NotFound(id.to_owned()))?;
    let shared_with = list_collaborators(pool, doc_id).await?;
    Ok(row_to_document(row, shared_with))
}

/// Save `snapshot` as document `id`. The first save creates the document
/// with `email` as owner; later saves overwrite it and change the name only
/// when the snapshot carries one. Returns the document and whether it was
/// created.
///
/// # Errors
///
/// Returns not found (malformed ID), forbidden (viewer or stranger), or a
/// database error.
pub async fn update_document(
    pool: &PgPool,
    id: &str,
    email: &str,
    snapshot: DocumentSnapshot,
) -> Result<(WhiteboardDocument, bool), DocumentError> {
    let doc_id = check_id(id)?;

    match role_for(pool, doc_id, email).await {
        Ok(role) if Permission::Edit.allows(role) => {}
        Ok(_) => {
            return Err(DocumentError::Forbidden {
                id: id.to_owned(),
                email: email.to_owned(),
                action: Permission::Edit.verb(),
            });
        }
        Err(DocumentError::NotFound(_)) => {
            if let Some(doc) = insert_document(pool, doc_id, email, &snapshot).await? {
                return Ok((doc, true));
            }
            // Another peer created it first.
            ensure_permission(pool, doc_id, email, Permission::Edit).await?;
        }
        Err(e) => return Err(e),
    }

    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "UPDATE whiteboards SET
            name = COALESCE($2, name),
            image_data = $3,
            ink_data = $4,
            text_boxes = $5,
            shapes = $6,
            canvas_x = $7,
            canvas_y = $8,
            zoom_level = $9,
            timestamp_ms = $10
         WHERE id = $1
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(doc_id)
    .bind(snapshot.name.as_deref().filter(|n| !n.trim().is_empty()))
    .bind(&snapshot.image_data)
    .bind(&snapshot.ink_data)
    .bind(Json(&snapshot.text_boxes))
    .bind(Json(&snapshot.shapes))
    .bind(snapshot.canvas_position.x)
    .bind(snapshot.canvas_position.y)
    .bind(snapshot.zoom_level)
    .bind(snapshot.timestamp)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DocumentError::NotFound(id.to_owned()))?;

    let shared_with = list_collaborators(pool, doc_id).await?;
    Ok((row_to_document(row, shared_with), false))
}

/// Insert a new document. `None` if `id` is already taken.
async fn insert_document(
    pool: &PgPool,
    id: &str,
    owner: &str,
    snapshot: &DocumentSnapshot,
) -> Result<Option<WhiteboardDocument>, DocumentError> {
    let name = name_or_default(snapshot.name.as_deref());

    let row = sqlx::query_as::<_, DocumentRow>(&format!(
        "INSERT INTO whiteboards
            (id, name, created_by, image_data, ink_data, text_boxes, shapes, canvas_x, canvas_y, zoom_level, timestamp_ms)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO NOTHING
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(&name)
    .bind(owner)
    .bind(&snapshot.image_data)
    .bind(&snapshot.ink_data)
    .bind(Json(&snapshot.text_boxes))
    .bind(Json(&snapshot.shapes))
    .bind(snapshot.canvas_position.x)
    .bind(snapshot.canvas_position.y)
    .bind(snapshot.zoom_level)
    .bind(snapshot.timestamp)
    .fetch_optional(pool)
    .await?;

    if row.is_some() {
        info!(document_id = %id, %owner, %name, "document created");
    }
    Ok(row.map(|row| row_to_document(row, Vec::new())))
}

/// Documents owned by or shared with `email`, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_documents(pool: &PgPool, email: &str) -> Result<Vec<DocumentSummary>, DocumentError> {
    let rows = sqlx::query_as::<_, (String, String, String, i64, Option<String>)>(
        "SELECT w.id, w.name, w.created_by, w.timestamp_ms, c.role
         FROM whiteboards w
         LEFT JOIN whiteboard_collaborators c ON c.whiteboard_id = w.id AND c.email = $1
         WHERE w.created_by = $1 OR c.email IS NOT NULL
         ORDER BY w.timestamp_ms DESC, w.created_at DESC",
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, name, created_by, timestamp, role)| {
            let role = resolve_role(&created_by, email, role.as_deref())?;
            Some(DocumentSummary { id, name, created_by, timestamp, role })
        })
        .collect())
}

// =============================================================================
// SHARING
// =============================================================================

/// Grant `collaborator` a role on `id` (editor when unspecified). Only the
/// owner may share. Re-adding an existing collaborator changes their role.
///
/// # Errors
///
/// Returns not found, forbidden, invalid collaborator (blank email, the
/// owner, or an owner role), or a database error.
pub async fn add_collaborator(
    pool: &PgPool,
    id: &str,
    email: &str,
    collaborator: &str,
    role: Option<Role>,
) -> Result<(), DocumentError> {
    ensure_permission(pool, id, email, Permission::Manage).await?;
    let doc_id = check_id(id)?;

    let collaborator = normalize_email(collaborator);
    if collaborator.is_empty() {
        return Err(DocumentError::InvalidCollaborator("email is required".to_owned()));
    }
    if collaborator == email {
        return Err(DocumentError::InvalidCollaborator("the owner cannot be a collaborator".to_owned()));
    }
    let role = role.unwrap_or(Role::Editor);
    if role == Role::Owner {
        return Err(DocumentError::InvalidCollaborator("ownership cannot be shared".to_owned()));
    }

    sqlx::query(
        "INSERT INTO whiteboard_collaborators (whiteboard_id, email, role)
         VALUES ($1, $2, $3)
         ON CONFLICT (whiteboard_id, email) DO UPDATE SET role = EXCLUDED.role",
    )
    .bind(doc_id)
    .bind(&collaborator)
    .bind(role.as_str())
    .execute(pool)
    .await?;

    info!(document_id = %doc_id, %collaborator, role = role.as_str(), "collaborator added");
    Ok(())
}

async fn list_collaborators(pool: &PgPool, doc_id: &str) -> Result<Vec<String>, DocumentError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT email FROM whiteboard_collaborators WHERE whiteboard_id = $1 ORDER BY added_at, email",
    )
    .bind(doc_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// =============================================================================
// NOTES
// =============================================================================

/// Notes for `id`; defaults when none were saved.
///
/// # Errors
///
/// Returns not found, forbidden, or a database error.
pub async fn get_notes(pool: &PgPool, id: &str, email: &str) -> Result<Notes, DocumentError> {
    ensure_permission(pool, id, email, Permission::View).await?;
    let doc_id = check_id(id)?;

    let row = sqlx::query_as::<_, (String, i32, String)>(
        "SELECT content, font_size, font_family FROM whiteboard_notes WHERE whiteboard_id = $1",
    )
    .bind(doc_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map_or_else(Notes::default, |(content, font_size, font_family)| Notes {
        content,
        font_size: u32::try_from(font_size).unwrap_or(Notes::default().font_size),
        font_family,
    }))
}

/// Replace the notes for `id`.
///
/// # Errors
///
/// Returns not found, forbidden (viewers), or a database error.
pub async fn put_notes(pool: &PgPool, id: &str, email: &str, notes: &Notes) -> Result<(), DocumentError> {
    ensure_permission(pool, id, email, Permission::Edit).await?;
    let doc_id = check_id(id)?;

    sqlx::query(
        "INSERT INTO whiteboard_notes (whiteboard_id, content, font_size, font_family, updated_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (whiteboard_id) DO UPDATE
         SET content = EXCLUDED.content,
             font_size = EXCLUDED.font_size,
             font_family = EXCLUDED.font_family,
             updated_at = now()",
    )
    .bind(doc_id)
    .bind(&notes.content)
    .bind(i32::try_from(notes.font_size).unwrap_or(i32::MAX))
    .bind(&notes.font_family)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
