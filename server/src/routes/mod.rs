//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the document store API, the websocket relay, and
//! a health probe. Caller identity arrives in the `x-user-email` header from
//! the fronting identity provider; this service does not authenticate.

pub mod documents;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/documents", get(documents::list_documents).post(documents::create_document))
        .route("/api/documents/{id}", get(documents::get_document).put(documents::update_document))
        .route("/api/documents/{id}/collaborators", post(documents::add_collaborator))
        .route("/api/documents/{id}/notes", get(documents::get_notes).put(documents::put_notes))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
