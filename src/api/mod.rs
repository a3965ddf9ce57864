//! HTTP surface: route table and handlers.

pub mod auth;
pub mod chat;
pub mod documents;
pub mod notifications;
pub mod roadmaps;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// An error response carried as `(status, message)`.
pub type ApiError = (axum::http::StatusCode, String);

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes() as usize;

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/oauth/login", get(auth::oauth_login))
        .route("/api/auth/oauth/callback", get(auth::oauth_callback))
        .route(
            "/api/documents",
            post(documents::upload).get(documents::list),
        )
        .route(
            "/api/documents/{id}",
            get(documents::get_one).delete(documents::delete),
        )
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/roadmaps",
            post(roadmaps::create).get(roadmaps::list),
        )
        .route(
            "/api/roadmaps/{id}",
            get(roadmaps::get_one).delete(roadmaps::delete),
        )
        .route(
            "/api/roadmaps/{id}/steps/{step_id}",
            patch(roadmaps::update_step),
        )
        .route("/api/notifications", get(notifications::list))
        .route(
            "/api/notifications/{id}/read",
            post(notifications::mark_read),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.keyword_index.stats();
    Json(json!({
        "status": "ok",
        "indexed_documents": stats.total_documents,
        "indexed_chunks": stats.total_chunks,
        "vector_entries": state.vector_store.len(),
        "llm_provider": state.config.llm.provider,
    }))
}
