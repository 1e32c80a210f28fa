use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Chat pipeline
        .route("/api/chat", post(handlers::chat))
        .route("/api/title", post(handlers::title))
        // Vector store file manager
        .route(
            "/api/assistant/vector-files",
            get(handlers::vector_files).delete(handlers::remove_vector_file),
        )
        .route("/api/assistant/file-meta", get(handlers::file_meta))
        .route("/api/assistant/upload", post(handlers::upload))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
