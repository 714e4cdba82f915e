// Declare modules to be part of the library crate

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Builds the HTTP router over the shared state.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/books", get(handlers::search_books).post(handlers::add_book))
        .route("/books/:id", get(handlers::get_book))
        .route(
            "/users/:telegram_id/books",
            get(handlers::get_user_books).post(handlers::add_user_book),
        )
        .route("/users/:telegram_id/recommendations", get(handlers::recommend_for_user))
        .route("/recommendations", get(handlers::recommend_for_text))
        .route("/model/rebuild", post(handlers::rebuild_model))
        .route("/model/stats", get(handlers::model_stats))
        .layer(TraceLayer::new_for_http()) // Log requests/responses
        .layer(CorsLayer::permissive()) // Allow all origins (adjust for production)
        .with_state(app_state)
}
