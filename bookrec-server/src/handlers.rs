use crate::catalog::{Book, BookSummary, TelegramId};
use crate::error::{ServerError, ServerResult};
use crate::models::{
    AddBookRequest, MarkReadRequest, MarkReadResponse, RebuildRequest, RecommendQuery, RecommendResponse,
    SearchQuery, TextRecommendQuery, UserBooksResponse,
};
use crate::state::AppState;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookrec_core::{ItemId, ModelStats, RebuildOutcome};
use std::collections::HashSet;
use tracing::{debug, info};

/// Handler for `POST /books`
/// Adds a book to the catalog. The model only picks it up on the next forced rebuild.
#[axum::debug_handler]
pub async fn add_book(
    State(state): State<AppState>,
    Json(payload): Json<AddBookRequest>,
) -> ServerResult<impl IntoResponse> {
    if payload.title.trim().is_empty() {
        return Err(ServerError::BadRequest("title must not be empty".to_string()));
    }
    let book: Book = state
        .catalog
        .add_book(payload.title, payload.author, payload.description, payload.genres)
        .await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Handler for `GET /books?query=...`
/// Case-insensitive substring search over titles and descriptions.
#[axum::debug_handler]
pub async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ServerResult<Json<Vec<BookSummary>>> {
    let hits = state.catalog.search_books(&params.query).await;
    debug!(query = %params.query, hits = hits.len(), "Book search");
    Ok(Json(hits))
}

/// Handler for `GET /books/:id`
#[axum::debug_handler]
pub async fn get_book(State(state): State<AppState>, Path(id): Path<ItemId>) -> ServerResult<Json<Book>> {
    state.catalog.get_book(id).await.map(Json).ok_or(ServerError::BookNotFound(id))
}

/// Handler for `GET /users/:telegram_id/books`
#[axum::debug_handler]
pub async fn get_user_books(
    State(state): State<AppState>,
    Path(telegram_id): Path<TelegramId>,
) -> ServerResult<Json<UserBooksResponse>> {
    let book_ids = state.catalog.get_user_books(telegram_id).await?;
    Ok(Json(UserBooksResponse { telegram_id, book_ids }))
}

/// Handler for `POST /users/:telegram_id/books`
/// Marks a book as read; `added` is false when it was already marked.
#[axum::debug_handler]
pub async fn add_user_book(
    State(state): State<AppState>,
    Path(telegram_id): Path<TelegramId>,
    Json(payload): Json<MarkReadRequest>,
) -> ServerResult<Json<MarkReadResponse>> {
    let added = state.catalog.add_user_book(telegram_id, payload.book_id).await?;
    Ok(Json(MarkReadResponse { added }))
}

/// Handler for `GET /users/:telegram_id/recommendations?top_n=5`
#[axum::debug_handler]
pub async fn recommend_for_user(
    State(state): State<AppState>,
    Path(telegram_id): Path<TelegramId>,
    Query(params): Query<RecommendQuery>,
) -> ServerResult<Json<RecommendResponse>> {
    let read_ids: HashSet<ItemId> = state.catalog.get_user_books(telegram_id).await?.into_iter().collect();
    let top_n = params.effective_top_n();

    let scored = state.recommender.recommend_scored(&read_ids, top_n);
    debug!(telegram_id, read = read_ids.len(), top_n, returned = scored.len(), "Recommendations served");

    Ok(Json(RecommendResponse::from(scored)))
}

/// Handler for `GET /recommendations?text=...&top_n=5`
/// Books closest to free text, e.g. a genre or a plot the user describes.
#[axum::debug_handler]
pub async fn recommend_for_text(
    State(state): State<AppState>,
    Query(params): Query<TextRecommendQuery>,
) -> ServerResult<Json<RecommendResponse>> {
    if params.text.trim().is_empty() {
        return Err(ServerError::BadRequest("text must not be empty".to_string()));
    }
    let top_n = params.effective_top_n();
    let scored = state.recommender.recommend_for_text(&params.text, top_n);
    debug!(top_n, returned = scored.len(), "Text recommendations served");
    Ok(Json(RecommendResponse::from(scored)))
}

/// Handler for `POST /model/rebuild`
/// `{"force": true}` refits from the catalog; otherwise the persisted model is reloaded.
#[axum::debug_handler]
pub async fn rebuild_model(
    State(state): State<AppState>,
    Json(payload): Json<RebuildRequest>,
) -> ServerResult<Json<RebuildOutcome>> {
    info!(force = payload.force, "Received model rebuild request");
    let outcome = state.recommender.rebuild(payload.force).await?;
    Ok(Json(outcome))
}

/// Handler for `GET /model/stats`
#[axum::debug_handler]
pub async fn model_stats(State(state): State<AppState>) -> ServerResult<Json<ModelStats>> {
    Ok(Json(state.recommender.stats()))
}
