//! Defines the data structures used for API request and response bodies.

use bookrec_core::{ItemId, Recommendation, DEFAULT_TOP_N};
use serde::{Deserialize, Serialize};

// --- Request Bodies ---

/// Request body for adding a book to the catalog.
#[derive(Debug, Deserialize)]
pub struct AddBookRequest {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Comma-separated genre tags.
    #[serde(default)]
    pub genres: Option<String>,
}

/// Query string for `GET /books`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Request body for marking a book as read.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub book_id: ItemId,
}

/// Query string for `GET /users/:telegram_id/recommendations`.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    /// Signed so that negative values can be accepted and treated as zero.
    pub top_n: Option<i64>,
}

impl RecommendQuery {
    pub fn effective_top_n(&self) -> usize {
        effective_top_n(self.top_n)
    }
}

/// Query string for `GET /recommendations?text=...`.
#[derive(Debug, Default, Deserialize)]
pub struct TextRecommendQuery {
    #[serde(default)]
    pub text: String,
    pub top_n: Option<i64>,
}

impl TextRecommendQuery {
    pub fn effective_top_n(&self) -> usize {
        effective_top_n(self.top_n)
    }
}

fn effective_top_n(top_n: Option<i64>) -> usize {
    match top_n {
        None => DEFAULT_TOP_N,
        Some(n) => usize::try_from(n).unwrap_or(0),
    }
}

/// Request body for `POST /model/rebuild`.
#[derive(Debug, Default, Deserialize)]
pub struct RebuildRequest {
    #[serde(default)]
    pub force: bool,
}

// --- Response Bodies ---

/// Response body for adding a read mark.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MarkReadResponse {
    pub added: bool,
}

/// Response body for a user's read list.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserBooksResponse {
    pub telegram_id: i64,
    pub book_ids: Vec<ItemId>,
}

/// A single recommended book.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendedBook {
    pub id: ItemId,
    pub score: f32,
}

/// Response body for recommendations.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendResponse {
    pub book_ids: Vec<ItemId>,
    pub results: Vec<RecommendedBook>,
}

impl From<Vec<Recommendation>> for RecommendResponse {
    fn from(scored: Vec<Recommendation>) -> Self {
        RecommendResponse {
            book_ids: scored.iter().map(|r| r.item_id).collect(),
            results: scored.into_iter().map(|r| RecommendedBook { id: r.item_id, score: r.score }).collect(),
        }
    }
}
