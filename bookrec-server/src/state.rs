use std::sync::Arc;

use bookrec_core::{FileModelStore, Recommender};

use crate::catalog::Catalog;

/// The recommender as wired in this server: fitted from the catalog, persisted to a file.
pub type BookRecommender = Recommender<Catalog, FileModelStore>;

/// Holds the shared state accessible by all request handlers.
///
/// Both members are internally synchronized: the catalog behind its own lock, the
/// recommender behind an atomically swapped model snapshot.
#[derive(Clone, Debug)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub recommender: Arc<BookRecommender>,
}

impl AppState {
    /// Creates a new instance of the application state.
    pub fn new(catalog: Arc<Catalog>, recommender: BookRecommender) -> Self {
        AppState { catalog, recommender: Arc::new(recommender) }
    }
}
