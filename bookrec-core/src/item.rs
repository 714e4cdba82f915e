use serde::{Serialize, Deserialize};

/// Type alias for item identifiers, as assigned by the catalog.
pub type ItemId = i64;

/// A snapshot of one catalog item as seen by the vectorizer.
///
/// `genres` keeps the catalog's comma-separated form (e.g. `"scifi,drama"`);
/// splitting is the normalizer's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub description: Option<String>,
    pub genres: Option<String>,
}

impl ItemRecord {
    pub fn new(id: ItemId, description: impl Into<String>, genres: impl Into<String>) -> Self {
        ItemRecord {
            id,
            description: Some(description.into()),
            genres: Some(genres.into()),
        }
    }
}
