pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod normalize;
pub mod similarity;
pub mod sparse;
pub mod stop_words;
pub mod store;
pub mod vectorizer;

// Re-export key types/traits for easier use
pub use config::{RowNorm, TfidfConfig};
pub use engine::{
    CorpusProvider, ModelSource, ModelStats, RebuildOutcome, Recommendation, Recommender, DEFAULT_TOP_N,
};
pub use error::{RecError, RecResult};
pub use item::{ItemId, ItemRecord};
pub use normalize::normalize;
pub use store::{FileModelStore, InMemoryModelStore, LoadOutcome, ModelStore};
pub use vectorizer::{fit, VectorSpaceModel};
