use serde::{Serialize, Deserialize};
use crate::error::{RecResult, RecError};
use crate::stop_words;

/// Row normalization applied after TF-IDF weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowNorm {
    /// Scale every non-zero row to unit Euclidean length.
    L2,
    /// Leave raw tf * idf weights untouched.
    None,
}

/// Configuration parameters for fitting the TF-IDF vector space.
///
/// The whole config is persisted alongside the fitted model so that
/// `VectorSpaceModel::transform` tokenizes exactly like the fit did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfConfig {
    /// Terms excluded from the vocabulary. Compared after lowercasing.
    pub stop_words: Vec<String>,
    /// Lowercase text before tokenizing.
    pub lowercase: bool,
    /// Add one to document frequencies, as if an extra document contained every term once.
    pub smooth_idf: bool,
    /// Row normalization.
    pub norm: RowNorm,
    /// Minimum token length in characters.
    pub min_token_len: usize,
}

impl TfidfConfig {
    /// Creates a configuration with the given stop words and default weighting.
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TfidfConfig {
            stop_words: words.into_iter().map(|w| w.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> RecResult<()> {
        if self.min_token_len == 0 {
            return Err(RecError::Configuration("min_token_len must be greater than 0".to_string()));
        }
        if let Some(bad) = self.stop_words.iter().find(|w| w.trim().is_empty()) {
            return Err(RecError::Configuration(format!("stop word list contains a blank entry: {:?}", bad)));
        }
        Ok(())
    }
}

// Russian stop words: the catalog this was built for is Russian-language.
impl Default for TfidfConfig {
    fn default() -> Self {
        TfidfConfig {
            stop_words: stop_words::RUSSIAN.iter().map(|w| w.to_string()).collect(),
            lowercase: true,
            smooth_idf: true,
            norm: RowNorm::L2,
            min_token_len: 2,
        }
    }
}
