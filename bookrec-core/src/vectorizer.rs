//! TF-IDF vector space: tokenization, fitting and the fitted model.
//!
//! Weighting follows the usual smooth-idf convention:
//!
//! ```text
//! tf(t, d)  = raw count of t in d
//! idf(t)    = ln((1 + N) / (1 + df(t))) + 1     (smooth_idf = true)
//!           = ln(N / df(t)) + 1                 (smooth_idf = false)
//! w(t, d)   = tf(t, d) * idf(t), then each row L2-normalized
//! ```
//!
//! The vocabulary is sorted lexicographically, so fitting the same corpus in the
//! same order with the same config always yields bit-identical output.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::config::{RowNorm, TfidfConfig};
use crate::error::{RecError, RecResult};
use crate::item::{ItemId, ItemRecord};
use crate::normalize::normalize;
use crate::sparse::{CsrMatrix, SparseVector};

/// Splits text into lowercase word tokens and drops stop words.
///
/// A token is a maximal run of alphanumeric characters or `_`, at least
/// `min_token_len` characters long.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    lowercase: bool,
    min_token_len: usize,
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn new(config: &TfidfConfig) -> Self {
        let stop_words = config
            .stop_words
            .iter()
            .map(|w| if config.lowercase { w.to_lowercase() } else { w.clone() })
            .collect();
        Tokenizer { lowercase: config.lowercase, min_token_len: config.min_token_len, stop_words }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase { text.to_lowercase() } else { text.to_string() };
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|tok| tok.chars().count() >= self.min_token_len)
            .filter(|tok| !self.stop_words.contains(*tok))
            .map(str::to_string)
            .collect()
    }
}

/// A fitted TF-IDF model over one corpus snapshot.
///
/// Immutable once built. Row `i` of the matrix belongs to `item_ids[i]`;
/// `id_to_row` is the inverse mapping and is rebuilt whenever a model is restored.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSpaceModel {
    pub(crate) config: TfidfConfig,
    pub(crate) vocabulary: Vec<String>,
    pub(crate) idf: Vec<f32>,
    pub(crate) matrix: CsrMatrix,
    pub(crate) item_ids: Vec<ItemId>,
    id_to_row: HashMap<ItemId, usize>,
    term_to_col: HashMap<String, u32>,
}

impl VectorSpaceModel {
    /// A model with no items and no vocabulary.
    pub fn empty(config: TfidfConfig) -> Self {
        VectorSpaceModel {
            config,
            vocabulary: Vec::new(),
            idf: Vec::new(),
            matrix: CsrMatrix::new(0),
            item_ids: Vec::new(),
            id_to_row: HashMap::new(),
            term_to_col: HashMap::new(),
        }
    }

    /// Reassembles a model from its persisted parts, checking that they agree with each other.
    pub(crate) fn from_parts(
        config: TfidfConfig,
        vocabulary: Vec<String>,
        idf: Vec<f32>,
        matrix: CsrMatrix,
        item_ids: Vec<ItemId>,
    ) -> Result<Self, String> {
        matrix.check_structure()?;
        if vocabulary.len() != matrix.n_cols() || idf.len() != matrix.n_cols() {
            return Err(format!(
                "matrix has {} columns but vocabulary has {} terms and idf has {} weights",
                matrix.n_cols(), vocabulary.len(), idf.len()
            ));
        }
        if item_ids.len() != matrix.n_rows() {
            return Err(format!("matrix has {} rows but {} item ids", matrix.n_rows(), item_ids.len()));
        }
        if vocabulary.windows(2).any(|w| w[0] >= w[1]) {
            return Err("vocabulary is not sorted and unique".to_string());
        }
        let id_to_row = index_rows(&item_ids).map_err(|id| format!("duplicate item id {}", id))?;
        let term_to_col = index_terms(&vocabulary);
        Ok(VectorSpaceModel { config, vocabulary, idf, matrix, item_ids, id_to_row, term_to_col })
    }

    pub fn config(&self) -> &TfidfConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn n_terms(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Row index of `id`, if the item was part of the fitted corpus.
    pub fn row_of(&self, id: ItemId) -> Option<usize> {
        self.id_to_row.get(&id).copied()
    }

    /// Item id stored at `row`.
    pub fn item_id_at(&self, row: usize) -> Option<ItemId> {
        self.item_ids.get(row).copied()
    }

    /// Projects arbitrary text into the fitted space. Terms outside the vocabulary are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let tokenizer = Tokenizer::new(&self.config);
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for tok in tokenizer.tokenize(text) {
            if let Some(&col) = self.term_to_col.get(&tok) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        weight_row(&counts, &self.idf, self.config.norm)
    }
}

fn index_rows(item_ids: &[ItemId]) -> Result<HashMap<ItemId, usize>, ItemId> {
    let mut id_to_row = HashMap::with_capacity(item_ids.len());
    for (row, &id) in item_ids.iter().enumerate() {
        if id_to_row.insert(id, row).is_some() {
            return Err(id);
        }
    }
    Ok(id_to_row)
}

fn index_terms(vocabulary: &[String]) -> HashMap<String, u32> {
    vocabulary.iter().enumerate().map(|(col, t)| (t.clone(), col as u32)).collect()
}

/// Turns per-column term counts into a weighted (and optionally normalized) sparse row.
fn weight_row(counts: &BTreeMap<u32, u32>, idf: &[f32], norm: RowNorm) -> SparseVector {
    let mut indices = Vec::with_capacity(counts.len());
    let mut weights: Vec<f64> = Vec::with_capacity(counts.len());
    for (&col, &tf) in counts {
        indices.push(col);
        weights.push(tf as f64 * idf[col as usize] as f64);
    }
    if norm == RowNorm::L2 {
        let length = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        if length > 0.0 {
            weights.iter_mut().for_each(|w| *w /= length);
        }
    }
    SparseVector { indices, values: weights.into_iter().map(|w| w as f32).collect() }
}

/// Fits a TF-IDF model over the normalized text of every item, in corpus order.
///
/// Items whose text yields no terms get an all-zero row. An empty corpus yields an
/// empty model. Duplicate item ids are rejected with `RecError::InvalidCorpus`.
pub fn fit(corpus: &[ItemRecord], config: &TfidfConfig) -> RecResult<VectorSpaceModel> {
    config.validate()?;
    let item_ids: Vec<ItemId> = corpus.iter().map(|item| item.id).collect();
    let id_to_row = index_rows(&item_ids)
        .map_err(|id| RecError::InvalidCorpus(format!("duplicate item id {}", id)))?;

    if corpus.is_empty() {
        info!("Fitting TF-IDF on an empty corpus; producing an empty model");
        return Ok(VectorSpaceModel::empty(config.clone()));
    }

    let tokenizer = Tokenizer::new(config);
    let documents: Vec<Vec<String>> = corpus.iter().map(|item| tokenizer.tokenize(&normalize(item))).collect();

    // Document frequency per term; BTreeMap keeps the vocabulary sorted.
    let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in &documents {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in unique {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }

    let n_docs = documents.len() as f64;
    let vocabulary: Vec<String> = doc_freq.keys().map(|t| t.to_string()).collect();
    let idf: Vec<f32> = doc_freq
        .values()
        .map(|&df| {
            let df = df as f64;
            let ratio = if config.smooth_idf { (1.0 + n_docs) / (1.0 + df) } else { n_docs / df };
            (ratio.ln() + 1.0) as f32
        })
        .collect();
    let term_to_col = index_terms(&vocabulary);

    let mut matrix = CsrMatrix::new(vocabulary.len());
    for tokens in &documents {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for tok in tokens {
            // Every token of the corpus is in the vocabulary by construction.
            if let Some(&col) = term_to_col.get(tok) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        matrix.push_row(weight_row(&counts, &idf, config.norm));
    }

    debug!(rows = matrix.n_rows(), terms = vocabulary.len(), nnz = matrix.nnz(), "TF-IDF matrix assembled");
    Ok(VectorSpaceModel { config: config.clone(), vocabulary, idf, matrix, item_ids, id_to_row, term_to_col })
}
