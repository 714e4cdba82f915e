use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array1, ArrayView1};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::TfidfConfig;
use crate::error::{RecError, RecResult};
use crate::item::{ItemId, ItemRecord};
use crate::similarity::cosine_similarities;
use crate::store::{LoadOutcome, ModelStore};
use crate::vectorizer::{fit, VectorSpaceModel};

/// Number of recommendations returned when the caller does not say.
pub const DEFAULT_TOP_N: usize = 5;

/// Supplies the full item catalog snapshot used for fitting.
#[async_trait]
pub trait CorpusProvider: Send + Sync {
    /// Every item, in any order that is stable between calls.
    async fn list_items(&self) -> RecResult<Vec<ItemRecord>>;
}

/// One ranked item with its similarity to the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f32,
}

/// Where the active model came from after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Restored from the model store.
    Loaded,
    /// Fitted from a fresh corpus snapshot and saved.
    Built,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub items: usize,
    pub terms: usize,
    pub non_zeros: usize,
}

impl ModelStats {
    fn of(model: &VectorSpaceModel) -> Self {
        ModelStats { items: model.n_items(), terms: model.n_terms(), non_zeros: model.matrix().nnz() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOutcome {
    pub source: ModelSource,
    pub stats: ModelStats,
    /// True when the active model was fitted with a different `TfidfConfig` than the
    /// recommender's. Only a forced rebuild clears it.
    pub stale_config: bool,
}

/// Ranks every item of `model` against the mean vector of the `read_ids` rows.
///
/// Unknown ids are dropped; if none remain the result is empty. Ties are broken by
/// ascending row index. Read items never appear in the output.
pub fn rank(model: &VectorSpaceModel, read_ids: &HashSet<ItemId>, top_n: usize) -> Vec<Recommendation> {
    if top_n == 0 {
        return Vec::new();
    }
    let mut read_rows: Vec<usize> = read_ids.iter().filter_map(|&id| model.row_of(id)).collect();
    if read_rows.is_empty() {
        debug!(requested = read_ids.len(), "No known read items; nothing to recommend");
        return Vec::new();
    }
    // HashSet iteration order is arbitrary; sum rows in a fixed order for reproducible floats.
    read_rows.sort_unstable();

    let profile = model.matrix().mean_of_rows(&read_rows);
    rank_profile(model, profile.view(), &read_rows, top_n)
}

/// Ranks every item of `model` against free text projected into the fitted space.
///
/// Text with no in-vocabulary terms ranks nothing. No item is excluded.
pub fn rank_text(model: &VectorSpaceModel, text: &str, top_n: usize) -> Vec<Recommendation> {
    if top_n == 0 {
        return Vec::new();
    }
    let query = model.transform(text);
    if query.indices.is_empty() {
        debug!("Query text has no known terms; nothing to recommend");
        return Vec::new();
    }
    let mut profile = Array1::<f32>::zeros(model.n_terms());
    for (&col, &value) in query.indices.iter().zip(&query.values) {
        profile[col as usize] = value;
    }
    rank_profile(model, profile.view(), &[], top_n)
}

/// Orders rows by similarity to `profile` (best first, ties by row), skipping `excluded_rows`.
/// `excluded_rows` must be sorted.
fn rank_profile(
    model: &VectorSpaceModel,
    profile: ArrayView1<f32>,
    excluded_rows: &[usize],
    top_n: usize,
) -> Vec<Recommendation> {
    let sims = match cosine_similarities(profile, model.matrix().rows()) {
        Ok(sims) => sims,
        Err(e) => {
            // The profile spans the model's own vocabulary, so this means a broken model.
            warn!(error = %e, "Similarity computation failed; returning no recommendations");
            return Vec::new();
        }
    };

    let mut order: Vec<usize> = (0..sims.len()).filter(|row| excluded_rows.binary_search(row).is_err()).collect();
    order.sort_by(|&a, &b| sims[b].partial_cmp(&sims[a]).unwrap_or(Ordering::Equal).then(a.cmp(&b)));

    order
        .into_iter()
        .take(top_n)
        .filter_map(|row| model.item_id_at(row).map(|item_id| Recommendation { item_id, score: sims[row] }))
        .collect()
}

/// Content-based recommender owning the active TF-IDF model.
///
/// Queries run against an immutable snapshot (`Arc<VectorSpaceModel>`); rebuilds fit a
/// new model off to the side, persist it, and swap the reference in one step.
pub struct Recommender<P: CorpusProvider, S: ModelStore> {
    provider: Arc<P>,
    store: S,
    config: TfidfConfig,
    active: RwLock<Arc<VectorSpaceModel>>,
    rebuild_lock: Mutex<()>,
}

impl<P, S> std::fmt::Debug for Recommender<P, S>
where
    P: CorpusProvider,
    S: ModelStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("store", &self.store)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<P, S> Recommender<P, S>
where
    P: CorpusProvider,
    S: ModelStore,
{
    /// Loads the persisted model, or fits and saves one when the store has none.
    pub async fn load_or_build(provider: Arc<P>, store: S, config: TfidfConfig) -> RecResult<Self> {
        config.validate()?;
        let recommender = Recommender {
            provider,
            store,
            config: config.clone(),
            active: RwLock::new(Arc::new(VectorSpaceModel::empty(config))),
            rebuild_lock: Mutex::new(()),
        };
        recommender.rebuild(false).await?;
        Ok(recommender)
    }

    /// Replaces the active model.
    ///
    /// With `force == false` the stored model is reloaded and a fit only happens when the
    /// store reports `NotFound`. With `force == true` the corpus is always refitted and saved.
    /// On error the previous model stays active.
    pub async fn rebuild(&self, force: bool) -> RecResult<RebuildOutcome> {
        let _guard = self.rebuild_lock.lock().await;

        let (model, source) = if force {
            info!("Forced rebuild requested; refitting from corpus");
            (self.build_and_save().await?, ModelSource::Built)
        } else {
            match self.store.load()? {
                LoadOutcome::Loaded(model) => (model, ModelSource::Loaded),
                LoadOutcome::NotFound => {
                    info!("No persisted model found; fitting from corpus");
                    (self.build_and_save().await?, ModelSource::Built)
                }
            }
        };

        let stats = ModelStats::of(&model);
        let stale_config = model.config() != &self.config;
        if stale_config {
            warn!(
                stored = ?model.config(),
                configured = ?self.config,
                "Persisted model was fitted with a different TF-IDF config; force a rebuild to apply the new one"
            );
        }
        *self.active.write() = Arc::new(model);
        info!(source = ?source, items = stats.items, terms = stats.terms, stale_config, "Active model swapped");
        Ok(RebuildOutcome { source, stats, stale_config })
    }

    async fn build_and_save(&self) -> RecResult<VectorSpaceModel> {
        let corpus = self
            .provider
            .list_items()
            .await
            .map_err(|e| match e {
                RecError::InvalidCorpus(_) => e,
                other => RecError::InvalidCorpus(format!("corpus provider failed: {}", other)),
            })?;
        let config = self.config.clone();
        info!(items = corpus.len(), "Fitting TF-IDF model");

        let model = tokio::task::spawn_blocking(move || fit(&corpus, &config))
            .await
            .map_err(|e| RecError::Internal(format!("model fit task failed: {}", e)))??;
        self.store.save(&model)?;
        Ok(model)
    }

    /// Snapshot of the model currently serving queries.
    pub fn model(&self) -> Arc<VectorSpaceModel> {
        Arc::clone(&self.active.read())
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats::of(&self.model())
    }

    /// Ids of the `top_n` items most similar to what the user has read, best first.
    pub fn recommend(&self, read_ids: &HashSet<ItemId>, top_n: usize) -> Vec<ItemId> {
        self.recommend_scored(read_ids, top_n).into_iter().map(|r| r.item_id).collect()
    }

    /// Same ranking as `recommend`, with similarity scores attached.
    pub fn recommend_scored(&self, read_ids: &HashSet<ItemId>, top_n: usize) -> Vec<Recommendation> {
        let model = self.model();
        let results = rank(&model, read_ids, top_n);
        debug!(read = read_ids.len(), top_n, returned = results.len(), "Computed recommendations");
        results
    }

    /// Items most similar to a free-text query, e.g. "space opera with pirates".
    pub fn recommend_for_text(&self, text: &str, top_n: usize) -> Vec<Recommendation> {
        let model = self.model();
        let results = rank_text(&model, text, top_n);
        debug!(top_n, returned = results.len(), "Computed text recommendations");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileModelStore, InMemoryModelStore};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tempfile::tempdir;

    #[derive(Debug)]
    struct StaticCorpus {
        items: parking_lot::Mutex<Vec<ItemRecord>>,
        calls: AtomicUsize,
    }

    impl StaticCorpus {
        fn new(items: Vec<ItemRecord>) -> Arc<Self> {
            Arc::new(StaticCorpus { items: parking_lot::Mutex::new(items), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl CorpusProvider for StaticCorpus {
        async fn list_items(&self) -> RecResult<Vec<ItemRecord>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.items.lock().clone())
        }
    }

    struct FailingCorpus;

    #[async_trait]
    impl CorpusProvider for FailingCorpus {
        async fn list_items(&self) -> RecResult<Vec<ItemRecord>> {
            Err(RecError::Internal("database unavailable".to_string()))
        }
    }

    fn english() -> TfidfConfig {
        TfidfConfig::with_stop_words(crate::stop_words::ENGLISH)
    }

    fn abc_corpus() -> Vec<ItemRecord> {
        vec![
            ItemRecord::new(1, "space opera adventure", "scifi"),
            ItemRecord::new(2, "galactic war adventure", "scifi"),
            ItemRecord::new(3, "romantic drama", "drama"),
        ]
    }

    fn ids(v: &[ItemId]) -> HashSet<ItemId> {
        v.iter().copied().collect()
    }

    async fn recommender(items: Vec<ItemRecord>) -> Recommender<StaticCorpus, InMemoryModelStore> {
        Recommender::load_or_build(StaticCorpus::new(items), InMemoryModelStore::new(), english())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ranking_prefers_shared_vocabulary() {
        let rec = recommender(abc_corpus()).await;
        let scored = rec.recommend_scored(&ids(&[1]), 2);
        assert_eq!(scored.iter().map(|r| r.item_id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(scored[0].score > scored[1].score);
        assert_eq!(scored[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_read_items_excluded_and_bound_respected() {
        let rec = recommender(abc_corpus()).await;
        for top_n in 0..5 {
            for read in [vec![1], vec![1, 2], vec![3], vec![1, 2, 3], vec![2, 42]] {
                let read = ids(&read);
                let out = rec.recommend(&read, top_n);
                assert!(out.len() <= top_n);
                assert!(out.iter().all(|id| !read.contains(id)));
            }
        }
        assert!(rec.recommend(&ids(&[1, 2, 3]), 5).is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_unknown_history() {
        let rec = recommender(abc_corpus()).await;
        assert!(rec.recommend(&HashSet::new(), 5).is_empty());
        assert!(rec.recommend(&ids(&[999]), 5).is_empty());
        // Unknown ids mixed with known ones are simply ignored.
        assert_eq!(rec.recommend(&ids(&[1, 999]), 1), vec![2]);
    }

    #[tokio::test]
    async fn test_ties_break_by_row_not_id() {
        let items = vec![
            ItemRecord::new(1, "deep sea exploration", "nature"),
            ItemRecord::new(5, "ocean voyage", "nature"),
            ItemRecord::new(4, "ocean voyage", "nature"),
            ItemRecord::new(9, "ocean voyage", "nature"),
        ];
        let rec = recommender(items).await;
        let scored = rec.recommend_scored(&ids(&[1]), 3);
        assert_eq!(scored.iter().map(|r| r.item_id).collect::<Vec<_>>(), vec![5, 4, 9]);
        assert_eq!(scored[0].score, scored[1].score);
        assert_eq!(scored[1].score, scored[2].score);
    }

    #[tokio::test]
    async fn test_ties_in_id_order_when_corpus_sorted_by_id() {
        let items = vec![
            ItemRecord::new(1, "mountain climbing memoir", "travel"),
            ItemRecord::new(2, "river rafting", "travel"),
            ItemRecord::new(3, "river rafting", "travel"),
        ];
        let rec = recommender(items).await;
        assert_eq!(rec.recommend(&ids(&[1]), 2), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_queries_are_repeatable() {
        let rec = recommender(abc_corpus()).await;
        let read = ids(&[1, 3]);
        let first = rec.recommend_scored(&read, 5);
        for _ in 0..10 {
            assert_eq!(rec.recommend_scored(&read, 5), first);
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_serves_nothing() {
        let rec = recommender(Vec::new()).await;
        assert_eq!(rec.stats().items, 0);
        assert!(rec.recommend(&ids(&[1]), 5).is_empty());
    }

    #[tokio::test]
    async fn test_load_or_build_reuses_persisted_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bkrv");

        let provider = StaticCorpus::new(abc_corpus());
        let first = Recommender::load_or_build(provider.clone(), FileModelStore::new(&path), english()).await.unwrap();
        assert_eq!(provider.calls(), 1);
        let expected = first.recommend_scored(&ids(&[1]), 5);

        let second = Recommender::load_or_build(provider.clone(), FileModelStore::new(&path), english()).await.unwrap();
        assert_eq!(provider.calls(), 1, "second start should load, not refit");
        assert_eq!(second.recommend_scored(&ids(&[1]), 5), expected);
        assert_eq!(*second.model(), *first.model());
    }

    #[tokio::test]
    async fn test_forced_rebuild_swaps_model() {
        let provider = StaticCorpus::new(abc_corpus());
        let rec = Recommender::load_or_build(provider.clone(), InMemoryModelStore::new(), english()).await.unwrap();
        let before = rec.model();

        provider.items.lock().push(ItemRecord::new(4, "space adventure saga", "scifi"));
        let unforced = rec.rebuild(false).await.unwrap();
        assert_eq!(unforced.source, ModelSource::Loaded);
        assert_eq!(unforced.stats.items, 3);

        let forced = rec.rebuild(true).await.unwrap();
        assert_eq!(forced.source, ModelSource::Built);
        assert_eq!(forced.stats.items, 4);
        assert_eq!(provider.calls(), 2);

        // A snapshot taken before the swap is untouched.
        assert_eq!(before.n_items(), 3);
        assert_eq!(rec.recommend(&ids(&[1]), 1), vec![4]);
    }

    #[tokio::test]
    async fn test_text_query_ranks_by_content() {
        let rec = recommender(abc_corpus()).await;
        let scored = rec.recommend_for_text("A galactic adventure!", 3);
        assert_eq!(scored.iter().map(|r| r.item_id).collect::<Vec<_>>(), vec![2, 1, 3]);
        assert!(scored[0].score > scored[1].score);
        assert_eq!(scored[2].score, 0.0);

        assert!(rec.recommend_for_text("unheard of words", 3).is_empty());
        assert!(rec.recommend_for_text("", 3).is_empty());
        assert!(rec.recommend_for_text("galactic", 0).is_empty());
        // A book's own text scores it first.
        assert_eq!(rec.recommend_for_text("romantic drama drama", 1)[0].item_id, 3);
    }

    #[tokio::test]
    async fn test_config_change_flags_stale_model_until_forced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bkrv");
        let provider = StaticCorpus::new(abc_corpus());
        let first = Recommender::load_or_build(provider.clone(), FileModelStore::new(&path), english()).await.unwrap();
        assert!(!first.rebuild(false).await.unwrap().stale_config);

        let mut other = english();
        other.smooth_idf = false;
        let second = Recommender::load_or_build(provider.clone(), FileModelStore::new(&path), other.clone())
            .await
            .unwrap();
        assert_eq!(second.model().config(), &english());

        let reloaded = second.rebuild(false).await.unwrap();
        assert_eq!(reloaded.source, ModelSource::Loaded);
        assert!(reloaded.stale_config);

        let forced = second.rebuild(true).await.unwrap();
        assert!(!forced.stale_config);
        assert_eq!(second.model().config(), &other);
    }

    #[tokio::test]
    async fn test_provider_failure_is_invalid_corpus() {
        let result = Recommender::load_or_build(Arc::new(FailingCorpus), InMemoryModelStore::new(), english()).await;
        match result {
            Err(RecError::InvalidCorpus(msg)) => assert!(msg.contains("database unavailable")),
            other => panic!("expected InvalidCorpus, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_corrupt_store_fails_loudly_and_keeps_old_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bkrv");
        let rec = Recommender::load_or_build(StaticCorpus::new(abc_corpus()), FileModelStore::new(&path), english())
            .await
            .unwrap();

        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(rec.rebuild(false).await, Err(RecError::CorruptModel { .. })));
        assert_eq!(rec.stats().items, 3);

        // A forced rebuild recovers by overwriting the corrupt file.
        rec.rebuild(true).await.unwrap();
        assert!(matches!(rec.rebuild(false).await.unwrap().source, ModelSource::Loaded));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_during_rebuild() {
        let provider = StaticCorpus::new(abc_corpus());
        let rec = Arc::new(
            Recommender::load_or_build(provider.clone(), InMemoryModelStore::new(), english()).await.unwrap(),
        );
        provider.items.lock().push(ItemRecord::new(4, "galactic space adventure", "scifi"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let rec = Arc::clone(&rec);
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let out = rec.recommend(&[1].into_iter().collect(), 5);
                    // Either the old (2 candidates) or the new (3 candidates) model, never a mix.
                    assert!(out == vec![2, 3] || out.len() == 3, "unexpected ranking {:?}", out);
                    assert!(!out.contains(&1));
                }
            }));
        }
        let rebuilds: Vec<_> = (0..3).map(|_| {
            let rec = Arc::clone(&rec);
            tokio::spawn(async move { rec.rebuild(true).await.unwrap() })
        }).collect();

        for h in handles {
            h.await.unwrap();
        }
        for r in rebuilds {
            assert_eq!(r.await.unwrap().stats.items, 4);
        }
        assert_eq!(provider.calls(), 4);
    }
}
