//! Text-level operations over one category.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pooling;
use super::{DEFAULT_SEARCH_LIMIT, thresholds};
use crate::config::Settings;
use crate::error::{VectorError, VectorResult};
use crate::store::{CategorySpec, Database, ScoringSite, VectorRecord, VectorTable};
use crate::vector::{Embedder, VectorDimension, VectorId};

/// One search result: a stored id and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: VectorId,
    pub similarity: f32,
}

/// Stores and searches texts in one category.
///
/// The category table is created on first use. The embedder's model
/// identifier becomes the active model tag: new records carry it and reads
/// skip records written by another model.
pub struct VectorCollection {
    db: Database,
    embedder: Arc<dyn Embedder>,
    table: VectorTable,
    initialized: AtomicBool,
    duplicate_threshold: f32,
    default_limit: usize,
}

impl std::fmt::Debug for VectorCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorCollection")
            .field("table", &self.table)
            .field("duplicate_threshold", &self.duplicate_threshold)
            .field("default_limit", &self.default_limit)
            .field("embedder", &"<dyn Embedder>")
            .finish()
    }
}

impl VectorCollection {
    /// Binds a category to a database and an embedder.
    ///
    /// The category dimension must equal the embedder's.
    pub fn new(db: Database, embedder: Arc<dyn Embedder>, spec: CategorySpec) -> VectorResult<Self> {
        let produced = embedder.dimensions();
        if spec.dimension != produced {
            return Err(VectorError::DimensionMismatch {
                expected: spec.dimension.get(),
                actual: produced.get(),
            });
        }

        let table = VectorTable::new(db.clone(), spec)?
            .with_model_tag(Some(embedder.model_identifier()));

        Ok(Self {
            db,
            embedder,
            table,
            initialized: AtomicBool::new(false),
            duplicate_threshold: thresholds::DUPLICATE,
            default_limit: DEFAULT_SEARCH_LIMIT,
        })
    }

    /// Builds the configured default category.
    pub fn from_settings(
        db: Database,
        embedder: Arc<dyn Embedder>,
        settings: &Settings,
    ) -> VectorResult<Self> {
        let category = &settings.category;
        let dimension = match category.dimension {
            Some(dim) => VectorDimension::new(dim)?,
            None => embedder.dimensions(),
        };

        let spec = CategorySpec::new(category.name.clone(), dimension)
            .with_engine(category.engine)
            .with_table_fixes(category.table_prefix.clone(), category.table_suffix.clone());

        Ok(Self::new(db, embedder, spec)?
            .with_scoring(settings.search.scoring)
            .with_duplicate_threshold(settings.search.duplicate_threshold)
            .with_default_limit(settings.search.default_limit))
    }

    /// Opens the configured database and builds the default category on it.
    pub fn open(embedder: Arc<dyn Embedder>, settings: &Settings) -> VectorResult<Self> {
        let db = Database::open_with_config(&settings.database)?;
        Self::from_settings(db, embedder, settings)
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringSite) -> Self {
        self.table = self.table.with_scoring(scoring);
        self
    }

    #[must_use]
    pub fn with_duplicate_threshold(mut self, threshold: f32) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn spec(&self) -> &CategorySpec {
        self.table.spec()
    }

    /// The underlying table, for vector-level access.
    pub fn table(&self) -> &VectorTable {
        &self.table
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// A handle on another category sharing this database and embedder.
    ///
    /// The new category keeps this one's dimension, engine and table fixes.
    pub fn with_category(&self, name: &str) -> VectorResult<Self> {
        let spec = self.spec().renamed(name);
        Ok(Self::new(self.db.clone(), Arc::clone(&self.embedder), spec)?
            .with_scoring(self.table.scoring())
            .with_duplicate_threshold(self.duplicate_threshold)
            .with_default_limit(self.default_limit))
    }

    /// Whether this category's table exists.
    pub fn category_exists(&self) -> VectorResult<bool> {
        self.table.exists()
    }

    /// Drops the table and creates it again, empty.
    pub fn force_recreate(&self) -> VectorResult<()> {
        self.table.drop()?;
        self.initialized.store(false, Ordering::Release);
        self.ensure_table()?;
        info!(category = %self.spec().name, "recreated category");
        Ok(())
    }

    /// Drops the table. The next operation recreates it.
    pub fn destroy(&self) -> VectorResult<()> {
        self.table.drop()?;
        self.initialized.store(false, Ordering::Release);
        Ok(())
    }

    /// Stores `text`, returning the id of an existing near-identical text
    /// instead when one is found.
    pub fn store(&self, text: &str) -> VectorResult<VectorId> {
        let table = self.ensure_table()?;
        let vector = self.embed(text)?;

        if let Some(existing) = self.find_duplicate(&vector)? {
            debug!(id = %existing, "text already stored");
            return Ok(existing);
        }

        table.upsert(&vector, None)
    }

    /// Stores every text in one transaction. No duplicate check.
    pub fn store_many(&self, texts: &[&str]) -> VectorResult<Vec<VectorId>> {
        let table = self.ensure_table()?;
        let vectors = texts
            .iter()
            .map(|text| self.embed(text))
            .collect::<VectorResult<Vec<_>>>()?;

        table.batch_insert(&vectors)
    }

    /// Re-embeds `text` and overwrites record `id` with it.
    pub fn update(&self, id: VectorId, text: &str) -> VectorResult<()> {
        let table = self.ensure_table()?;
        let vector = self.embed(text)?;
        table.upsert(&vector, Some(id))?;
        Ok(())
    }

    /// Records for `ids` written by the active model, ordered by id.
    pub fn get_by_ids(&self, ids: &[VectorId]) -> VectorResult<Vec<VectorRecord>> {
        self.ensure_table()?.select(ids, false)
    }

    /// Deletes `id`; returns whether it existed.
    pub fn delete_by_id(&self, id: VectorId) -> VectorResult<bool> {
        self.ensure_table()?.delete(id)
    }

    pub fn count(&self) -> VectorResult<usize> {
        self.ensure_table()?.count()
    }

    /// The `limit` stored texts most similar to `text`.
    pub fn search(&self, text: &str, limit: usize) -> VectorResult<Vec<Match>> {
        let table = self.ensure_table()?;
        let vector = self.embed(text)?;
        Ok(to_matches(table.search(&vector, limit, false)?))
    }

    /// [`search`](Self::search) with the configured default limit.
    pub fn search_default(&self, text: &str) -> VectorResult<Vec<Match>> {
        self.search(text, self.default_limit)
    }

    /// The `limit` records most similar to the stored record `id`, which
    /// is itself included.
    ///
    /// A record written by another model counts as absent.
    pub fn search_by_id(&self, id: VectorId, limit: usize) -> VectorResult<Vec<Match>> {
        let table = self.ensure_table()?;
        let record = self.current_record(table, id)?;
        Ok(to_matches(table.search(&record.vector, limit, false)?))
    }

    /// Id of a stored text whose similarity to `text` reaches the duplicate
    /// threshold.
    pub fn id_of_text(&self, text: &str) -> VectorResult<Option<VectorId>> {
        self.ensure_table()?;
        let vector = self.embed(text)?;
        self.find_duplicate(&vector)
    }

    /// Cosine similarity of two texts.
    pub fn similarity(&self, a: &str, b: &str) -> VectorResult<f32> {
        let table = self.ensure_table()?;
        let va = self.embed(a)?;
        let vb = self.embed(b)?;
        table.cosine(&va, &vb)
    }

    /// Cosine similarity of `text` to the stored record `id`, which must
    /// have been written by the active model.
    pub fn similarity_to_id(&self, text: &str, id: VectorId) -> VectorResult<f32> {
        let table = self.ensure_table()?;
        let record = self.current_record(table, id)?;
        let vector = self.embed(text)?;
        table.cosine(&vector, &record.normalized_vector)
    }

    fn current_record(&self, table: &VectorTable, id: VectorId) -> VectorResult<VectorRecord> {
        table
            .select(&[id], false)?
            .into_iter()
            .next()
            .ok_or(VectorError::NotFound(id.get()))
    }

    fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        pooling::pool(self.embedder.as_ref(), text)
    }

    fn find_duplicate(&self, vector: &[f32]) -> VectorResult<Option<VectorId>> {
        let nearest = self.table.search(vector, 1, false)?;
        Ok(nearest
            .into_iter()
            .find(|hit| hit.similarity >= self.duplicate_threshold)
            .map(|hit| hit.id))
    }

    /// Creates the table on first use, and again whenever another handle
    /// on the same category has dropped it since.
    fn ensure_table(&self) -> VectorResult<&VectorTable> {
        if !self.initialized.load(Ordering::Acquire) || !self.table.exists()? {
            self.table.initialize(true)?;
            self.initialized.store(true, Ordering::Release);
        }
        Ok(&self.table)
    }
}

fn to_matches(hits: Vec<crate::store::SearchHit>) -> Vec<Match> {
    hits.into_iter()
        .map(|hit| Match {
            id: hit.id,
            similarity: hit.similarity,
        })
        .collect()
}
