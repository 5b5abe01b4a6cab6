//! Persistent vectors of one category and the two-phase search over them.
//!
//! # Search
//! 1. The query is normalized and sign-quantized like a stored record.
//! 2. Coarse filter: `HAMMING_DISTANCE` against every stored code, keeping the
//!    `n` closest (ties by id).
//! 3. Exact rerank of those `n` candidates by the dot product of normalized
//!    vectors, either in SQL through `COSIM` or in process.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::database::Database;
use super::functions;
use super::record::{EncodedVector, RECORD_COLUMNS, SearchHit, VectorRecord, to_json};
use super::schema::{self, CategorySpec, TableEngine};
use crate::error::{VectorError, VectorResult};
use crate::vector::{self, BinaryCode, ModelTag, VectorDimension, VectorId};

/// Where the exact rerank is evaluated.
///
/// Both sites score `dot(normalized_vector, normalized_query)` and agree
/// within floating point tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringSite {
    /// Through the `COSIM` SQL function.
    #[default]
    Database,
    /// On rows fetched into the process.
    Client,
}

/// The records of one category.
#[derive(Debug, Clone)]
pub struct VectorTable {
    db: Database,
    spec: CategorySpec,
    table: String,
    model_tag: Option<ModelTag>,
    scoring: ScoringSite,
}

impl VectorTable {
    /// Binds a category to a database. Nothing is created until
    /// [`initialize`](Self::initialize).
    pub fn new(db: Database, spec: CategorySpec) -> VectorResult<Self> {
        let table = spec.table_name()?;
        Ok(Self {
            db,
            spec,
            table,
            model_tag: None,
            scoring: ScoringSite::default(),
        })
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringSite) -> Self {
        self.scoring = scoring;
        self
    }

    #[must_use]
    pub fn with_model_tag(mut self, tag: Option<ModelTag>) -> Self {
        self.model_tag = tag;
        self
    }

    /// Sets the tag written on inserts and used to filter reads.
    pub fn set_model_tag(&mut self, tag: Option<ModelTag>) {
        self.model_tag = tag;
    }

    pub fn model_tag(&self) -> Option<&ModelTag> {
        self.model_tag.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn dimension(&self) -> VectorDimension {
        self.spec.dimension
    }

    pub fn engine(&self) -> TableEngine {
        self.spec.engine
    }

    pub fn scoring(&self) -> ScoringSite {
        self.scoring
    }

    pub fn spec(&self) -> &CategorySpec {
        &self.spec
    }

    /// Registers the category, creates the table and its code index, then
    /// checks that the scoring functions answer. All in one transaction.
    ///
    /// A category already registered with another dimension fails with
    /// [`VectorError::DimensionMismatch`]. With `if_not_exists = false` an
    /// existing table is an error.
    pub fn initialize(&self, if_not_exists: bool) -> VectorResult<()> {
        let table = self.table.as_str();
        let dimension = self.spec.dimension;
        let schema_error = |e: rusqlite::Error| VectorError::schema(table, e);

        self.db.transaction(schema_error, |tx| {
            let registered: Option<i64> = tx
                .query_row(
                    &format!(
                        "SELECT dimension FROM \"{}\" WHERE table_name = ?1",
                        schema::CATEGORY_TABLE
                    ),
                    params![table],
                    |row| row.get(0),
                )
                .optional()
                .map_err(schema_error)?;

            match registered {
                Some(stored) if usize::try_from(stored).ok() != Some(dimension.get()) => {
                    return Err(VectorError::DimensionMismatch {
                        expected: usize::try_from(stored).unwrap_or_default(),
                        actual: dimension.get(),
                    });
                }
                Some(_) => {}
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO \"{}\" (table_name, dimension, engine, created)
                             VALUES (?1, ?2, ?3, ?4)",
                            schema::CATEGORY_TABLE
                        ),
                        params![
                            table,
                            dimension.get() as i64,
                            self.spec.engine.to_string(),
                            Utc::now().timestamp()
                        ],
                    )
                    .map_err(schema_error)?;
                }
            }

            tx.execute_batch(&schema::create_table_sql(
                table,
                dimension,
                self.spec.engine,
                if_not_exists,
            ))
            .map_err(schema_error)?;
            tx.execute_batch(&schema::create_index_sql(table, if_not_exists))
                .map_err(schema_error)?;
            functions::verify(tx).map_err(schema_error)?;
            Ok(())
        })?;

        info!(
            table,
            dimension = %dimension,
            engine = %self.spec.engine,
            "initialized vector table"
        );
        Ok(())
    }

    /// Whether the table exists.
    pub fn exists(&self) -> VectorResult<bool> {
        self.db.with_connection("exists", |conn| {
            conn.query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
    }

    /// Drops the table and its index and unregisters the category, so it
    /// may be created again with another dimension. Dropping a missing
    /// table is a no-op.
    pub fn drop(&self) -> VectorResult<()> {
        let table = self.table.as_str();
        let schema_error = |e: rusqlite::Error| VectorError::schema(table, e);

        self.db.transaction(schema_error, |tx| {
            tx.execute_batch(&schema::drop_table_sql(table))
                .map_err(schema_error)?;
            tx.execute(
                &format!(
                    "DELETE FROM \"{}\" WHERE table_name = ?1",
                    schema::CATEGORY_TABLE
                ),
                params![table],
            )
            .map_err(schema_error)?;
            Ok(())
        })?;

        info!(table, "dropped vector table");
        Ok(())
    }

    /// Inserts `raw`, or with an id inserts-or-overwrites that row.
    ///
    /// On overwrite every derived field and the model tag are replaced;
    /// the creation time is kept.
    pub fn upsert(&self, raw: &[f32], id: Option<VectorId>) -> VectorResult<VectorId> {
        self.spec.dimension.validate_vector(raw)?;
        let encoded = EncodedVector::from_raw(raw)?;
        let tag = self.model_tag.as_ref().map(ModelTag::as_str);
        let created = Utc::now().timestamp();
        let table = &self.table;

        let rowid = self.db.with_connection("upsert", |conn| match id {
            None => {
                conn.execute(
                    &format!(
                        "INSERT INTO \"{table}\" (vector, normalized_vector, magnitude, binary_code, model_tag, created)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                    ),
                    params![
                        encoded.vector_json,
                        encoded.normalized_json,
                        encoded.magnitude,
                        encoded.binary_code,
                        tag,
                        created
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            }
            Some(id) => {
                conn.execute(
                    &format!(
                        "INSERT INTO \"{table}\" (id, vector, normalized_vector, magnitude, binary_code, model_tag, created)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(id) DO UPDATE SET
                            vector = excluded.vector,
                            normalized_vector = excluded.normalized_vector,
                            magnitude = excluded.magnitude,
                            binary_code = excluded.binary_code,
                            model_tag = excluded.model_tag"
                    ),
                    params![
                        id,
                        encoded.vector_json,
                        encoded.normalized_json,
                        encoded.magnitude,
                        encoded.binary_code,
                        tag,
                        created
                    ],
                )?;
                Ok(id.get())
            }
        })?;

        let id = VectorId::new(rowid).ok_or_else(|| {
            VectorError::InvalidState(format!("store returned non-positive id {rowid}"))
        })?;
        debug!(table = %self.table, %id, "upserted vector");
        Ok(id)
    }

    /// Inserts every vector in one transaction; ids come back in input order.
    ///
    /// All lengths are validated before anything is written. Any failure
    /// rolls the whole batch back.
    pub fn batch_insert(&self, raws: &[Vec<f32>]) -> VectorResult<Vec<VectorId>> {
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        for raw in raws {
            self.spec.dimension.validate_vector(raw)?;
        }
        let encoded = raws
            .iter()
            .map(|raw| EncodedVector::from_raw(raw))
            .collect::<VectorResult<Vec<_>>>()?;

        let tag = self.model_tag.as_ref().map(ModelTag::as_str);
        let created = Utc::now().timestamp();
        let table = &self.table;
        let store_error = |e: rusqlite::Error| VectorError::store("batch_insert", e);

        let ids = self.db.transaction(store_error, |tx| {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO \"{table}\" (vector, normalized_vector, magnitude, binary_code, model_tag, created)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ))
                .map_err(store_error)?;

            let mut ids = Vec::with_capacity(encoded.len());
            for row in &encoded {
                stmt.execute(params![
                    row.vector_json,
                    row.normalized_json,
                    row.magnitude,
                    row.binary_code,
                    tag,
                    created
                ])
                .map_err(store_error)?;

                let rowid = tx.last_insert_rowid();
                let id = VectorId::new(rowid).ok_or_else(|| {
                    VectorError::InvalidState(format!("store returned non-positive id {rowid}"))
                })?;
                ids.push(id);
            }
            Ok(ids)
        })?;

        debug!(table = %self.table, count = ids.len(), "batch inserted vectors");
        Ok(ids)
    }

    /// Records for `ids`, ordered by id. Missing ids are absent.
    pub fn select(&self, ids: &[VectorId], include_outdated: bool) -> VectorResult<Vec<VectorRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> = ids.iter().map(|id| Value::Integer(id.get())).collect();
        let placeholders = placeholders(1, ids.len());
        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM \"{}\" WHERE id IN ({placeholders})",
            self.table
        );
        if let Some(tag) = self.tag_filter(include_outdated) {
            values.push(Value::Text(tag.as_str().to_string()));
            sql.push_str(&format!(" AND model_tag = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY id ASC");

        self.query_records("select", &sql, values)
    }

    /// Every record passing the tag filter, ordered by id.
    pub fn select_all(&self, include_outdated: bool) -> VectorResult<Vec<VectorRecord>> {
        let mut values = Vec::new();
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM \"{}\"", self.table);
        if let Some(tag) = self.tag_filter(include_outdated) {
            values.push(Value::Text(tag.as_str().to_string()));
            sql.push_str(" WHERE model_tag = ?1");
        }
        sql.push_str(" ORDER BY id ASC");

        self.query_records("select_all", &sql, values)
    }

    /// One record by id, regardless of its model tag.
    pub fn get(&self, id: VectorId) -> VectorResult<Option<VectorRecord>> {
        Ok(self.select(&[id], true)?.into_iter().next())
    }

    /// Deletes `id`. Returns whether a row was removed; a missing id is not
    /// an error.
    pub fn delete(&self, id: VectorId) -> VectorResult<bool> {
        let removed = self.db.with_connection("delete", |conn| {
            conn.execute(
                &format!("DELETE FROM \"{}\" WHERE id = ?1", self.table),
                params![id],
            )
        })?;

        debug!(table = %self.table, %id, removed, "deleted vector");
        Ok(removed > 0)
    }

    /// Number of records, all model tags included.
    pub fn count(&self) -> VectorResult<usize> {
        let count: i64 = self.db.with_connection("count", |conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |row| {
                row.get(0)
            })
        })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Two-phase search for the `n` records most similar to `query`.
    ///
    /// Returns at most `n` hits, best first, ties broken by ascending id.
    pub fn search(
        &self,
        query: &[f32],
        n: usize,
        include_outdated: bool,
    ) -> VectorResult<Vec<SearchHit>> {
        self.spec.dimension.validate_vector(query)?;
        if n == 0 {
            warn!(table = %self.table, "search called with n = 0");
            return Ok(Vec::new());
        }

        let normalized = vector::normalize_default(query);
        let code = BinaryCode::encode(&normalized);

        let candidates = self.coarse_filter(&code, n, include_outdated)?;
        if candidates.is_empty() {
            debug!(table = %self.table, "search found no candidates");
            return Ok(Vec::new());
        }

        let hits = match self.scoring {
            ScoringSite::Database => self.rerank_in_database(&candidates, &normalized, n)?,
            ScoringSite::Client => self.rerank_in_client(&candidates, &normalized, n)?,
        };

        debug!(
            table = %self.table,
            candidates = candidates.len(),
            hits = hits.len(),
            scoring = ?self.scoring,
            "search complete"
        );
        Ok(hits)
    }

    /// Cosine similarity of two vectors of this category's dimension,
    /// evaluated at the same site as the search rerank.
    pub fn cosine(&self, v1: &[f32], v2: &[f32]) -> VectorResult<f32> {
        self.spec.dimension.validate_vector(v1)?;
        self.spec.dimension.validate_vector(v2)?;

        if vector::magnitude_f64(v1) == 0.0 || vector::magnitude_f64(v2) == 0.0 {
            return Err(VectorError::ZeroMagnitude);
        }
        let n1 = vector::normalize_default(v1);
        let n2 = vector::normalize_default(v2);

        match self.scoring {
            ScoringSite::Client => vector::dot(&n1, &n2),
            ScoringSite::Database => {
                let (a, b) = (to_json(&n1)?, to_json(&n2)?);
                let similarity: f64 = self.db.with_connection("cosine", |conn| {
                    conn.query_row("SELECT COSIM(?1, ?2)", params![a, b], |row| row.get(0))
                })?;
                Ok(similarity as f32)
            }
        }
    }

    fn tag_filter(&self, include_outdated: bool) -> Option<&ModelTag> {
        if include_outdated {
            None
        } else {
            self.model_tag.as_ref()
        }
    }

    fn coarse_filter(
        &self,
        code: &BinaryCode,
        n: usize,
        include_outdated: bool,
    ) -> VectorResult<Vec<VectorId>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut values = vec![Value::Blob(code.as_bytes().to_vec()), Value::Integer(limit)];
        let mut sql = format!(
            "SELECT id, HAMMING_DISTANCE(binary_code, ?1) AS hd FROM \"{}\"",
            self.table
        );
        if let Some(tag) = self.tag_filter(include_outdated) {
            values.push(Value::Text(tag.as_str().to_string()));
            sql.push_str(" WHERE model_tag = ?3");
        }
        sql.push_str(" ORDER BY hd ASC, id ASC LIMIT ?2");

        self.db.with_connection("search", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, VectorId>(0))?;
            rows.collect()
        })
    }

    fn rerank_in_database(
        &self,
        candidates: &[VectorId],
        normalized_query: &[f32],
        n: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        let mut values = vec![Value::Text(to_json(normalized_query)?)];
        values.extend(candidates.iter().map(|id| Value::Integer(id.get())));
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        values.push(Value::Integer(limit));

        let sql = format!(
            "SELECT id, vector, normalized_vector, magnitude, COSIM(normalized_vector, ?1) AS similarity
             FROM \"{}\"
             WHERE id IN ({})
             ORDER BY similarity DESC, id ASC
             LIMIT ?{}",
            self.table,
            placeholders(2, candidates.len()),
            values.len()
        );

        self.db.with_connection("search", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                let similarity: f64 = row.get(4)?;
                SearchHit::from_row(row, similarity as f32)
            })?;
            rows.collect()
        })
    }

    fn rerank_in_client(
        &self,
        candidates: &[VectorId],
        normalized_query: &[f32],
        n: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        let values: Vec<Value> = candidates.iter().map(|id| Value::Integer(id.get())).collect();
        let sql = format!(
            "SELECT id, vector, normalized_vector, magnitude FROM \"{}\" WHERE id IN ({})",
            self.table,
            placeholders(1, candidates.len())
        );

        let rows: Vec<SearchHit> = self.db.with_connection("search", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| SearchHit::from_row(row, 0.0))?;
            rows.collect()
        })?;

        let mut hits = rows
            .into_iter()
            .map(|mut hit| {
                hit.similarity = vector::dot(&hit.normalized_vector, normalized_query)?;
                Ok(hit)
            })
            .collect::<VectorResult<Vec<_>>>()?;

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(n);
        Ok(hits)
    }

    fn query_records(
        &self,
        operation: &str,
        sql: &str,
        values: Vec<Value>,
    ) -> VectorResult<Vec<VectorRecord>> {
        self.db.with_connection(operation, |conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params_from_iter(values), VectorRecord::from_row)?;
            rows.collect()
        })
    }
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
