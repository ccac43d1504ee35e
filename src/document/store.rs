use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{
    FACULTY, PUBLICATIONS, STORE_NAME,
    pipeline::{self, Accumulator, Expr, Filter, Pipeline, SortKey, Stage},
    schema::{self, INDEXES, IndexKind},
};
use crate::{
    config::StoreConfig,
    dataset::Dataset,
    errors::{FederationError, FederationResult, collect_rows},
    model::{ContainerCount, Exclusions, FacultyScore, KeywordCount, TOP_LIMIT, rank_scores},
    pool::ConnectionPool,
    transaction::TransactionGuard,
};

/// Read-only view of the academic data as denormalized documents. The only
/// write path is [`DocumentStore::load_dataset`].
pub struct DocumentStore {
    pool: ConnectionPool,
    load_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn open(config: StoreConfig) -> FederationResult<Self> {
        let pool = ConnectionPool::new(STORE_NAME, config)?;
        {
            let conn = pool.acquire_for_setup()?;
            schema::ensure_schema(&conn)?;
        }
        info!(store = STORE_NAME, "store opened");
        Ok(Self {
            pool,
            load_lock: Mutex::new(()),
        })
    }

    pub fn open_in_memory() -> FederationResult<Self> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn close(&self) {
        self.pool.close();
    }

    pub fn load_dataset(&self, dataset: &Dataset) -> FederationResult<()> {
        dataset.validate()?;
        let _serial = self.load_lock.lock();
        let conn = self.pool.acquire_for_setup()?;
        let documents = TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| {
            tx.execute_batch("DELETE FROM document_index_entries; DELETE FROM documents;")
                .map_err(FederationError::from_write)?;
            let mut written = 0usize;
            for (collection, docs) in build_documents(dataset) {
                for (doc_id, body) in docs {
                    insert_document(tx, collection, doc_id, &body)?;
                    written += 1;
                }
            }
            Ok(written)
        })?;
        info!(store = STORE_NAME, documents, "dataset loaded");
        Ok(())
    }

    /// Runs an arbitrary pipeline under this store's call deadline.
    pub fn aggregate(&self, pipeline: &Pipeline) -> FederationResult<Vec<Value>> {
        let conn = self.pool.acquire()?;
        pipeline::run_pipeline(&conn, pipeline)
    }

    /// Same contract as the relational trending query, computed by unwinding
    /// the keyword array of each publication from `year` onwards.
    pub fn query_trending_keywords_doc(&self, year: i32) -> FederationResult<Vec<KeywordCount>> {
        self.query_trending_keywords_doc_excluding(year, &Exclusions::none())
    }

    /// [`Self::query_trending_keywords_doc`] without the keywords soft-deleted
    /// in the graph store. They are dropped before ranking, so the limit is
    /// filled from the remaining keywords.
    pub fn query_trending_keywords_doc_excluding(
        &self,
        year: i32,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<KeywordCount>> {
        let pipeline = Pipeline::new(PUBLICATIONS)
            .stage(Stage::Match(Filter::gte("year", year)))
            .stage(Stage::Unwind("keywords".into()))
            .stage(Stage::Match(Filter::not_in(
                "keywords.name",
                exclusions.keywords.iter().map(String::as_str),
            )))
            .stage(Stage::Group {
                keys: vec![("keyword".into(), "keywords.name".into())],
                accumulator: Accumulator::Count,
                output: "count".into(),
            })
            .stage(Stage::Sort(vec![SortKey::desc("count"), SortKey::asc("keyword")]))
            .stage(Stage::Limit(TOP_LIMIT));
        let docs = self.aggregate(&pipeline)?;
        let mut result = Vec::with_capacity(docs.len());
        for doc in &docs {
            result.push(KeywordCount {
                keyword: string_field(doc, "keyword")?,
                count: int_field(doc, "count")?,
            });
        }
        debug!(
            store = STORE_NAME,
            query = "trending_keywords",
            year,
            excluded = exclusions.keywords.len(),
            rows = result.len()
        );
        Ok(result)
    }

    /// Faculty of `affiliation` ranked by KRC for `keyword`.
    pub fn query_top_krc_faculty(
        &self,
        keyword: &str,
        affiliation: &str,
    ) -> FederationResult<Vec<FacultyScore>> {
        self.query_top_krc_faculty_excluding(keyword, affiliation, &Exclusions::none())
    }

    /// [`Self::query_top_krc_faculty`] honouring soft deletes made elsewhere:
    /// faculty deleted relationally are not ranked, and a keyword deleted in
    /// the graph ranks nobody.
    pub fn query_top_krc_faculty_excluding(
        &self,
        keyword: &str,
        affiliation: &str,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<FacultyScore>> {
        let pipeline = Pipeline::new(FACULTY)
            .stage(Stage::Match(Filter::And(vec![
                Filter::eq("affiliation.name", affiliation),
                Filter::not_in("id", exclusions.faculty_ids.iter().copied()),
            ])))
            .stage(Stage::Lookup {
                from: PUBLICATIONS.into(),
                local_field: "publications".into(),
                as_field: "pubs".into(),
            })
            .stage(Stage::Unwind("pubs".into()))
            .stage(Stage::Unwind("pubs.keywords".into()))
            .stage(Stage::Match(Filter::And(vec![
                Filter::eq("pubs.keywords.name", keyword),
                Filter::not_in(
                    "pubs.keywords.name",
                    exclusions.keywords.iter().map(String::as_str),
                ),
            ])))
            .stage(Stage::Group {
                keys: vec![
                    ("facultyId".into(), "id".into()),
                    ("faculty".into(), "name".into()),
                ],
                accumulator: Accumulator::Sum(Expr::Multiply(vec![
                    Expr::field("pubs.keywords.score"),
                    Expr::field("pubs.numCitations"),
                ])),
                output: "krc".into(),
            })
            .stage(Stage::Round {
                field: "krc".into(),
                places: 2,
            })
            .stage(Stage::Sort(vec![
                SortKey::desc("krc"),
                SortKey::asc("faculty"),
                SortKey::asc("facultyId"),
            ]))
            .stage(Stage::Limit(TOP_LIMIT));
        let docs = self.aggregate(&pipeline)?;
        let mut rows = Vec::with_capacity(docs.len());
        for doc in &docs {
            rows.push(FacultyScore {
                faculty_id: int_field(doc, "facultyId")?,
                faculty: string_field(doc, "faculty")?,
                krc: doc
                    .get("krc")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| FederationError::query("krc missing from result"))?,
            });
        }
        let result = rank_scores(rows);
        debug!(store = STORE_NAME, query = "top_krc_faculty", rows = result.len());
        Ok(result)
    }

    pub fn distinct_affiliations(&self) -> FederationResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {expr} FROM documents
             WHERE collection = ?1 AND {expr} IS NOT NULL
             ORDER BY 1",
            expr = schema::json_expr("affiliation.name")?
        );
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![FACULTY], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn distinct_keywords(&self) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT DISTINCT value FROM document_index_entries
                 WHERE collection = ?1 AND path = 'keywords.name'
                 ORDER BY value",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![PUBLICATIONS], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn collections(&self) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached("SELECT DISTINCT collection FROM documents ORDER BY collection")
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn count_documents(&self, collection: &str) -> FederationResult<i64> {
        if !self.collections()?.iter().any(|name| name == collection) {
            return Err(FederationError::not_found(format!(
                "collection {collection:?}"
            )));
        }
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
    }

    pub fn inventory(&self) -> FederationResult<Vec<ContainerCount>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT collection, COUNT(*) FROM documents
                 GROUP BY collection ORDER BY collection",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ContainerCount {
                    container: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }
}

fn build_documents(dataset: &Dataset) -> Vec<(&'static str, Vec<(i64, Value)>)> {
    let keyword_names = dataset.keyword_names();
    let keyword_list = |scores: &[crate::dataset::KeywordScore]| -> Vec<Value> {
        scores
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.keyword_id,
                    "name": keyword_names.get(&entry.keyword_id).copied().unwrap_or_default(),
                    "score": entry.score,
                })
            })
            .collect()
    };

    let publications = dataset
        .publications
        .iter()
        .map(|p| {
            let body = json!({
                "id": p.id,
                "title": p.title,
                "year": p.year,
                "numCitations": p.num_citations,
                "keywords": keyword_list(&p.keywords),
            });
            (p.id, body)
        })
        .collect();

    let faculty = dataset
        .faculty
        .iter()
        .map(|f| {
            let affiliation = dataset.university(f.university_id).map(|u| {
                json!({
                    "id": u.id,
                    "name": u.name,
                    "photoUrl": u.photo_url,
                })
            });
            // Lookups and KRC sums follow publication id order.
            let mut publication_ids = f.publications.clone();
            publication_ids.sort_unstable();
            publication_ids.dedup();
            let body = json!({
                "id": f.id,
                "name": f.name,
                "affiliation": affiliation,
                "publications": publication_ids,
                "keywords": keyword_list(&f.keywords),
            });
            (f.id, body)
        })
        .collect();

    vec![(PUBLICATIONS, publications), (FACULTY, faculty)]
}

fn insert_document(
    tx: &Connection,
    collection: &str,
    doc_id: i64,
    body: &Value,
) -> FederationResult<()> {
    let text = serde_json::to_string(body).map_err(|e| FederationError::query(e.to_string()))?;
    tx.prepare_cached("INSERT INTO documents(collection, doc_id, body) VALUES (?1, ?2, ?3)")
        .and_then(|mut stmt| stmt.execute(params![collection, doc_id, text]))
        .map_err(FederationError::from_write)?;
    for spec in INDEXES
        .iter()
        .filter(|s| s.collection == collection && s.kind == IndexKind::Multikey)
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT OR IGNORE INTO document_index_entries(collection, path, value, doc_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(FederationError::from_write)?;
        for value in pipeline::values_at(body, spec.path) {
            if let Some(text) = value.as_str() {
                stmt.execute(params![collection, spec.path, text, doc_id])
                    .map_err(FederationError::from_write)?;
            }
        }
    }
    Ok(())
}

fn string_field(doc: &Value, field: &str) -> FederationResult<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FederationError::query(format!("{field} missing from result")))
}

fn int_field(doc: &Value, field: &str) -> FederationResult<i64> {
    doc.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| FederationError::query(format!("{field} missing from result")))
}
