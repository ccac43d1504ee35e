use std::collections::BTreeSet;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use tracing::{debug, info};

use super::{STORE_NAME, schema};
use crate::{
    config::RelationalConfig,
    dataset::Dataset,
    errors::{FederationError, FederationResult, collect_rows},
    fault_injection::{FaultInjector, FaultPoint},
    model::{
        ContainerCount, EntityClass, Exclusions, FacultyAffiliation, FacultyScore, KeywordCount,
        MutationAction, MutationReceipt, TOP_LIMIT, TOP_UNIVERSITIES_LIMIT, UniversityCount,
        UniversityInfo, rank_scores,
    },
    pool::{ConnectionPool, numbered_placeholders},
    transaction::TransactionGuard,
};

/// Largest keyword set accepted by [`RelationalStore::query_faculty_by_keywords`].
pub const MAX_KEYWORD_SET: usize = 512;

pub struct RelationalStore {
    pool: ConnectionPool,
    min_keyword_relevance: f64,
    mutation_lock: Mutex<()>,
    faults: FaultInjector,
}

impl RelationalStore {
    pub fn open(config: RelationalConfig) -> FederationResult<Self> {
        let pool = ConnectionPool::new(STORE_NAME, config.store)?;
        {
            let conn = pool.acquire_for_setup()?;
            schema::ensure_schema(&conn)?;
        }
        info!(store = STORE_NAME, "store opened");
        Ok(Self {
            pool,
            min_keyword_relevance: config.min_keyword_relevance,
            mutation_lock: Mutex::new(()),
            faults: FaultInjector::new(),
        })
    }

    pub fn open_in_memory() -> FederationResult<Self> {
        Self::open(RelationalConfig::default())
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn close(&self) {
        self.pool.close();
    }

    /// Replaces the store content with `dataset` in one transaction.
    pub fn load_dataset(&self, dataset: &Dataset) -> FederationResult<()> {
        dataset.validate()?;
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire_for_setup()?;
        TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| insert_dataset(tx, dataset))?;
        info!(
            store = STORE_NAME,
            universities = dataset.universities.len(),
            faculty = dataset.faculty.len(),
            publications = dataset.publications.len(),
            "dataset loaded"
        );
        Ok(())
    }

    /// Top keywords over publications from `year` onwards: number of distinct
    /// publications per keyword, highest first, ties by keyword name.
    pub fn query_trending_keywords(&self, year: i32) -> FederationResult<Vec<KeywordCount>> {
        self.query_trending_keywords_excluding(year, &Exclusions::none())
    }

    /// [`Self::query_trending_keywords`] without the keywords soft-deleted in
    /// the graph store.
    pub fn query_trending_keywords_excluding(
        &self,
        year: i32,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<KeywordCount>> {
        let excluded = &exclusions.keywords;
        let filter = if excluded.is_empty() {
            String::new()
        } else {
            format!(
                "AND k.name NOT IN ({})",
                numbered_placeholders(3, excluded.len())
            )
        };
        let sql = format!(
            "SELECT k.name, COUNT(DISTINCT pk.publication_id) AS cnt
             FROM publication_keyword pk
             JOIN keyword k ON k.id = pk.keyword_id
             WHERE pk.year >= ?1 {filter}
             GROUP BY pk.keyword_id
             ORDER BY cnt DESC, k.name ASC
             LIMIT ?2"
        );
        let mut bound: Vec<Value> = vec![
            Value::Integer(year.into()),
            Value::Integer(TOP_LIMIT as i64),
        ];
        bound.extend(excluded.iter().map(|name| Value::Text(name.clone())));

        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                Ok(KeywordCount {
                    keyword: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(FederationError::from_read)?;
        let result = collect_rows(rows)?;
        debug!(
            store = STORE_NAME,
            query = "trending_keywords",
            year,
            excluded = excluded.len(),
            rows = result.len()
        );
        Ok(result)
    }

    /// Active faculty working on any keyword in `keywords` (relevance at or
    /// above the configured threshold), ordered by name.
    ///
    /// Keywords are only ever bound as statement parameters; the statement
    /// text depends on nothing but the number of distinct keywords.
    pub fn query_faculty_by_keywords<S: AsRef<str>>(
        &self,
        keywords: &[S],
    ) -> FederationResult<Vec<FacultyAffiliation>> {
        self.query_faculty_by_keywords_excluding(keywords, &Exclusions::none())
    }

    /// [`Self::query_faculty_by_keywords`] ignoring keywords soft-deleted in
    /// the graph store. A set made up only of deleted keywords matches nobody.
    pub fn query_faculty_by_keywords_excluding<S: AsRef<str>>(
        &self,
        keywords: &[S],
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<FacultyAffiliation>> {
        let mut distinct: BTreeSet<&str> = keywords.iter().map(|k| k.as_ref()).collect();
        if distinct.is_empty() {
            return Err(FederationError::query("keyword set must not be empty"));
        }
        if distinct.len() > MAX_KEYWORD_SET {
            return Err(FederationError::query(format!(
                "keyword set holds {} keywords, at most {MAX_KEYWORD_SET} allowed",
                distinct.len()
            )));
        }
        distinct.retain(|keyword| !exclusions.excludes_keyword(keyword));
        if distinct.is_empty() {
            debug!(store = STORE_NAME, query = "faculty_by_keywords", "every keyword is deleted");
            return Ok(Vec::new());
        }
        let placeholders = numbered_placeholders(2, distinct.len());
        let sql = format!(
            "SELECT DISTINCT f.id, f.name, u.name
             FROM faculty f
             JOIN university u ON u.id = f.university_id
             JOIN faculty_keyword fk ON fk.faculty_id = f.id
             JOIN keyword k ON k.id = fk.keyword_id
             WHERE f.is_active = 1
               AND fk.score >= ?1
               AND k.name IN ({placeholders})
             ORDER BY f.name ASC, f.id ASC"
        );
        let mut bound: Vec<Value> = Vec::with_capacity(distinct.len() + 1);
        bound.push(Value::Real(self.min_keyword_relevance));
        bound.extend(distinct.iter().map(|k| Value::Text((*k).to_string())));

        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                Ok(FacultyAffiliation {
                    faculty_id: row.get(0)?,
                    faculty: row.get(1)?,
                    affiliation: row.get(2)?,
                })
            })
            .map_err(FederationError::from_read)?;
        let result = collect_rows(rows)?;
        debug!(
            store = STORE_NAME,
            query = "faculty_by_keywords",
            keywords = distinct.len(),
            rows = result.len()
        );
        Ok(result)
    }

    /// Soft-deletes one active faculty member and records it for restore.
    pub fn delete_faculty(&self, faculty_id: i64) -> FederationResult<MutationReceipt> {
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire()?;
        let receipt = TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| {
            let row: Option<(String, i64, bool)> = tx
                .query_row(
                    "SELECT name, university_id, is_active FROM faculty WHERE id = ?1",
                    params![faculty_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
                )
                .optional()
                .map_err(FederationError::from_write)?;
            let Some((name, university_id, active)) = row else {
                return Err(FederationError::not_found(format!("faculty {faculty_id}")));
            };
            if !active {
                return Err(FederationError::not_found(format!(
                    "faculty {faculty_id} is already deleted"
                )));
            }
            tx.execute(
                "UPDATE faculty SET is_active = 0 WHERE id = ?1",
                params![faculty_id],
            )
            .map_err(FederationError::from_write)?;
            adjust_active_faculty(tx, university_id, -1)?;
            tx.execute(
                "INSERT INTO faculty_undo(faculty_id) VALUES (?1)",
                params![faculty_id],
            )
            .map_err(FederationError::from_write)?;
            self.faults.check(FaultPoint::FacultyDeleteBeforeCommit)?;
            Ok(MutationReceipt {
                entity: EntityClass::Faculty,
                id: faculty_id,
                name,
                action: MutationAction::Deleted,
                edges: 0,
            })
        })?;
        info!(store = STORE_NAME, faculty_id, "faculty deleted");
        Ok(receipt)
    }

    /// Re-activates the most recently deleted faculty member. An empty undo
    /// log is reported as `NotFound` and changes nothing.
    pub fn restore_faculty(&self) -> FederationResult<MutationReceipt> {
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire()?;
        let receipt = TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| {
            let entry: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT seq, faculty_id FROM faculty_undo ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(FederationError::from_write)?;
            let Some((seq, faculty_id)) = entry else {
                return Err(FederationError::not_found("nothing to restore"));
            };
            let (name, university_id): (String, i64) = tx
                .query_row(
                    "SELECT name, university_id FROM faculty WHERE id = ?1 AND is_active = 0",
                    params![faculty_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(FederationError::from_write)?
                .ok_or_else(|| {
                    FederationError::transaction(format!(
                        "undo entry {seq} points at faculty {faculty_id}, which is not deleted"
                    ))
                })?;
            tx.execute(
                "UPDATE faculty SET is_active = 1 WHERE id = ?1",
                params![faculty_id],
            )
            .map_err(FederationError::from_write)?;
            adjust_active_faculty(tx, university_id, 1)?;
            tx.execute("DELETE FROM faculty_undo WHERE seq = ?1", params![seq])
                .map_err(FederationError::from_write)?;
            self.faults.check(FaultPoint::FacultyRestoreBeforeCommit)?;
            Ok(MutationReceipt {
                entity: EntityClass::Faculty,
                id: faculty_id,
                name,
                action: MutationAction::Restored,
                edges: 0,
            })
        })?;
        info!(store = STORE_NAME, faculty_id = receipt.id, "faculty restored");
        Ok(receipt)
    }

    pub fn count_active_faculty(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM faculty WHERE is_active = 1",
            [],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
    }

    /// Faculty currently soft-deleted, by id.
    pub fn inactive_faculty_ids(&self) -> FederationResult<Vec<i64>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached("SELECT id FROM faculty WHERE is_active = 0 ORDER BY id")
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    /// Number of deletes that can still be undone.
    pub fn pending_restores(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row("SELECT COUNT(*) FROM faculty_undo", [], |row| row.get(0))
            .map_err(FederationError::from_read)
    }

    /// Highest KRC among the active faculty of `affiliation` for `keyword`.
    pub fn query_top_krc_faculty(
        &self,
        keyword: &str,
        affiliation: &str,
    ) -> FederationResult<Vec<FacultyScore>> {
        self.query_top_krc_faculty_excluding(keyword, affiliation, &Exclusions::none())
    }

    /// [`Self::query_top_krc_faculty`]; a keyword soft-deleted in the graph
    /// store ranks nobody.
    ///
    /// Each faculty member's terms are summed in publication id order, the
    /// order the document store accumulates them in, so both stores agree on
    /// the unrounded total.
    pub fn query_top_krc_faculty_excluding(
        &self,
        keyword: &str,
        affiliation: &str,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<FacultyScore>> {
        if exclusions.excludes_keyword(keyword) {
            debug!(store = STORE_NAME, query = "top_krc_faculty", "keyword is deleted");
            return Ok(Vec::new());
        }
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT f.id, f.name, pk.score * p.num_citations
                 FROM faculty f
                 JOIN university u ON u.id = f.university_id
                 JOIN faculty_publication fp ON fp.faculty_id = f.id
                 JOIN publication p ON p.id = fp.publication_id
                 JOIN publication_keyword pk ON pk.publication_id = p.id
                 JOIN keyword k ON k.id = pk.keyword_id
                 WHERE f.is_active = 1 AND k.name = ?1 AND u.name = ?2
                 ORDER BY f.id, p.id",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![keyword, affiliation], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
            })
            .map_err(FederationError::from_read)?;
        let mut totals: Vec<FacultyScore> = Vec::new();
        for (faculty_id, faculty, term) in collect_rows(rows)? {
            match totals.last_mut() {
                Some(last) if last.faculty_id == faculty_id => last.krc += term,
                _ => totals.push(FacultyScore {
                    faculty_id,
                    faculty,
                    krc: term,
                }),
            }
        }
        let result = rank_scores(totals);
        debug!(store = STORE_NAME, query = "top_krc_faculty", rows = result.len());
        Ok(result)
    }

    /// Universities with the most active faculty whose keywords contain
    /// `keyword` as a substring.
    pub fn query_top_universities_for_keyword(
        &self,
        keyword: &str,
    ) -> FederationResult<Vec<UniversityCount>> {
        self.query_top_universities_for_keyword_excluding(keyword, &Exclusions::none())
    }

    /// [`Self::query_top_universities_for_keyword`] without matches on
    /// keywords soft-deleted in the graph store.
    pub fn query_top_universities_for_keyword_excluding(
        &self,
        keyword: &str,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<UniversityCount>> {
        if keyword.trim().is_empty() {
            return Err(FederationError::query("keyword must not be empty"));
        }
        let excluded = &exclusions.keywords;
        let filter = if excluded.is_empty() {
            String::new()
        } else {
            format!(
                "AND k.name NOT IN ({})",
                numbered_placeholders(3, excluded.len())
            )
        };
        let sql = format!(
            "SELECT u.name, COUNT(DISTINCT f.id) AS faculty_count
             FROM university u
             JOIN faculty f ON f.university_id = u.id
             JOIN faculty_keyword fk ON fk.faculty_id = f.id
             JOIN keyword k ON k.id = fk.keyword_id
             WHERE f.is_active = 1 AND k.name LIKE ?1 ESCAPE '\\' {filter}
             GROUP BY u.id, u.name
             ORDER BY faculty_count DESC, u.name ASC
             LIMIT ?2"
        );
        let mut bound: Vec<Value> = vec![
            Value::Text(format!("%{}%", escape_like(keyword))),
            Value::Integer(TOP_UNIVERSITIES_LIMIT as i64),
        ];
        bound.extend(excluded.iter().map(|name| Value::Text(name.clone())));

        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                Ok(UniversityCount {
                    university: row.get(0)?,
                    faculty_count: row.get(1)?,
                })
            })
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn query_university_info(&self, name: &str) -> FederationResult<UniversityInfo> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT u.id, u.name, u.photo_url,
                    (SELECT COUNT(*) FROM faculty f
                     WHERE f.university_id = u.id AND f.is_active = 1)
             FROM university u
             WHERE u.name = ?1",
            params![name],
            |row| {
                Ok(UniversityInfo {
                    university_id: row.get(0)?,
                    university: row.get(1)?,
                    photo_url: row.get(2)?,
                    active_faculty: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(FederationError::from_read)?
        .ok_or_else(|| FederationError::not_found(format!("university {name:?}")))
    }

    pub fn list_keywords(&self) -> FederationResult<Vec<String>> {
        self.list_names("SELECT name FROM keyword ORDER BY name")
    }

    pub fn list_universities(&self) -> FederationResult<Vec<String>> {
        self.list_names("SELECT name FROM university ORDER BY name")
    }

    /// Row count of one table. The name must belong to this store's schema.
    pub fn count_rows(&self, table: &str) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        let tables = schema::table_names(&conn)?;
        if !tables.iter().any(|name| name == table) {
            return Err(FederationError::not_found(format!("table {table:?}")));
        }
        count_table(&conn, table)
    }

    pub fn inventory(&self) -> FederationResult<Vec<ContainerCount>> {
        let conn = self.pool.acquire()?;
        let mut result = Vec::new();
        for table in schema::table_names(&conn)? {
            let count = count_table(&conn, &table)?;
            result.push(ContainerCount {
                container: table,
                count,
            });
        }
        Ok(result)
    }

    /// Universities whose materialized active-faculty count differs from the
    /// live count: `(university_id, cached, live)`.
    pub fn stats_drift(&self) -> FederationResult<Vec<(i64, i64, i64)>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, cached, live FROM (
                     SELECT u.id AS id,
                            COALESCE(s.active_faculty, 0) AS cached,
                            (SELECT COUNT(*) FROM faculty f
                             WHERE f.university_id = u.id AND f.is_active = 1) AS live
                     FROM university u
                     LEFT JOIN university_stats s ON s.university_id = u.id
                 )
                 WHERE cached != live
                 ORDER BY id",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    /// Undo entries that point at a faculty member who is currently active.
    pub fn stale_undo_entries(&self) -> FederationResult<Vec<i64>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT u.seq FROM faculty_undo u
                 JOIN faculty f ON f.id = u.faculty_id
                 WHERE f.is_active = 1
                 ORDER BY u.seq",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    fn list_names(&self, sql: &str) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    fn lock_mutations(&self) -> FederationResult<MutexGuard<'_, ()>> {
        let timeout = self.pool.config().query_timeout;
        self.mutation_lock.try_lock_for(timeout).ok_or_else(|| {
            FederationError::timeout(format!(
                "another {STORE_NAME} mutation held the lock for {timeout:?}"
            ))
        })
    }
}

fn insert_dataset(tx: &Connection, dataset: &Dataset) -> FederationResult<()> {
    tx.execute_batch(
        "DELETE FROM faculty_undo;
         DELETE FROM university_stats;
         DELETE FROM publication_keyword;
         DELETE FROM faculty_publication;
         DELETE FROM faculty_keyword;
         DELETE FROM publication;
         DELETE FROM faculty;
         DELETE FROM keyword;
         DELETE FROM university;",
    )
    .map_err(FederationError::from_write)?;

    let mut stmt = tx
        .prepare_cached("INSERT INTO university(id, name, photo_url) VALUES (?1, ?2, ?3)")
        .map_err(FederationError::from_write)?;
    for university in &dataset.universities {
        stmt.execute(params![
            university.id,
            university.name,
            university.photo_url.as_deref()
        ])
        .map_err(FederationError::from_write)?;
    }

    let mut stmt = tx
        .prepare_cached("INSERT INTO keyword(id, name) VALUES (?1, ?2)")
        .map_err(FederationError::from_write)?;
    for keyword in &dataset.keywords {
        stmt.execute(params![keyword.id, keyword.name])
            .map_err(FederationError::from_write)?;
    }

    let mut pub_stmt = tx
        .prepare_cached(
            "INSERT INTO publication(id, title, year, num_citations) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(FederationError::from_write)?;
    let mut pub_kw_stmt = tx
        .prepare_cached(
            "INSERT INTO publication_keyword(publication_id, keyword_id, year, score)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(FederationError::from_write)?;
    for publication in &dataset.publications {
        pub_stmt
            .execute(params![
                publication.id,
                publication.title,
                publication.year,
                publication.num_citations
            ])
            .map_err(FederationError::from_write)?;
        for entry in &publication.keywords {
            pub_kw_stmt
                .execute(params![
                    publication.id,
                    entry.keyword_id,
                    publication.year,
                    entry.score
                ])
                .map_err(FederationError::from_write)?;
        }
    }

    let mut faculty_stmt = tx
        .prepare_cached(
            "INSERT INTO faculty(id, name, university_id, is_active) VALUES (?1, ?2, ?3, 1)",
        )
        .map_err(FederationError::from_write)?;
    let mut fk_stmt = tx
        .prepare_cached(
            "INSERT INTO faculty_keyword(faculty_id, keyword_id, score) VALUES (?1, ?2, ?3)",
        )
        .map_err(FederationError::from_write)?;
    let mut fp_stmt = tx
        .prepare_cached(
            "INSERT INTO faculty_publication(faculty_id, publication_id) VALUES (?1, ?2)",
        )
        .map_err(FederationError::from_write)?;
    for faculty in &dataset.faculty {
        faculty_stmt
            .execute(params![faculty.id, faculty.name, faculty.university_id])
            .map_err(FederationError::from_write)?;
        for entry in &faculty.keywords {
            fk_stmt
                .execute(params![faculty.id, entry.keyword_id, entry.score])
                .map_err(FederationError::from_write)?;
        }
        for publication in &faculty.publications {
            fp_stmt
                .execute(params![faculty.id, publication])
                .map_err(FederationError::from_write)?;
        }
    }

    tx.execute(
        "INSERT INTO university_stats(university_id, active_faculty)
         SELECT u.id, COUNT(f.id)
         FROM university u
         LEFT JOIN faculty f ON f.university_id = u.id AND f.is_active = 1
         GROUP BY u.id",
        [],
    )
    .map_err(FederationError::from_write)?;
    Ok(())
}

fn adjust_active_faculty(tx: &Connection, university_id: i64, delta: i64) -> FederationResult<()> {
    let updated = tx
        .execute(
            "UPDATE university_stats SET active_faculty = active_faculty + ?2
             WHERE university_id = ?1",
            params![university_id, delta],
        )
        .map_err(FederationError::from_write)?;
    if updated != 1 {
        return Err(FederationError::transaction(format!(
            "no stats row for university {university_id}"
        )));
    }
    Ok(())
}

/// `table` must come from [`schema::table_names`]; it is quoted, never taken
/// from a caller directly.
fn count_table(conn: &Connection, table: &str) -> FederationResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
    conn.query_row(&sql, [], |row| row.get(0))
        .map_err(FederationError::from_read)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
