use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use serde_json::json;
use tracing::{debug, info};

use super::{
    STORE_NAME, schema,
    types::{
        EdgeType, GraphEdge, GraphEntity, NodeKind, row_to_edge, row_to_entity, validate_edge,
        validate_entity,
    },
};
use crate::{
    config::StoreConfig,
    dataset::Dataset,
    errors::{FederationError, FederationResult, collect_rows},
    fault_injection::{FaultInjector, FaultPoint},
    model::{
        Collaborator, ContainerCount, EntityClass, Exclusions, MutationAction, MutationReceipt,
        TOP_LIMIT, UniversityKeyword,
    },
    pool::{ConnectionPool, numbered_placeholders},
    transaction::TransactionGuard,
};

pub struct GraphStore {
    pool: ConnectionPool,
    mutation_lock: Mutex<()>,
    faults: FaultInjector,
}

impl GraphStore {
    pub fn open(config: StoreConfig) -> FederationResult<Self> {
        let pool = ConnectionPool::new(STORE_NAME, config)?;
        {
            let conn = pool.acquire_for_setup()?;
            schema::ensure_schema(&conn)?;
        }
        info!(store = STORE_NAME, "store opened");
        Ok(Self {
            pool,
            mutation_lock: Mutex::new(()),
            faults: FaultInjector::new(),
        })
    }

    pub fn open_in_memory() -> FederationResult<Self> {
        Self::open(StoreConfig::in_memory())
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

    /// Replaces the graph with the nodes and edges derived from `dataset`,
    /// including `COLLABORATES_WITH` edges between universities.
    pub fn load_dataset(&self, dataset: &Dataset) -> FederationResult<()> {
        dataset.validate()?;
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire_for_setup()?;
        let (nodes, edges) =
            TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| insert_dataset(tx, dataset))?;
        info!(store = STORE_NAME, nodes, edges, "dataset loaded");
        Ok(())
    }

    /// Keywords that the most faculty of the university are interested in,
    /// counting active keyword nodes only.
    pub fn query_top_keywords_by_university(
        &self,
        university_id: i64,
    ) -> FederationResult<Vec<UniversityKeyword>> {
        self.query_top_keywords_by_university_excluding(university_id, &Exclusions::none())
    }

    /// [`Self::query_top_keywords_by_university`] without the interests of
    /// faculty soft-deleted in the relational store.
    pub fn query_top_keywords_by_university_excluding(
        &self,
        university_id: i64,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<UniversityKeyword>> {
        let excluded = &exclusions.faculty_ids;
        let filter = if excluded.is_empty() {
            String::new()
        } else {
            format!(
                "AND f.external_id NOT IN ({})",
                numbered_placeholders(3, excluded.len())
            )
        };
        let sql = format!(
            "SELECT k.external_id, k.name, COUNT(DISTINCT f.id) AS cnt
             FROM graph_edges a
             JOIN graph_entities f
               ON f.id = a.from_id AND f.kind = 'FACULTY' AND f.active = 1 {filter}
             JOIN graph_edges i
               ON i.from_id = f.id AND i.edge_type = 'INTERESTED_IN' AND i.active = 1
             JOIN graph_entities k
               ON k.id = i.to_id AND k.kind = 'KEYWORD' AND k.active = 1
             WHERE a.to_id = ?1 AND a.edge_type = 'AFFILIATION_WITH' AND a.active = 1
             GROUP BY k.id
             ORDER BY cnt DESC, k.name ASC
             LIMIT ?2"
        );
        let conn = self.pool.acquire()?;
        let institute = institute_node(&conn, university_id)?;
        let mut bound = vec![Value::Integer(institute), Value::Integer(TOP_LIMIT as i64)];
        bound.extend(excluded.iter().map(|id| Value::Integer(*id)));
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                Ok(UniversityKeyword {
                    keyword_id: row.get(0)?,
                    keyword: row.get(1)?,
                    count: row.get(2)?,
                })
            })
            .map_err(FederationError::from_read)?;
        let result = collect_rows(rows)?;
        debug!(
            store = STORE_NAME,
            query = "top_keywords_by_university",
            university_id,
            excluded = excluded.len(),
            rows = result.len()
        );
        Ok(result)
    }

    /// Universities sharing the most co-authoring faculty pairs with
    /// `university_id`. A university without collaborations yields no rows.
    pub fn query_top_collaborators(
        &self,
        university_id: i64,
    ) -> FederationResult<Vec<Collaborator>> {
        self.query_top_collaborators_excluding(university_id, &Exclusions::none())
    }

    /// [`Self::query_top_collaborators`] without faculty soft-deleted in the
    /// relational store. The stored COLLABORATES_WITH counts cover every
    /// faculty member, so with exclusions the pairs are recounted from the
    /// affiliation and PUBLISH edges.
    pub fn query_top_collaborators_excluding(
        &self,
        university_id: i64,
        exclusions: &Exclusions,
    ) -> FederationResult<Vec<Collaborator>> {
        let excluded = &exclusions.faculty_ids;
        let sql = if excluded.is_empty() {
            "SELECT o.external_id, o.name,
                    CAST(json_extract(e.data, '$.coauthors') AS INTEGER) AS coauthors
             FROM graph_edges e
             JOIN graph_entities o ON o.id = e.to_id
             WHERE e.from_id = ?1 AND e.to_id != ?1
               AND e.edge_type = 'COLLABORATES_WITH' AND e.active = 1
               AND o.kind = 'INSTITUTE' AND o.active = 1
             UNION ALL
             SELECT o.external_id, o.name,
                    CAST(json_extract(e.data, '$.coauthors') AS INTEGER)
             FROM graph_edges e
             JOIN graph_entities o ON o.id = e.from_id
             WHERE e.to_id = ?1 AND e.from_id != ?1
               AND e.edge_type = 'COLLABORATES_WITH' AND e.active = 1
               AND o.kind = 'INSTITUTE' AND o.active = 1
             ORDER BY 3 DESC, 2 ASC
             LIMIT ?2"
                .to_string()
        } else {
            format!(
                "WITH members AS (
                     SELECT f.id AS faculty, a.to_id AS institute
                     FROM graph_entities f
                     JOIN graph_edges a
                       ON a.from_id = f.id AND a.edge_type = 'AFFILIATION_WITH' AND a.active = 1
                     WHERE f.kind = 'FACULTY' AND f.active = 1
                       AND f.external_id NOT IN ({})
                 ),
                 pairs AS (
                     SELECT DISTINCT l.faculty AS near, r.faculty AS far, r.institute AS other
                     FROM members l
                     JOIN graph_edges pl
                       ON pl.from_id = l.faculty AND pl.edge_type = 'PUBLISH' AND pl.active = 1
                     JOIN graph_edges pr
                       ON pr.to_id = pl.to_id AND pr.edge_type = 'PUBLISH' AND pr.active = 1
                     JOIN members r ON r.faculty = pr.from_id
                     WHERE l.institute = ?1 AND r.institute != ?1
                 )
                 SELECT o.external_id, o.name, COUNT(*) AS coauthors
                 FROM pairs
                 JOIN graph_entities o ON o.id = pairs.other
                 WHERE o.kind = 'INSTITUTE' AND o.active = 1
                 GROUP BY o.id
                 ORDER BY coauthors DESC, o.name ASC
                 LIMIT ?2",
                numbered_placeholders(3, excluded.len())
            )
        };
        let conn = self.pool.acquire()?;
        let institute = institute_node(&conn, university_id)?;
        let mut bound = vec![Value::Integer(institute), Value::Integer(TOP_LIMIT as i64)];
        bound.extend(excluded.iter().map(|id| Value::Integer(*id)));
        let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                Ok(Collaborator {
                    university_id: row.get(0)?,
                    university: row.get(1)?,
                    coauthors: row.get(2)?,
                })
            })
            .map_err(FederationError::from_read)?;
        let result = collect_rows(rows)?;
        debug!(
            store = STORE_NAME,
            query = "top_collaborators",
            university_id,
            excluded = excluded.len(),
            rows = result.len()
        );
        Ok(result)
    }

    /// Flags the keyword node and every active edge touching it inactive,
    /// recording the exact edge set for [`GraphStore::restore_keyword`].
    pub fn delete_keyword(&self, keyword_id: i64) -> FederationResult<MutationReceipt> {
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire()?;
        let receipt = TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| {
            let node: Option<(i64, String, bool)> = tx
                .query_row(
                    "SELECT id, name, active FROM graph_entities
                     WHERE kind = ?1 AND external_id = ?2",
                    params![NodeKind::Keyword.as_str(), keyword_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
                )
                .optional()
                .map_err(FederationError::from_write)?;
            let Some((node_id, name, active)) = node else {
                return Err(FederationError::not_found(format!("keyword {keyword_id}")));
            };
            if !active {
                return Err(FederationError::not_found(format!(
                    "keyword {keyword_id} is already deleted"
                )));
            }
            tx.execute(
                "UPDATE graph_entities SET active = 0 WHERE id = ?1",
                params![node_id],
            )
            .map_err(FederationError::from_write)?;
            tx.execute(
                "INSERT INTO graph_undo(entity_id) VALUES (?1)",
                params![node_id],
            )
            .map_err(FederationError::from_write)?;
            let seq = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO graph_undo_edges(seq, edge_id)
                 SELECT ?1, id FROM graph_edges
                 WHERE (from_id = ?2 OR to_id = ?2) AND active = 1",
                params![seq, node_id],
            )
            .map_err(FederationError::from_write)?;
            let edges = tx
                .execute(
                    "UPDATE graph_edges SET active = 0
                     WHERE id IN (SELECT edge_id FROM graph_undo_edges WHERE seq = ?1)",
                    params![seq],
                )
                .map_err(FederationError::from_write)?;
            self.faults.check(FaultPoint::KeywordDeleteBeforeCommit)?;
            Ok(MutationReceipt {
                entity: EntityClass::Keyword,
                id: keyword_id,
                name,
                action: MutationAction::Deleted,
                edges,
            })
        })?;
        info!(
            store = STORE_NAME,
            keyword_id,
            edges = receipt.edges,
            "keyword deleted"
        );
        Ok(receipt)
    }

    /// Re-activates the most recently deleted keyword and exactly the edges
    /// its delete flagged. An empty undo log is reported as `NotFound`.
    pub fn restore_keyword(&self) -> FederationResult<MutationReceipt> {
        let _serial = self.lock_mutations()?;
        let conn = self.pool.acquire()?;
        let receipt = TransactionGuard::begin(&conn, STORE_NAME)?.run(|tx| {
            let entry: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT seq, entity_id FROM graph_undo ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(FederationError::from_write)?;
            let Some((seq, node_id)) = entry else {
                return Err(FederationError::not_found("nothing to restore"));
            };
            let (external_id, name): (i64, String) = tx
                .query_row(
                    "SELECT external_id, name FROM graph_entities WHERE id = ?1 AND active = 0",
                    params![node_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(FederationError::from_write)?
                .ok_or_else(|| {
                    FederationError::transaction(format!(
                        "undo entry {seq} points at node {node_id}, which is not deleted"
                    ))
                })?;
            tx.execute(
                "UPDATE graph_entities SET active = 1 WHERE id = ?1",
                params![node_id],
            )
            .map_err(FederationError::from_write)?;
            let edges = tx
                .execute(
                    "UPDATE graph_edges SET active = 1
                     WHERE id IN (SELECT edge_id FROM graph_undo_edges WHERE seq = ?1)",
                    params![seq],
                )
                .map_err(FederationError::from_write)?;
            tx.execute("DELETE FROM graph_undo_edges WHERE seq = ?1", params![seq])
                .map_err(FederationError::from_write)?;
            tx.execute("DELETE FROM graph_undo WHERE seq = ?1", params![seq])
                .map_err(FederationError::from_write)?;
            self.faults.check(FaultPoint::KeywordRestoreBeforeCommit)?;
            Ok(MutationReceipt {
                entity: EntityClass::Keyword,
                id: external_id,
                name,
                action: MutationAction::Restored,
                edges,
            })
        })?;
        info!(
            store = STORE_NAME,
            keyword_id = receipt.id,
            edges = receipt.edges,
            "keyword restored"
        );
        Ok(receipt)
    }

    pub fn count_active_keywords(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM graph_entities WHERE kind = ?1 AND active = 1",
            params![NodeKind::Keyword.as_str()],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
    }

    /// Names of the keywords currently soft-deleted.
    pub fn inactive_keyword_names(&self) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT name FROM graph_entities WHERE kind = ?1 AND active = 0 ORDER BY name",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![NodeKind::Keyword.as_str()], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn pending_restores(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row("SELECT COUNT(*) FROM graph_undo", [], |row| row.get(0))
            .map_err(FederationError::from_read)
    }

    pub fn node(&self, kind: NodeKind, external_id: i64) -> FederationResult<GraphEntity> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT id, kind, external_id, name, data, active FROM graph_entities
             WHERE kind = ?1 AND external_id = ?2",
            params![kind.as_str(), external_id],
            row_to_entity,
        )
        .optional()
        .map_err(FederationError::from_read)?
        .ok_or_else(|| FederationError::not_found(format!("{} {external_id}", kind.as_str())))
    }

    /// Every edge touching `node_id`, active or not, ordered by id.
    pub fn edges_of(&self, node_id: i64) -> FederationResult<Vec<GraphEdge>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, from_id, to_id, edge_type, data, active FROM graph_edges
                 WHERE from_id = ?1
                 UNION
                 SELECT id, from_id, to_id, edge_type, data, active FROM graph_edges
                 WHERE to_id = ?1
                 ORDER BY 1",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![node_id], row_to_edge)
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn list_institutes(&self) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT name FROM graph_entities WHERE kind = ?1 AND active = 1 ORDER BY name",
            )
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map(params![NodeKind::Institute.as_str()], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    pub fn labels(&self) -> FederationResult<Vec<String>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached("SELECT DISTINCT kind FROM graph_entities ORDER BY kind")
            .map_err(FederationError::from_read)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(FederationError::from_read)?;
        collect_rows(rows)
    }

    /// Node count for one label. The label must exist in the graph.
    pub fn count_label(&self, label: &str) -> FederationResult<i64> {
        if !self.labels()?.iter().any(|name| name == label) {
            return Err(FederationError::not_found(format!("label {label:?}")));
        }
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM graph_entities WHERE kind = ?1",
            params![label],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
    }

    pub fn inventory(&self) -> FederationResult<Vec<ContainerCount>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT kind, COUNT(*) FROM graph_entities GROUP BY kind ORDER BY kind",
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

    /// Active edges attached to an inactive keyword node.
    pub fn dangling_keyword_edges(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM graph_edges e
             JOIN graph_entities k ON k.id = e.from_id OR k.id = e.to_id
             WHERE e.active = 1 AND k.kind = ?1 AND k.active = 0",
            params![NodeKind::Keyword.as_str()],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
    }

    pub fn self_loop_collaborations(&self) -> FederationResult<i64> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT COUNT(*) FROM graph_edges
             WHERE edge_type = ?1 AND from_id = to_id",
            params![EdgeType::CollaboratesWith.as_str()],
            |row| row.get(0),
        )
        .map_err(FederationError::from_read)
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

fn institute_node(conn: &Connection, university_id: i64) -> FederationResult<i64> {
    conn.query_row(
        "SELECT id FROM graph_entities WHERE kind = ?1 AND external_id = ?2",
        params![NodeKind::Institute.as_str(), university_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(FederationError::from_read)?
    .ok_or_else(|| FederationError::not_found(format!("university {university_id}")))
}

/// Coauthor count per unordered university pair: the number of distinct
/// unordered faculty pairs, one from each university, that share at least
/// one publication. Pairs are keyed `(lower id, higher id)`.
pub(crate) fn derive_collaborations(dataset: &Dataset) -> Vec<((i64, i64), i64)> {
    let affiliation: AHashMap<i64, i64> = dataset
        .faculty
        .iter()
        .map(|f| (f.id, f.university_id))
        .collect();
    let mut authors: AHashMap<i64, Vec<i64>> = AHashMap::new();
    for faculty in &dataset.faculty {
        for publication in &faculty.publications {
            authors.entry(*publication).or_default().push(faculty.id);
        }
    }

    let mut seen_pairs: AHashSet<(i64, i64)> = AHashSet::new();
    let mut counts: AHashMap<(i64, i64), i64> = AHashMap::new();
    for list in authors.values() {
        for (idx, &a) in list.iter().enumerate() {
            for &b in &list[idx + 1..] {
                let (Some(&ua), Some(&ub)) = (affiliation.get(&a), affiliation.get(&b)) else {
                    continue;
                };
                if ua == ub {
                    continue;
                }
                if seen_pairs.insert((a.min(b), a.max(b))) {
                    *counts.entry((ua.min(ub), ua.max(ub))).or_default() += 1;
                }
            }
        }
    }
    let mut result: Vec<((i64, i64), i64)> = counts.into_iter().collect();
    result.sort_unstable();
    result
}

fn insert_dataset(tx: &Connection, dataset: &Dataset) -> FederationResult<(usize, usize)> {
    tx.execute_batch(
        "DELETE FROM graph_undo_edges;
         DELETE FROM graph_undo;
         DELETE FROM graph_edges;
         DELETE FROM graph_entities;",
    )
    .map_err(FederationError::from_write)?;

    let mut institutes = AHashMap::new();
    let mut keywords = AHashMap::new();
    let mut publications = AHashMap::new();
    let mut nodes = 0usize;
    for university in &dataset.universities {
        let id = insert_entity(
            tx,
            NodeKind::Institute,
            university.id,
            &university.name,
            json!({ "photoUrl": university.photo_url }),
        )?;
        institutes.insert(university.id, id);
        nodes += 1;
    }
    for keyword in &dataset.keywords {
        let id = insert_entity(tx, NodeKind::Keyword, keyword.id, &keyword.name, json!({}))?;
        keywords.insert(keyword.id, id);
        nodes += 1;
    }
    for publication in &dataset.publications {
        let id = insert_entity(
            tx,
            NodeKind::Publication,
            publication.id,
            &publication.title,
            json!({ "year": publication.year, "numCitations": publication.num_citations }),
        )?;
        publications.insert(publication.id, id);
        nodes += 1;
    }

    let mut edges = 0usize;
    for faculty in &dataset.faculty {
        let node = insert_entity(tx, NodeKind::Faculty, faculty.id, &faculty.name, json!({}))?;
        nodes += 1;
        let institute = lookup(&institutes, faculty.university_id, "university")?;
        insert_edge(tx, node, institute, EdgeType::AffiliationWith, json!({}))?;
        edges += 1;
        for entry in &faculty.keywords {
            let keyword = lookup(&keywords, entry.keyword_id, "keyword")?;
            insert_edge(
                tx,
                node,
                keyword,
                EdgeType::InterestedIn,
                json!({ "score": entry.score }),
            )?;
            edges += 1;
        }
        for publication in &faculty.publications {
            let target = lookup(&publications, *publication, "publication")?;
            insert_edge(tx, node, target, EdgeType::Publish, json!({}))?;
            edges += 1;
        }
    }

    for ((left, right), coauthors) in derive_collaborations(dataset) {
        let from = lookup(&institutes, left, "university")?;
        let to = lookup(&institutes, right, "university")?;
        insert_edge(
            tx,
            from,
            to,
            EdgeType::CollaboratesWith,
            json!({ "coauthors": coauthors }),
        )?;
        edges += 1;
    }
    Ok((nodes, edges))
}

fn insert_entity(
    tx: &Connection,
    kind: NodeKind,
    external_id: i64,
    name: &str,
    data: serde_json::Value,
) -> FederationResult<i64> {
    let entity = GraphEntity {
        id: 0,
        kind: kind.as_str().to_string(),
        external_id,
        name: name.to_string(),
        data,
        active: true,
    };
    validate_entity(&entity)?;
    let data = serde_json::to_string(&entity.data)
        .map_err(|e| FederationError::query(e.to_string()))?;
    tx.prepare_cached(
        "INSERT INTO graph_entities(kind, external_id, name, data, active)
         VALUES (?1, ?2, ?3, ?4, 1)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            entity.kind.as_str(),
            entity.external_id,
            entity.name.as_str(),
            data
        ])
    })
    .map_err(FederationError::from_write)?;
    Ok(tx.last_insert_rowid())
}

fn insert_edge(
    tx: &Connection,
    from_id: i64,
    to_id: i64,
    edge_type: EdgeType,
    data: serde_json::Value,
) -> FederationResult<i64> {
    let edge = GraphEdge {
        id: 0,
        from_id,
        to_id,
        edge_type: edge_type.as_str().to_string(),
        data,
        active: true,
    };
    validate_edge(&edge)?;
    let data =
        serde_json::to_string(&edge.data).map_err(|e| FederationError::query(e.to_string()))?;
    tx.prepare_cached(
        "INSERT INTO graph_edges(from_id, to_id, edge_type, data, active)
         VALUES (?1, ?2, ?3, ?4, 1)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![edge.from_id, edge.to_id, edge.edge_type.as_str(), data])
    })
    .map_err(FederationError::from_write)?;
    Ok(tx.last_insert_rowid())
}

fn lookup(ids: &AHashMap<i64, i64>, external_id: i64, what: &str) -> FederationResult<i64> {
    ids.get(&external_id)
        .copied()
        .ok_or_else(|| FederationError::query(format!("unknown {what} {external_id}")))
}
