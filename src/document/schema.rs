use rusqlite::Connection;

use crate::errors::{FederationError, FederationResult};

/// How an indexed document path is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    /// Expression index over a scalar JSON path of the document body.
    Expression,
    /// One `document_index_entries` row per element of an array path.
    Multikey,
}

#[derive(Clone, Copy, Debug)]
pub struct IndexSpec {
    pub name: &'static str,
    pub collection: &'static str,
    pub path: &'static str,
    pub kind: IndexKind,
}

pub const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_documents_year",
        collection: "publications",
        path: "year",
        kind: IndexKind::Expression,
    },
    IndexSpec {
        name: "idx_documents_affiliation",
        collection: "faculty",
        path: "affiliation.name",
        kind: IndexKind::Expression,
    },
    IndexSpec {
        name: "publications_keywords_name",
        collection: "publications",
        path: "keywords.name",
        kind: IndexKind::Multikey,
    },
    IndexSpec {
        name: "faculty_keywords_name",
        collection: "faculty",
        path: "keywords.name",
        kind: IndexKind::Multikey,
    },
];

pub fn index_for(collection: &str, path: &str) -> Option<&'static IndexSpec> {
    INDEXES
        .iter()
        .find(|spec| spec.collection == collection && spec.path == path)
}

/// Document paths are dotted field names; anything else is rejected before
/// it reaches a statement.
pub fn validate_path(path: &str) -> FederationResult<()> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(FederationError::query(format!("invalid document path {path:?}")))
    }
}

/// SQL expression matching the expression index on `path`.
pub fn json_expr(path: &str) -> FederationResult<String> {
    validate_path(path)?;
    Ok(format!("json_extract(body, '$.{path}')"))
}

pub fn ensure_schema(conn: &Connection) -> FederationResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            doc_id     INTEGER NOT NULL,
            body       TEXT NOT NULL CHECK (json_valid(body)),
            PRIMARY KEY (collection, doc_id)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS document_index_entries (
            collection TEXT NOT NULL,
            path       TEXT NOT NULL,
            value      TEXT NOT NULL,
            doc_id     INTEGER NOT NULL,
            PRIMARY KEY (collection, path, value, doc_id)
        ) WITHOUT ROWID;
        CREATE INDEX IF NOT EXISTS idx_documents_year
            ON documents(collection, json_extract(body, '$.year'));
        CREATE INDEX IF NOT EXISTS idx_documents_affiliation
            ON documents(collection, json_extract(body, '$.affiliation.name'));
        "#,
    )
    .map_err(|e| FederationError::connection(format!("document schema: {e}")))?;
    Ok(())
}
