use rusqlite::Connection;

use crate::errors::{FederationError, FederationResult};

/// Index backing the trending-keywords aggregation. It covers every column
/// the query reads, so the year range is answered from the index alone.
pub const TRENDING_INDEX: &str = "idx_pubkw_year_keyword";

pub fn ensure_schema(conn: &Connection) -> FederationResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS university (
            id        INTEGER PRIMARY KEY,
            name      TEXT NOT NULL UNIQUE,
            photo_url TEXT
        );
        CREATE TABLE IF NOT EXISTS keyword (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS faculty (
            id            INTEGER PRIMARY KEY,
            name          TEXT NOT NULL,
            university_id INTEGER NOT NULL REFERENCES university(id),
            is_active     INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS publication (
            id            INTEGER PRIMARY KEY,
            title         TEXT NOT NULL,
            year          INTEGER NOT NULL,
            num_citations INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS faculty_keyword (
            faculty_id INTEGER NOT NULL REFERENCES faculty(id),
            keyword_id INTEGER NOT NULL REFERENCES keyword(id),
            score      REAL NOT NULL,
            PRIMARY KEY (faculty_id, keyword_id)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS faculty_publication (
            faculty_id     INTEGER NOT NULL REFERENCES faculty(id),
            publication_id INTEGER NOT NULL REFERENCES publication(id),
            PRIMARY KEY (faculty_id, publication_id)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS publication_keyword (
            publication_id INTEGER NOT NULL REFERENCES publication(id),
            keyword_id     INTEGER NOT NULL REFERENCES keyword(id),
            year           INTEGER NOT NULL,
            score          REAL NOT NULL,
            PRIMARY KEY (publication_id, keyword_id)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS university_stats (
            university_id  INTEGER PRIMARY KEY REFERENCES university(id),
            active_faculty INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS faculty_undo (
            seq        INTEGER PRIMARY KEY AUTOINCREMENT,
            faculty_id INTEGER NOT NULL REFERENCES faculty(id)
        );
        CREATE INDEX IF NOT EXISTS idx_pubkw_year_keyword
            ON publication_keyword(year, keyword_id, publication_id);
        CREATE INDEX IF NOT EXISTS idx_faculty_keyword_keyword
            ON faculty_keyword(keyword_id, score, faculty_id);
        CREATE INDEX IF NOT EXISTS idx_faculty_university
            ON faculty(university_id, is_active);
        CREATE INDEX IF NOT EXISTS idx_faculty_publication_publication
            ON faculty_publication(publication_id, faculty_id);
        "#,
    )
    .map_err(|e| FederationError::connection(format!("relational schema: {e}")))?;
    Ok(())
}

/// Names of the tables this store owns, read from the catalogue.
pub fn table_names(conn: &Connection) -> FederationResult<Vec<String>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(FederationError::from_read)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(FederationError::from_read)?;
    let mut names = Vec::new();
    for name in rows {
        names.push(name.map_err(FederationError::from_read)?);
    }
    Ok(names)
}
