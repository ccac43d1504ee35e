use rusqlite::Connection;

use crate::errors::{FederationError, FederationResult};

pub fn ensure_schema(conn: &Connection) -> FederationResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS graph_entities (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            kind        TEXT NOT NULL,
            external_id INTEGER NOT NULL,
            name        TEXT NOT NULL,
            data        TEXT NOT NULL,
            active      INTEGER NOT NULL DEFAULT 1,
            UNIQUE (kind, external_id)
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            from_id   INTEGER NOT NULL REFERENCES graph_entities(id),
            to_id     INTEGER NOT NULL REFERENCES graph_entities(id),
            edge_type TEXT NOT NULL,
            data      TEXT NOT NULL,
            active    INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS graph_undo (
            seq       INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id INTEGER NOT NULL REFERENCES graph_entities(id)
        );
        CREATE TABLE IF NOT EXISTS graph_undo_edges (
            seq     INTEGER NOT NULL REFERENCES graph_undo(seq),
            edge_id INTEGER NOT NULL REFERENCES graph_edges(id),
            PRIMARY KEY (seq, edge_id)
        ) WITHOUT ROWID;
        CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id, edge_type, active);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id, edge_type, active);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        CREATE INDEX IF NOT EXISTS idx_entities_kind_name ON graph_entities(kind, name);
        "#,
    )
    .map_err(|e| FederationError::connection(format!("graph schema: {e}")))?;
    Ok(())
}
