use serde::{Deserialize, Serialize};

use crate::errors::{FederationError, FederationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Institute,
    Faculty,
    Keyword,
    Publication,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Institute,
        NodeKind::Faculty,
        NodeKind::Keyword,
        NodeKind::Publication,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Institute => "INSTITUTE",
            NodeKind::Faculty => "FACULTY",
            NodeKind::Keyword => "KEYWORD",
            NodeKind::Publication => "PUBLICATION",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeType {
    AffiliationWith,
    InterestedIn,
    Publish,
    CollaboratesWith,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::AffiliationWith => "AFFILIATION_WITH",
            EdgeType::InterestedIn => "INTERESTED_IN",
            EdgeType::Publish => "PUBLISH",
            EdgeType::CollaboratesWith => "COLLABORATES_WITH",
        }
    }
}

/// A node together with the id it carries in the source dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphEntity {
    pub id: i64,
    pub kind: String,
    pub external_id: i64,
    pub name: String,
    pub data: serde_json::Value,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: i64,
    pub from_id: i64,
    pub to_id: i64,
    pub edge_type: String,
    pub data: serde_json::Value,
    pub active: bool,
}

pub fn validate_entity(entity: &GraphEntity) -> FederationResult<()> {
    if entity.kind.trim().is_empty() {
        return Err(FederationError::query("entity kind must be set"));
    }
    if entity.name.trim().is_empty() {
        return Err(FederationError::query("entity name must be set"));
    }
    Ok(())
}

pub fn validate_edge(edge: &GraphEdge) -> FederationResult<()> {
    if edge.edge_type.trim().is_empty() {
        return Err(FederationError::query("edge type must be set"));
    }
    if edge.from_id <= 0 || edge.to_id <= 0 {
        return Err(FederationError::query("edge endpoints must be positive ids"));
    }
    if edge.from_id == edge.to_id {
        return Err(FederationError::query("self loops are not supported"));
    }
    Ok(())
}

/// Columns: `id, kind, external_id, name, data, active`.
pub fn row_to_entity(row: &rusqlite::Row<'_>) -> Result<GraphEntity, rusqlite::Error> {
    Ok(GraphEntity {
        id: row.get(0)?,
        kind: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        data: json_column(row, 4)?,
        active: row.get::<_, i64>(5)? != 0,
    })
}

/// Columns: `id, from_id, to_id, edge_type, data, active`.
pub fn row_to_edge(row: &rusqlite::Row<'_>) -> Result<GraphEdge, rusqlite::Error> {
    Ok(GraphEdge {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        edge_type: row.get(3)?,
        data: json_column(row, 4)?,
        active: row.get::<_, i64>(5)? != 0,
    })
}

fn json_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<serde_json::Value, rusqlite::Error> {
    let data: String = row.get(idx)?;
    serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
