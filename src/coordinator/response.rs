use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    lifecycle::RequestState,
    request::{QueryName, Source},
};
use crate::{
    errors::{ErrorKind, FederationError},
    model::{
        Collaborator, ContainerCount, FacultyAffiliation, FacultyScore, KeywordCount,
        MutationReceipt, UniversityCount, UniversityInfo, UniversityKeyword,
    },
};

/// A store row that can be flattened into a fixed column layout.
pub trait Tabular {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Value>;
}

impl Tabular for KeywordCount {
    const COLUMNS: &'static [&'static str] = &["keyword", "count"];

    fn cells(&self) -> Vec<Value> {
        vec![json!(self.keyword), json!(self.count)]
    }
}

impl Tabular for UniversityKeyword {
    const COLUMNS: &'static [&'static str] = &["keywordId", "keyword", "count"];

    fn cells(&self) -> Vec<Value> {
        vec![json!(self.keyword_id), json!(self.keyword), json!(self.count)]
    }
}

impl Tabular for FacultyAffiliation {
    const COLUMNS: &'static [&'static str] = &["facultyId", "faculty", "affiliation"];

    fn cells(&self) -> Vec<Value> {
        vec![
            json!(self.faculty_id),
            json!(self.faculty),
            json!(self.affiliation),
        ]
    }
}

impl Tabular for FacultyScore {
    const COLUMNS: &'static [&'static str] = &["facultyId", "faculty", "krc"];

    fn cells(&self) -> Vec<Value> {
        vec![json!(self.faculty_id), json!(self.faculty), json!(self.krc)]
    }
}

impl Tabular for Collaborator {
    const COLUMNS: &'static [&'static str] = &["universityId", "university", "coauthors"];

    fn cells(&self) -> Vec<Value> {
        vec![
            json!(self.university_id),
            json!(self.university),
            json!(self.coauthors),
        ]
    }
}

impl Tabular for UniversityCount {
    const COLUMNS: &'static [&'static str] = &["university", "facultyCount"];

    fn cells(&self) -> Vec<Value> {
        vec![json!(self.university), json!(self.faculty_count)]
    }
}

impl Tabular for UniversityInfo {
    const COLUMNS: &'static [&'static str] =
        &["universityId", "university", "photoUrl", "activeFaculty"];

    fn cells(&self) -> Vec<Value> {
        vec![
            json!(self.university_id),
            json!(self.university),
            json!(self.photo_url),
            json!(self.active_faculty),
        ]
    }
}

impl Tabular for String {
    const COLUMNS: &'static [&'static str] = &["name"];

    fn cells(&self) -> Vec<Value> {
        vec![json!(self)]
    }
}

/// Container size tagged with the store it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryRow {
    pub store: Source,
    pub entry: ContainerCount,
}

impl Tabular for InventoryRow {
    const COLUMNS: &'static [&'static str] = &["store", "container", "count"];

    fn cells(&self) -> Vec<Value> {
        vec![
            json!(self.store.as_str()),
            json!(self.entry.container),
            json!(self.entry.count),
        ]
    }
}

/// Source-independent tabular result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn from_rows<T: Tabular>(rows: &[T]) -> Self {
        Self {
            columns: T::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(Tabular::cells).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every value of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Payload {
    Rows(ResultSet),
    Count(i64),
    Mutation(MutationReceipt),
}

impl Payload {
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            Payload::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<i64> {
        match self {
            Payload::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn mutation(&self) -> Option<&MutationReceipt> {
        match self {
            Payload::Mutation(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Active entity counts read after the request completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCounts {
    pub active_faculty: i64,
    pub active_keywords: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedResponse {
    pub query: QueryName,
    pub source: Source,
    pub payload: Payload,
    /// `None` when the counts could not be read after the request.
    pub counts: Option<LiveCounts>,
    pub states: Vec<RequestState>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationFailure {
    pub query: QueryName,
    pub source: Option<Source>,
    pub kind: ErrorKind,
    pub message: String,
    pub states: Vec<RequestState>,
}

impl FederationFailure {
    pub fn new(
        query: QueryName,
        source: Option<Source>,
        err: &FederationError,
        states: Vec<RequestState>,
    ) -> Self {
        Self {
            query,
            source,
            kind: err.kind(),
            message: err.to_string(),
            states,
        }
    }
}

impl fmt::Display for FederationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({:?}): {}", self.query, self.kind, self.message)
    }
}

impl std::error::Error for FederationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_set_keeps_column_order() {
        let rows = vec![
            KeywordCount {
                keyword: "databases".into(),
                count: 4,
            },
            KeywordCount {
                keyword: "ai".into(),
                count: 2,
            },
        ];
        let set = ResultSet::from_rows(&rows);
        assert_eq!(set.columns, vec!["keyword", "count"]);
        assert_eq!(set.get(1, "keyword"), Some(&json!("ai")));
        assert_eq!(set.column("count"), Some(vec![&json!(4), &json!(2)]));
    }

    #[test]
    fn payload_serializes_tagged() {
        let value = serde_json::to_value(Payload::Count(3)).expect("json");
        assert_eq!(value, json!({"type": "count", "value": 3}));
    }
}
