//! Typed result rows returned by the store adapters.

use serde::{Deserialize, Serialize};

/// Upper bound for every ranked listing.
pub const TOP_LIMIT: usize = 10;

/// Upper bound for the universities-per-keyword ranking.
pub const TOP_UNIVERSITIES_LIMIT: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: i64,
}

/// Keyword popularity within one university, with the id needed to delete it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityKeyword {
    pub keyword_id: i64,
    pub keyword: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyAffiliation {
    pub faculty_id: i64,
    pub faculty: String,
    pub affiliation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyScore {
    pub faculty_id: i64,
    pub faculty: String,
    pub krc: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub university_id: i64,
    pub university: String,
    pub coauthors: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityCount {
    pub university: String,
    pub faculty_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityInfo {
    pub university_id: i64,
    pub university: String,
    pub photo_url: Option<String>,
    pub active_faculty: i64,
}

/// One container (table, collection or node label) and its size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerCount {
    pub container: String,
    pub count: i64,
}

/// Soft deletes owned by one store that the copies held by the other stores
/// must honour: faculty are deleted relationally, keywords in the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub faculty_ids: Vec<i64>,
    pub keywords: Vec<String>,
}

impl Exclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|name| name == keyword)
    }
}

/// Rounds to two decimals, the precision every KRC score is reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Orders KRC rows by score descending, then name and id ascending, and keeps
/// the top [`TOP_LIMIT`].
pub fn rank_scores(mut rows: Vec<FacultyScore>) -> Vec<FacultyScore> {
    for row in &mut rows {
        row.krc = round2(row.krc);
    }
    rows.sort_by(|a, b| {
        b.krc
            .total_cmp(&a.krc)
            .then_with(|| a.faculty.cmp(&b.faculty))
            .then_with(|| a.faculty_id.cmp(&b.faculty_id))
    });
    rows.truncate(TOP_LIMIT);
    rows
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityClass {
    Faculty,
    Keyword,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationAction {
    Deleted,
    Restored,
}

/// What a committed delete or restore changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReceipt {
    pub entity: EntityClass,
    pub id: i64,
    pub name: String,
    pub action: MutationAction,
    /// Edges flagged or unflagged together with the entity (graph store only).
    pub edges: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(id: i64, name: &str, krc: f64) -> FacultyScore {
        FacultyScore {
            faculty_id: id,
            faculty: name.to_string(),
            krc,
        }
    }

    #[test]
    fn ties_break_on_name() {
        let ranked = rank_scores(vec![
            score(1, "Zed", 10.0),
            score(2, "Amy", 10.0),
            score(3, "Bob", 12.5),
        ]);
        let names: Vec<&str> = ranked.iter().map(|r| r.faculty.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Amy", "Zed"]);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(2.5), 2.5);
    }
}
