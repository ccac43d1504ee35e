use tracing::{debug, warn};

use crate::{
    document::DocumentStore,
    errors::FederationResult,
    model::{Exclusions, FacultyScore, KeywordCount},
    relational::RelationalStore,
};

#[derive(Debug, PartialEq, Eq)]
pub enum DualReadResult<T> {
    Match,
    Mismatch { base: Vec<T>, other: Vec<T> },
}

pub fn compare_rows<T: PartialEq + Clone>(base: &[T], other: &[T]) -> DualReadResult<T> {
    if base == other {
        DualReadResult::Match
    } else {
        DualReadResult::Mismatch {
            base: base.to_vec(),
            other: other.to_vec(),
        }
    }
}

/// Runs the trending-keywords query against both stores that can answer it
/// and compares the normalized rows.
pub fn compare_trending(
    relational: &RelationalStore,
    document: &DocumentStore,
    year: i32,
    exclusions: &Exclusions,
) -> FederationResult<DualReadResult<KeywordCount>> {
    let base = relational.query_trending_keywords_excluding(year, exclusions)?;
    let other = document.query_trending_keywords_doc_excluding(year, exclusions)?;
    let result = compare_rows(&base, &other);
    match &result {
        DualReadResult::Match => debug!(year, rows = base.len(), "trending sources agree"),
        DualReadResult::Mismatch { .. } => warn!(year, "trending sources disagree"),
    }
    Ok(result)
}

/// Compares the KRC ranking of both stores under the same exclusions.
pub fn compare_top_krc(
    relational: &RelationalStore,
    document: &DocumentStore,
    keyword: &str,
    affiliation: &str,
    exclusions: &Exclusions,
) -> FederationResult<DualReadResult<FacultyScore>> {
    let base = relational.query_top_krc_faculty_excluding(keyword, affiliation, exclusions)?;
    let other = document.query_top_krc_faculty_excluding(keyword, affiliation, exclusions)?;
    let result = compare_rows(&base, &other);
    if let DualReadResult::Mismatch { .. } = &result {
        warn!(keyword, affiliation, "krc sources disagree");
    }
    Ok(result)
}
