use std::{fmt, result};

use serde::Serialize;
use tracing::warn;

use crate::{
    errors::{FederationError, FederationResult},
    graph::GraphStore,
    relational::RelationalStore,
};

/// Consistency findings for the mutable stores. Every counter is zero on a
/// healthy federation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    pub active_faculty: i64,
    pub active_keywords: i64,
    /// Universities whose materialized faculty count disagrees with the live one.
    pub stats_drift: i64,
    /// Faculty undo entries pointing at an active faculty member.
    pub stale_undo_entries: i64,
    pub edges_on_inactive_keywords: i64,
    pub self_loop_collaborations: i64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.active_faculty = self.active_faculty.max(other.active_faculty);
        self.active_keywords = self.active_keywords.max(other.active_keywords);
        self.stats_drift += other.stats_drift;
        self.stale_undo_entries += other.stale_undo_entries;
        self.edges_on_inactive_keywords += other.edges_on_inactive_keywords;
        self.self_loop_collaborations += other.self_loop_collaborations;
    }

    pub fn has_issues(&self) -> bool {
        self.stats_drift > 0
            || self.stale_undo_entries > 0
            || self.edges_on_inactive_keywords > 0
            || self.self_loop_collaborations > 0
    }
}

#[derive(Debug)]
pub struct SafetyError {
    pub report: SafetyReport,
    pub source: Option<FederationError>,
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consistency violations detected")
    }
}

impl std::error::Error for SafetyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

pub fn validate_relational(store: &RelationalStore) -> FederationResult<SafetyReport> {
    let drift = store.stats_drift()?;
    for (university_id, cached, live) in &drift {
        warn!(university_id, cached, live, "university stats drifted");
    }
    Ok(SafetyReport {
        active_faculty: store.count_active_faculty()?,
        stats_drift: drift.len() as i64,
        stale_undo_entries: store.stale_undo_entries()?.len() as i64,
        ..SafetyReport::default()
    })
}

pub fn validate_graph(store: &GraphStore) -> FederationResult<SafetyReport> {
    Ok(SafetyReport {
        active_keywords: store.count_active_keywords()?,
        edges_on_inactive_keywords: store.dangling_keyword_edges()?,
        self_loop_collaborations: store.self_loop_collaborations()?,
        ..SafetyReport::default()
    })
}

pub fn run_safety_checks(
    relational: &RelationalStore,
    graph: &GraphStore,
) -> FederationResult<SafetyReport> {
    let mut report = SafetyReport::default();
    report.merge(&validate_relational(relational)?);
    report.merge(&validate_graph(graph)?);
    Ok(report)
}

pub fn run_strict_safety_checks(
    relational: &RelationalStore,
    graph: &GraphStore,
) -> result::Result<(), SafetyError> {
    let report = run_safety_checks(relational, graph).map_err(|err| SafetyError {
        report: SafetyReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        Err(SafetyError {
            report,
            source: None,
        })
    } else {
        Ok(())
    }
}
