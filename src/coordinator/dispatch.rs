use tracing::{info, warn};

use super::{
    lifecycle::{RequestLifecycle, RequestState},
    request::{LogicalRequest, Parameters, QueryName, Source, require},
    response::{
        FederatedResponse, FederationFailure, InventoryRow, LiveCounts, Payload, ResultSet,
        Tabular,
    },
};
use crate::{
    document::DocumentStore,
    errors::{FederationError, FederationResult},
    graph::GraphStore,
    model::Exclusions,
    relational::RelationalStore,
};

/// Holds borrowed handles to the three stores; it owns no connections and
/// caches no results, so every answer reflects the last committed state.
pub struct Coordinator<'a> {
    relational: &'a RelationalStore,
    document: &'a DocumentStore,
    graph: &'a GraphStore,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        relational: &'a RelationalStore,
        document: &'a DocumentStore,
        graph: &'a GraphStore,
    ) -> Self {
        Self {
            relational,
            document,
            graph,
        }
    }

    pub fn relational(&self) -> &'a RelationalStore {
        self.relational
    }

    pub fn document(&self) -> &'a DocumentStore {
        self.document
    }

    pub fn graph(&self) -> &'a GraphStore {
        self.graph
    }

    /// Runs one request to completion on the calling thread.
    pub fn handle(
        &self,
        request: &LogicalRequest,
    ) -> Result<FederatedResponse, FederationFailure> {
        let query = request.query_name;
        let mut lifecycle = RequestLifecycle::new(query);

        let source = match query.resolve_source(request.parameters.source) {
            Ok(source) => source,
            Err(err) => return Err(self.report(lifecycle, None, err)),
        };
        if let Err(err) = lifecycle.advance(RequestState::Dispatched(source)) {
            return Err(self.report(lifecycle, Some(source), err));
        }

        let payload = match self.dispatch(query, source, &request.parameters) {
            Ok(payload) => payload,
            Err(err) => return Err(self.report(lifecycle, Some(source), err)),
        };
        if let Err(err) = lifecycle.advance(RequestState::Normalized) {
            return Err(self.report(lifecycle, Some(source), err));
        }

        let counts = match self.live_counts() {
            Ok(counts) => Some(counts),
            Err(err) => {
                warn!(query = query.as_str(), error = %err, "live counts unavailable");
                None
            }
        };
        if let Err(err) = lifecycle.advance(RequestState::Returned) {
            return Err(self.report(lifecycle, Some(source), err));
        }
        info!(
            query = query.as_str(),
            source = source.as_str(),
            mutation = query.is_mutation(),
            "request served"
        );
        Ok(FederatedResponse {
            query,
            source,
            payload,
            counts,
            states: lifecycle.into_trail(),
        })
    }

    /// Active faculty and keyword counts as of the last committed mutation.
    pub fn live_counts(&self) -> FederationResult<LiveCounts> {
        Ok(LiveCounts {
            active_faculty: self.relational.count_active_faculty()?,
            active_keywords: self.graph.count_active_keywords()?,
        })
    }

    /// Soft deletes each store owns, for the stores holding copies of the
    /// same entities. Faculty are deleted relationally and keywords in the
    /// graph; the document store holds copies of both.
    pub fn exclusions(&self) -> FederationResult<Exclusions> {
        Ok(Exclusions {
            faculty_ids: self.relational.inactive_faculty_ids()?,
            keywords: self.graph.inactive_keyword_names()?,
        })
    }

    fn dispatch(
        &self,
        query: QueryName,
        source: Source,
        params: &Parameters,
    ) -> FederationResult<Payload> {
        let payload = match (query, source) {
            (QueryName::TrendingKeywords, Source::Relational) => {
                let year = require(&params.year, "year", query)?;
                let exclusions = self.exclusions()?;
                rows(&self.relational.query_trending_keywords_excluding(year, &exclusions)?)
            }
            (QueryName::TrendingKeywords, Source::Document) => {
                let year = require(&params.year, "year", query)?;
                let exclusions = self.exclusions()?;
                rows(&self.document.query_trending_keywords_doc_excluding(year, &exclusions)?)
            }
            (QueryName::FacultyByKeywords, _) => {
                let keywords = require(&params.keyword_set, "keywordSet", query)?;
                let exclusions = self.exclusions()?;
                let faculty = self
                    .relational
                    .query_faculty_by_keywords_excluding(&keywords, &exclusions)?;
                rows(&faculty)
            }
            (QueryName::TopKrcFaculty, _) => {
                let keyword = require(&params.keyword, "keyword", query)?;
                let affiliation = require(&params.affiliation, "affiliation", query)?;
                let exclusions = self.exclusions()?;
                let scores = match source {
                    Source::Relational => self.relational.query_top_krc_faculty_excluding(
                        &keyword,
                        &affiliation,
                        &exclusions,
                    )?,
                    _ => self.document.query_top_krc_faculty_excluding(
                        &keyword,
                        &affiliation,
                        &exclusions,
                    )?,
                };
                rows(&scores)
            }
            (QueryName::TopKeywordsByUniversity, _) => {
                let id = require(&params.university_id, "universityId", query)?;
                let exclusions = self.exclusions()?;
                rows(&self.graph.query_top_keywords_by_university_excluding(id, &exclusions)?)
            }
            (QueryName::TopCollaborators, _) => {
                let id = require(&params.university_id, "universityId", query)?;
                let exclusions = self.exclusions()?;
                rows(&self.graph.query_top_collaborators_excluding(id, &exclusions)?)
            }
            (QueryName::DeleteFaculty, _) => {
                let id = require(&params.faculty_id, "facultyId", query)?;
                Payload::Mutation(self.relational.delete_faculty(id)?)
            }
            (QueryName::RestoreFaculty, _) => Payload::Mutation(self.relational.restore_faculty()?),
            (QueryName::DeleteKeyword, _) => {
                let id = require(&params.keyword_id, "keywordId", query)?;
                Payload::Mutation(self.graph.delete_keyword(id)?)
            }
            (QueryName::RestoreKeyword, _) => Payload::Mutation(self.graph.restore_keyword()?),
            (QueryName::CountActiveFaculty, _) => {
                Payload::Count(self.relational.count_active_faculty()?)
            }
            (QueryName::CountActiveKeywords, _) => {
                Payload::Count(self.graph.count_active_keywords()?)
            }
            (QueryName::TopUniversitiesByKeyword, _) => {
                let keyword = require(&params.keyword, "keyword", query)?;
                let exclusions = self.exclusions()?;
                rows(
                    &self
                        .relational
                        .query_top_universities_for_keyword_excluding(&keyword, &exclusions)?,
                )
            }
            (QueryName::UniversityInfo, _) => {
                let name = require(&params.university, "university", query)?;
                rows(&[self.relational.query_university_info(&name)?])
            }
            (QueryName::ListKeywords, Source::Document) => {
                rows(&self.document.distinct_keywords()?)
            }
            (QueryName::ListKeywords, _) => rows(&self.relational.list_keywords()?),
            (QueryName::ListUniversities, _) => rows(&self.relational.list_universities()?),
            (QueryName::StoreInventory, _) => {
                let entries = match source {
                    Source::Relational => self.relational.inventory()?,
                    Source::Document => self.document.inventory()?,
                    Source::Graph => self.graph.inventory()?,
                };
                let inventory: Vec<InventoryRow> = entries
                    .into_iter()
                    .map(|entry| InventoryRow {
                        store: source,
                        entry,
                    })
                    .collect();
                rows(&inventory)
            }
            (QueryName::TrendingKeywords, Source::Graph) => {
                return Err(FederationError::query(format!(
                    "{query} cannot be served by the {source} store"
                )));
            }
        };
        Ok(payload)
    }

    fn report(
        &self,
        mut lifecycle: RequestLifecycle,
        source: Option<Source>,
        err: FederationError,
    ) -> FederationFailure {
        let query = lifecycle.query();
        warn!(
            query = query.as_str(),
            source = source.map(Source::as_str),
            kind = ?err.kind(),
            error = %err,
            "request failed"
        );
        lifecycle.fail();
        FederationFailure::new(query, source, &err, lifecycle.into_trail())
    }
}

fn rows<T: Tabular>(items: &[T]) -> Payload {
    Payload::Rows(ResultSet::from_rows(items))
}
