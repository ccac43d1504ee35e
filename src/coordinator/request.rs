use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{FederationError, FederationResult};

/// Backing store a logical query is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(alias = "mysql")]
    Relational,
    #[serde(alias = "mongodb")]
    Document,
    #[serde(alias = "neo4j")]
    Graph,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Relational => "relational",
            Source::Document => "document",
            Source::Graph => "graph",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = FederationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "relational" | "mysql" => Ok(Source::Relational),
            "document" | "mongodb" => Ok(Source::Document),
            "graph" | "neo4j" => Ok(Source::Graph),
            other => Err(FederationError::query(format!("unknown source {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryName {
    TrendingKeywords,
    FacultyByKeywords,
    #[serde(rename = "topKRCFaculty", alias = "topKrcFaculty")]
    TopKrcFaculty,
    TopKeywordsByUniversity,
    TopCollaborators,
    DeleteFaculty,
    RestoreFaculty,
    DeleteKeyword,
    RestoreKeyword,
    CountActiveFaculty,
    CountActiveKeywords,
    TopUniversitiesByKeyword,
    UniversityInfo,
    ListKeywords,
    ListUniversities,
    StoreInventory,
}

impl QueryName {
    pub const ALL: [QueryName; 16] = [
        QueryName::TrendingKeywords,
        QueryName::FacultyByKeywords,
        QueryName::TopKrcFaculty,
        QueryName::TopKeywordsByUniversity,
        QueryName::TopCollaborators,
        QueryName::DeleteFaculty,
        QueryName::RestoreFaculty,
        QueryName::DeleteKeyword,
        QueryName::RestoreKeyword,
        QueryName::CountActiveFaculty,
        QueryName::CountActiveKeywords,
        QueryName::TopUniversitiesByKeyword,
        QueryName::UniversityInfo,
        QueryName::ListKeywords,
        QueryName::ListUniversities,
        QueryName::StoreInventory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryName::TrendingKeywords => "trendingKeywords",
            QueryName::FacultyByKeywords => "facultyByKeywords",
            QueryName::TopKrcFaculty => "topKRCFaculty",
            QueryName::TopKeywordsByUniversity => "topKeywordsByUniversity",
            QueryName::TopCollaborators => "topCollaborators",
            QueryName::DeleteFaculty => "deleteFaculty",
            QueryName::RestoreFaculty => "restoreFaculty",
            QueryName::DeleteKeyword => "deleteKeyword",
            QueryName::RestoreKeyword => "restoreKeyword",
            QueryName::CountActiveFaculty => "countActiveFaculty",
            QueryName::CountActiveKeywords => "countActiveKeywords",
            QueryName::TopUniversitiesByKeyword => "topUniversitiesByKeyword",
            QueryName::UniversityInfo => "universityInfo",
            QueryName::ListKeywords => "listKeywords",
            QueryName::ListUniversities => "listUniversities",
            QueryName::StoreInventory => "storeInventory",
        }
    }

    /// Stores able to answer this query; the first entry is the default.
    pub fn sources(self) -> &'static [Source] {
        match self {
            QueryName::TrendingKeywords | QueryName::ListKeywords => {
                &[Source::Relational, Source::Document]
            }
            QueryName::TopKrcFaculty => &[Source::Document, Source::Relational],
            QueryName::FacultyByKeywords
            | QueryName::DeleteFaculty
            | QueryName::RestoreFaculty
            | QueryName::CountActiveFaculty
            | QueryName::TopUniversitiesByKeyword
            | QueryName::UniversityInfo
            | QueryName::ListUniversities => &[Source::Relational],
            QueryName::TopKeywordsByUniversity
            | QueryName::TopCollaborators
            | QueryName::DeleteKeyword
            | QueryName::RestoreKeyword
            | QueryName::CountActiveKeywords => &[Source::Graph],
            QueryName::StoreInventory => &[Source::Relational, Source::Document, Source::Graph],
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            QueryName::DeleteFaculty
                | QueryName::RestoreFaculty
                | QueryName::DeleteKeyword
                | QueryName::RestoreKeyword
        )
    }

    /// Picks the requested source, or the default one when none was given.
    pub fn resolve_source(self, requested: Option<Source>) -> FederationResult<Source> {
        let sources = self.sources();
        match requested {
            None => Ok(sources[0]),
            Some(source) if sources.contains(&source) => Ok(source),
            Some(source) => Err(FederationError::query(format!(
                "{self} cannot be served by the {source} store"
            ))),
        }
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryName {
    type Err = FederationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        QueryName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| FederationError::query(format!("unknown query {raw:?}")))
    }
}

/// Query arguments. Each query reads the fields it needs and ignores the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Parameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_keyword_set"
    )]
    pub keyword_set: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_id: Option<i64>,
}

impl Parameters {
    /// Sets one parameter from its textual `key=value` form.
    pub fn set(&mut self, key: &str, value: &str) -> FederationResult<()> {
        match key {
            "source" => self.source = Some(value.parse()?),
            "year" => self.year = Some(parse_number(key, value)?),
            "keywordSet" => self.keyword_set = Some(normalize_keywords(value.split(','))),
            "keyword" => self.keyword = Some(value.to_string()),
            "affiliation" => self.affiliation = Some(value.to_string()),
            "university" => self.university = Some(value.to_string()),
            "universityId" => self.university_id = Some(parse_number(key, value)?),
            "facultyId" => self.faculty_id = Some(parse_number(key, value)?),
            "keywordId" => self.keyword_id = Some(parse_number(key, value)?),
            other => {
                return Err(FederationError::query(format!("unknown parameter {other:?}")));
            }
        }
        Ok(())
    }
}

pub(crate) fn require<T: Clone>(
    value: &Option<T>,
    name: &str,
    query: QueryName,
) -> FederationResult<T> {
    value
        .clone()
        .ok_or_else(|| FederationError::query(format!("{query} requires parameter {name}")))
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> FederationResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| FederationError::query(format!("parameter {key} has invalid value {raw:?}")))
}

/// One call from the presentation shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LogicalRequest {
    pub query_name: QueryName,
    #[serde(default)]
    pub parameters: Parameters,
}

impl LogicalRequest {
    pub fn new(query_name: QueryName) -> Self {
        Self {
            query_name,
            parameters: Parameters::default(),
        }
    }

    pub fn from_json_str(raw: &str) -> FederationResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| FederationError::query(format!("invalid request: {e}")))
    }

    /// Builds a request from a query name and `key=value` arguments.
    pub fn from_command<S: AsRef<str>>(name: &str, args: &[S]) -> FederationResult<Self> {
        let mut request = Self::new(name.parse()?);
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                FederationError::query(format!("argument {arg:?} is not key=value"))
            })?;
            request.parameters.set(key.trim(), value)?;
        }
        Ok(request)
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.parameters.source = Some(source);
        self
    }

    pub fn trending_keywords(year: i32) -> Self {
        let mut request = Self::new(QueryName::TrendingKeywords);
        request.parameters.year = Some(year);
        request
    }

    pub fn faculty_by_keywords<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut request = Self::new(QueryName::FacultyByKeywords);
        request.parameters.keyword_set = Some(normalize_keywords(keywords));
        request
    }

    pub fn top_krc_faculty(keyword: &str, affiliation: &str) -> Self {
        let mut request = Self::new(QueryName::TopKrcFaculty);
        request.parameters.keyword = Some(keyword.to_string());
        request.parameters.affiliation = Some(affiliation.to_string());
        request
    }

    pub fn top_keywords_by_university(university_id: i64) -> Self {
        let mut request = Self::new(QueryName::TopKeywordsByUniversity);
        request.parameters.university_id = Some(university_id);
        request
    }

    pub fn top_collaborators(university_id: i64) -> Self {
        let mut request = Self::new(QueryName::TopCollaborators);
        request.parameters.university_id = Some(university_id);
        request
    }

    pub fn delete_faculty(faculty_id: i64) -> Self {
        let mut request = Self::new(QueryName::DeleteFaculty);
        request.parameters.faculty_id = Some(faculty_id);
        request
    }

    pub fn delete_keyword(keyword_id: i64) -> Self {
        let mut request = Self::new(QueryName::DeleteKeyword);
        request.parameters.keyword_id = Some(keyword_id);
        request
    }
}

/// Trims every keyword and drops the blank ones, whatever form the set
/// arrived in.
fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn deserialize_keyword_set<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(raw.map(normalize_keywords))
}
