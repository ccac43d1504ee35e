//! Store-agnostic academic dataset used to seed all three stores.

use std::{fs, path::Path};

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::{FederationError, FederationResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct University {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
}

/// Relevance of a keyword to a faculty member or publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordScore {
    pub keyword_id: i64,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: i64,
    pub name: String,
    pub university_id: i64,
    #[serde(default)]
    pub keywords: Vec<KeywordScore>,
    #[serde(default)]
    pub publications: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub year: i32,
    #[serde(default)]
    pub num_citations: i64,
    #[serde(default)]
    pub keywords: Vec<KeywordScore>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub universities: Vec<University>,
    pub keywords: Vec<Keyword>,
    pub faculty: Vec<Faculty>,
    pub publications: Vec<Publication>,
}

impl Dataset {
    pub fn from_json_str(raw: &str) -> FederationResult<Self> {
        let dataset: Dataset = serde_json::from_str(raw)
            .map_err(|e| FederationError::query(format!("invalid dataset: {e}")))?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> FederationResult<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            FederationError::query(format!(
                "cannot read dataset {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn to_json(&self) -> FederationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FederationError::query(e.to_string()))
    }

    /// Checks ids, names and cross references. Every store loader calls this
    /// before touching its database.
    pub fn validate(&self) -> FederationResult<()> {
        let universities = unique_ids("university", self.universities.iter().map(|u| u.id))?;
        let keywords = unique_ids("keyword", self.keywords.iter().map(|k| k.id))?;
        unique_ids("faculty", self.faculty.iter().map(|f| f.id))?;
        let publications = unique_ids("publication", self.publications.iter().map(|p| p.id))?;

        unique_names("university", self.universities.iter().map(|u| u.name.as_str()))?;
        unique_names("keyword", self.keywords.iter().map(|k| k.name.as_str()))?;

        for faculty in &self.faculty {
            require_name("faculty", faculty.id, &faculty.name)?;
            if !universities.contains(&faculty.university_id) {
                return Err(FederationError::query(format!(
                    "faculty {} references unknown university {}",
                    faculty.id, faculty.university_id
                )));
            }
            check_scores("faculty", faculty.id, &faculty.keywords, &keywords)?;
            let mut seen = AHashSet::new();
            for publication in &faculty.publications {
                if !publications.contains(publication) {
                    return Err(FederationError::query(format!(
                        "faculty {} references unknown publication {publication}",
                        faculty.id
                    )));
                }
                if !seen.insert(*publication) {
                    return Err(FederationError::query(format!(
                        "faculty {} lists publication {publication} twice",
                        faculty.id
                    )));
                }
            }
        }
        for publication in &self.publications {
            require_name("publication", publication.id, &publication.title)?;
            if publication.num_citations < 0 {
                return Err(FederationError::query(format!(
                    "publication {} has negative citations",
                    publication.id
                )));
            }
            check_scores("publication", publication.id, &publication.keywords, &keywords)?;
        }
        Ok(())
    }

    pub fn keyword_names(&self) -> AHashMap<i64, &str> {
        self.keywords
            .iter()
            .map(|k| (k.id, k.name.as_str()))
            .collect()
    }

    pub fn university(&self, id: i64) -> Option<&University> {
        self.universities.iter().find(|u| u.id == id)
    }
}

fn unique_ids(entity: &str, ids: impl Iterator<Item = i64>) -> FederationResult<AHashSet<i64>> {
    let mut seen = AHashSet::new();
    for id in ids {
        if id <= 0 {
            return Err(FederationError::query(format!(
                "{entity} id must be positive, got {id}"
            )));
        }
        if !seen.insert(id) {
            return Err(FederationError::query(format!("duplicate {entity} id {id}")));
        }
    }
    Ok(seen)
}

fn unique_names<'a>(entity: &str, names: impl Iterator<Item = &'a str>) -> FederationResult<()> {
    let mut seen = AHashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(FederationError::query(format!("{entity} name must be set")));
        }
        if !seen.insert(name) {
            return Err(FederationError::query(format!("duplicate {entity} name {name:?}")));
        }
    }
    Ok(())
}

fn require_name(entity: &str, id: i64, name: &str) -> FederationResult<()> {
    if name.trim().is_empty() {
        return Err(FederationError::query(format!("{entity} {id} has no name")));
    }
    Ok(())
}

fn check_scores(
    entity: &str,
    id: i64,
    scores: &[KeywordScore],
    keywords: &AHashSet<i64>,
) -> FederationResult<()> {
    let mut seen = AHashSet::new();
    for entry in scores {
        if !keywords.contains(&entry.keyword_id) {
            return Err(FederationError::query(format!(
                "{entity} {id} references unknown keyword {}",
                entry.keyword_id
            )));
        }
        if !seen.insert(entry.keyword_id) {
            return Err(FederationError::query(format!(
                "{entity} {id} lists keyword {} twice",
                entry.keyword_id
            )));
        }
        if !entry.score.is_finite() {
            return Err(FederationError::query(format!(
                "{entity} {id} has a non-finite score for keyword {}",
                entry.keyword_id
            )));
        }
    }
    Ok(())
}
