#![allow(dead_code)]

use academicfed::{
    dataset::{Dataset, Faculty, Keyword, KeywordScore, Publication, University},
    document::DocumentStore,
    graph::GraphStore,
    relational::RelationalStore,
};

pub const AI: i64 = 1;
pub const DATABASES: i64 = 2;
pub const ROBOTICS: i64 = 3;
pub const DATA_MINING: i64 = 4;

/// Three universities, four keywords, five faculty members, five papers.
///
/// U1: F1 (AI 80, databases 60), F2 (AI 90)
/// U2: F3 (databases 70, robotics 40), F4 (AI 30)
/// U3: F5 (robotics 95), no co-authors outside U3
pub fn academic_dataset() -> Dataset {
    Dataset {
        universities: vec![
            university(1, "U1", Some("https://images.example.org/u1.png")),
            university(2, "U2", None),
            university(3, "U3", None),
        ],
        keywords: vec![
            keyword(AI, "AI"),
            keyword(DATABASES, "databases"),
            keyword(ROBOTICS, "robotics"),
            keyword(DATA_MINING, "data_mining"),
        ],
        faculty: vec![
            faculty(1, "F1", 1, &[(AI, 80.0), (DATABASES, 60.0)], &[1, 2]),
            faculty(2, "F2", 1, &[(AI, 90.0)], &[2, 3]),
            faculty(3, "F3", 2, &[(DATABASES, 70.0), (ROBOTICS, 40.0)], &[1, 3]),
            faculty(4, "F4", 2, &[(AI, 30.0)], &[4]),
            faculty(5, "F5", 3, &[(ROBOTICS, 95.0)], &[5]),
        ],
        publications: vec![
            publication(1, 2018, 10, &[(AI, 0.5), (DATABASES, 1.0)]),
            publication(2, 2019, 20, &[(AI, 0.75)]),
            publication(3, 2020, 4, &[(DATABASES, 0.25), (ROBOTICS, 1.0)]),
            publication(4, 2015, 100, &[(AI, 1.0)]),
            publication(5, 2021, 8, &[(ROBOTICS, 0.5), (DATA_MINING, 0.5)]),
        ],
    }
}

pub fn loaded_relational() -> RelationalStore {
    let store = RelationalStore::open_in_memory().expect("relational store");
    store
        .load_dataset(&academic_dataset())
        .expect("load relational");
    store
}

pub fn loaded_document() -> DocumentStore {
    let store = DocumentStore::open_in_memory().expect("document store");
    store.load_dataset(&academic_dataset()).expect("load document");
    store
}

pub fn loaded_graph() -> GraphStore {
    let store = GraphStore::open_in_memory().expect("graph store");
    store.load_dataset(&academic_dataset()).expect("load graph");
    store
}

pub fn university(id: i64, name: &str, photo_url: Option<&str>) -> University {
    University {
        id,
        name: name.to_string(),
        photo_url: photo_url.map(str::to_string),
    }
}

pub fn keyword(id: i64, name: &str) -> Keyword {
    Keyword {
        id,
        name: name.to_string(),
    }
}

pub fn scores(entries: &[(i64, f64)]) -> Vec<KeywordScore> {
    entries
        .iter()
        .map(|(keyword_id, score)| KeywordScore {
            keyword_id: *keyword_id,
            score: *score,
        })
        .collect()
}

pub fn faculty(
    id: i64,
    name: &str,
    university_id: i64,
    keywords: &[(i64, f64)],
    publications: &[i64],
) -> Faculty {
    Faculty {
        id,
        name: name.to_string(),
        university_id,
        keywords: scores(keywords),
        publications: publications.to_vec(),
    }
}

pub fn publication(id: i64, year: i32, citations: i64, keywords: &[(i64, f64)]) -> Publication {
    Publication {
        id,
        title: format!("P{id}"),
        year,
        num_citations: citations,
        keywords: scores(keywords),
    }
}
