mod common;

use academicfed::{
    FederationError,
    document::{FACULTY, PUBLICATIONS},
    dataset::Dataset,
    document::DocumentStore,
    dual_read::{DualReadResult, compare_top_krc, compare_trending},
    model::{Exclusions, KeywordCount},
    relational::RelationalStore,
};
use common::{
    AI, faculty, keyword, loaded_document, loaded_relational, publication, university,
};

#[test]
fn trending_matches_relational_definition() {
    let document = loaded_document();
    let relational = loaded_relational();
    for year in [2000, 2018, 2019, 2020, 2021, 2030] {
        assert_eq!(
            compare_trending(&relational, &document, year, &Exclusions::none())
                .expect("compare"),
            DualReadResult::Match,
            "sources disagree for {year}"
        );
    }
    assert_eq!(
        document.query_trending_keywords_doc(2020).expect("trending"),
        vec![
            KeywordCount {
                keyword: "robotics".into(),
                count: 2,
            },
            KeywordCount {
                keyword: "data_mining".into(),
                count: 1,
            },
            KeywordCount {
                keyword: "databases".into(),
                count: 1,
            },
        ]
    );
}

#[test]
fn top_krc_faculty_ranks_by_score() {
    let document = loaded_document();
    let rows = document.query_top_krc_faculty("AI", "U1").expect("krc");
    let scores: Vec<(i64, &str, f64)> = rows
        .iter()
        .map(|r| (r.faculty_id, r.faculty.as_str(), r.krc))
        .collect();
    assert_eq!(scores, vec![(1, "F1", 20.0), (2, "F2", 15.0)]);

    let rows = document.query_top_krc_faculty("databases", "U1").expect("krc");
    let scores: Vec<f64> = rows.iter().map(|r| r.krc).collect();
    assert_eq!(scores, vec![10.0, 1.0]);
}

#[test]
fn unknown_keyword_or_affiliation_yields_no_rows() {
    let document = loaded_document();
    assert!(document.query_top_krc_faculty("AI", "Nowhere").expect("krc").is_empty());
    assert!(document.query_top_krc_faculty("chemistry", "U1").expect("krc").is_empty());
    assert!(
        document
            .query_top_krc_faculty("AI' || '1", "U1' OR 1=1 --")
            .expect("krc")
            .is_empty()
    );
}

#[test]
fn krc_sources_agree_after_relational_soft_delete() {
    let document = loaded_document();
    let relational = loaded_relational();
    let krc = |exclusions: &Exclusions| {
        compare_top_krc(&relational, &document, "AI", "U1", exclusions).expect("compare")
    };
    assert_eq!(krc(&Exclusions::none()), DualReadResult::Match);

    relational.delete_faculty(1).expect("delete");
    let exclusions = Exclusions {
        faculty_ids: relational.inactive_faculty_ids().expect("inactive"),
        keywords: Vec::new(),
    };
    assert_eq!(exclusions.faculty_ids, vec![1]);
    assert_eq!(krc(&exclusions), DualReadResult::Match);
    let rows = document
        .query_top_krc_faculty_excluding("AI", "U1", &exclusions)
        .expect("krc");
    let scores: Vec<(i64, f64)> = rows.iter().map(|r| (r.faculty_id, r.krc)).collect();
    assert_eq!(scores, vec![(2, 15.0)]);

    relational.restore_faculty().expect("restore");
    assert!(relational.inactive_faculty_ids().expect("inactive").is_empty());
    assert_eq!(krc(&Exclusions::none()), DualReadResult::Match);
}

#[test]
fn deleted_keywords_leave_document_rankings() {
    let document = loaded_document();
    let relational = loaded_relational();
    let exclusions = Exclusions {
        faculty_ids: Vec::new(),
        keywords: vec!["AI".into()],
    };
    let trending = document
        .query_trending_keywords_doc_excluding(2000, &exclusions)
        .expect("trending");
    let names: Vec<&str> = trending.iter().map(|r| r.keyword.as_str()).collect();
    assert_eq!(names, vec!["databases", "robotics", "data_mining"]);
    assert_eq!(
        compare_trending(&relational, &document, 2000, &exclusions).expect("compare"),
        DualReadResult::Match
    );
    assert!(
        document
            .query_top_krc_faculty_excluding("AI", "U1", &exclusions)
            .expect("krc")
            .is_empty()
    );
    assert_eq!(
        compare_top_krc(&relational, &document, "AI", "U1", &exclusions).expect("compare"),
        DualReadResult::Match
    );
}

/// One author whose AI terms sum to 0.545 in publication order but to
/// 0.5449999999999999 in any other order, so the rounded score depends on
/// summation order.
fn order_sensitive_dataset() -> Dataset {
    Dataset {
        universities: vec![university(1, "U1", None)],
        keywords: vec![keyword(AI, "AI")],
        faculty: vec![faculty(1, "F1", 1, &[(AI, 50.0)], &[3, 1, 2])],
        publications: vec![
            publication(1, 2020, 1, &[(AI, 0.1)]),
            publication(2, 2020, 1, &[(AI, 0.3)]),
            publication(3, 2020, 1, &[(AI, 0.145)]),
        ],
    }
}

#[test]
fn krc_rounding_is_identical_across_sources() {
    let dataset = order_sensitive_dataset();
    let document = DocumentStore::open_in_memory().expect("document store");
    document.load_dataset(&dataset).expect("load document");
    let relational = RelationalStore::open_in_memory().expect("relational store");
    relational.load_dataset(&dataset).expect("load relational");

    let rows = document.query_top_krc_faculty("AI", "U1").expect("krc");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].krc, 0.55);
    assert_eq!(
        relational.query_top_krc_faculty("AI", "U1").expect("krc"),
        rows
    );
}

#[test]
fn distinct_values_and_inventory() {
    let document = loaded_document();
    assert_eq!(
        document.distinct_affiliations().expect("affiliations"),
        vec!["U1", "U2", "U3"]
    );
    assert_eq!(
        document.distinct_keywords().expect("keywords"),
        vec!["AI", "data_mining", "databases", "robotics"]
    );
    assert_eq!(
        document.collections().expect("collections"),
        vec![FACULTY, PUBLICATIONS]
    );
    assert_eq!(document.count_documents(PUBLICATIONS).expect("count"), 5);
    assert_eq!(document.count_documents(FACULTY).expect("count"), 5);
    assert!(matches!(
        document.count_documents("grants"),
        Err(FederationError::NotFound(_))
    ));
    let inventory = document.inventory().expect("inventory");
    assert_eq!(inventory.len(), 2);
    assert!(inventory.iter().all(|entry| entry.count == 5));
}

#[test]
fn reloading_replaces_previous_documents() {
    let document = loaded_document();
    let mut dataset = common::academic_dataset();
    dataset.publications.truncate(2);
    for faculty in &mut dataset.faculty {
        faculty.publications.retain(|id| *id <= 2);
    }
    document.load_dataset(&dataset).expect("reload");
    assert_eq!(document.count_documents(PUBLICATIONS).expect("count"), 2);
    assert_eq!(
        document.distinct_keywords().expect("keywords"),
        vec!["AI", "databases"]
    );
}
