mod common;

use academicfed::{
    FederationError,
    document::{Accumulator, Expr, FACULTY, Filter, PUBLICATIONS, Pipeline, SortKey, Stage},
};
use common::loaded_document;
use serde_json::{Value, json};

fn ids(docs: &[Value]) -> Vec<i64> {
    docs.iter()
        .filter_map(|doc| doc.get("id").and_then(Value::as_i64))
        .collect()
}

#[test]
fn match_on_array_path_uses_any_element() {
    let store = loaded_document();
    let docs = store
        .aggregate(
            &Pipeline::new(PUBLICATIONS).stage(Stage::Match(Filter::eq("keywords.name", "robotics"))),
        )
        .expect("aggregate");
    assert_eq!(ids(&docs), vec![3, 5]);
}

#[test]
fn combined_filters_intersect() {
    let store = loaded_document();
    let docs = store
        .aggregate(&Pipeline::new(PUBLICATIONS).stage(Stage::Match(Filter::And(vec![
            Filter::gte("year", 2019),
            Filter::eq("keywords.name", "databases"),
        ]))))
        .expect("aggregate");
    assert_eq!(ids(&docs), vec![3]);
}

#[test]
fn group_sum_sort_and_limit() {
    let store = loaded_document();
    let pipeline = Pipeline::new(PUBLICATIONS)
        .stage(Stage::Unwind("keywords".into()))
        .stage(Stage::Group {
            keys: vec![("keyword".into(), "keywords.name".into())],
            accumulator: Accumulator::Sum(Expr::Multiply(vec![
                Expr::field("keywords.score"),
                Expr::field("numCitations"),
            ])),
            output: "weighted".into(),
        })
        .stage(Stage::Sort(vec![SortKey::desc("weighted"), SortKey::asc("keyword")]))
        .stage(Stage::Limit(2));
    let docs = store.aggregate(&pipeline).expect("aggregate");
    // AI: 0.5*10 + 0.75*20 + 1.0*100; databases: 10 + 1.
    assert_eq!(
        docs,
        vec![
            json!({"keyword": "AI", "weighted": 120.0}),
            json!({"keyword": "databases", "weighted": 11.0}),
        ]
    );
}

#[test]
fn lookup_joins_referenced_documents() {
    let store = loaded_document();
    let pipeline = Pipeline::new(FACULTY)
        .stage(Stage::Match(Filter::eq("name", "F3")))
        .stage(Stage::Lookup {
            from: PUBLICATIONS.into(),
            local_field: "publications".into(),
            as_field: "papers".into(),
        });
    let docs = store.aggregate(&pipeline).expect("aggregate");
    assert_eq!(docs.len(), 1);
    let papers = docs[0]["papers"].as_array().expect("papers");
    assert_eq!(ids(papers), vec![1, 3]);
    assert_eq!(docs[0]["affiliation"]["name"], json!("U2"));
}

#[test]
fn round_stage_keeps_two_decimals() {
    let store = loaded_document();
    let pipeline = Pipeline::new(PUBLICATIONS)
        .stage(Stage::Match(Filter::eq("id", 1)))
        .stage(Stage::Group {
            keys: vec![("id".into(), "id".into())],
            accumulator: Accumulator::Sum(Expr::Multiply(vec![
                Expr::field("numCitations"),
                Expr::Literal(1.0 / 3.0),
            ])),
            output: "third".into(),
        })
        .stage(Stage::Round {
            field: "third".into(),
            places: 2,
        });
    let docs = store.aggregate(&pipeline).expect("aggregate");
    assert_eq!(docs, vec![json!({"id": 1, "third": 3.33})]);
}

#[test]
fn unsafe_paths_never_reach_sql() {
    let store = loaded_document();
    for path in ["year') OR 1=1 --", "", "a..b", "keywords[0]"] {
        let err = store
            .aggregate(&Pipeline::new(PUBLICATIONS).stage(Stage::Match(Filter::eq(path, 1))))
            .expect_err("invalid path");
        assert!(matches!(err, FederationError::QueryError(_)), "{path:?}");
    }
    let err = store
        .aggregate(&Pipeline::new("publications; DROP TABLE documents"))
        .expect_err("invalid collection");
    assert!(matches!(err, FederationError::QueryError(_)));
    assert_eq!(store.count_documents(PUBLICATIONS).expect("count"), 5);
}

#[test]
fn unknown_collection_is_empty() {
    let store = loaded_document();
    assert!(store.aggregate(&Pipeline::new("grants")).expect("aggregate").is_empty());
}
