mod common;

use academicfed::{
    ErrorKind, Federation, LogicalRequest, Payload, QueryName, Source,
    coordinator::{LiveCounts, RequestState},
};
use common::{AI, academic_dataset};

fn handle(federation: &Federation, request: &LogicalRequest) -> Payload {
    federation
        .coordinator()
        .handle(request)
        .expect("response")
        .payload
}
use serde_json::{Value, json};

fn federation() -> Federation {
    let federation = Federation::open_in_memory().expect("federation");
    federation.load(&academic_dataset()).expect("load");
    federation
}

fn column(payload: &Payload, name: &str) -> Vec<Value> {
    payload
        .rows()
        .expect("rows payload")
        .column(name)
        .expect("column")
        .into_iter()
        .cloned()
        .collect()
}

#[test]
fn trending_routes_by_source_with_one_shape() {
    let federation = federation();
    let coordinator = federation.coordinator();
    let relational = coordinator
        .handle(&LogicalRequest::trending_keywords(2018))
        .expect("relational");
    let document = coordinator
        .handle(&LogicalRequest::trending_keywords(2018).with_source(Source::Document))
        .expect("document");
    assert_eq!(relational.source, Source::Relational);
    assert_eq!(document.source, Source::Document);
    assert_eq!(relational.payload, document.payload);
    let rows = relational.payload.rows().expect("rows");
    assert_eq!(rows.columns, vec!["keyword", "count"]);
    assert_eq!(rows.rows[0], vec![json!("AI"), json!(2)]);
}

#[test]
fn graph_cannot_serve_trending() {
    let federation = federation();
    let failure = federation
        .coordinator()
        .handle(&LogicalRequest::trending_keywords(2018).with_source(Source::Graph))
        .expect_err("unsupported source");
    assert_eq!(failure.kind, ErrorKind::QueryError);
    assert_eq!(failure.source, None);
    assert_eq!(
        failure.states,
        vec![
            RequestState::Received,
            RequestState::Failed,
            RequestState::ErrorReported
        ]
    );
}

#[test]
fn successful_request_walks_every_state() {
    let federation = federation();
    let response = federation
        .coordinator()
        .handle(&LogicalRequest::top_collaborators(1))
        .expect("collaborators");
    assert_eq!(
        response.states,
        vec![
            RequestState::Received,
            RequestState::Dispatched(Source::Graph),
            RequestState::Normalized,
            RequestState::Returned,
        ]
    );
    assert_eq!(column(&response.payload, "university"), vec![json!("U2")]);
    assert_eq!(column(&response.payload, "coauthors"), vec![json!(2)]);
}

#[test]
fn mutations_are_visible_in_live_counts() {
    let federation = federation();
    let coordinator = federation.coordinator();
    let initial = coordinator.live_counts().expect("counts");
    assert_eq!(
        initial,
        LiveCounts {
            active_faculty: 5,
            active_keywords: 4,
        }
    );

    let deleted = coordinator
        .handle(&LogicalRequest::delete_faculty(1))
        .expect("delete faculty");
    assert_eq!(deleted.counts.expect("counts").active_faculty, 4);
    let count = coordinator
        .handle(&LogicalRequest::new(QueryName::CountActiveFaculty))
        .expect("count");
    assert_eq!(count.payload.count(), Some(4));

    let deleted = coordinator
        .handle(&LogicalRequest::delete_keyword(AI))
        .expect("delete keyword");
    assert_eq!(deleted.payload.mutation().expect("receipt").edges, 3);
    assert_eq!(deleted.counts.expect("counts").active_keywords, 3);

    coordinator
        .handle(&LogicalRequest::new(QueryName::RestoreFaculty))
        .expect("restore faculty");
    let restored = coordinator
        .handle(&LogicalRequest::new(QueryName::RestoreKeyword))
        .expect("restore keyword");
    assert_eq!(restored.counts, Some(initial));
}

#[test]
fn empty_undo_stack_is_reported_as_not_found() {
    let federation = federation();
    let failure = federation
        .coordinator()
        .handle(&LogicalRequest::new(QueryName::RestoreFaculty))
        .expect_err("nothing to restore");
    assert_eq!(failure.kind, ErrorKind::NotFoundError);
    assert_eq!(failure.source, Some(Source::Relational));
    assert!(failure.message.contains("nothing to restore"));
    assert_eq!(failure.states.last(), Some(&RequestState::ErrorReported));
    assert_eq!(
        federation.coordinator().live_counts().expect("counts").active_faculty,
        5
    );
}

#[test]
fn missing_parameters_are_query_errors() {
    let federation = federation();
    let coordinator = federation.coordinator();
    for query in [
        QueryName::TrendingKeywords,
        QueryName::FacultyByKeywords,
        QueryName::TopKrcFaculty,
        QueryName::TopCollaborators,
        QueryName::DeleteFaculty,
        QueryName::DeleteKeyword,
        QueryName::UniversityInfo,
    ] {
        let failure = coordinator
            .handle(&LogicalRequest::new(query))
            .expect_err("missing parameter");
        assert_eq!(failure.kind, ErrorKind::QueryError, "{query}");
    }
    let empty: [&str; 0] = [];
    let failure = coordinator
        .handle(&LogicalRequest::faculty_by_keywords(&empty))
        .expect_err("empty set");
    assert_eq!(failure.kind, ErrorKind::QueryError);
}

#[test]
fn krc_defaults_to_document_and_can_use_relational() {
    let federation = federation();
    let coordinator = federation.coordinator();
    let document = coordinator
        .handle(&LogicalRequest::top_krc_faculty("AI", "U1"))
        .expect("document krc");
    assert_eq!(document.source, Source::Document);
    assert_eq!(column(&document.payload, "krc"), vec![json!(20.0), json!(15.0)]);

    let relational = coordinator
        .handle(&LogicalRequest::top_krc_faculty("AI", "U1").with_source(Source::Relational))
        .expect("relational krc");
    assert_eq!(relational.payload, document.payload);
}

#[test]
fn krc_honours_relational_faculty_deletes_in_both_sources() {
    let federation = federation();
    let document_krc = LogicalRequest::top_krc_faculty("AI", "U1");
    let relational_krc = document_krc.clone().with_source(Source::Relational);

    handle(&federation, &LogicalRequest::delete_faculty(1));
    let document = handle(&federation, &document_krc);
    assert_eq!(column(&document, "faculty"), vec![json!("F2")]);
    assert_eq!(column(&document, "krc"), vec![json!(15.0)]);
    assert_eq!(handle(&federation, &relational_krc), document);

    handle(&federation, &LogicalRequest::new(QueryName::RestoreFaculty));
    let document = handle(&federation, &document_krc);
    assert_eq!(column(&document, "faculty"), vec![json!("F1"), json!("F2")]);
    assert_eq!(handle(&federation, &relational_krc), document);
}

#[test]
fn keyword_deletes_leave_every_keyword_ranking() {
    let federation = federation();
    let trending = LogicalRequest::trending_keywords(2018);
    let document_trending = trending.clone().with_source(Source::Document);
    let mut universities = LogicalRequest::new(QueryName::TopUniversitiesByKeyword);
    universities.parameters.keyword = Some("AI".into());

    handle(&federation, &LogicalRequest::delete_keyword(AI));
    let relational = handle(&federation, &trending);
    assert_eq!(
        column(&relational, "keyword"),
        vec![json!("databases"), json!("robotics"), json!("data_mining")]
    );
    assert_eq!(handle(&federation, &document_trending), relational);
    let faculty = handle(&federation, &LogicalRequest::faculty_by_keywords(&["AI"]));
    assert!(faculty.rows().expect("rows").is_empty());
    let krc = handle(&federation, &LogicalRequest::top_krc_faculty("AI", "U1"));
    assert!(krc.rows().expect("rows").is_empty());
    assert!(handle(&federation, &universities).rows().expect("rows").is_empty());

    handle(&federation, &LogicalRequest::new(QueryName::RestoreKeyword));
    let relational = handle(&federation, &trending);
    assert_eq!(relational.rows().expect("rows").rows[0], vec![json!("AI"), json!(2)]);
    assert_eq!(handle(&federation, &document_trending), relational);
    assert_eq!(
        column(&handle(&federation, &universities), "university"),
        vec![json!("U1"), json!("U2")]
    );
}

#[test]
fn graph_rankings_skip_relationally_deleted_faculty() {
    let federation = federation();
    let keywords = LogicalRequest::top_keywords_by_university(1);
    let collaborators = LogicalRequest::top_collaborators(1);

    handle(&federation, &LogicalRequest::delete_faculty(2));
    let rows = handle(&federation, &keywords);
    assert_eq!(column(&rows, "keyword"), vec![json!("AI"), json!("databases")]);
    assert_eq!(column(&rows, "count"), vec![json!(1), json!(1)]);
    assert_eq!(column(&handle(&federation, &collaborators), "coauthors"), vec![json!(1)]);

    handle(&federation, &LogicalRequest::delete_faculty(1));
    assert!(handle(&federation, &collaborators).rows().expect("rows").is_empty());

    handle(&federation, &LogicalRequest::new(QueryName::RestoreFaculty));
    handle(&federation, &LogicalRequest::new(QueryName::RestoreFaculty));
    let rows = handle(&federation, &keywords);
    assert_eq!(column(&rows, "count"), vec![json!(2), json!(1)]);
    assert_eq!(column(&handle(&federation, &collaborators), "coauthors"), vec![json!(2)]);
}

#[test]
fn json_requests_use_public_query_names() {
    let federation = federation();
    let request = LogicalRequest::from_json_str(
        r#"{"queryName": "facultyByKeywords", "parameters": {"keywordSet": ["AI"], "source": "mysql"}}"#,
    )
    .expect("request");
    let response = federation.coordinator().handle(&request).expect("response");
    assert_eq!(
        column(&response.payload, "faculty"),
        vec![json!("F1"), json!("F2")]
    );
    let encoded = serde_json::to_value(&response).expect("encode");
    assert_eq!(encoded["query"], json!("facultyByKeywords"));
    assert_eq!(encoded["payload"]["type"], json!("rows"));
    assert_eq!(encoded["counts"]["activeFaculty"], json!(5));
}

#[test]
fn auxiliary_queries_are_normalized() {
    let federation = federation();
    let coordinator = federation.coordinator();
    let mut request = LogicalRequest::new(QueryName::UniversityInfo);
    request.parameters.university = Some("U1".into());
    let info = coordinator.handle(&request).expect("info");
    let rows = info.payload.rows().expect("rows");
    assert_eq!(
        rows.columns,
        vec!["universityId", "university", "photoUrl", "activeFaculty"]
    );
    assert_eq!(rows.get(0, "activeFaculty"), Some(&json!(2)));

    let keywords = coordinator
        .handle(&LogicalRequest::new(QueryName::ListKeywords).with_source(Source::Document))
        .expect("keywords");
    assert_eq!(keywords.payload.rows().expect("rows").len(), 4);

    let inventory = coordinator
        .handle(&LogicalRequest::new(QueryName::StoreInventory).with_source(Source::Graph))
        .expect("inventory");
    assert_eq!(
        column(&inventory.payload, "store"),
        vec![json!("graph"); 4]
    );

    let mut request = LogicalRequest::new(QueryName::TopUniversitiesByKeyword);
    request.parameters.keyword = Some("robot".into());
    let universities = coordinator.handle(&request).expect("universities");
    assert_eq!(
        column(&universities.payload, "university"),
        vec![json!("U2"), json!("U3")]
    );
}

#[test]
fn every_query_name_has_a_default_source() {
    for query in QueryName::ALL {
        let source = query.resolve_source(None).expect("default");
        assert!(query.sources().contains(&source));
        assert_eq!(query.as_str().parse::<QueryName>().expect("parse"), query);
    }
}
