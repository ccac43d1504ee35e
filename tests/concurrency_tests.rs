mod common;

use std::thread;

use academicfed::{
    Federation, FederationConfig, LogicalRequest, QueryName, StoreConfig, StoreLocation,
};
use common::{AI, academic_dataset};
use tempfile::TempDir;

const CYCLES: usize = 25;
const READERS: usize = 3;

fn file_federation(dir: &TempDir) -> Federation {
    let mut config = FederationConfig::default();
    config.relational.store = StoreConfig::file(dir.path().join("relational.db")).with_pool_size(4);
    config.document = StoreConfig::file(dir.path().join("document.db")).with_pool_size(4);
    config.graph = StoreConfig::file(dir.path().join("graph.db")).with_pool_size(4);
    let federation = Federation::open(&config).expect("federation");
    federation.load(&academic_dataset()).expect("load");
    federation
}

#[test]
fn readers_only_see_committed_states() {
    let dir = TempDir::new().expect("tempdir");
    let federation = file_federation(&dir);
    assert!(matches!(
        federation.relational.pool().config().location,
        StoreLocation::File(_)
    ));

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..CYCLES {
                federation.relational.delete_faculty(1).expect("delete faculty");
                federation.relational.restore_faculty().expect("restore faculty");
            }
        });
        scope.spawn(|| {
            for _ in 0..CYCLES {
                federation.graph.delete_keyword(AI).expect("delete keyword");
                federation.graph.restore_keyword().expect("restore keyword");
            }
        });
        for _ in 0..READERS {
            scope.spawn(|| {
                let coordinator = federation.coordinator();
                for _ in 0..CYCLES {
                    let counts = coordinator.live_counts().expect("counts");
                    assert!(
                        (4..=5).contains(&counts.active_faculty),
                        "partial faculty state: {counts:?}"
                    );
                    assert!(
                        (3..=4).contains(&counts.active_keywords),
                        "partial keyword state: {counts:?}"
                    );

                    let faculty = federation
                        .relational
                        .query_faculty_by_keywords(&["AI"])
                        .expect("faculty");
                    assert!(faculty.iter().any(|row| row.faculty == "F2"));

                    let keywords = federation
                        .graph
                        .query_top_keywords_by_university(1)
                        .expect("keywords");
                    // AI and its two edges from U1 vanish and return together.
                    let ai = keywords.iter().find(|row| row.keyword_id == AI);
                    assert!(ai.is_none_or(|row| row.count == 2), "{keywords:?}");
                }
            });
        }
    });

    let counts = federation.coordinator().live_counts().expect("counts");
    assert_eq!(counts.active_faculty, 5);
    assert_eq!(counts.active_keywords, 4);
    assert!(federation.relational.stats_drift().expect("drift").is_empty());
    assert_eq!(federation.relational.pending_restores().expect("pending"), 0);
    assert_eq!(federation.graph.pending_restores().expect("pending"), 0);
    assert_eq!(federation.graph.dangling_keyword_edges().expect("dangling"), 0);
}

#[test]
fn concurrent_requests_through_one_coordinator() {
    let dir = TempDir::new().expect("tempdir");
    let federation = file_federation(&dir);
    let coordinator = federation.coordinator();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let coordinator = &coordinator;
                scope.spawn(move || {
                    let request = match worker % 2 {
                        0 => LogicalRequest::trending_keywords(2018),
                        _ => LogicalRequest::top_krc_faculty("AI", "U1"),
                    };
                    (0..CYCLES)
                        .map(|_| coordinator.handle(&request).expect("response").payload)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            let payloads = handle.join().expect("worker");
            assert!(payloads.windows(2).all(|pair| pair[0] == pair[1]));
        }
    });

    let count = coordinator
        .handle(&LogicalRequest::new(QueryName::CountActiveFaculty))
        .expect("count");
    assert_eq!(count.payload.count(), Some(5));
}
