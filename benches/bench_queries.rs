use std::time::Duration;

use academicfed::{
    Federation, LogicalRequest, Source,
    synthetic::{DatasetShape, generate_dataset},
};
use criterion::{Criterion, criterion_group, criterion_main};

const DATASET_SEED: u64 = 0xACAD;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

fn bench_shape() -> DatasetShape {
    #[cfg(feature = "bench-ci")]
    {
        DatasetShape::default()
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        DatasetShape::large()
    }
}

fn prepared_federation() -> Federation {
    let federation = Federation::open_in_memory().expect("federation");
    federation
        .load(&generate_dataset(&bench_shape(), DATASET_SEED))
        .expect("load");
    federation
}

fn bench_reads(c: &mut Criterion) {
    let federation = prepared_federation();
    let coordinator = federation.coordinator();
    let krc_keyword = federation.relational.list_keywords().expect("keywords")[0].clone();
    let krc_affiliation = federation.relational.list_universities().expect("universities")[0].clone();
    let keyword_set: Vec<String> = federation
        .relational
        .list_keywords()
        .expect("keywords")
        .into_iter()
        .take(5)
        .collect();

    let requests = [
        ("trending_relational", LogicalRequest::trending_keywords(2010)),
        (
            "trending_document",
            LogicalRequest::trending_keywords(2010).with_source(Source::Document),
        ),
        ("faculty_by_keywords", LogicalRequest::faculty_by_keywords(&keyword_set)),
        (
            "top_krc_document",
            LogicalRequest::top_krc_faculty(&krc_keyword, &krc_affiliation),
        ),
        ("top_keywords_by_university", LogicalRequest::top_keywords_by_university(1)),
        ("top_collaborators", LogicalRequest::top_collaborators(1)),
    ];

    let mut group = c.benchmark_group("reads");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for (label, request) in &requests {
        group.bench_function(*label, |b| {
            b.iter(|| coordinator.handle(request).expect("response"));
        });
    }
    group.finish();
}

fn bench_mutations(c: &mut Criterion) {
    let federation = prepared_federation();
    let mut group = c.benchmark_group("mutations");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    group.bench_function("delete_restore_faculty", |b| {
        b.iter(|| {
            federation.relational.delete_faculty(1).expect("delete");
            federation.relational.restore_faculty().expect("restore");
        });
    });
    group.bench_function("delete_restore_keyword", |b| {
        b.iter(|| {
            federation.graph.delete_keyword(1).expect("delete");
            federation.graph.restore_keyword().expect("restore");
        });
    });
    group.finish();
}

criterion_group!(benches, bench_reads, bench_mutations);
criterion_main!(benches);
