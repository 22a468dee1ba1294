use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use har_recorder::capture::{RequestHalf, ResourceCorrelator};
use har_recorder::clock::SystemClock;
use har_recorder::resource::{Headers, PageRef, PerformanceTiming, RequestInfo, ResponseInfo};

fn request_half(url: &str) -> RequestHalf {
    RequestHalf {
        request: RequestInfo {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: Headers::new(),
            body: None,
        },
        response: Some(ResponseInfo {
            status: 200,
            status_text: "OK".to_string(),
            headers: Headers::new(),
            body: Some("{}".to_string()),
            url: None,
        }),
        page_ref: Some(PageRef::new("page_0")),
    }
}

fn timing(url: &str) -> PerformanceTiming {
    PerformanceTiming {
        url: url.to_string(),
        duration: 1.0,
        ..Default::default()
    }
}

fn bench_pairing_with_backlog(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    // Backlog of never-completed calls on unrelated URLs
    for backlog in [0, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(backlog),
            &backlog,
            |b, &backlog| {
                let mut correlator = ResourceCorrelator::new(Arc::new(SystemClock));
                for i in 0..backlog {
                    correlator.submit_request(request_half(&format!("https://stale.test/{i}")));
                }

                b.iter(|| {
                    correlator.submit_request(request_half("https://api.test/x"));
                    black_box(correlator.submit_timing(timing("https://api.test/x")))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pairing_with_backlog);
criterion_main!(benches);
