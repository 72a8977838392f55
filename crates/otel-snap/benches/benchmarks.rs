#![forbid(unsafe_code)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::status::StatusCode;
use otel_snap_store::{QueryFilter, UnifiedStore};

fn span_batch(service: &str, n: u64) -> ExportTraceServiceRequest {
    let mut request = otel_snap_test_helpers::trace_export_request(
        service,
        otel_snap_test_helpers::otlp_span(vec![0; 16], vec![0; 8], Vec::new(), "op", 0, 1, StatusCode::Ok),
    );
    let scope = &mut request.resource_spans[0].scope_spans[0];
    for i in 1..n {
        scope.spans.push(otel_snap_test_helpers::otlp_span(
            i.to_be_bytes().repeat(2),
            i.to_be_bytes().to_vec(),
            Vec::new(),
            "op",
            i,
            i + 1,
            StatusCode::Ok,
        ));
    }
    request
}

fn bench_receive_spans(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_spans");
    for batch_size in [1_u64, 16, 256] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            let store = UnifiedStore::new(100_000, 1, 1).unwrap();
            let batch = span_batch("bench-svc", batch_size);
            b.iter(|| black_box(store.receive_spans(black_box(&batch))));
        });
    }
    group.finish();
}

fn bench_query_by_service(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_by_service");
    for ring_size in [1_000_u64, 10_000] {
        group.throughput(Throughput::Elements(ring_size));
        group.bench_with_input(BenchmarkId::from_parameter(ring_size), &ring_size, |b, &ring_size| {
            let store = UnifiedStore::new(ring_size as usize, 1, 1).unwrap();
            store.receive_spans(&span_batch("bench-svc", ring_size));
            let filter = QueryFilter { service_name: Some("bench-svc".to_string()), limit: 100, ..Default::default() };
            b.iter(|| black_box(store.query(black_box(&filter)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_receive_spans, bench_query_by_service);
criterion_main!(benches);
