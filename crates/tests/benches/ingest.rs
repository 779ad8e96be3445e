use context::{SpanStore, TraceQuery};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use otlp::{transform_request, KeyValue, SpanRecord};
use std::sync::Arc;
use std::time::Duration;
use tests::{memory_store, payload, span, span_id, trace_id};
use tokio::runtime::Runtime;

const SPANS_PER_TRACE: u64 = 8;

/// Records for `num_spans` spans split into traces of `SPANS_PER_TRACE`
fn generate_records(num_spans: u64) -> Vec<SpanRecord> {
    let spans = (0..num_spans)
        .map(|n| {
            let parent = (n % SPANS_PER_TRACE != 0).then(|| span_id(n - 1));
            let mut s = span(
                &trace_id(n / SPANS_PER_TRACE),
                &span_id(n),
                parent.as_deref(),
                "GET /items/{item_id}",
                n,
                n + 3,
            );
            s.attributes = vec![
                KeyValue::int("item_id", n as i64),
                KeyValue::string("http.method", "GET"),
                KeyValue::double("ratio", n as f64 / 3.0),
                KeyValue::bool("cached", n % 2 == 0),
            ];
            s
        })
        .collect();

    transform_request(&payload("bench", spans))
}

/// One bulk write per iteration, encoding included
fn bench_bulk_write(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bulk_write");
    group.measurement_time(Duration::from_secs(20));
    group.sample_size(20);

    for batch_size in [512u64, 2048, 8192] {
        let records = generate_records(batch_size);
        let store = Arc::new(memory_store().unwrap());
        group.throughput(Throughput::Elements(batch_size));

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &records,
            |b, records| {
                b.to_async(&rt).iter(|| {
                    let store = Arc::clone(&store);
                    async move {
                        let outcome = store.write_spans(records).await;
                        assert_eq!(outcome.rows_written(), records.len());
                    }
                });
            },
        );
    }

    group.finish();
}

/// Trace list queries over a store holding `segments` segments of 2048 spans
fn bench_search(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("search_traces");
    group.sample_size(10);

    for segments in [1u64, 8] {
        let store: Arc<SpanStore> = Arc::new(memory_store().unwrap());
        rt.block_on(async {
            for _ in 0..segments {
                store.write_spans(&generate_records(2048)).await;
            }
        });

        let query = TraceQuery {
            limit: Some(50),
            operation: Some("items".to_string()),
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("segments", segments), &query, |b, query| {
            b.to_async(&rt).iter(|| {
                let store = Arc::clone(&store);
                async move {
                    let page = store.search_traces(query).await.unwrap();
                    assert!(!page.traces.is_empty());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bulk_write, bench_search);
criterion_main!(benches);
