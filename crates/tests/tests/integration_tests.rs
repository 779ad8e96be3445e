use config::Config;
use context::{open_store, TraceLookup, TraceQuery, WriteOutcome};
use futures::future::join_all;
use object_store::local::LocalFileSystem;
use serde_json::json;
use std::sync::Arc;
use test_each_file::test_each_file;
use tests::{load_payload, memory_store, parse_payload, payload, span, span_id, trace_id, T0};

const CHECKOUT_TRACE: &str = "5b8efff798038103d269b633813fc60c";

fn all_traces() -> TraceQuery {
    TraceQuery::default()
}

test_each_file! { #[tokio::test] async for ["json"] in "./crates/tests/payloads" => test_payload_round_trip }

async fn test_payload_round_trip([input]: [&str; 1]) {
    let request = parse_payload(input).expect("Failed to parse payload");
    let store = memory_store().expect("Failed to open store");

    let outcome = store.ingest(&request).await;
    assert_eq!(outcome.rows_written(), request.span_count());

    // One stored row per wire span
    let result = store
        .execute_adhoc("SELECT trace_id, span_id, parent_span_id FROM spans")
        .await
        .expect("Failed to count spans");
    assert_eq!(result.row_count, request.span_count());

    // Every trace in the payload is listed and can be loaded
    let mut expected_traces: Vec<&str> = request
        .resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
        .map(|s| s.trace_id.as_str())
        .collect();
    expected_traces.sort();
    expected_traces.dedup();

    let page = store.search_traces(&all_traces()).await.expect("Search failed");
    assert_eq!(page.pagination.total as usize, expected_traces.len());

    for trace in expected_traces {
        let lookup = store.trace_detail(trace).await.expect("Detail failed");
        assert!(lookup.is_found(), "trace {} not found", trace);
    }
}

#[tokio::test]
async fn test_checkout_scenario() {
    let store = memory_store().unwrap();
    let request = load_payload("checkout.json").unwrap();
    assert!(matches!(
        store.ingest(&request).await,
        WriteOutcome::Written { rows: 2, .. }
    ));

    let page = store.search_traces(&all_traces()).await.unwrap();
    assert_eq!(page.traces.len(), 1);
    let summary = &page.traces[0];
    assert_eq!(summary.trace_id, CHECKOUT_TRACE);
    assert_eq!(summary.span_count, 2);
    assert_eq!(summary.root_operation, "POST /pay");
    assert_eq!(summary.root_service, "checkout");
    assert_eq!(summary.duration_ms, 150.0);

    let TraceLookup::Found(detail) = store.trace_detail(CHECKOUT_TRACE).await.unwrap() else {
        panic!("checkout trace should be found");
    };
    let names: Vec<_> = detail.spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["POST /pay", "db.query"]);
    assert_eq!(detail.spans[0].duration_ms, 150.0);
    assert_eq!(detail.spans[1].duration_ms, 50.0);
    assert_eq!(detail.spans[1].parent_span_id.as_deref(), Some("aaaaaaaaaaaaaaaa"));
    assert_eq!(detail.spans[0].attributes, json!({"http.method": "POST", "http.status_code": 200}));
    assert_eq!(detail.spans[1].events[0]["name"], json!("rows.fetched"));
    assert_eq!(detail.spans[0].scope_name.as_deref(), Some("io.opentelemetry.http"));
    assert_eq!(detail.service_name, "checkout");
    assert_eq!(detail.operation_name, "POST /pay");
    assert_eq!(detail.duration_ms, 200.0);
    assert_eq!(detail.elapsed_ms, 150.0);
    assert_eq!(detail.start_time, "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn test_templated_names_and_duration_fallback() {
    let store = memory_store().unwrap();
    store.ingest(&load_payload("templated_names.json").unwrap()).await;

    let TraceLookup::Found(detail) = store
        .trace_detail("0af7651916cd43dd8448eb211c80319c")
        .await
        .unwrap()
    else {
        panic!("trace should be found");
    };
    assert_eq!(detail.operation_name, "GET /orders/1234");
    assert_eq!(detail.spans[1].name, "cache.get {missing}");
    assert_eq!(detail.spans[1].kind, 3);
    // Zero-length span reports its duration_ms attribute
    assert_eq!(detail.spans[1].duration_ms, 1.5);
    assert_eq!(detail.duration_ms, 41.5);
}

#[tokio::test]
async fn test_root_resolution_is_order_independent() {
    let t = trace_id(0);
    let (root, child, grandchild) = (span_id(0), span_id(1), span_id(2));
    let spans = vec![
        span(&t, &root, None, "root", 5, 100),
        span(&t, &child, Some(&root), "child", 0, 50),
        span(&t, &grandchild, Some(&child), "grandchild", 10, 20),
    ];

    for rotation in 0..spans.len() {
        let mut ordered = spans.clone();
        ordered.rotate_left(rotation);

        let store = memory_store().unwrap();
        store.ingest(&payload("svc", ordered)).await;

        let page = store.search_traces(&all_traces()).await.unwrap();
        assert_eq!(page.traces[0].root_operation, "root");
        assert_eq!(page.traces[0].root_service, "svc");
        // The earliest span is not the root
        assert_eq!(page.traces[0].duration_ms, 100.0);

        let TraceLookup::Found(detail) = store.trace_detail(&t).await.unwrap() else {
            panic!("trace should be found");
        };
        assert_eq!(detail.operation_name, "root");
        assert_eq!(detail.spans[0].name, "child");
    }
}

#[tokio::test]
async fn test_multi_resource_services() {
    let store = memory_store().unwrap();
    store.ingest(&load_payload("multi_resource.json").unwrap()).await;

    let page = store.search_traces(&all_traces()).await.unwrap();
    let by_id = |id: &str| {
        page.traces
            .iter()
            .find(|t| t.trace_id == id)
            .unwrap_or_else(|| panic!("missing trace {}", id))
    };

    let cart = by_id("11111111111111111111111111111111");
    assert_eq!(cart.span_count, 2);
    assert_eq!(cart.root_service, "frontend");
    assert_eq!(cart.root_operation, "GET /cart");

    assert_eq!(by_id("33333333333333333333333333333333").root_service, "unknown");

    let q = TraceQuery {
        service: Some("cart".into()),
        ..all_traces()
    };
    let page = store.search_traces(&q).await.unwrap();
    let ids: Vec<_> = page.traces.iter().map(|t| t.trace_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["22222222222222222222222222222222", "11111111111111111111111111111111"]
    );
}

#[tokio::test]
async fn test_attribute_queries() {
    let store = memory_store().unwrap();
    store.ingest(&load_payload("mixed_attributes.json").unwrap()).await;

    let result = store
        .execute_adhoc(
            "SELECT name, attr_num(attributes, 'retries') AS retries, \
             attr_str(attributes, 'whole') AS whole, attr_str(attributes, 'cached') AS cached, \
             attr_str(resource_attributes, 'process.pid') AS pid \
             FROM spans",
        )
        .await
        .unwrap();
    let row = &result.rows[0];
    assert_eq!(row["name"], json!("job resize"));
    assert_eq!(row["retries"], json!(3.0));
    assert_eq!(row["whole"], json!("3.0"));
    assert_eq!(row["cached"], json!("false"));
    assert_eq!(row["pid"], json!("4242"));
}

#[tokio::test]
async fn test_filters() {
    let store = memory_store().unwrap();
    store.ingest(&load_payload("checkout.json").unwrap()).await;
    store.ingest(&load_payload("templated_names.json").unwrap()).await;
    store.ingest(&load_payload("multi_resource.json").unwrap()).await;

    let count = |q: TraceQuery| {
        let store = &store;
        async move { store.search_traces(&q).await.unwrap().pagination.total }
    };

    assert_eq!(count(all_traces()).await, 5);
    assert_eq!(
        count(TraceQuery {
            operation: Some("Cart".into()),
            ..all_traces()
        })
        .await,
        1
    );
    assert_eq!(
        count(TraceQuery {
            start_time: Some("2023-11-14T22:13:22Z".into()),
            ..all_traces()
        })
        .await,
        3
    );
    assert_eq!(
        count(TraceQuery {
            end_time: Some((T0 + 1_000_000_000).to_string()),
            ..all_traces()
        })
        .await,
        1
    );
    // Unparsable bounds are ignored
    assert_eq!(
        count(TraceQuery {
            start_time: Some("last tuesday".into()),
            ..all_traces()
        })
        .await,
        5
    );
    assert_eq!(
        count(TraceQuery {
            service: Some("checkout".into()),
            operation: Some("db.".into()),
            ..all_traces()
        })
        .await,
        1
    );
    assert_eq!(
        count(TraceQuery {
            service: Some("nobody".into()),
            ..all_traces()
        })
        .await,
        0
    );
}

#[tokio::test]
async fn test_pagination_covers_every_trace_once() {
    let store = memory_store().unwrap();
    let traces = 23u64;

    // Pairs of traces share a start time to exercise the tie-break
    let spans = (0..traces)
        .map(|n| span(&trace_id(n), &span_id(n), None, "op", n / 2, n / 2 + 1))
        .collect();
    store.ingest(&payload("svc", spans)).await;

    let limit = 5;
    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let q = TraceQuery {
            offset,
            limit: Some(limit),
            ..all_traces()
        };
        let page = store.search_traces(&q).await.unwrap();
        assert_eq!(page.pagination.total, traces);
        assert_eq!(page.pagination.has_prev, offset > 0);
        seen.extend(page.traces.iter().map(|t| t.trace_id.clone()));

        if !page.pagination.has_next {
            break;
        }
        offset += limit;
    }

    assert_eq!(seen.len(), traces as usize);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), traces as usize);

    // Latest first, ties by trace id ascending
    assert_eq!(seen[0], trace_id(22));
    assert_eq!(seen[1], trace_id(20));
    assert_eq!(seen[2], trace_id(21));
}

#[tokio::test]
async fn test_storage_failure_still_acknowledges() {
    // A store rooted at a regular file cannot create segment directories
    let file = std::env::temp_dir().join(format!("tracestore-it-not-a-dir-{}", std::process::id()));
    std::fs::write(&file, b"x").unwrap();
    let store = open_store(
        &Config::in_memory(),
        Arc::new(LocalFileSystem::new_with_prefix(&file).unwrap()),
    )
    .unwrap();

    let request = load_payload("checkout.json").unwrap();
    let outcome = store.ingest(&request).await;
    assert!(matches!(outcome, WriteOutcome::Dropped { rows: 2, .. }));
    assert_eq!(store.metrics().spans_dropped.get(), 2);

    // A second write fails independently
    assert!(store.ingest(&request).await.is_dropped());
    assert_eq!(store.metrics().batches_dropped.get(), 2);

    std::fs::remove_file(&file).unwrap();
}

#[tokio::test]
async fn test_concurrent_ingestion_and_queries() {
    let store = Arc::new(memory_store().unwrap());

    let writes = (0..8u64).map(|n| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let t = trace_id(100 + n);
            store
                .ingest(&payload("svc", vec![span(&t, &span_id(n), None, "op", n, n + 1)]))
                .await
        })
    });
    let reads = (0..8).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.search_traces(&TraceQuery::default()).await })
    });

    for outcome in join_all(writes).await {
        assert_eq!(outcome.unwrap().rows_written(), 1);
    }
    for page in join_all(reads).await {
        assert!(page.unwrap().is_ok());
    }

    let page = store.search_traces(&all_traces()).await.unwrap();
    assert_eq!(page.pagination.total, 8);
    assert_eq!(store.segments().discover_segments().await.unwrap().len(), 8);
}
