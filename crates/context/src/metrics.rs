use prometheus::{
    exponential_buckets, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

/// Store-level counters, exposed in Prometheus text format
///
/// Each store owns its registry, so several stores can live in one process.
#[derive(Debug, Clone)]
pub struct StoreMetrics {
    registry: Registry,
    pub spans_received: IntCounter,
    pub spans_written: IntCounter,
    pub spans_dropped: IntCounter,
    pub batches_written: IntCounter,
    pub batches_dropped: IntCounter,
    pub bulk_write_duration: Histogram,
    pub query_errors: IntCounterVec,
}

impl StoreMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let spans_received = IntCounter::new(
            "tracestore_spans_received_total",
            "Spans handed to the bulk writer",
        )?;
        let spans_written = IntCounter::new(
            "tracestore_spans_written_total",
            "Spans persisted in a segment",
        )?;
        let spans_dropped = IntCounter::new(
            "tracestore_spans_dropped_total",
            "Spans lost because their bulk write failed",
        )?;
        let batches_written = IntCounter::new(
            "tracestore_batches_written_total",
            "Successful bulk writes",
        )?;
        let batches_dropped = IntCounter::new(
            "tracestore_batches_dropped_total",
            "Failed bulk writes",
        )?;
        let bulk_write_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tracestore_bulk_write_duration_seconds",
                "Duration of one bulk write, including pool wait",
            )
            .buckets(exponential_buckets(0.001, 2.0, 15)?),
        )?;
        let query_errors = IntCounterVec::new(
            Opts::new(
                "tracestore_query_errors_total",
                "Read operations that returned an error",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(spans_received.clone()))?;
        registry.register(Box::new(spans_written.clone()))?;
        registry.register(Box::new(spans_dropped.clone()))?;
        registry.register(Box::new(batches_written.clone()))?;
        registry.register(Box::new(batches_dropped.clone()))?;
        registry.register(Box::new(bulk_write_duration.clone()))?;
        registry.register(Box::new(query_errors.clone()))?;

        Ok(Self {
            registry,
            spans_received,
            spans_written,
            spans_dropped,
            batches_written,
            batches_dropped,
            bulk_write_duration,
            query_errors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
