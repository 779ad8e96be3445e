use otlp::{transform_request, ExportTraceRequest, SpanRecord};
use serde::Serialize;
use tracing::{debug, error};

use crate::store::SpanStore;

/// What happened to one bulk write
///
/// A failed write is not an error for the caller: the batch is dropped,
/// logged and counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Nothing to write
    Skipped,
    Written { rows: usize, segment: String },
    Dropped { rows: usize, error: String },
}

impl WriteOutcome {
    pub fn rows_written(&self) -> usize {
        match self {
            Self::Written { rows, .. } => *rows,
            _ => 0,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

impl SpanStore {
    /// Transform one ingestion payload and bulk-write its spans
    pub async fn ingest(&self, request: &ExportTraceRequest) -> WriteOutcome {
        let records = transform_request(request);
        self.write_spans(&records).await
    }

    /// Write all records as a single segment
    ///
    /// Storage, timeout and pool failures are absorbed here and reported
    /// as `WriteOutcome::Dropped`.
    pub async fn write_spans(&self, records: &[SpanRecord]) -> WriteOutcome {
        if records.is_empty() {
            return WriteOutcome::Skipped;
        }

        let rows = records.len();
        self.metrics.spans_received.inc_by(rows as u64);
        let timer = self.metrics.bulk_write_duration.start_timer();

        let result = self
            .pool
            .run("bulk_write", async {
                Ok(self.segments.write_segment(records).await?)
            })
            .await;
        timer.observe_duration();

        match result {
            Ok(segment) => {
                self.metrics.batches_written.inc();
                self.metrics.spans_written.inc_by(rows as u64);
                debug!(rows, segment = %segment.path, bytes = segment.bytes, "Bulk write complete");
                WriteOutcome::Written {
                    rows,
                    segment: segment.path.to_string(),
                }
            }
            Err(e) => {
                self.metrics.batches_dropped.inc();
                self.metrics.spans_dropped.inc_by(rows as u64);
                error!(rows, error = %e, "Bulk write failed, dropping batch");
                WriteOutcome::Dropped {
                    rows,
                    error: e.to_string(),
                }
            }
        }
    }
}
