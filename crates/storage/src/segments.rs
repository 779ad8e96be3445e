use chrono::{DateTime, Utc};
use datafusion::error::{DataFusionError, Result};
use futures_util::stream::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use otlp::SpanRecord;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::encoder::{encode_parquet, records_to_batch};

const SEGMENT_EXTENSION: &str = "parquet";

/// A segment found under the store prefix
#[derive(Debug, Clone)]
pub struct DiscoveredSegment {
    pub path: ObjectPath,
    pub size: u64,
}

/// Result of one bulk write
#[derive(Debug, Clone)]
pub struct WrittenSegment {
    pub path: ObjectPath,
    pub rows: usize,
    pub bytes: usize,
}

/// SegmentStorage - Writes span segments and discovers them for scanning
///
/// Every segment is one immutable Parquet file at
/// `<prefix>/<YYYY-MM-DD>/<uuid>.parquet`.
#[derive(Debug, Clone)]
pub struct SegmentStorage {
    object_store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl SegmentStorage {
    pub fn new(object_store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            object_store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Path of a new segment written at `now`
    pub fn segment_path(&self, now: DateTime<Utc>) -> ObjectPath {
        ObjectPath::from(format!(
            "{}/{}/{}.{}",
            self.prefix,
            now.format("%Y-%m-%d"),
            Uuid::new_v4(),
            SEGMENT_EXTENSION
        ))
    }

    /// Encode all records as one segment and store it with a single put
    pub async fn write_segment(&self, records: &[SpanRecord]) -> Result<WrittenSegment> {
        let batch = records_to_batch(records)?;
        let bytes = encode_parquet(&batch)?;
        let size = bytes.len();
        let path = self.segment_path(Utc::now());

        self.object_store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| {
                DataFusionError::External(format!("Failed to put segment {}: {}", path, e).into())
            })?;

        debug!(path = %path, rows = records.len(), bytes = size, "Wrote segment");

        Ok(WrittenSegment {
            path,
            rows: records.len(),
            bytes: size,
        })
    }

    /// List every segment under the prefix, sorted by path
    pub async fn discover_segments(&self) -> Result<Vec<DiscoveredSegment>> {
        let all_objects: Vec<_> = self
            .object_store
            .list(Some(&ObjectPath::from(self.prefix.as_str())))
            .try_collect()
            .await
            .map_err(|e| {
                DataFusionError::External(format!("Failed to list segments: {}", e).into())
            })?;

        let mut segments: Vec<_> = all_objects
            .into_iter()
            .filter(|obj| obj.location.extension() == Some(SEGMENT_EXTENSION))
            .map(|obj| DiscoveredSegment {
                path: obj.location,
                size: obj.size,
            })
            .collect();
        segments.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Found {} segments under prefix '{}'",
            segments.len(),
            self.prefix
        );

        Ok(segments)
    }

    /// Get a reference to the object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.object_store
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
