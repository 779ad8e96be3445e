use config::{Config, DataFusionConfig, QueryConfig};
use datafusion::prelude::*;
use object_store::ObjectStore;
use provider::{register_spans_table, register_udfs};
use std::future::Future;
use std::sync::Arc;
use storage::{create_object_store, SegmentStorage};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::metrics::StoreMetrics;
use crate::pool::ConnectionPool;

/// Handle to the span store
///
/// Constructed once by the composition root and shared as `Arc<SpanStore>`.
/// All operations go through the connection pool.
pub struct SpanStore {
    pub(crate) ctx: SessionContext,
    pub(crate) segments: SegmentStorage,
    pub(crate) pool: ConnectionPool,
    pub(crate) metrics: StoreMetrics,
    pub(crate) query: QueryConfig,
}

/// Create a new DataFusion session context for span queries
pub fn create_context(config: &DataFusionConfig) -> SessionContext {
    // Determine optimal parallelism based on CPU count
    let target_partitions = if config.target_partitions > 0 {
        config.target_partitions
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
    };

    let session_config = SessionConfig::default()
        .with_information_schema(true)
        .with_target_partitions(target_partitions)
        .with_repartition_file_scans(true)
        .with_repartition_joins(true)
        .with_repartition_aggregations(true)
        .with_parquet_pruning(config.parquet_pruning);

    let ctx = SessionContext::new_with_config(session_config);
    register_udfs(&ctx);
    ctx
}

/// Build a store over the object store described by the configuration
pub fn create_store(config: &Config) -> Result<SpanStore> {
    let object_store = create_object_store(&config.store)?;
    open_store(config, object_store)
}

/// Build a store over an existing object store
///
/// Parameters:
/// - config: Store, query and DataFusion settings; the store backend is ignored
/// - object_store: Where segments are read from and written to
pub fn open_store(config: &Config, object_store: Arc<dyn ObjectStore>) -> Result<SpanStore> {
    config
        .store
        .validate()
        .and_then(|_| config.query.validate())
        .map_err(|e| StoreError::Config(format!("{:#}", e)))?;

    let ctx = create_context(&config.datafusion);
    let segments = SegmentStorage::new(object_store, config.store.prefix.as_str());
    register_spans_table(&ctx, segments.clone())?;

    let pool = ConnectionPool::new(
        config.store.max_connections,
        config.store.acquire_timeout(),
        config.store.command_timeout(),
    );

    info!(
        backend = ?config.store.backend,
        prefix = %config.store.prefix,
        max_connections = config.store.max_connections,
        acquire_timeout_secs = config.store.acquire_timeout_secs,
        command_timeout_secs = config.store.command_timeout_secs,
        "Span store opened"
    );
    if !config.query.adhoc_read_only {
        warn!("Ad-hoc queries are not restricted to read-only statements");
    }

    Ok(SpanStore {
        ctx,
        segments,
        pool,
        metrics: StoreMetrics::new()?,
        query: config.query.clone(),
    })
}

impl SpanStore {
    /// Run a read operation on a pooled connection, counting failures
    pub(crate) async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = self.pool.run(operation, fut).await;
        if let Err(e) = &result {
            self.metrics
                .query_errors
                .with_label_values(&[operation])
                .inc();
            warn!(operation, error = %e, "Store operation failed");
        }
        result
    }

    /// Close the pool; later operations fail with `StoreError::Closed`
    pub fn close(&self) {
        self.pool.close();
        info!("Span store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query
    }

    pub fn segments(&self) -> &SegmentStorage {
        &self.segments
    }
}
