use async_trait::async_trait;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::catalog::Session;
use datafusion::datasource::file_format::parquet::ParquetFormat;
use datafusion::datasource::file_format::FileFormat;
use datafusion::datasource::physical_plan::FileScanConfigBuilder;
use datafusion::datasource::{TableProvider, TableType};
use datafusion::error::{DataFusionError, Result};
use datafusion::execution::context::SessionContext;
use datafusion::execution::object_store::ObjectStoreUrl;
use datafusion::logical_expr::Expr;
use datafusion::physical_plan::empty::EmptyExec;
use datafusion::physical_plan::ExecutionPlan;
use datafusion_datasource::PartitionedFile;
use std::any::Any;
use std::sync::Arc;
use storage::{spans_schema, SegmentStorage};
use tracing::debug;

/// Name under which the span segments are queryable
pub const SPANS_TABLE: &str = "spans";

/// Object store URL the segment store is registered under
pub const STORE_URL: &str = "tracestore://store";

/// SpanTableProvider - Exposes every Parquet segment under the store prefix as one table
///
/// Segments are listed on each scan, so a query sees every segment whose
/// write completed before planning.
#[derive(Debug)]
pub struct SpanTableProvider {
    /// The fixed schema of every segment
    schema: SchemaRef,
    /// Segment discovery over the object store
    segments: SegmentStorage,
    /// The parquet file format
    file_format: Arc<ParquetFormat>,
    store_url: ObjectStoreUrl,
}

impl SpanTableProvider {
    pub fn try_new(segments: SegmentStorage) -> Result<Self> {
        Ok(Self {
            schema: spans_schema(),
            segments,
            file_format: Arc::new(ParquetFormat::default()),
            store_url: ObjectStoreUrl::parse(STORE_URL)?,
        })
    }
}

#[async_trait]
impl TableProvider for SpanTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        limit: Option<usize>,
    ) -> Result<Arc<dyn ExecutionPlan>> {
        let segments = self.segments.discover_segments().await?;
        debug!(segments = segments.len(), "Planning span scan");

        // Nothing written yet
        if segments.is_empty() {
            let projected = match projection {
                Some(proj) => Arc::new(self.schema.project(proj)?),
                None => self.schema(),
            };
            return Ok(Arc::new(EmptyExec::new(projected)));
        }

        let file_source = self.file_format.file_source();
        let mut config_builder =
            FileScanConfigBuilder::new(self.store_url.clone(), self.schema(), file_source);

        for segment in &segments {
            config_builder = config_builder
                .with_file(PartitionedFile::new(segment.path.to_string(), segment.size));
        }

        if let Some(proj) = projection {
            config_builder = config_builder.with_projection_indices(Some(proj.clone()));
        }

        config_builder = config_builder.with_limit(limit);

        // Filters are applied above the scan
        self.file_format
            .create_physical_plan(state, config_builder.build())
            .await
    }
}

/// Register the segment object store and the `spans` table with the session context
///
/// Parameters:
/// - ctx: The DataFusion session context
/// - segments: Segment storage over the configured object store
pub fn register_spans_table(ctx: &SessionContext, segments: SegmentStorage) -> Result<()> {
    let store_url = url::Url::parse(STORE_URL)
        .map_err(|e| DataFusionError::External(format!("Failed to parse store URL: {}", e).into()))?;
    ctx.register_object_store(&store_url, Arc::clone(segments.object_store()));

    let table_provider = SpanTableProvider::try_new(segments)?;
    ctx.register_table(SPANS_TABLE, Arc::new(table_provider))?;

    Ok(())
}
