use config::{S3Config, StoreBackend, StoreConfig};
use datafusion::error::{DataFusionError, Result};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ClientOptions;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create the object store backing the span segments
///
/// Parameters:
/// - config: Store configuration selecting the backend and its settings
///
/// Returns:
/// - Arc-wrapped ObjectStore; segment paths are relative to its root
pub fn create_object_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StoreBackend::Local => {
            // The segment prefix must exist before the first listing
            let segment_dir = std::path::Path::new(&config.path).join(&config.prefix);
            std::fs::create_dir_all(&segment_dir).map_err(|e| {
                DataFusionError::External(
                    format!("Failed to create store directory {}: {}", segment_dir.display(), e)
                        .into(),
                )
            })?;

            let store = LocalFileSystem::new_with_prefix(&config.path).map_err(|e| {
                DataFusionError::External(
                    format!("Failed to open local store at {}: {}", config.path, e).into(),
                )
            })?;
            info!(path = %config.path, "Using local filesystem store");
            Ok(Arc::new(store))
        }
        StoreBackend::S3 => create_s3_store(&config.s3),
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(InMemory::new()))
        }
    }
}

/// Create an S3-compatible object store from configuration
fn create_s3_store(config: &S3Config) -> Result<Arc<dyn ObjectStore>> {
    // Configure HTTP client options with connection pool settings
    let client_options = ClientOptions::new()
        .with_pool_max_idle_per_host(config.pool_max_idle_per_host)
        .with_pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs));

    let credentials = if config.use_env_credentials {
        // Env vars, instance profiles, etc.
        info!(bucket = %config.bucket, "Using AWS environment credential chain");
        AmazonS3Builder::from_env()
    } else {
        AmazonS3Builder::new()
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
    };

    let mut builder = credentials
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_client_options(client_options);

    // AWS uses default regional endpoints when none is given
    if !config.endpoint.is_empty() {
        builder = builder.with_endpoint(&config.endpoint);
    }

    if config.allow_http {
        builder = builder.with_allow_http(true);
    }

    if let Some(token) = &config.session_token {
        builder = builder.with_token(token);
    }

    let s3_store: Arc<dyn ObjectStore> = Arc::new(builder.build().map_err(|e| {
        DataFusionError::External(format!("Failed to build S3 object store: {}", e).into())
    })?);

    info!(bucket = %config.bucket, endpoint = %config.endpoint, "Using S3 store");
    Ok(s3_store)
}
