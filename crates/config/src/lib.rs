use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Span store configuration (object store backend, pool sizing, timeouts)
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Trace query and ad-hoc query limits
    #[serde(default)]
    pub query: QueryConfig,

    /// DataFusion engine configuration
    #[serde(default)]
    pub datafusion: DataFusionConfig,
}

/// Where span segments are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local filesystem rooted at `store.path`
    Local,
    /// S3-compatible object storage described by `store.s3`
    S3,
    /// Process-local in-memory store (tests, demos)
    Memory,
}

/// Configuration for the span store and its connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Root directory for the local backend
    #[serde(default = "default_path")]
    pub path: String,

    /// Prefix under which span segments are written (e.g., "spans")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub s3: S3Config,

    /// Maximum number of concurrent store operations
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// How long an operation waits for a free connection before failing
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Upper bound on the duration of a single store operation
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// Configuration for S3-compatible object storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 endpoint URL (e.g., "http://localhost:9000")
    /// Optional - if not provided, uses AWS SDK default endpoint for the region
    #[serde(default)]
    pub endpoint: String,

    /// S3 bucket name
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// AWS region (required but ignored by Minio)
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    /// S3 session token (optional, for temporary credentials)
    #[serde(default)]
    pub session_token: Option<String>,

    /// Allow HTTP connections (true for Minio, false for AWS S3)
    #[serde(default)]
    pub allow_http: bool,

    /// Use AWS environment credentials via AmazonS3Builder::from_env()
    #[serde(default)]
    pub use_env_credentials: bool,

    /// Maximum number of idle connections per host (default: 30)
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Pool idle timeout in seconds (default: 120)
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the server binds to
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Configuration for trace queries and the ad-hoc query bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size used when a trace list request has no limit
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u64,

    /// Page sizes above this value are clamped
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u64,

    /// Maximum number of rows returned by an ad-hoc query
    #[serde(default = "default_adhoc_row_limit")]
    pub adhoc_row_limit: usize,

    /// Reject DDL, DML and session statements in ad-hoc queries
    #[serde(default = "default_adhoc_read_only")]
    pub adhoc_read_only: bool,
}

/// Configuration for DataFusion query engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFusionConfig {
    /// Enable parquet predicate pushdown/pruning (default: true)
    #[serde(default = "default_parquet_pruning")]
    pub parquet_pruning: bool,

    /// Number of target partitions, 0 means one per CPU
    #[serde(default)]
    pub target_partitions: usize,
}

// Default value functions
fn default_backend() -> StoreBackend {
    StoreBackend::Local
}

fn default_path() -> String {
    "./data".to_string()
}

fn default_prefix() -> String {
    "spans".to_string()
}

fn default_max_connections() -> usize {
    20
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    60
}

fn default_bucket() -> String {
    "tracestore".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_pool_max_idle_per_host() -> usize {
    30
}

fn default_pool_idle_timeout() -> u64 {
    120
}

fn default_listen_address() -> String {
    "0.0.0.0:4318".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:8080".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_page_limit() -> u64 {
    20
}

fn default_max_page_limit() -> u64 {
    1000
}

fn default_adhoc_row_limit() -> usize {
    10_000
}

fn default_adhoc_read_only() -> bool {
    true
}

fn default_parquet_pruning() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
            prefix: default_prefix(),
            s3: S3Config::default(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: default_bucket(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            allow_http: true,
            use_env_credentials: false,
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            cors_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            adhoc_row_limit: default_adhoc_row_limit(),
            adhoc_read_only: default_adhoc_read_only(),
        }
    }
}

impl Default for DataFusionConfig {
    fn default() -> Self {
        Self {
            parquet_pruning: default_parquet_pruning(),
            target_partitions: 0,
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (TRACESTORE_ prefix, `__` between sections,
    ///    e.g. TRACESTORE_STORE__BACKEND=s3)
    /// 4. Explicit AWS credentials from environment (fallback for empty credentials)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // Store defaults
            .set_default("store.backend", "local")?
            .set_default("store.path", default_path())?
            .set_default("store.prefix", default_prefix())?
            .set_default("store.max_connections", default_max_connections() as u64)?
            .set_default("store.acquire_timeout_secs", default_acquire_timeout())?
            .set_default("store.command_timeout_secs", default_command_timeout())?
            .set_default("store.s3.endpoint", "http://localhost:9000")?
            .set_default("store.s3.bucket", default_bucket())?
            .set_default("store.s3.region", default_region())?
            .set_default("store.s3.allow_http", true)?
            .set_default("store.s3.use_env_credentials", false)?
            // Server defaults
            .set_default("server.listen_address", default_listen_address())?
            .set_default("server.cors_origins", default_cors_origins())?
            .set_default("server.max_body_bytes", default_max_body_bytes() as u64)?
            // Query defaults
            .set_default("query.default_page_limit", default_page_limit())?
            .set_default("query.max_page_limit", default_max_page_limit())?
            .set_default("query.adhoc_row_limit", default_adhoc_row_limit() as u64)?
            .set_default("query.adhoc_read_only", true)?
            // DataFusion defaults
            .set_default("datafusion.parquet_pruning", true)?
            .set_default("datafusion.target_partitions", 0)?;

        // Add TOML file if provided
        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("TRACESTORE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut app_config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Fallback: If credentials are still empty, try AWS_* environment variables
        let s3 = &mut app_config.store.s3;
        if s3.access_key_id.is_empty() {
            if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
                s3.access_key_id = key;
            }
        }

        if s3.secret_access_key.is_empty() {
            if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                s3.secret_access_key = secret;
            }
        }

        if s3.session_token.is_none() {
            if let Ok(token) = std::env::var("AWS_SESSION_TOKEN") {
                s3.session_token = Some(token);
            }
        }

        Ok(app_config)
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .with_context(|| format!("Configuration path is not UTF-8: {}", path.display()))?;
        Self::load(Some(path_str))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Configuration backed by an in-memory store, used by tests and demos
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.store.backend = StoreBackend::Memory;
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.server.validate()?;
        self.query.validate()?;
        Ok(())
    }
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.prefix.is_empty(), "store prefix cannot be empty");
        anyhow::ensure!(
            self.max_connections > 0,
            "store max_connections must be greater than 0"
        );
        anyhow::ensure!(
            self.command_timeout_secs > 0,
            "store command_timeout_secs must be greater than 0"
        );

        match self.backend {
            StoreBackend::Local => {
                anyhow::ensure!(!self.path.is_empty(), "store path cannot be empty");
            }
            StoreBackend::S3 => self.s3.validate()?,
            StoreBackend::Memory => {}
        }

        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl S3Config {
    /// Validate the S3 configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.bucket.is_empty(), "S3 bucket cannot be empty");

        // If not using env credentials, validate that credentials are provided
        if !self.use_env_credentials {
            anyhow::ensure!(
                !self.endpoint.is_empty(),
                "S3 endpoint cannot be empty (unless use_env_credentials=true)"
            );
            anyhow::ensure!(
                !self.access_key_id.is_empty(),
                "S3 access key ID cannot be empty (unless use_env_credentials=true)"
            );
            anyhow::ensure!(
                !self.secret_access_key.is_empty(),
                "S3 secret access key cannot be empty (unless use_env_credentials=true)"
            );
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.listen_address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid listen address: {}", self.listen_address))?;
        anyhow::ensure!(self.max_body_bytes > 0, "max_body_bytes must be greater than 0");
        Ok(())
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.default_page_limit > 0,
            "default_page_limit must be greater than 0"
        );
        anyhow::ensure!(
            self.max_page_limit >= self.default_page_limit,
            "max_page_limit must be at least default_page_limit"
        );
        anyhow::ensure!(
            self.adhoc_row_limit > 0,
            "adhoc_row_limit must be greater than 0"
        );
        Ok(())
    }
}
