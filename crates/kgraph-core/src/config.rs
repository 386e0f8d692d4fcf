//! Graph database configuration.
//!
//! A [`GraphDatabaseConfig`] is read once (TOML or environment), validated,
//! and then treated as immutable by whatever adapter was built from it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KgError, KgResult};
use crate::tenant::{IsolationConfig, IsolationStrategy, ShardingStrategy};

/// Physical engine behind the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// A native property-graph engine spoken to over Bolt.
    #[serde(rename = "native-graph")]
    NativeGraphEngine,
    /// Relational tables with graph traversal layered on top.
    #[serde(rename = "hybrid-relational-graph")]
    HybridRelationalGraph,
}

impl BackendType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeGraphEngine => "native-graph",
            Self::HybridRelationalGraph => "hybrid-relational-graph",
        }
    }

    /// Prefix of the backend-specific environment keys.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::NativeGraphEngine => "NATIVE_GRAPH",
            Self::HybridRelationalGraph => "HYBRID_GRAPH",
        }
    }
}

impl FromStr for BackendType {
    type Err = KgError;

    fn from_str(s: &str) -> KgResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "native-graph" | "native" | "neo4j" => Ok(Self::NativeGraphEngine),
            "hybrid-relational-graph" | "hybrid" | "sqlite" => Ok(Self::HybridRelationalGraph),
            other => Err(KgError::config(format!("unknown graph database type '{other}'"))),
        }
    }
}

/// Where records physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageStrategy {
    Native,
    Hybrid,
    /// Hybrid engine kept entirely in memory; nothing touches disk.
    MemoryCached,
}

impl FromStr for StorageStrategy {
    type Err = KgError;

    fn from_str(s: &str) -> KgResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "hybrid" => Ok(Self::Hybrid),
            "memory-cached" | "memory_cached" | "memory" => Ok(Self::MemoryCached),
            other => Err(KgError::config(format!("unknown storage strategy '{other}'"))),
        }
    }
}

/// Connection settings for the native graph engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeConnection {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database used for per-schema isolation and for bootstrap queries.
    #[serde(default = "default_native_database")]
    pub database: String,
}

fn default_native_database() -> String {
    "neo4j".to_string()
}

impl Default for NativeConnection {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: default_native_database(),
        }
    }
}

/// Connection settings for the hybrid relational engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConnection {
    /// Directory holding the database files. Ignored for
    /// [`StorageStrategy::MemoryCached`].
    pub data_dir: PathBuf,
}

impl Default for HybridConnection {
    fn default() -> Self {
        Self { data_dir: PathBuf::from(".kgraph/data") }
    }
}

/// Throughput, timeout and analytics knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub batch_size: usize,
    pub pool_size: usize,
    /// Seconds.
    pub query_timeout: u64,
    pub enable_analytics: bool,
    pub cache: bool,
    /// Seconds.
    pub cache_timeout: u64,
    pub max_cache_size: usize,
    pub analytics_workers: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            pool_size: 10,
            query_timeout: 30,
            enable_analytics: true,
            cache: true,
            cache_timeout: 300,
            max_cache_size: 128,
            analytics_workers: 4,
        }
    }
}

impl PerformanceConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_timeout)
    }
}

/// Complete configuration of one graph database deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDatabaseConfig {
    pub db_type: BackendType,
    pub storage_strategy: StorageStrategy,
    #[serde(default)]
    pub native: NativeConnection,
    #[serde(default)]
    pub hybrid: HybridConnection,
    #[serde(default)]
    pub isolation: IsolationConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Graph id used when a caller does not name one.
    #[serde(default = "default_graph_name")]
    pub graph_name: String,
}

fn default_graph_name() -> String {
    "knowledge_graph".to_string()
}

impl GraphDatabaseConfig {
    /// Defaults for a backend type.
    pub fn new(db_type: BackendType) -> Self {
        let (storage_strategy, strategy) = match db_type {
            BackendType::NativeGraphEngine => {
                (StorageStrategy::Native, IsolationStrategy::PerDatabase)
            }
            BackendType::HybridRelationalGraph => {
                (StorageStrategy::Hybrid, IsolationStrategy::PerSchema)
            }
        };
        Self {
            db_type,
            storage_strategy,
            native: NativeConnection::default(),
            hybrid: HybridConnection::default(),
            isolation: IsolationConfig { strategy, ..IsolationConfig::default() },
            performance: PerformanceConfig::default(),
            graph_name: default_graph_name(),
        }
    }

    /// In-memory hybrid configuration, handy for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            storage_strategy: StorageStrategy::MemoryCached,
            ..Self::new(BackendType::HybridRelationalGraph)
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> KgResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| KgError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from process environment variables.
    pub fn from_env() -> KgResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment-shaped keys).
    pub fn from_lookup<F>(lookup: F) -> KgResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("GRAPH_DATABASE_ENABLED") {
            if !parse_bool("GRAPH_DATABASE_ENABLED", &enabled)? {
                return Err(KgError::config("graph database disabled"));
            }
        }

        let db_type = match lookup("GRAPH_DATABASE_TYPE") {
            Some(raw) => raw.parse()?,
            None => BackendType::NativeGraphEngine,
        };
        let mut config = Self::new(db_type);
        let prefix = db_type.env_prefix();
        let key = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

        if let Some(raw) = lookup("GRAPH_STORAGE_STRATEGY") {
            config.storage_strategy = raw.parse()?;
        }
        if let Some(raw) = lookup("TENANT_SHARDING_STRATEGY") {
            config.isolation.sharding = raw.parse()?;
        }
        if let Some(raw) = key("ISOLATION") {
            config.isolation.strategy = raw.parse()?;
        }
        let partition_prefix = match db_type {
            BackendType::NativeGraphEngine => key("DB_PREFIX"),
            BackendType::HybridRelationalGraph => key("SCHEMA_PREFIX"),
        };
        if let Some(p) = partition_prefix {
            config.isolation.prefix = p;
        }
        if let Some(name) = key("GRAPH_NAME") {
            config.graph_name = name;
        }

        match db_type {
            BackendType::NativeGraphEngine => {
                // Credentials have no defaults worth trusting.
                config.native.uri = key("URI").unwrap_or_default();
                config.native.user = key("USER").unwrap_or_default();
                config.native.password = key("PASSWORD").unwrap_or_default();
                if let Some(db) = key("DATABASE") {
                    config.native.database = db;
                }
            }
            BackendType::HybridRelationalGraph => {
                if let Some(dir) = key("DATA_DIR") {
                    config.hybrid.data_dir = PathBuf::from(dir);
                }
            }
        }

        let perf = &mut config.performance;
        if let Some(v) = key("BATCH_SIZE") {
            perf.batch_size = parse_num(&format!("{prefix}_BATCH_SIZE"), &v)?;
        }
        if let Some(v) = key("POOL_SIZE") {
            perf.pool_size = parse_num(&format!("{prefix}_POOL_SIZE"), &v)?;
        }
        if let Some(v) = key("QUERY_TIMEOUT") {
            perf.query_timeout = parse_num(&format!("{prefix}_QUERY_TIMEOUT"), &v)?;
        }
        if let Some(v) = key("ENABLE_ANALYTICS") {
            perf.enable_analytics = parse_bool(&format!("{prefix}_ENABLE_ANALYTICS"), &v)?;
        }
        if let Some(v) = key("CACHE") {
            perf.cache = parse_bool(&format!("{prefix}_CACHE"), &v)?;
        }
        if let Some(v) = key("CACHE_TIMEOUT") {
            perf.cache_timeout = parse_num(&format!("{prefix}_CACHE_TIMEOUT"), &v)?;
        }
        if let Some(v) = key("MAX_CACHE_SIZE") {
            perf.max_cache_size = parse_num(&format!("{prefix}_MAX_CACHE_SIZE"), &v)?;
        }
        if let Some(v) = key("ANALYTICS_WORKERS") {
            perf.analytics_workers = parse_num(&format!("{prefix}_ANALYTICS_WORKERS"), &v)?;
        }

        config.validate()?;
        debug!(
            db_type = db_type.as_str(),
            sharding = %config.isolation.sharding,
            "Loaded graph database config"
        );
        Ok(config)
    }

    /// Reject configurations an adapter could not run with.
    pub fn validate(&self) -> KgResult<()> {
        match (self.db_type, self.storage_strategy) {
            (BackendType::NativeGraphEngine, StorageStrategy::Native)
            | (BackendType::HybridRelationalGraph, StorageStrategy::Hybrid)
            | (BackendType::HybridRelationalGraph, StorageStrategy::MemoryCached) => {}
            (db_type, strategy) => {
                return Err(KgError::config(format!(
                    "storage strategy {strategy:?} is not supported by {}",
                    db_type.as_str()
                )))
            }
        }

        if self.db_type == BackendType::NativeGraphEngine {
            let native = &self.native;
            let required =
                [("uri", &native.uri), ("user", &native.user), ("password", &native.password)];
            for (field, value) in required {
                if value.trim().is_empty() {
                    return Err(KgError::config(format!(
                        "native graph connection requires '{field}'"
                    )));
                }
            }
        }

        self.isolation.validate()?;
        if self.graph_name.trim().is_empty() {
            return Err(KgError::config("graph name must not be empty"));
        }
        let perf = &self.performance;
        if perf.batch_size == 0 {
            return Err(KgError::config("batch_size must be positive"));
        }
        if perf.pool_size == 0 {
            return Err(KgError::config("pool_size must be positive"));
        }
        if perf.analytics_workers == 0 {
            return Err(KgError::config("analytics_workers must be positive"));
        }
        if perf.query_timeout == 0 {
            return Err(KgError::config("query_timeout must be positive"));
        }
        Ok(())
    }

    /// Sharding strategy shortcut.
    pub fn sharding(&self) -> ShardingStrategy {
        self.isolation.sharding
    }
}

fn parse_bool(key: &str, raw: &str) -> KgResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(KgError::config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_num<T: FromStr>(key: &str, raw: &str) -> KgResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| KgError::config(format!("{key}: expected a number, got '{raw}'")))
}
