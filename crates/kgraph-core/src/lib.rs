//! KGraph Core Library
//!
//! Data model, deterministic keys, configuration and tenant isolation
//! shared by every storage backend.

pub mod config;
pub mod error;
pub mod keys;
pub mod model;
pub mod tenant;

pub use config::{
    BackendType, GraphDatabaseConfig, HybridConnection, NativeConnection, PerformanceConfig,
    StorageStrategy,
};
pub use error::{KgError, KgResult};
pub use model::{
    is_valid_confidence, Entity, EntityPatch, GraphStatus, Properties, RawTriple, Relation,
    RelationPatch, TripleRecord,
};
pub use tenant::{
    IsolationConfig, IsolationStrategy, PartitionHandle, ShardingStrategy, TenantIsolationResolver,
};
