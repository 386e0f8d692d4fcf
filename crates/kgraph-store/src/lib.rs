//! # KGraph Store
//!
//! Persistence of tenant-scoped knowledge graphs across interchangeable
//! backends.
//!
//! Provides the [`GraphBackendAdapter`] contract with a native graph-engine
//! adapter (Neo4j over Bolt) and a hybrid relational adapter (SQLite), the
//! triple ingestion pipeline, bounded traversal and statistics, and the
//! [`KnowledgeGraphStore`] facade that the API layer talks to.

pub mod adapter;
pub mod envelope;
pub mod events;
pub mod factory;
pub mod hybrid;
pub mod native;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod tenants;

pub use adapter::{GraphBackendAdapter, GraphCounts, GraphSummary, ItemFailure};
pub use envelope::{DeleteResult, Envelope, IngestionFailure, LoadResult, SaveReport};
pub use events::{create_event_channel, EventReceiver, EventSender, GraphEvent};
pub use factory::{GraphBackendFactory, GraphDatabaseRegistry};
pub use hybrid::HybridGraphAdapter;
pub use native::NativeGraphAdapter;
pub use pipeline::{IngestionOutcome, PreparedBatch, RelationKeyStrategy, TripleIngestionPipeline};
pub use query::{GraphQueryEngine, GraphStatistics};
pub use store::{GraphProcessingState, KnowledgeGraphStore};
pub use tenants::TenantRegistry;
