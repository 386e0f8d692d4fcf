//! Native graph engine backend (Neo4j over Bolt).

mod adapter;
mod client;
mod schema;

pub use adapter::NativeGraphAdapter;
pub use client::NativeClient;
pub use schema::{database_for, neo4j_database_name};
