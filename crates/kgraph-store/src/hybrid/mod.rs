//! Hybrid relational backend (SQLite tables with graph traversal on top).

mod adapter;
mod schema;

pub use adapter::HybridGraphAdapter;
pub use schema::Tables;
