//! Bolt connection to the native graph engine.

use std::time::Duration;

use neo4rs::{ConfigBuilder, Graph, Query, Row};
use tracing::debug;

use kgraph_core::{KgError, KgResult, NativeConnection};

/// Pooled client bound to one server, able to target any database on it.
#[derive(Clone)]
pub struct NativeClient {
    graph: Graph,
    timeout: Duration,
}

impl NativeClient {
    /// Connect and prove the server answers.
    ///
    /// neo4rs builds its pool lazily, so `Graph::connect` alone never touches
    /// the network. A `RETURN 1` ping forces the handshake so an unreachable
    /// server fails here instead of on the first real query.
    pub async fn connect(
        conn: &NativeConnection,
        pool_size: usize,
        timeout: Duration,
    ) -> KgResult<Self> {
        let config = ConfigBuilder::default()
            .uri(&conn.uri)
            .user(&conn.user)
            .password(&conn.password)
            .db(conn.database.as_str())
            .max_connections(pool_size.max(1))
            .fetch_size(500)
            .build()
            .map_err(|e| KgError::config(format!("invalid native graph settings: {e}")))?;

        let graph = tokio::time::timeout(timeout, Graph::connect(config))
            .await
            .map_err(|_| KgError::unavailable(format!("timed out connecting to {}", conn.uri)))?
            .map_err(|e| KgError::unavailable(format!("cannot reach {}: {e}", conn.uri)))?;

        let client = Self { graph, timeout };
        client
            .run_on(&conn.database, Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| match e {
                KgError::Timeout(_) => {
                    KgError::unavailable(format!("{} is not responding", conn.uri))
                }
                other => other,
            })?;
        debug!(uri = %conn.uri, pool_size, "Connected to native graph engine");
        Ok(client)
    }

    /// Execute a statement that returns no rows against `db`.
    pub async fn run_on(&self, db: &str, query: Query) -> KgResult<()> {
        tokio::time::timeout(self.timeout, self.graph.run_on(db, query))
            .await
            .map_err(|_| KgError::Timeout(self.timeout))?
            .map_err(classify)
    }

    /// Execute a read against `db` and collect every row, bounded by the
    /// query timeout.
    pub async fn query_on(&self, db: &str, query: Query) -> KgResult<Vec<Row>> {
        tokio::time::timeout(self.timeout, self.fetch(db, query))
            .await
            .map_err(|_| KgError::Timeout(self.timeout))?
    }

    /// Execute a write against `db` and collect every row.
    ///
    /// Writes are not cut short on the client: abandoning the request does not
    /// stop the server from committing, so the outcome reported here must be
    /// the one the server produced. Long writes are bounded by the server's
    /// transaction timeout.
    pub async fn write_on(&self, db: &str, query: Query) -> KgResult<Vec<Row>> {
        self.fetch(db, query).await
    }

    /// First column `field` of the first row of a read, if any.
    pub async fn query_scalar_on(
        &self,
        db: &str,
        query: Query,
        field: &str,
    ) -> KgResult<Option<i64>> {
        first_scalar(self.query_on(db, query).await?, field)
    }

    /// First column `field` of the first row of a write, if any.
    pub async fn write_scalar_on(
        &self,
        db: &str,
        query: Query,
        field: &str,
    ) -> KgResult<Option<i64>> {
        first_scalar(self.write_on(db, query).await?, field)
    }

    /// Stream errors are propagated rather than treated as end of results.
    async fn fetch(&self, db: &str, query: Query) -> KgResult<Vec<Row>> {
        let mut stream = self.graph.execute_on(db, query).await.map_err(classify)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify)? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn first_scalar(rows: Vec<Row>, field: &str) -> KgResult<Option<i64>> {
    match rows.into_iter().next() {
        Some(row) => {
            let value: i64 = row
                .get(field)
                .map_err(|e| KgError::query(format!("failed to read field '{field}': {e:?}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Connectivity and authentication problems are fatal; anything else is a
/// query failure the caller can report.
fn classify(error: neo4rs::Error) -> KgError {
    match error {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::AuthenticationError(_) => KgError::unavailable(error.to_string()),
        other => KgError::query(other.to_string()),
    }
}
