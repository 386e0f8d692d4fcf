//! Backend construction and the runtime registry.
//!
//! The registry replaces a process-wide "current database" global: it is
//! built explicitly, passed to whoever needs storage, and owns the
//! initialize/shutdown lifecycle of the adapter it holds.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use kgraph_core::{
    BackendType, GraphDatabaseConfig, KgResult, StorageStrategy, TenantIsolationResolver,
};

use crate::adapter::GraphBackendAdapter;
use crate::events::{create_event_channel, EventReceiver, EventSender, GraphEvent};
use crate::hybrid::HybridGraphAdapter;
use crate::native::NativeGraphAdapter;

/// Builds the adapter matching a configuration.
pub struct GraphBackendFactory;

impl GraphBackendFactory {
    /// Validate `config` and construct (but not connect) its adapter.
    pub fn build(config: &GraphDatabaseConfig) -> KgResult<Arc<dyn GraphBackendAdapter>> {
        config.validate()?;
        let resolver = TenantIsolationResolver::new(config.isolation.clone())?;
        let performance = config.performance.clone();

        let adapter: Arc<dyn GraphBackendAdapter> = match config.db_type {
            BackendType::NativeGraphEngine => {
                Arc::new(NativeGraphAdapter::new(config.native.clone(), performance, resolver))
            }
            BackendType::HybridRelationalGraph => match config.storage_strategy {
                StorageStrategy::MemoryCached => {
                    Arc::new(HybridGraphAdapter::in_memory(performance, resolver))
                }
                _ => Arc::new(HybridGraphAdapter::with_data_dir(
                    config.hybrid.data_dir.clone(),
                    performance,
                    resolver,
                )),
            },
        };
        Ok(adapter)
    }
}

struct BackendSlot {
    config: Arc<GraphDatabaseConfig>,
    adapter: Arc<dyn GraphBackendAdapter>,
}

/// Holds the active backend and publishes mutation events.
///
/// Readers load the current slot without locking; `switch_backend` swaps it
/// atomically so requests already in flight finish on the adapter they
/// started with.
pub struct GraphDatabaseRegistry {
    slot: ArcSwap<BackendSlot>,
    switch_lock: Mutex<()>,
    events: EventSender,
}

impl GraphDatabaseRegistry {
    /// Registry for `config`. Call [`Self::initialize`] before use.
    pub fn new(config: GraphDatabaseConfig) -> KgResult<Self> {
        let adapter = GraphBackendFactory::build(&config)?;
        Ok(Self::with_adapter(config, adapter))
    }

    /// Registry around an already constructed adapter.
    pub fn with_adapter(
        config: GraphDatabaseConfig,
        adapter: Arc<dyn GraphBackendAdapter>,
    ) -> Self {
        Self {
            slot: ArcSwap::from_pointee(BackendSlot { config: Arc::new(config), adapter }),
            switch_lock: Mutex::new(()),
            events: create_event_channel(),
        }
    }

    /// Build and initialize in one step.
    pub async fn connect(config: GraphDatabaseConfig) -> KgResult<Self> {
        let registry = Self::new(config)?;
        registry.initialize().await?;
        Ok(registry)
    }

    pub async fn initialize(&self) -> KgResult<()> {
        let adapter = self.adapter();
        adapter.initialize().await?;
        info!(backend = adapter.backend_type().as_str(), "Graph database registry initialized");
        Ok(())
    }

    pub async fn shutdown(&self) -> KgResult<()> {
        let adapter = self.adapter();
        adapter.close().await?;
        info!(backend = adapter.backend_type().as_str(), "Graph database registry shut down");
        Ok(())
    }

    pub fn adapter(&self) -> Arc<dyn GraphBackendAdapter> {
        self.slot.load().adapter.clone()
    }

    pub fn config(&self) -> Arc<GraphDatabaseConfig> {
        self.slot.load().config.clone()
    }

    /// Replace the active backend.
    ///
    /// The new adapter is initialized before the swap, so a failure leaves
    /// the current backend in place. The old adapter is closed afterwards.
    pub async fn switch_backend(&self, config: GraphDatabaseConfig) -> KgResult<()> {
        let _guard = self.switch_lock.lock().await;

        let adapter = GraphBackendFactory::build(&config)?;
        adapter.initialize().await?;
        let backend = adapter.backend_type();

        let previous = self.slot.swap(Arc::new(BackendSlot { config: Arc::new(config), adapter }));
        if let Err(e) = previous.adapter.close().await {
            warn!(error = %e, "Failed to close previous graph backend");
        }

        info!(
            from = previous.adapter.backend_type().as_str(),
            to = backend.as_str(),
            "Switched graph backend"
        );
        self.publish(GraphEvent::BackendSwitched);
        Ok(())
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Send an event; having no subscribers is not an error.
    pub fn publish(&self, event: GraphEvent) {
        let _ = self.events.send(event);
    }
}
