use super::types::{ComponentState, ShutdownReason, ShutdownTrigger};
use crate::config::DCameraConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::provider::SimulatedProvider;
use crate::source::{LoggingListener, SimulatedBackend, SourceService};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Daemon hosting the distributed camera source service
pub struct DCameraApp {
    pub(super) config: DCameraConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) provider: Arc<SimulatedProvider>,
    pub(super) backend: Arc<SimulatedBackend>,
    pub(super) service: Arc<SourceService>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_trigger: ShutdownTrigger,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl DCameraApp {
    /// Create the application from a validated configuration
    pub fn new(config: DCameraConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.source.event_bus_capacity));
        let provider = Arc::new(SimulatedProvider::new());
        let backend = Arc::new(SimulatedBackend::new(config.source.metadata_cache_size));
        let service = Arc::new(SourceService::new(
            &config,
            backend.clone(),
            provider.clone(),
            Arc::new(LoggingListener),
            Arc::clone(&event_bus),
        ));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        info!(
            "Distributed camera source created with {} configured camera(s)",
            config.devices.len()
        );

        Ok(Self {
            config,
            event_bus,
            provider,
            backend,
            service,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_trigger: ShutdownTrigger::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn service(&self) -> Arc<SourceService> {
        Arc::clone(&self.service)
    }

    pub fn provider(&self) -> Arc<SimulatedProvider> {
        Arc::clone(&self.provider)
    }

    pub fn backend(&self) -> Arc<SimulatedBackend> {
        Arc::clone(&self.backend)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn config(&self) -> &DCameraConfig {
        &self.config
    }

    /// Handle that stops a running application from another task
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown_trigger.clone()
    }
}
