use crate::config::{DCameraConfig, SourceConfig};
use crate::error::{DCameraError, Result};
use crate::events::EventBus;
use crate::provider::{CameraProvider, Validator};
use crate::source::controller::{CameraController, SimulatedController};
use crate::source::dev::{SourceDev, SourceDevContext};
use crate::source::input::{CameraInput, SimulatedInput};
use crate::source::listener::RegisterListener;
use crate::source::state::SourceState;
use crate::types::{DCameraIndex, EnableParam};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Creates the control and data collaborators of a new source device
pub trait DeviceBackend: Send + Sync {
    fn create(&self, index: &DCameraIndex) -> (Arc<dyn CameraController>, Arc<dyn CameraInput>);
}

/// Backend handing out in-process collaborators, kept for inspection
pub struct SimulatedBackend {
    metadata_cache_size: usize,
    created: SyncMutex<HashMap<DCameraIndex, (Arc<SimulatedController>, Arc<SimulatedInput>)>>,
}

impl SimulatedBackend {
    pub fn new(metadata_cache_size: usize) -> Self {
        Self {
            metadata_cache_size,
            created: SyncMutex::new(HashMap::new()),
        }
    }

    /// Controller of the most recently created device for `index`
    pub fn controller(&self, index: &DCameraIndex) -> Option<Arc<SimulatedController>> {
        self.created
            .lock()
            .get(index)
            .map(|(controller, _)| Arc::clone(controller))
    }

    pub fn input(&self, index: &DCameraIndex) -> Option<Arc<SimulatedInput>> {
        self.created
            .lock()
            .get(index)
            .map(|(_, input)| Arc::clone(input))
    }
}

impl DeviceBackend for SimulatedBackend {
    fn create(&self, index: &DCameraIndex) -> (Arc<dyn CameraController>, Arc<dyn CameraInput>) {
        let controller = Arc::new(SimulatedController::new(self.metadata_cache_size));
        let input = Arc::new(SimulatedInput::new());
        self.created.lock().insert(
            index.clone(),
            (Arc::clone(&controller), Arc::clone(&input)),
        );
        (controller, input)
    }
}

/// Registry of source devices, keyed by remote camera.
///
/// Entry point of the distributed hardware framework: it registers and
/// unregisters remote cameras and forwards sink notifications.
pub struct SourceService {
    devices: Mutex<HashMap<DCameraIndex, Arc<SourceDev>>>,
    backend: Arc<dyn DeviceBackend>,
    provider: Arc<dyn CameraProvider>,
    listener: Arc<dyn RegisterListener>,
    event_bus: Arc<EventBus>,
    validator: Validator,
    config: SourceConfig,
    cancellation_token: CancellationToken,
}

impl SourceService {
    pub fn new(
        config: &DCameraConfig,
        backend: Arc<dyn DeviceBackend>,
        provider: Arc<dyn CameraProvider>,
        listener: Arc<dyn RegisterListener>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            backend,
            provider,
            listener,
            event_bus,
            validator: Validator::new(config.limits),
            config: config.source.clone(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Register a remote camera, creating its source device on first use
    pub async fn register_distributed_hardware(
        &self,
        dev_id: &str,
        dh_id: &str,
        req_id: &str,
        mut param: EnableParam,
    ) -> Result<()> {
        self.validator
            .check_registration(dev_id, dh_id, req_id, &param)?;
        if param.version.is_empty() {
            param.version = self.config.version.clone();
        }

        let index = DCameraIndex::new(dev_id, dh_id);
        info!("Registering distributed camera {}, req {}", index, req_id);

        let device = {
            let mut devices = self.devices.lock().await;
            match devices.get(&index) {
                Some(device) => Arc::clone(device),
                None => {
                    let device = self.create_device(&index);
                    devices.insert(index.clone(), Arc::clone(&device));
                    device
                }
            }
        };

        let result = match device.register(req_id, param) {
            Ok(completion) => completion.wait().await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!("Registering camera {} failed: {}", index, e);
            if device.state() == SourceState::Init {
                self.remove_device(&index, &device).await;
            }
        }
        result
    }

    /// Unregister a remote camera; its source device is dropped either way
    pub async fn unregister_distributed_hardware(
        &self,
        dev_id: &str,
        dh_id: &str,
        req_id: &str,
    ) -> Result<()> {
        self.validator.check_id("devId", dev_id)?;
        self.validator.check_id("dhId", dh_id)?;
        self.validator.check_id("reqId", req_id)?;

        let index = DCameraIndex::new(dev_id, dh_id);
        let device = self.device(&index).await.ok_or_else(|| DCameraError::NotFound {
            details: format!("camera {} is not registered", index),
        })?;
        info!("Unregistering distributed camera {}, req {}", index, req_id);

        let result = match device.unregister(req_id) {
            Ok(completion) => completion.wait().await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!("Unregistering camera {} failed: {}", index, e);
        }

        self.remove_device(&index, &device).await;
        result
    }

    /// Forward a sink notification to the matching device
    pub async fn dcamera_notify(&self, dev_id: &str, dh_id: &str, event_json: &str) -> Result<()> {
        self.validator.check_id("devId", dev_id)?;
        self.validator.check_id("dhId", dh_id)?;
        if event_json.len() > self.validator.limits().param_max_size {
            return Err(DCameraError::bad_value(format!(
                "notification of {} bytes exceeds limit",
                event_json.len()
            )));
        }

        let index = DCameraIndex::new(dev_id, dh_id);
        let device = self.device(&index).await.ok_or_else(|| DCameraError::NotFound {
            details: format!("camera {} is not registered", index),
        })?;
        device.notify(event_json)?.wait().await
    }

    pub async fn device(&self, index: &DCameraIndex) -> Option<Arc<SourceDev>> {
        self.devices.lock().await.get(index).cloned()
    }

    pub async fn device_count(&self) -> usize {
        self.devices.lock().await.len()
    }

    pub async fn indexes(&self) -> Vec<DCameraIndex> {
        self.devices.lock().await.keys().cloned().collect()
    }

    /// Unregister every device and stop all workers
    pub async fn shutdown(&self) {
        let devices: Vec<(DCameraIndex, Arc<SourceDev>)> =
            self.devices.lock().await.drain().collect();
        info!("Shutting down {} source device(s)", devices.len());

        for (index, device) in devices {
            let result = match device.unregister("shutdown") {
                Ok(completion) => completion.wait().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("Unregistering camera {} on shutdown failed: {}", index, e);
            }
        }

        self.cancellation_token.cancel();
    }

    fn create_device(&self, index: &DCameraIndex) -> Arc<SourceDev> {
        let (controller, input) = self.backend.create(index);
        let context = SourceDevContext {
            controller,
            input,
            provider: Arc::clone(&self.provider),
            listener: Arc::clone(&self.listener),
            event_bus: Arc::clone(&self.event_bus),
            validator: self.validator,
            queue_capacity: self.config.event_queue_capacity,
        };
        SourceDev::spawn(index.clone(), context, self.cancellation_token.child_token())
    }

    /// Drop the map entry if it still holds this very device
    async fn remove_device(&self, index: &DCameraIndex, device: &Arc<SourceDev>) {
        let mut devices = self.devices.lock().await;
        if devices
            .get(index)
            .is_some_and(|current| Arc::ptr_eq(current, device))
        {
            devices.remove(index);
        }
    }
}
