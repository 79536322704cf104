use super::{CameraProvider, ProviderCallback};
use crate::error::Result;
use crate::source::fault::FaultInjector;
use crate::types::{DHBase, HdfEvent};
use crate::utils::anonymize;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

struct EnabledDevice {
    abilities: String,
    callback: Arc<ProviderCallback>,
}

/// Provider keeping enabled devices and received notifications in memory
pub struct SimulatedProvider {
    devices: Mutex<HashMap<DHBase, EnabledDevice>>,
    notifications: Mutex<Vec<(DHBase, HdfEvent)>>,
    faults: FaultInjector,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            faults: FaultInjector::new("provider"),
        }
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.faults.arm(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.faults.disarm(operation);
    }

    /// Callback the device handed over when it was enabled
    pub fn callback(&self, dh_base: &DHBase) -> Option<Arc<ProviderCallback>> {
        self.devices
            .lock()
            .get(dh_base)
            .map(|device| Arc::clone(&device.callback))
    }

    pub fn abilities(&self, dh_base: &DHBase) -> Option<String> {
        self.devices
            .lock()
            .get(dh_base)
            .map(|device| device.abilities.clone())
    }

    pub fn is_enabled(&self, dh_base: &DHBase) -> bool {
        self.devices.lock().contains_key(dh_base)
    }

    pub fn enabled_count(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn notifications(&self) -> Vec<(DHBase, HdfEvent)> {
        self.notifications.lock().clone()
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraProvider for SimulatedProvider {
    async fn enable_device(
        &self,
        dh_base: &DHBase,
        abilities: &str,
        callback: Arc<ProviderCallback>,
    ) -> Result<()> {
        self.faults.check("enable_device")?;
        info!(
            "Provider enabling camera {}/{}",
            anonymize(&dh_base.device_id),
            dh_base.dh_id
        );
        self.devices.lock().insert(
            dh_base.clone(),
            EnabledDevice {
                abilities: abilities.to_string(),
                callback,
            },
        );
        Ok(())
    }

    async fn disable_device(&self, dh_base: &DHBase) -> Result<()> {
        self.faults.check("disable_device")?;
        if self.devices.lock().remove(dh_base).is_none() {
            debug!("Provider asked to disable unknown camera {}", dh_base.dh_id);
        }
        Ok(())
    }

    async fn notify(&self, dh_base: &DHBase, event: &HdfEvent) -> Result<()> {
        self.faults.check("notify")?;
        self.notifications
            .lock()
            .push((dh_base.clone(), event.clone()));
        Ok(())
    }
}
