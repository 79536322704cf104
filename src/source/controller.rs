use crate::error::Result;
use crate::source::fault::FaultInjector;
use crate::source::notify::CameraEvent;
use crate::types::{DCCaptureInfo, DCameraIndex, DCameraSettings, SettingsType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Control channel towards the remote sink
#[async_trait]
pub trait CameraController: Send + Sync {
    async fn init(&self, indexes: &[DCameraIndex]) -> Result<()>;
    async fn uninit(&self) -> Result<()>;
    async fn open_channel(&self, indexes: &[DCameraIndex]) -> Result<()>;
    async fn close_channel(&self) -> Result<()>;
    async fn start_capture(&self, captures: &[Arc<DCCaptureInfo>]) -> Result<()>;
    async fn stop_capture(&self) -> Result<()>;
    async fn update_settings(&self, settings: &[Arc<DCameraSettings>]) -> Result<()>;
    async fn notify(&self, event: &CameraEvent) -> Result<()>;
}

#[derive(Debug, Default)]
struct ControllerState {
    initialized: bool,
    channel_open: bool,
    capturing: bool,
    metadata_cache: VecDeque<String>,
    applied_metadata: Vec<String>,
    calls: Vec<&'static str>,
}

/// In-process controller standing in for the sink control channel
pub struct SimulatedController {
    state: Mutex<ControllerState>,
    metadata_cache_size: usize,
    faults: FaultInjector,
}

impl SimulatedController {
    pub fn new(metadata_cache_size: usize) -> Self {
        Self {
            state: Mutex::new(ControllerState::default()),
            metadata_cache_size: metadata_cache_size.max(1),
            faults: FaultInjector::new("controller"),
        }
    }

    /// Make the named operation fail until disarmed
    pub fn fail_on(&self, operation: &'static str) {
        self.faults.arm(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.faults.disarm(operation);
    }

    pub fn is_channel_open(&self) -> bool {
        self.state.lock().channel_open
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    pub fn cached_metadata(&self) -> Vec<String> {
        self.state.lock().metadata_cache.iter().cloned().collect()
    }

    pub fn applied_metadata(&self) -> Vec<String> {
        self.state.lock().applied_metadata.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        self.state.lock().calls.push(operation);
        self.faults.check(operation)
    }

    fn cache_metadata(&self, state: &mut ControllerState, value: String) {
        if state.metadata_cache.len() >= self.metadata_cache_size {
            warn!("Controller metadata cache oversize, dropping oldest entry");
            state.metadata_cache.pop_front();
        }
        state.metadata_cache.push_back(value);
    }
}

#[async_trait]
impl CameraController for SimulatedController {
    async fn init(&self, indexes: &[DCameraIndex]) -> Result<()> {
        self.record("init")?;
        self.state.lock().initialized = true;
        debug!("Controller initialized for {} camera(s)", indexes.len());
        Ok(())
    }

    async fn uninit(&self) -> Result<()> {
        self.record("uninit")?;
        let mut state = self.state.lock();
        state.initialized = false;
        state.channel_open = false;
        state.capturing = false;
        state.metadata_cache.clear();
        Ok(())
    }

    async fn open_channel(&self, indexes: &[DCameraIndex]) -> Result<()> {
        self.record("open_channel")?;
        let mut state = self.state.lock();
        state.channel_open = true;
        // settings received before the session existed are applied now
        let cached: Vec<String> = state.metadata_cache.drain(..).collect();
        state.applied_metadata.extend(cached);
        info!("Controller channel opened for {} camera(s)", indexes.len());
        Ok(())
    }

    async fn close_channel(&self) -> Result<()> {
        self.record("close_channel")?;
        let mut state = self.state.lock();
        state.channel_open = false;
        state.capturing = false;
        Ok(())
    }

    async fn start_capture(&self, captures: &[Arc<DCCaptureInfo>]) -> Result<()> {
        self.record("start_capture")?;
        let mut state = self.state.lock();
        for capture in captures {
            for setting in &capture.capture_settings {
                if setting.setting_type == SettingsType::UpdateMetadata {
                    state.applied_metadata.push(setting.value.clone());
                }
            }
        }
        state.capturing = true;
        Ok(())
    }

    async fn stop_capture(&self) -> Result<()> {
        self.record("stop_capture")?;
        self.state.lock().capturing = false;
        Ok(())
    }

    async fn update_settings(&self, settings: &[Arc<DCameraSettings>]) -> Result<()> {
        self.record("update_settings")?;
        let mut state = self.state.lock();
        for setting in settings {
            match setting.setting_type {
                SettingsType::UpdateMetadata => {
                    if state.channel_open {
                        state.applied_metadata.push(setting.value.clone());
                    } else {
                        self.cache_metadata(&mut state, setting.value.clone());
                    }
                }
                other => debug!("Controller ignoring settings type {:?}", other),
            }
        }
        Ok(())
    }

    async fn notify(&self, event: &CameraEvent) -> Result<()> {
        self.record("notify")?;
        debug!("Controller notified of {:?}", event.event_result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(value: &str) -> Arc<DCameraSettings> {
        Arc::new(DCameraSettings {
            setting_type: SettingsType::UpdateMetadata,
            value: value.to_string(),
        })
    }

    #[tokio::test]
    async fn test_metadata_cache_is_bounded() {
        let controller = SimulatedController::new(2);
        controller
            .update_settings(&[metadata("a"), metadata("b"), metadata("c")])
            .await
            .unwrap();
        assert_eq!(controller.cached_metadata(), vec!["b", "c"]);

        controller.open_channel(&[]).await.unwrap();
        assert!(controller.cached_metadata().is_empty());
        assert_eq!(controller.applied_metadata(), vec!["b", "c"]);

        controller.update_settings(&[metadata("d")]).await.unwrap();
        assert_eq!(controller.applied_metadata(), vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let controller = SimulatedController::new(4);
        controller.fail_on("open_channel");
        assert!(controller.open_channel(&[]).await.is_err());
        assert!(!controller.is_channel_open());

        controller.recover("open_channel");
        controller.open_channel(&[]).await.unwrap();
        assert!(controller.is_channel_open());
        assert_eq!(controller.calls(), vec!["open_channel", "open_channel"]);
    }
}
