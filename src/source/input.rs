use crate::error::{DCameraError, Result};
use crate::source::fault::FaultInjector;
use crate::types::{DCCaptureInfo, DCStreamInfo, DCameraIndex, DCameraSettings, StreamType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Data channel and stream pipeline feeding frames to the provider
#[async_trait]
pub trait CameraInput: Send + Sync {
    async fn init(&self) -> Result<()>;
    async fn uninit(&self) -> Result<()>;
    async fn open_channel(&self, indexes: &[DCameraIndex]) -> Result<()>;
    async fn close_channel(&self) -> Result<()>;
    async fn config_streams(&self, streams: &[Arc<DCStreamInfo>]) -> Result<()>;
    /// Returns true once no configured stream is left
    async fn release_streams(&self, stream_ids: &[i32]) -> Result<bool>;
    async fn release_all_streams(&self) -> Result<()>;
    /// Returns the stream ids this call started; ids already capturing are
    /// not included
    async fn start_capture(&self, captures: &[Arc<DCCaptureInfo>]) -> Result<Vec<i32>>;
    /// Returns true once no stream is capturing any more
    async fn stop_capture(&self, stream_ids: &[i32]) -> Result<bool>;
    async fn stop_all_capture(&self) -> Result<()>;
    async fn update_settings(&self, settings: &[Arc<DCameraSettings>]) -> Result<()>;
}

#[derive(Debug, Default)]
struct InputState {
    initialized: bool,
    channel_open: bool,
    streams: BTreeMap<i32, Arc<DCStreamInfo>>,
    capturing: BTreeSet<i32>,
    settings_applied: usize,
}

/// In-process stream pipeline
pub struct SimulatedInput {
    state: Mutex<InputState>,
    faults: FaultInjector,
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InputState::default()),
            faults: FaultInjector::new("input"),
        }
    }

    /// Make the named operation fail until recovered
    pub fn fail_on(&self, operation: &'static str) {
        self.faults.arm(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.faults.disarm(operation);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_channel_open(&self) -> bool {
        self.state.lock().channel_open
    }

    pub fn configured_streams(&self) -> Vec<i32> {
        self.state.lock().streams.keys().copied().collect()
    }

    pub fn capturing_streams(&self) -> Vec<i32> {
        self.state.lock().capturing.iter().copied().collect()
    }

    pub fn settings_applied(&self) -> usize {
        self.state.lock().settings_applied
    }
}

impl Default for SimulatedInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraInput for SimulatedInput {
    async fn init(&self) -> Result<()> {
        self.faults.check("init")?;
        self.state.lock().initialized = true;
        Ok(())
    }

    async fn uninit(&self) -> Result<()> {
        self.faults.check("uninit")?;
        *self.state.lock() = InputState::default();
        Ok(())
    }

    async fn open_channel(&self, indexes: &[DCameraIndex]) -> Result<()> {
        self.faults.check("open_channel")?;
        self.state.lock().channel_open = true;
        info!("Input data channel opened for {} camera(s)", indexes.len());
        Ok(())
    }

    async fn close_channel(&self) -> Result<()> {
        self.faults.check("close_channel")?;
        let mut state = self.state.lock();
        state.channel_open = false;
        state.capturing.clear();
        Ok(())
    }

    async fn config_streams(&self, streams: &[Arc<DCStreamInfo>]) -> Result<()> {
        self.faults.check("config_streams")?;
        let mut state = self.state.lock();
        let mut seen = BTreeSet::new();
        for stream in streams {
            if !seen.insert(stream.stream_id) || state.streams.contains_key(&stream.stream_id) {
                return Err(DCameraError::bad_value(format!(
                    "stream {} configured twice",
                    stream.stream_id
                )));
            }
        }
        for stream in streams {
            debug!(
                "Configuring stream {} {}x{} {:?}",
                stream.stream_id, stream.width, stream.height, stream.encode_type
            );
            state.streams.insert(stream.stream_id, Arc::clone(stream));
        }
        Ok(())
    }

    async fn release_streams(&self, stream_ids: &[i32]) -> Result<bool> {
        self.faults.check("release_streams")?;
        let mut state = self.state.lock();
        if let Some(id) = stream_ids.iter().find(|id| state.capturing.contains(id)) {
            return Err(DCameraError::bad_value(format!(
                "stream {} is still capturing",
                id
            )));
        }
        for id in stream_ids {
            state.streams.remove(id);
        }
        Ok(state.streams.is_empty())
    }

    async fn release_all_streams(&self) -> Result<()> {
        self.faults.check("release_all_streams")?;
        let mut state = self.state.lock();
        state.capturing.clear();
        state.streams.clear();
        Ok(())
    }

    async fn start_capture(&self, captures: &[Arc<DCCaptureInfo>]) -> Result<Vec<i32>> {
        self.faults.check("start_capture")?;
        let mut state = self.state.lock();
        for capture in captures {
            if let Some(id) = capture
                .stream_ids
                .iter()
                .find(|id| !state.streams.contains_key(id))
            {
                return Err(DCameraError::bad_value(format!(
                    "stream {} is not configured",
                    id
                )));
            }
        }
        let mut started = Vec::new();
        for capture in captures {
            // snapshot streams only run when a capture is actually requested
            if capture.is_capture || capture.stream_type == StreamType::Continuous {
                for id in &capture.stream_ids {
                    if state.capturing.insert(*id) {
                        started.push(*id);
                    }
                }
            }
        }
        Ok(started)
    }

    async fn stop_capture(&self, stream_ids: &[i32]) -> Result<bool> {
        self.faults.check("stop_capture")?;
        let mut state = self.state.lock();
        for id in stream_ids {
            state.capturing.remove(id);
        }
        Ok(state.capturing.is_empty())
    }

    async fn stop_all_capture(&self) -> Result<()> {
        self.faults.check("stop_all_capture")?;
        self.state.lock().capturing.clear();
        Ok(())
    }

    async fn update_settings(&self, settings: &[Arc<DCameraSettings>]) -> Result<()> {
        self.faults.check("update_settings")?;
        self.state.lock().settings_applied += settings.len();
        Ok(())
    }
}
