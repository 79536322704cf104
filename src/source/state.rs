use crate::error::{DCameraError, Result};
use crate::source::event::{RegisterParam, SourceEventData};
use crate::source::notify::CameraEvent;
use crate::types::{DCCaptureInfo, DCStreamInfo, DCameraIndex, DCameraSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle states of a source device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceState {
    Init,
    Registered,
    Opened,
    Configured,
    Capture,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Work the state machine delegates to the device
#[async_trait]
pub trait SourceActions: Send {
    async fn register(&mut self, param: &RegisterParam) -> Result<()>;
    async fn unregister(&mut self, param: &RegisterParam) -> Result<()>;
    async fn open(&mut self, index: &DCameraIndex) -> Result<()>;
    /// Best-effort teardown of capture, streams and channels
    async fn close(&mut self) -> Result<()>;
    async fn config_streams(&mut self, streams: &[Arc<DCStreamInfo>]) -> Result<()>;
    async fn release_all_streams(&mut self) -> Result<()>;
    /// Returns true once no configured stream is left
    async fn release_streams(&mut self, stream_ids: &[i32]) -> Result<bool>;
    async fn start_capture(&mut self, captures: &[Arc<DCCaptureInfo>]) -> Result<()>;
    /// Returns true once nothing is capturing any more
    async fn stop_capture(&mut self, stream_ids: &[i32]) -> Result<bool>;
    async fn update_settings(&mut self, settings: &[Arc<DCameraSettings>]) -> Result<()>;
    async fn event_notify(&mut self, event: &CameraEvent) -> Result<()>;
}

/// Transition authority of one source device
#[derive(Debug)]
pub struct StateMachine {
    state: SourceState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SourceState::Init,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Run one event. On error the state stays where it was, except for a
    /// failed reconfiguration which has already dropped the old streams and a
    /// failed unregistration after the session was closed.
    pub async fn execute<A>(&mut self, actions: &mut A, data: &SourceEventData) -> Result<()>
    where
        A: SourceActions + ?Sized,
    {
        use SourceEventData as E;
        use SourceState as S;

        let current = self.state;
        let next = match (current, data) {
            (S::Init | S::Registered, E::Register(param)) => {
                actions.register(param).await?;
                S::Registered
            }
            (S::Init | S::Registered, E::Unregister(param)) => {
                actions.unregister(param).await?;
                S::Init
            }
            (S::Opened | S::Configured | S::Capture, E::Unregister(param)) => {
                actions.close().await?;
                // the session is gone even if the provider refuses to disable
                self.state = S::Registered;
                actions.unregister(param).await?;
                S::Init
            }
            (S::Registered, E::Open(index)) => {
                actions.open(index).await?;
                S::Opened
            }
            (S::Opened | S::Configured | S::Capture, E::Open(_)) => current,
            (S::Registered, E::Close(_)) => current,
            (S::Opened | S::Configured | S::Capture, E::Close(_)) => {
                actions.close().await?;
                S::Registered
            }
            (S::Opened, E::ConfigStreams(streams)) => {
                actions.config_streams(streams).await?;
                S::Configured
            }
            (S::Configured, E::ConfigStreams(streams)) => {
                actions.release_all_streams().await?;
                if let Err(e) = actions.config_streams(streams).await {
                    warn!("Reconfiguration failed, falling back to {}", S::Opened);
                    self.state = S::Opened;
                    return Err(e);
                }
                S::Configured
            }
            (S::Opened, E::ReleaseStreams(_)) => current,
            (S::Configured, E::ReleaseStreams(ids)) => {
                if actions.release_streams(ids).await? {
                    S::Opened
                } else {
                    S::Configured
                }
            }
            (S::Configured | S::Capture, E::StartCapture(captures)) => {
                actions.start_capture(captures).await?;
                S::Capture
            }
            (S::Configured, E::StopCapture(_)) => current,
            (S::Capture, E::StopCapture(ids)) => {
                if actions.stop_capture(ids).await? {
                    S::Configured
                } else {
                    S::Capture
                }
            }
            (S::Registered | S::Opened | S::Configured | S::Capture, E::UpdateSettings(settings)) => {
                actions.update_settings(settings).await?;
                current
            }
            (S::Registered, E::EventNotify(event)) => {
                actions.event_notify(event).await?;
                current
            }
            (S::Opened | S::Configured | S::Capture, E::EventNotify(event)) => {
                actions.event_notify(event).await?;
                if event.is_channel_disconnected() {
                    warn!("Channel disconnected in state {}, closing session", current);
                    actions.close().await?;
                    S::Registered
                } else {
                    current
                }
            }
            (state, data) => {
                return Err(DCameraError::wrong_state(
                    state.to_string(),
                    data.event_type().to_string(),
                ));
            }
        };

        if next != current {
            debug!("Source state {} -> {}", current, next);
        }
        self.state = next;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
