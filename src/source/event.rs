use crate::error::{DCameraError, Result};
use crate::source::notify::CameraEvent;
use crate::types::{DCCaptureInfo, DCStreamInfo, DCameraIndex, DCameraSettings, EnableParam};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceEventType {
    Register,
    Unregister,
    Open,
    Close,
    ConfigStreams,
    ReleaseStreams,
    StartCapture,
    StopCapture,
    UpdateSettings,
    EventNotify,
}

impl fmt::Display for SourceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct RegisterParam {
    pub dev_id: String,
    pub dh_id: String,
    pub req_id: String,
    pub param: EnableParam,
}

/// Payload carried by a queued source event
#[derive(Debug, Clone)]
pub enum SourceEventData {
    Register(RegisterParam),
    Unregister(RegisterParam),
    Open(DCameraIndex),
    Close(DCameraIndex),
    ConfigStreams(Vec<Arc<DCStreamInfo>>),
    ReleaseStreams(Vec<i32>),
    StartCapture(Vec<Arc<DCCaptureInfo>>),
    StopCapture(Vec<i32>),
    UpdateSettings(Vec<Arc<DCameraSettings>>),
    EventNotify(CameraEvent),
}

impl SourceEventData {
    pub fn event_type(&self) -> SourceEventType {
        match self {
            SourceEventData::Register(_) => SourceEventType::Register,
            SourceEventData::Unregister(_) => SourceEventType::Unregister,
            SourceEventData::Open(_) => SourceEventType::Open,
            SourceEventData::Close(_) => SourceEventType::Close,
            SourceEventData::ConfigStreams(_) => SourceEventType::ConfigStreams,
            SourceEventData::ReleaseStreams(_) => SourceEventType::ReleaseStreams,
            SourceEventData::StartCapture(_) => SourceEventType::StartCapture,
            SourceEventData::StopCapture(_) => SourceEventType::StopCapture,
            SourceEventData::UpdateSettings(_) => SourceEventType::UpdateSettings,
            SourceEventData::EventNotify(_) => SourceEventType::EventNotify,
        }
    }
}

/// An event waiting in a source device queue
pub struct SourceEvent {
    pub data: SourceEventData,
    pub(crate) reply: Option<oneshot::Sender<Result<()>>>,
}

impl SourceEvent {
    pub fn new(data: SourceEventData) -> (Self, Completion) {
        let (reply, receiver) = oneshot::channel();
        let event = Self {
            data,
            reply: Some(reply),
        };
        (event, Completion { receiver })
    }

    pub fn event_type(&self) -> SourceEventType {
        self.data.event_type()
    }

    /// Hand the execution result back to whoever is waiting on it
    pub(crate) fn complete(&mut self, result: Result<()>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }
}

/// Handle on the execution of a queued event.
///
/// Dropping it is fine; the event still executes.
#[must_use = "dropping a Completion discards the execution result"]
pub struct Completion {
    receiver: oneshot::Receiver<Result<()>>,
}

impl Completion {
    /// Wait until the state machine has executed the event
    pub async fn wait(self) -> Result<()> {
        self.receiver
            .await
            .map_err(|_| DCameraError::DeviceDestroyed)?
    }
}
