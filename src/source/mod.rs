//! Source side of a distributed camera.
//!
//! Each registered remote camera gets a [`SourceDev`]: a queue of requests
//! drained by one worker that drives the [`StateMachine`] and the control
//! ([`CameraController`]) and data ([`CameraInput`]) collaborators.
//! [`SourceService`] keeps the registry of devices.

pub mod controller;
pub mod dev;
pub mod event;
pub mod fault;
pub mod input;
pub mod listener;
pub mod notify;
pub mod service;
pub mod state;

#[cfg(test)]
mod tests;

pub use controller::{CameraController, SimulatedController};
pub use dev::{SourceDev, SourceDevContext};
pub use event::{Completion, RegisterParam, SourceEvent, SourceEventData, SourceEventType};
pub use fault::FaultInjector;
pub use input::{CameraInput, SimulatedInput};
pub use listener::{LoggingListener, RecordingListener, RegisterListener, RegistrationResult};
pub use notify::{build_event_cmd, parse_event_cmd, CameraEvent};
pub use service::{DeviceBackend, SimulatedBackend, SourceService};
pub use state::{SourceActions, SourceState, StateMachine};
