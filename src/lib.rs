pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod provider;
pub mod source;
pub mod types;
pub mod utils;

pub use app::{ComponentState, DCameraApp, ShutdownReason, ShutdownTrigger};
pub use config::{DCameraConfig, DeviceConfig, LimitsConfig, SourceConfig};
pub use error::{DCameraError, EventBusError, Result, ValidationError};
pub use events::{DCameraEvent, EventBus, EventFilter, EventReceiver};
pub use provider::{CameraProvider, DCamRetCode, ProviderCallback, SimulatedProvider, Validator};
pub use source::{
    CameraController, CameraEvent, CameraInput, Completion, RegisterListener, SourceDev,
    SourceService, SourceState,
};
pub use types::{DCameraIndex, DHBase, EnableParam};
