//! HDI-facing side of the source device.
//!
//! `CameraProvider` is the local camera provider a source device enables
//! itself on. The provider talks back through a [`ProviderCallback`], which
//! validates every inbound call before anything reaches device state.

mod callback;
mod simulated;
mod validate;


pub use callback::ProviderCallback;
pub use simulated::SimulatedProvider;
pub use validate::Validator;

use crate::error::{DCameraError, Result};
use crate::types::{DHBase, HdfEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Result codes returned across the HDI boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DCamRetCode {
    Success = 0,
    CameraBusy = 1,
    InvalidArgument = 2,
    MethodNotSupported = 3,
    CameraOffline = 4,
    ExceedMaxNumber = 5,
    DeviceNotInit = 6,
    Failed = 7,
}

impl DCamRetCode {
    pub fn is_success(self) -> bool {
        self == DCamRetCode::Success
    }
}

impl From<&DCameraError> for DCamRetCode {
    fn from(error: &DCameraError) -> Self {
        match error {
            DCameraError::Validation(_) | DCameraError::BadValue { .. } => {
                DCamRetCode::InvalidArgument
            }
            _ => DCamRetCode::Failed,
        }
    }
}

/// Local camera provider the source device registers with.
///
/// Implementations must not call back into the handed-over callback from
/// within `enable_device`: the device is still executing its registration.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn enable_device(
        &self,
        dh_base: &DHBase,
        abilities: &str,
        callback: Arc<ProviderCallback>,
    ) -> Result<()>;

    async fn disable_device(&self, dh_base: &DHBase) -> Result<()>;

    async fn notify(&self, dh_base: &DHBase, event: &HdfEvent) -> Result<()>;
}
