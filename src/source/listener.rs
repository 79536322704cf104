use crate::error::errno;
use crate::utils::anonymize;
use parking_lot::Mutex;
use tracing::{info, warn};

/// Outcome reported to the distributed hardware framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub dev_id: String,
    pub dh_id: String,
    pub req_id: String,
    pub status: i32,
    pub data: String,
}

/// Receives registration outcomes of source devices
pub trait RegisterListener: Send + Sync {
    fn on_register_result(&self, result: RegistrationResult);
    fn on_unregister_result(&self, result: RegistrationResult);
}

/// Listener keeping every reported result
#[derive(Debug, Default)]
pub struct RecordingListener {
    registered: Mutex<Vec<RegistrationResult>>,
    unregistered: Mutex<Vec<RegistrationResult>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_results(&self) -> Vec<RegistrationResult> {
        self.registered.lock().clone()
    }

    pub fn unregister_results(&self) -> Vec<RegistrationResult> {
        self.unregistered.lock().clone()
    }
}

impl RegisterListener for RecordingListener {
    fn on_register_result(&self, result: RegistrationResult) {
        self.registered.lock().push(result);
    }

    fn on_unregister_result(&self, result: RegistrationResult) {
        self.unregistered.lock().push(result);
    }
}

/// Listener writing every result to the log
#[derive(Debug, Default)]
pub struct LoggingListener;

impl RegisterListener for LoggingListener {
    fn on_register_result(&self, result: RegistrationResult) {
        if result.status == errno::DCAMERA_OK {
            info!(
                "Camera {}/{} registered, req {}",
                anonymize(&result.dev_id),
                result.dh_id,
                result.req_id
            );
        } else {
            warn!(
                "Camera {}/{} registration failed with {}: {}",
                anonymize(&result.dev_id),
                result.dh_id,
                result.status,
                result.data
            );
        }
    }

    fn on_unregister_result(&self, result: RegistrationResult) {
        info!(
            "Camera {}/{} unregistered with status {}, req {}",
            anonymize(&result.dev_id),
            result.dh_id,
            result.status,
            result.req_id
        );
    }
}
