use super::{DCamRetCode, Validator};
use crate::error::{Result, ValidationError};
use crate::source::{Completion, SourceDev};
use crate::types::{DCameraIndex, DHBase, HdiCameraSettings, HdiCaptureInfo, HdiStreamInfo};
use crate::utils::anonymize;
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Entry point the camera provider uses to drive a source device.
///
/// Every call is checked against the configured limits first; rejected
/// calls never reach the device. The device is held weakly, so calls made
/// after it has been destroyed fail instead of keeping it alive.
pub struct ProviderCallback {
    dev_id: String,
    dh_id: String,
    device: Weak<SourceDev>,
    validator: Validator,
}

impl ProviderCallback {
    pub fn new<D: Into<String>, H: Into<String>>(
        dev_id: D,
        dh_id: H,
        device: Weak<SourceDev>,
        validator: Validator,
    ) -> Self {
        Self {
            dev_id: dev_id.into(),
            dh_id: dh_id.into(),
            device,
            validator,
        }
    }

    pub fn index(&self) -> DCameraIndex {
        DCameraIndex::new(self.dev_id.clone(), self.dh_id.clone())
    }

    pub async fn open_session(&self, dh_base: &DHBase) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "OpenSession") {
            return code;
        }
        let device = match self.device("OpenSession") {
            Ok(device) => device,
            Err(code) => return code,
        };
        let index = DCameraIndex::from(dh_base);
        Self::finish("OpenSession", device.open_session(index)).await
    }

    pub async fn close_session(&self, dh_base: &DHBase) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "CloseSession") {
            return code;
        }
        let device = match self.device("CloseSession") {
            Ok(device) => device,
            Err(code) => return code,
        };
        let index = DCameraIndex::from(dh_base);
        Self::finish("CloseSession", device.close_session(index)).await
    }

    pub async fn configure_streams(
        &self,
        dh_base: &DHBase,
        stream_infos: &[HdiStreamInfo],
    ) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "ConfigureStreams") {
            return code;
        }
        let streams = match self.validator.stream_infos(stream_infos) {
            Ok(streams) => streams,
            Err(e) => return Self::reject("ConfigureStreams", e),
        };
        let device = match self.device("ConfigureStreams") {
            Ok(device) => device,
            Err(code) => return code,
        };
        Self::finish("ConfigureStreams", device.config_streams(streams)).await
    }

    pub async fn release_streams(&self, dh_base: &DHBase, stream_ids: &[i32]) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "ReleaseStreams") {
            return code;
        }
        let ids = match self.validator.stream_ids(stream_ids) {
            Ok(ids) => ids,
            Err(e) => return Self::reject("ReleaseStreams", e),
        };
        let device = match self.device("ReleaseStreams") {
            Ok(device) => device,
            Err(code) => return code,
        };
        Self::finish("ReleaseStreams", device.release_streams(ids)).await
    }

    pub async fn start_capture(
        &self,
        dh_base: &DHBase,
        capture_infos: &[HdiCaptureInfo],
    ) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "StartCapture") {
            return code;
        }
        let captures = match self.validator.capture_infos(capture_infos) {
            Ok(captures) => captures,
            Err(e) => return Self::reject("StartCapture", e),
        };
        let device = match self.device("StartCapture") {
            Ok(device) => device,
            Err(code) => return code,
        };
        Self::finish("StartCapture", device.start_capture(captures)).await
    }

    pub async fn stop_capture(&self, dh_base: &DHBase, stream_ids: &[i32]) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "StopCapture") {
            return code;
        }
        let ids = match self.validator.stream_ids(stream_ids) {
            Ok(ids) => ids,
            Err(e) => return Self::reject("StopCapture", e),
        };
        let device = match self.device("StopCapture") {
            Ok(device) => device,
            Err(code) => return code,
        };
        Self::finish("StopCapture", device.stop_capture(ids)).await
    }

    pub async fn update_settings(
        &self,
        dh_base: &DHBase,
        settings: &[HdiCameraSettings],
    ) -> DCamRetCode {
        if let Err(code) = self.check_identity(dh_base, "UpdateSettings") {
            return code;
        }
        let settings = match self.validator.settings(settings) {
            Ok(settings) => settings,
            Err(e) => return Self::reject("UpdateSettings", e),
        };
        let device = match self.device("UpdateSettings") {
            Ok(device) => device,
            Err(code) => return code,
        };
        Self::finish("UpdateSettings", device.update_settings(settings)).await
    }

    fn check_identity(
        &self,
        dh_base: &DHBase,
        operation: &str,
    ) -> std::result::Result<(), DCamRetCode> {
        if let Err(e) = self.validator.check_dh_base(dh_base) {
            return Err(Self::reject(operation, e));
        }
        if dh_base.device_id != self.dev_id || dh_base.dh_id != self.dh_id {
            return Err(Self::reject(operation, ValidationError::ForeignDevice));
        }
        Ok(())
    }

    fn device(&self, operation: &str) -> std::result::Result<Arc<SourceDev>, DCamRetCode> {
        self.device.upgrade().ok_or_else(|| {
            error!(
                "{}: source device {}/{} already destroyed",
                operation,
                anonymize(&self.dev_id),
                self.dh_id
            );
            DCamRetCode::Failed
        })
    }

    fn reject(operation: &str, error: ValidationError) -> DCamRetCode {
        warn!("{} rejected: {}", operation, error);
        DCamRetCode::InvalidArgument
    }

    async fn finish(operation: &str, posted: Result<Completion>) -> DCamRetCode {
        let result = match posted {
            Ok(completion) => completion.wait().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug!("{} done", operation);
                DCamRetCode::Success
            }
            Err(e) => {
                error!("{} failed: {}", operation, e);
                DCamRetCode::from(&e)
            }
        }
    }
}
