use crate::config::LimitsConfig;
use crate::error::ValidationError;
use crate::types::{
    DCCaptureInfo, DCStreamInfo, DCameraSettings, DHBase, EncodeType, EnableParam,
    HdiCameraSettings, HdiCaptureInfo, HdiStreamInfo, SettingsType, StreamType,
};
use std::sync::Arc;

type CheckResult<T> = std::result::Result<T, ValidationError>;

/// Boundary checks applied to every inbound HDI call
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn check_id(&self, field: &'static str, id: &str) -> CheckResult<()> {
        if id.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if id.len() > self.limits.did_max_size {
            return Err(ValidationError::TooLong {
                field,
                len: id.len(),
                max: self.limits.did_max_size,
            });
        }
        Ok(())
    }

    pub fn check_dh_base(&self, dh_base: &DHBase) -> CheckResult<()> {
        self.check_id("deviceId", &dh_base.device_id)?;
        self.check_id("dhId", &dh_base.dh_id)
    }

    /// Non-empty and no larger than the container capacity
    pub fn check_container<T>(&self, field: &'static str, items: &[T]) -> CheckResult<()> {
        if items.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        self.check_capacity(field, items)
    }

    fn check_capacity<T>(&self, field: &'static str, items: &[T]) -> CheckResult<()> {
        if items.len() > self.limits.container_capacity_max_size {
            return Err(ValidationError::TooManyItems {
                field,
                count: items.len(),
                max: self.limits.container_capacity_max_size,
            });
        }
        Ok(())
    }

    pub fn check_resolution(&self, width: i32, height: i32) -> CheckResult<()> {
        let max = self.limits.resolution_max_width as u64 * self.limits.resolution_max_height as u64;
        // both factors are non-negative i32 here, the product fits in u64
        if width as u64 * height as u64 > max {
            return Err(ValidationError::Resolution {
                width,
                height,
                max_width: self.limits.resolution_max_width,
                max_height: self.limits.resolution_max_height,
            });
        }
        Ok(())
    }

    pub fn check_stream_info(&self, info: &HdiStreamInfo) -> CheckResult<()> {
        non_negative("streamId", info.stream_id)?;
        check_geometry(
            info.width,
            info.height,
            info.stride,
            info.format,
            info.dataspace,
        )?;
        self.check_resolution(info.width, info.height)
    }

    pub fn check_capture_info(&self, info: &HdiCaptureInfo) -> CheckResult<()> {
        self.check_container("streamIds", &info.stream_ids)?;
        for id in &info.stream_ids {
            non_negative("streamId", *id)?;
        }
        check_geometry(
            info.width,
            info.height,
            info.stride,
            info.format,
            info.dataspace,
        )?;
        self.check_resolution(info.width, info.height)?;
        self.check_capacity("captureSettings", &info.capture_settings)?;
        for setting in &info.capture_settings {
            self.check_setting_value(setting)?;
        }
        Ok(())
    }

    pub fn check_settings(&self, settings: &[HdiCameraSettings]) -> CheckResult<()> {
        self.check_container("settings", settings)?;
        for setting in settings {
            self.check_setting_value(setting)?;
        }
        Ok(())
    }

    fn check_setting_value(&self, setting: &HdiCameraSettings) -> CheckResult<()> {
        if setting.value.len() > self.limits.param_max_size {
            return Err(ValidationError::TooLong {
                field: "settings.value",
                len: setting.value.len(),
                max: self.limits.param_max_size,
            });
        }
        Ok(())
    }

    /// Checks applied when the framework registers a remote camera
    pub fn check_registration(
        &self,
        dev_id: &str,
        dh_id: &str,
        req_id: &str,
        param: &EnableParam,
    ) -> CheckResult<()> {
        self.check_id("devId", dev_id)?;
        self.check_id("dhId", dh_id)?;
        self.check_id("reqId", req_id)?;
        if param.attrs.len() > self.limits.param_max_size {
            return Err(ValidationError::TooLong {
                field: "attrs",
                len: param.attrs.len(),
                max: self.limits.param_max_size,
            });
        }
        Ok(())
    }

    pub fn stream_infos(&self, infos: &[HdiStreamInfo]) -> CheckResult<Vec<Arc<DCStreamInfo>>> {
        self.check_container("streamInfos", infos)?;
        infos
            .iter()
            .map(|info| {
                self.check_stream_info(info)?;
                Ok(Arc::new(DCStreamInfo {
                    stream_id: info.stream_id,
                    width: info.width as u32,
                    height: info.height as u32,
                    stride: info.stride as u32,
                    format: info.format as u32,
                    dataspace: info.dataspace as u32,
                    encode_type: EncodeType::try_from(info.encode_type)?,
                    stream_type: StreamType::try_from(info.stream_type)?,
                }))
            })
            .collect()
    }

    pub fn capture_infos(
        &self,
        infos: &[HdiCaptureInfo],
    ) -> CheckResult<Vec<Arc<DCCaptureInfo>>> {
        self.check_container("captureInfos", infos)?;
        infos
            .iter()
            .map(|info| {
                self.check_capture_info(info)?;
                let capture_settings = info
                    .capture_settings
                    .iter()
                    .map(translate_setting)
                    .collect::<CheckResult<Vec<_>>>()?;
                Ok(Arc::new(DCCaptureInfo {
                    stream_ids: info.stream_ids.clone(),
                    width: info.width as u32,
                    height: info.height as u32,
                    stride: info.stride as u32,
                    format: info.format as u32,
                    dataspace: info.dataspace as u32,
                    is_capture: info.is_capture,
                    encode_type: EncodeType::try_from(info.encode_type)?,
                    stream_type: StreamType::try_from(info.stream_type)?,
                    capture_settings,
                }))
            })
            .collect()
    }

    pub fn settings(
        &self,
        settings: &[HdiCameraSettings],
    ) -> CheckResult<Vec<Arc<DCameraSettings>>> {
        self.check_settings(settings)?;
        settings
            .iter()
            .map(|setting| translate_setting(setting).map(Arc::new))
            .collect()
    }

    pub fn stream_ids(&self, ids: &[i32]) -> CheckResult<Vec<i32>> {
        self.check_container("streamIds", ids)?;
        for id in ids {
            non_negative("streamId", *id)?;
        }
        Ok(ids.to_vec())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

fn non_negative(field: &'static str, value: i32) -> CheckResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

fn check_geometry(
    width: i32,
    height: i32,
    stride: i32,
    format: i32,
    dataspace: i32,
) -> CheckResult<()> {
    non_negative("width", width)?;
    non_negative("height", height)?;
    non_negative("stride", stride)?;
    non_negative("format", format)?;
    non_negative("dataspace", dataspace)
}

fn translate_setting(setting: &HdiCameraSettings) -> CheckResult<DCameraSettings> {
    Ok(DCameraSettings {
        setting_type: SettingsType::try_from(setting.setting_type)?,
        value: setting.value.clone(),
    })
}
