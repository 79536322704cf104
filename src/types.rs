//! Distributed hardware value objects.
//!
//! `Hdi*` types mirror what the hardware stack hands to the provider callback:
//! plain signed integers that have not been checked yet. The `DC*` types are
//! what a source device works with once the boundary has accepted them.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device id + hardware id pair identifying a remote peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DHBase {
    pub device_id: String,
    pub dh_id: String,
}

impl DHBase {
    pub fn new<D: Into<String>, H: Into<String>>(device_id: D, dh_id: H) -> Self {
        Self {
            device_id: device_id.into(),
            dh_id: dh_id.into(),
        }
    }
}

/// Key of one source device instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DCameraIndex {
    pub dev_id: String,
    pub dh_id: String,
}

impl DCameraIndex {
    pub fn new<D: Into<String>, H: Into<String>>(dev_id: D, dh_id: H) -> Self {
        Self {
            dev_id: dev_id.into(),
            dh_id: dh_id.into(),
        }
    }

    pub fn dh_base(&self) -> DHBase {
        DHBase::new(self.dev_id.clone(), self.dh_id.clone())
    }
}

impl From<&DHBase> for DCameraIndex {
    fn from(base: &DHBase) -> Self {
        Self::new(base.device_id.clone(), base.dh_id.clone())
    }
}

impl fmt::Display for DCameraIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            crate::utils::anonymize(&self.dev_id),
            self.dh_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodeType {
    Null = 0,
    H264 = 1,
    H265 = 2,
    Jpeg = 3,
    Mpeg4V = 4,
}

impl TryFrom<i32> for EncodeType {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EncodeType::Null),
            1 => Ok(EncodeType::H264),
            2 => Ok(EncodeType::H265),
            3 => Ok(EncodeType::Jpeg),
            4 => Ok(EncodeType::Mpeg4V),
            _ => Err(ValidationError::UnknownValue {
                field: "encodeType",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Preview / video frames pushed continuously
    Continuous = 0,
    /// Single still capture
    Snapshot = 1,
}

impl TryFrom<i32> for StreamType {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StreamType::Continuous),
            1 => Ok(StreamType::Snapshot),
            _ => Err(ValidationError::UnknownValue {
                field: "streamType",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingsType {
    UpdateMetadata = 0,
    EnableMetadata = 1,
    DisableMetadata = 2,
    MetadataResult = 3,
    SetFlashLight = 4,
    FpsRange = 5,
    UpdateFrameMetadata = 6,
}

impl TryFrom<i32> for SettingsType {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SettingsType::UpdateMetadata),
            1 => Ok(SettingsType::EnableMetadata),
            2 => Ok(SettingsType::DisableMetadata),
            3 => Ok(SettingsType::MetadataResult),
            4 => Ok(SettingsType::SetFlashLight),
            5 => Ok(SettingsType::FpsRange),
            6 => Ok(SettingsType::UpdateFrameMetadata),
            _ => Err(ValidationError::UnknownValue {
                field: "settingsType",
                value,
            }),
        }
    }
}

/// Stream geometry as delivered by the HDI layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HdiStreamInfo {
    pub stream_id: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: i32,
    pub dataspace: i32,
    pub encode_type: i32,
    pub stream_type: i32,
}

/// Capture request as delivered by the HDI layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HdiCaptureInfo {
    pub stream_ids: Vec<i32>,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: i32,
    pub dataspace: i32,
    pub is_capture: bool,
    pub encode_type: i32,
    pub stream_type: i32,
    pub capture_settings: Vec<HdiCameraSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HdiCameraSettings {
    pub setting_type: i32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DCStreamInfo {
    pub stream_id: i32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
    pub dataspace: u32,
    pub encode_type: EncodeType,
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DCCaptureInfo {
    pub stream_ids: Vec<i32>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
    pub dataspace: u32,
    pub is_capture: bool,
    pub encode_type: EncodeType,
    pub stream_type: StreamType,
    pub capture_settings: Vec<DCameraSettings>,
}

/// Opaque settings blob (usually base64 encoded camera metadata)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DCameraSettings {
    pub setting_type: SettingsType,
    pub value: String,
}

/// Registration parameters handed over by the distributed hardware framework
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnableParam {
    pub version: String,
    /// Camera abilities, a JSON document the provider interprets
    pub attrs: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdfEventType {
    Message = 0,
    Operation = 1,
}

impl TryFrom<i32> for HdfEventType {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HdfEventType::Message),
            1 => Ok(HdfEventType::Operation),
            _ => Err(ValidationError::UnknownValue {
                field: "EventType",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdfEventResult {
    ChannelConnected = 0,
    ChannelDisconnected = 1,
    OpenChannelError = 2,
    ConfigStreamsError = 3,
    ReleaseStreamsError = 4,
    StartCaptureError = 5,
    StopCaptureError = 6,
    UpdateSettingsError = 7,
    DeviceError = 8,
    DevicePreempt = 9,
    DeviceInUse = 10,
    NoPermission = 11,
}

impl TryFrom<i32> for HdfEventResult {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use HdfEventResult::*;
        let result = match value {
            0 => ChannelConnected,
            1 => ChannelDisconnected,
            2 => OpenChannelError,
            3 => ConfigStreamsError,
            4 => ReleaseStreamsError,
            5 => StartCaptureError,
            6 => StopCaptureError,
            7 => UpdateSettingsError,
            8 => DeviceError,
            9 => DevicePreempt,
            10 => DeviceInUse,
            11 => NoPermission,
            _ => {
                return Err(ValidationError::UnknownValue {
                    field: "EventResult",
                    value,
                })
            }
        };
        Ok(result)
    }
}

/// Notification pushed to the provider about device state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdfEvent {
    pub event_type: HdfEventType,
    pub result: HdfEventResult,
    pub content: String,
}

impl HdfEvent {
    pub fn message<S: Into<String>>(result: HdfEventResult, content: S) -> Self {
        Self {
            event_type: HdfEventType::Message,
            result,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_conversions() {
        assert_eq!(EncodeType::try_from(3).unwrap(), EncodeType::Jpeg);
        assert!(EncodeType::try_from(9).is_err());
        assert_eq!(StreamType::try_from(1).unwrap(), StreamType::Snapshot);
        assert_eq!(
            StreamType::try_from(-1),
            Err(ValidationError::UnknownValue {
                field: "streamType",
                value: -1
            })
        );
        assert_eq!(
            HdfEventResult::try_from(1).unwrap(),
            HdfEventResult::ChannelDisconnected
        );
        assert!(HdfEventResult::try_from(12).is_err());
    }

    #[test]
    fn test_index_from_dh_base() {
        let base = DHBase::new("device-123456789", "camera_0");
        let index = DCameraIndex::from(&base);
        assert_eq!(index.dev_id, "device-123456789");
        assert_eq!(index.dh_base(), base);
        assert!(!index.to_string().contains("123456789"));
    }
}
