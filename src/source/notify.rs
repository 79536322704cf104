use crate::error::{DCameraError, Result};
use crate::types::{HdfEvent, HdfEventResult, HdfEventType};
use serde::{Deserialize, Serialize};

pub const STATE_NOTIFY_COMMAND: &str = "STATE_NOTIFY";
pub const MESSAGE_TYPE: &str = "MESSAGE";

/// State notification sent by the remote sink over the control channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEvent {
    pub event_type: HdfEventType,
    pub event_result: HdfEventResult,
    pub event_content: String,
}

impl CameraEvent {
    pub fn is_channel_disconnected(&self) -> bool {
        self.event_result == HdfEventResult::ChannelDisconnected
    }

    pub fn to_hdf_event(&self) -> HdfEvent {
        HdfEvent {
            event_type: self.event_type,
            result: self.event_result,
            content: self.event_content.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EventCmd {
    #[serde(rename = "Type")]
    msg_type: String,
    #[serde(rename = "dhId")]
    dh_id: String,
    #[serde(rename = "Command")]
    command: String,
    #[serde(rename = "Value")]
    value: EventValue,
}

#[derive(Debug, Serialize, Deserialize)]
struct EventValue {
    #[serde(rename = "EventType")]
    event_type: i32,
    #[serde(rename = "EventResult")]
    event_result: i32,
    #[serde(rename = "EventContent", default)]
    event_content: String,
}

/// Parse a sink `STATE_NOTIFY` command
pub fn parse_event_cmd(json: &str) -> Result<CameraEvent> {
    let cmd: EventCmd = serde_json::from_str(json)
        .map_err(|e| DCameraError::bad_value(format!("malformed event command: {}", e)))?;

    if cmd.msg_type != MESSAGE_TYPE {
        return Err(DCameraError::bad_value(format!(
            "unexpected message type {}",
            cmd.msg_type
        )));
    }
    if cmd.command != STATE_NOTIFY_COMMAND {
        return Err(DCameraError::bad_value(format!(
            "unexpected command {}",
            cmd.command
        )));
    }

    Ok(CameraEvent {
        event_type: HdfEventType::try_from(cmd.value.event_type)?,
        event_result: HdfEventResult::try_from(cmd.value.event_result)?,
        event_content: cmd.value.event_content,
    })
}

/// Build the `STATE_NOTIFY` command for an event
pub fn build_event_cmd(dh_id: &str, event: &CameraEvent) -> Result<String> {
    let cmd = EventCmd {
        msg_type: MESSAGE_TYPE.to_string(),
        dh_id: dh_id.to_string(),
        command: STATE_NOTIFY_COMMAND.to_string(),
        value: EventValue {
            event_type: event.event_type as i32,
            event_result: event.event_result as i32,
            event_content: event.event_content.clone(),
        },
    };
    serde_json::to_string(&cmd).map_err(|e| DCameraError::bad_value(e.to_string()))
}
