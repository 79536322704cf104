use thiserror::Error;

/// Internal status codes shared with the distributed hardware framework
pub mod errno {
    pub const DCAMERA_OK: i32 = 0;
    pub const DCAMERA_MEMORY_OPT_ERROR: i32 = -1;
    pub const DCAMERA_BAD_VALUE: i32 = -2;
    pub const DCAMERA_BAD_OPERATE: i32 = -3;
    pub const DCAMERA_INIT_ERR: i32 = -4;
    pub const DCAMERA_NOT_FOUND: i32 = -5;
    pub const DCAMERA_WRONG_STATE: i32 = -6;
    pub const DCAMERA_BAD_TYPE: i32 = -7;
    pub const DCAMERA_ALLOC_ERROR: i32 = -8;
    pub const DCAMERA_DEVICE_BUSY: i32 = -9;
}

#[derive(Error, Debug)]
pub enum DCameraError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Bad value: {details}")]
    BadValue { details: String },

    #[error("Operation {operation} not allowed in state {state}")]
    WrongState { state: String, operation: String },

    #[error("Device not found: {details}")]
    NotFound { details: String },

    #[error("Initialization failed in {component}: {details}")]
    Init { component: String, details: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },

    #[error("Source device has been destroyed")]
    DeviceDestroyed,

    #[error("System error: {message}")]
    System { message: String },
}

/// Rejections raised at the HDI boundary before anything reaches device state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Empty { field: &'static str },

    #[error("{field} length {len} exceeds {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} holds {count} items, limit is {max}")]
    TooManyItems {
        field: &'static str,
        count: usize,
        max: usize,
    },

    #[error("{field} is negative: {value}")]
    Negative { field: &'static str, value: i32 },

    #[error("resolution {width}x{height} exceeds {max_width}x{max_height}")]
    Resolution {
        width: i32,
        height: i32,
        max_width: u32,
        max_height: u32,
    },

    #[error("unknown {field} value {value}")]
    UnknownValue { field: &'static str, value: i32 },

    #[error("dhBase does not belong to this provider callback")]
    ForeignDevice,
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

impl DCameraError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn bad_value<S: Into<String>>(details: S) -> Self {
        Self::BadValue {
            details: details.into(),
        }
    }

    pub fn wrong_state<S: Into<String>, O: Into<String>>(state: S, operation: O) -> Self {
        Self::WrongState {
            state: state.into(),
            operation: operation.into(),
        }
    }

    /// Map the error onto the framework errno reported to listeners
    pub fn code(&self) -> i32 {
        match self {
            DCameraError::Validation(_) | DCameraError::BadValue { .. } => errno::DCAMERA_BAD_VALUE,
            DCameraError::WrongState { .. } => errno::DCAMERA_WRONG_STATE,
            DCameraError::NotFound { .. } | DCameraError::DeviceDestroyed => {
                errno::DCAMERA_NOT_FOUND
            }
            DCameraError::Init { .. } => errno::DCAMERA_INIT_ERR,
            DCameraError::Config(_) | DCameraError::Serialization(_) => errno::DCAMERA_BAD_TYPE,
            DCameraError::Io(_) => errno::DCAMERA_MEMORY_OPT_ERROR,
            DCameraError::EventBus(_)
            | DCameraError::Component { .. }
            | DCameraError::System { .. } => errno::DCAMERA_BAD_OPERATE,
        }
    }
}

pub type Result<T> = std::result::Result<T, DCameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: DCameraError = ValidationError::Empty { field: "devId" }.into();
        assert_eq!(err.code(), errno::DCAMERA_BAD_VALUE);
        assert_eq!(
            DCameraError::wrong_state("Init", "Open").code(),
            errno::DCAMERA_WRONG_STATE
        );
        assert_eq!(DCameraError::DeviceDestroyed.code(), errno::DCAMERA_NOT_FOUND);
        assert_eq!(
            DCameraError::component("input", "boom").code(),
            errno::DCAMERA_BAD_OPERATE
        );
    }

    #[test]
    fn test_error_messages() {
        let err = DCameraError::wrong_state("Registered", "StartCapture");
        assert_eq!(
            err.to_string(),
            "Operation StartCapture not allowed in state Registered"
        );

        let err = ValidationError::Resolution {
            width: 20000,
            height: 20000,
            max_width: 10000,
            max_height: 10000,
        };
        assert!(err.to_string().contains("20000x20000"));
    }
}
