use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DCameraConfig {
    pub limits: LimitsConfig,
    pub source: SourceConfig,
    /// Remote cameras registered at daemon startup
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Bounds enforced on every inbound HDI call
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    /// Maximum length of device, hardware and request ids
    #[serde(default = "default_did_max_size")]
    pub did_max_size: usize,

    /// Maximum element count of any inbound collection
    #[serde(default = "default_container_capacity_max_size")]
    pub container_capacity_max_size: usize,

    #[serde(default = "default_resolution_max_width")]
    pub resolution_max_width: u32,

    #[serde(default = "default_resolution_max_height")]
    pub resolution_max_height: u32,

    /// Maximum byte length of a settings value or abilities blob
    #[serde(default = "default_param_max_size")]
    pub param_max_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Capacity of the per-device event queue
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Settings kept by the controller while no session is open
    #[serde(default = "default_metadata_cache_size")]
    pub metadata_cache_size: usize,

    /// Protocol version announced on registration
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub dev_id: String,
    pub dh_id: String,
    /// Camera abilities blob handed to the provider
    #[serde(default)]
    pub attrs: String,
}

impl DCameraConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("dcamera.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("limits.did_max_size", default_did_max_size() as i64)?
            .set_default(
                "limits.container_capacity_max_size",
                default_container_capacity_max_size() as i64,
            )?
            .set_default("limits.resolution_max_width", default_resolution_max_width())?
            .set_default("limits.resolution_max_height", default_resolution_max_height())?
            .set_default("limits.param_max_size", default_param_max_size() as i64)?
            .set_default(
                "source.event_queue_capacity",
                default_event_queue_capacity() as i64,
            )?
            .set_default(
                "source.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "source.metadata_cache_size",
                default_metadata_cache_size() as i64,
            )?
            .set_default("source.version", default_version())?
            .add_source(File::with_name(&path_str).required(false))
            // DCAMERA_LIMITS__DID_MAX_SIZE=128 overrides limits.did_max_size
            .add_source(
                Environment::with_prefix("DCAMERA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DCameraConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.did_max_size == 0 {
            return Err(ConfigError::Message(
                "limits.did_max_size must be greater than 0".to_string(),
            ));
        }

        if limits.container_capacity_max_size == 0 {
            return Err(ConfigError::Message(
                "limits.container_capacity_max_size must be greater than 0".to_string(),
            ));
        }

        if limits.resolution_max_width == 0 || limits.resolution_max_height == 0 {
            return Err(ConfigError::Message(
                "Maximum resolution must be greater than 0".to_string(),
            ));
        }

        if limits.param_max_size == 0 {
            return Err(ConfigError::Message(
                "limits.param_max_size must be greater than 0".to_string(),
            ));
        }

        if self.source.event_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Event queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.source.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        for device in &self.devices {
            if device.dev_id.is_empty() || device.dh_id.is_empty() {
                return Err(ConfigError::Message(
                    "Configured devices need both dev_id and dh_id".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for DCameraConfig {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            source: SourceConfig {
                event_queue_capacity: default_event_queue_capacity(),
                event_bus_capacity: default_event_bus_capacity(),
                metadata_cache_size: default_metadata_cache_size(),
                version: default_version(),
            },
            devices: Vec::new(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            did_max_size: default_did_max_size(),
            container_capacity_max_size: default_container_capacity_max_size(),
            resolution_max_width: default_resolution_max_width(),
            resolution_max_height: default_resolution_max_height(),
            param_max_size: default_param_max_size(),
        }
    }
}

// Default value functions
fn default_did_max_size() -> usize {
    256
}
fn default_container_capacity_max_size() -> usize {
    50 * 1024
}
fn default_resolution_max_width() -> u32 {
    10000
}
fn default_resolution_max_height() -> u32 {
    10000
}
fn default_param_max_size() -> usize {
    50 * 1024 * 1024
}

fn default_event_queue_capacity() -> usize {
    64
}
fn default_event_bus_capacity() -> usize {
    100
}
fn default_metadata_cache_size() -> usize {
    10
}
fn default_version() -> String {
    "1.0".to_string()
}
