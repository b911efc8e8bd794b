use std::env;
use std::fs;
use std::time::Duration;

use iotdm_api::{DeviceIdentity, DeviceInfo, TopicScheme};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize_path;
use crate::errors::SettingsError;

const CONFIG_ENV: &str = "IOTDM_CONFIG";
const RUN_MODE_ENV: &str = "IOTDM_RUN_MODE";
const DEFAULT_PATH: &str = "configs/default.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub organization: String,
    pub device_type: String,
    pub device_id: String,
    pub auth_token: Option<String>,
}

impl Device {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.organization, &self.device_type, &self.device_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    /// Defaults to the organization's messaging host.
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub response_timeout_secs: u64,
    pub unmanage_timeout_secs: u64,
    pub renewal_margin_secs: u64,
    pub min_lifetime_secs: u64,
    pub renewal_retries: u32,
    pub renewal_retry_delay_secs: u64,
    pub topic_scheme: TopicScheme,
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            response_timeout_secs: config.response_timeout.as_secs(),
            unmanage_timeout_secs: config.unmanage_timeout.as_secs(),
            renewal_margin_secs: config.renewal_margin.as_secs(),
            min_lifetime_secs: config.min_lifetime.as_secs(),
            renewal_retries: config.renewal_retries,
            renewal_retry_delay_secs: config.renewal_retry_delay.as_secs(),
            topic_scheme: config.topic_scheme,
        }
    }
}

impl Engine {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            unmanage_timeout: Duration::from_secs(self.unmanage_timeout_secs),
            renewal_margin: Duration::from_secs(self.renewal_margin_secs),
            min_lifetime: Duration::from_secs(self.min_lifetime_secs),
            renewal_retries: self.renewal_retries,
            renewal_retry_delay: Duration::from_secs(self.renewal_retry_delay_secs),
            topic_scheme: self.topic_scheme,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Agent {
    pub lifetime_secs: u64,
    pub supports_firmware_actions: bool,
    pub supports_device_actions: bool,
    pub info: DeviceInfo,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub device: Device,
    pub broker: Broker,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub agent: Agent,
}

impl Settings {
    /// Load `$IOTDM_CONFIG` (or `configs/default.toml`), then overlay
    /// `configs/$IOTDM_RUN_MODE.toml` when that file exists.
    pub fn new() -> Result<Self, SettingsError> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut table = read_table(&path)?;

        if let Ok(run_mode) = env::var(RUN_MODE_ENV) {
            let overlay = format!("configs/{run_mode}.toml");
            if normalize_path(&overlay).map(|p| p.is_file()).unwrap_or(false) {
                merge_tables(&mut table, read_table(&overlay)?);
            }
        }

        let settings: Settings = toml::Value::Table(table).try_into()?;
        settings.validate()?;

        Ok(settings)
    }

    pub fn from_toml(source: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn broker_host(&self) -> String {
        self.broker
            .host
            .clone()
            .unwrap_or_else(|| self.device.identity().messaging_host())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.engine.response_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "engine.response_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }

        if self.engine.renewal_margin_secs >= self.engine.min_lifetime_secs {
            return Err(SettingsError::Invalid {
                field: "engine.renewal_margin_secs",
                reason: format!(
                    "must be below min_lifetime_secs ({})",
                    self.engine.min_lifetime_secs
                ),
            });
        }

        for (field, value) in [
            ("device.organization", &self.device.organization),
            ("device.device_type", &self.device.device_type),
            ("device.device_id", &self.device.device_id),
        ] {
            if value.is_empty() {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "must not be empty".into(),
                });
            }
        }

        Ok(())
    }
}

/// Engine tuning consumed by [`ManagedDevice`](crate::ManagedDevice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on waiting for a manage or update response.
    pub response_timeout: Duration,
    /// Bound on waiting for an unmanage response before giving up on the server.
    pub unmanage_timeout: Duration,
    /// How long before lifetime expiry the renewal is sent.
    pub renewal_margin: Duration,
    /// Non-zero lifetimes below this are raised to it.
    pub min_lifetime: Duration,
    pub renewal_retries: u32,
    pub renewal_retry_delay: Duration,
    pub topic_scheme: TopicScheme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            unmanage_timeout: Duration::from_secs(10),
            renewal_margin: Duration::from_secs(120),
            min_lifetime: Duration::from_secs(3600),
            renewal_retries: 3,
            renewal_retry_delay: Duration::from_secs(30),
            topic_scheme: TopicScheme::Device,
        }
    }
}

fn read_table(path: &str) -> Result<toml::Table, SettingsError> {
    let io_error = |source| SettingsError::Io {
        path: path.to_string(),
        source,
    };

    let resolved = normalize_path(path).map_err(io_error)?;
    let source = fs::read_to_string(&resolved).map_err(io_error)?;

    Ok(toml::from_str(&source)?)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(left)), toml::Value::Table(right)) => merge_tables(left, right),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn default_port() -> u16 {
    8883
}

fn default_true() -> bool {
    true
}

fn default_keep_alive() -> u64 {
    60
}
