use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use domain::{DeviceFilter, DomainError, ReceiptTemplate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Ble,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_transport_kind")]
    pub kind: TransportKind,
    #[serde(default = "default_capture_path")]
    pub capture_path: PathBuf, // Used when kind is "file"
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
    pub device_name: Option<String>,
}

fn default_transport_kind() -> TransportKind {
    TransportKind::File
}
fn default_capture_path() -> PathBuf {
    PathBuf::from("receipts.bin")
}
fn default_scan_timeout() -> u64 {
    5
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            capture_path: default_capture_path(),
            scan_timeout_secs: default_scan_timeout(),
            device_name: None,
        }
    }
}

impl TransportConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WriterConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,
}

fn default_chunk_size() -> usize {
    20
}
fn default_chunk_delay() -> u64 {
    50
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay(),
            write_timeout_ms: None,
        }
    }
}

impl WriterConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PrintAgentConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub filter: DeviceFilter,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub receipt: ReceiptTemplate,
}

impl PrintAgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file - e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Per-environment overrides - e.g. config/production.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PRINTER__WRITER__CHUNK_SIZE=64)
            .add_source(Environment::with_prefix("PRINTER").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.writer.chunk_size == 0 {
            return Err(DomainError::InvalidConfiguration(
                "writer.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.transport.kind == TransportKind::File
            && self.transport.capture_path.as_os_str().is_empty()
        {
            return Err(DomainError::InvalidConfiguration(
                "transport.capture_path is required for the file transport".to_string(),
            ));
        }
        Ok(())
    }
}
