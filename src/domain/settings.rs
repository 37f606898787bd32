use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "flex_glove_bridge".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Bridge configuration, persisted as JSON in the platform config dir.
///
/// The connection fields describe the transport the bridge expects to be
/// attached to; the transport implementation itself lives outside this crate
/// and reads them when opening the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// BLE device name the transport should search for.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_scan_duration_ms")]
    pub scan_duration_ms: u64,

    /// Bounded wait of each polling read against the transport.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Warn when connected but no frame has arrived for this long.
    #[serde(default = "default_stale_data_warn_secs")]
    pub stale_data_warn_secs: u64,

    /// ADC full-scale used to normalize finger readings for display.
    #[serde(default = "default_max_sensor_value")]
    pub max_sensor_value: u16,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            connection_timeout_ms: default_connection_timeout_ms(),
            scan_duration_ms: default_scan_duration_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            stale_data_warn_secs: default_stale_data_warn_secs(),
            max_sensor_value: default_max_sensor_value(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    "FlexGlove-ESP32".to_string()
}
fn default_connection_timeout_ms() -> u64 {
    10000
}
fn default_scan_duration_ms() -> u64 {
    5000
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_stale_data_warn_secs() -> u64 {
    2
}
fn default_max_sensor_value() -> u16 {
    4095
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let service = match Self::load_from_file(&settings_path) {
            Ok(settings) => Self {
                settings,
                settings_path,
            },
            Err(_) => {
                // First run: write the defaults out so there is a file to edit.
                let service = Self {
                    settings: Settings::default(),
                    settings_path,
                };
                if let Err(e) = service.save() {
                    warn!("Could not write default settings: {e}");
                }
                service
            }
        };

        Ok(service)
    }

    /// Wrap explicit settings instead of touching the config dir.
    #[cfg(test)]
    pub fn with_settings(settings: Settings, settings_path: PathBuf) -> Self {
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("FlexGloveBridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_file_fills_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"device_name": "FlexGlove-Lab"}"#).unwrap();
        assert_eq!(settings.device_name, "FlexGlove-Lab");
        assert_eq!(settings.read_timeout_ms, 50);
        assert_eq!(settings.max_sensor_value, 4095);
        assert_eq!(settings.log_settings.level, "info");
    }
}
