use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Log output. The console sink writes to stderr and is off by default
/// because the terminal remote owns the screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `info` or `bt_rc_remote=debug`.
    /// `RUST_LOG` takes precedence.
    pub filter: String,
    pub console: bool,
    pub file: bool,
    /// Relative to the config directory unless absolute.
    pub dir: PathBuf,
    pub file_prefix: String,
    pub rotation: LogRotation,
    /// Include source file and line in each record.
    pub source_locations: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            console: false,
            file: true,
            dir: PathBuf::from("logs"),
            file_prefix: "bt_rc_remote".to_string(),
            rotation: LogRotation::default(),
            source_locations: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// How the BLE transport finds and talks to the car's serial module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleSettings {
    /// Only list devices advertising this service. Empty lists everything.
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    /// Characteristic that receives command bytes.
    #[serde(default = "default_serial_char_uuid")]
    pub serial_char_uuid: String,
    /// How long to listen for devices before presenting the list.
    #[serde(default = "default_scan_duration_ms")]
    pub scan_duration_ms: u64,
    #[serde(default)]
    pub adapter_index: usize,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            serial_char_uuid: default_serial_char_uuid(),
            scan_duration_ms: default_scan_duration_ms(),
            adapter_index: 0,
        }
    }
}

fn default_service_uuid() -> String {
    String::new()
}
fn default_serial_char_uuid() -> String {
    // HM-10 / HC-08 transparent UART
    "0000ffe1-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_scan_duration_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub ble: BleSettings,
    #[serde(default)]
    pub last_connected_address: Option<String>,
}

pub const APP_DIR_NAME: &str = "BtRcRemote";
const SETTINGS_FILE: &str = "settings.json";

pub struct SettingsService {
    settings: Settings,
    config_dir: PathBuf,
}

impl SettingsService {
    /// Load settings from `config_dir`, or from the platform config
    /// directory when none is given. Missing or broken files yield defaults.
    pub fn new(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => Self::default_config_dir()?,
        };
        fs::create_dir_all(&config_dir)?;
        let settings = Self::load_from_file(&config_dir.join(SETTINGS_FILE)).unwrap_or_default();

        Ok(Self {
            settings,
            config_dir,
        })
    }

    fn default_config_dir() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push(APP_DIR_NAME);
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(self.config_dir.join(SETTINGS_FILE), json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn remember_address(&mut self, address: &str) -> anyhow::Result<()> {
        if self.settings.last_connected_address.as_deref() != Some(address) {
            self.settings.last_connected_address = Some(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}
