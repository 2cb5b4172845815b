//! Dashboard configuration
//!
//! Configuration is read from YAML. Every field has a default, so an empty
//! file (or no file) yields a working dashboard for the public sources.
//! Secrets are normally supplied through `HOMEDASH_*` environment variables,
//! which override the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::{EnergyPeriod, Meters, MealsCredentials, Tariff};

const LOCAL_API_URL: &str = "http://localhost:8765";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub calendar: CalendarConfig,
    pub meals: MealsConfig,
    pub energy: EnergyConfig,
    pub purifier: PurifierConfig,
    pub devices: DevicesConfig,
    pub network: NetworkConfig,
    pub http: HttpConfig,
    pub refresh: RefreshConfig,
    pub ttl: TtlConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub location: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            location: "Princes Risborough".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub ics_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MealsConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub email: String,
    pub password: String,
}

impl MealsConfig {
    pub fn credentials(&self) -> MealsCredentials {
        MealsCredentials {
            supabase_url: self.supabase_url.clone(),
            anon_key: self.anon_key.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub api_key: String,
    pub mpan: String,
    pub electricity_serial: String,
    pub mprn: String,
    pub gas_serial: String,
    pub electricity_rate: f64,
    pub gas_rate: f64,
    pub gas_conversion: f64,
    /// Period shown when the dashboard starts
    pub default_period: EnergyPeriod,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        let tariff = Tariff::default();
        Self {
            api_key: String::new(),
            mpan: String::new(),
            electricity_serial: String::new(),
            mprn: String::new(),
            gas_serial: String::new(),
            electricity_rate: tariff.electricity_rate,
            gas_rate: tariff.gas_rate,
            gas_conversion: tariff.gas_conversion,
            default_period: EnergyPeriod::Day,
        }
    }
}

impl EnergyConfig {
    pub fn meters(&self) -> Meters {
        Meters {
            api_key: self.api_key.clone(),
            mpan: self.mpan.clone(),
            electricity_serial: self.electricity_serial.clone(),
            mprn: self.mprn.clone(),
            gas_serial: self.gas_serial.clone(),
        }
    }

    pub fn tariff(&self) -> Tariff {
        Tariff {
            electricity_rate: self.electricity_rate,
            gas_rate: self.gas_rate,
            gas_conversion: self.gas_conversion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PurifierConfig {
    pub api_url: String,
}

impl Default for PurifierConfig {
    fn default() -> Self {
        Self {
            api_url: LOCAL_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub api_url: String,
    pub list: Vec<DeviceEntry>,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            api_url: LOCAL_API_URL.to_string(),
            list: vec![
                DeviceEntry {
                    id: "main".to_string(),
                    label: "MainTV".to_string(),
                },
                DeviceEntry {
                    id: "bedroom".to_string(),
                    label: "TV Bedroom".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_url: String,
    pub label: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://www.gstatic.com/generate_204".to_string(),
            label: "Wi-Fi".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub tick_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { tick_secs: 15 }
    }
}

impl RefreshConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

/// Freshness window per card, in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub weather_secs: u64,
    pub calendar_secs: u64,
    pub meals_secs: u64,
    pub energy_secs: u64,
    pub purifier_secs: u64,
    pub status_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            weather_secs: 30 * 60,
            calendar_secs: 5 * 60,
            meals_secs: 5 * 60,
            energy_secs: 5 * 60,
            purifier_secs: 60,
            status_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. ./homedash.yaml (current directory)
    /// 3. $XDG_CONFIG_HOME/homedash/config.yaml
    ///
    /// Without any file the defaults are used.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => Self::find_config_file(),
        };

        let mut config = match path {
            Some(p) => {
                tracing::info!(path = %p.display(), "loading config");
                Self::load_from_path(&p)?
            }
            None => {
                tracing::info!("no config file found, using defaults");
                Config::default()
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("homedash.yaml");
        if local.exists() {
            return Some(local);
        }

        directories::ProjectDirs::from("", "", "homedash")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .filter(|p| p.exists())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document deserializes to unit, not to an empty map
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Override fields from `HOMEDASH_*` variables
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, `None` when unset
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOMEDASH_CALENDAR_URL") {
            self.calendar.ics_url = Some(v);
        }
        let overrides: [(&str, &mut String); 10] = [
            ("HOMEDASH_MEALS_ANON_KEY", &mut self.meals.anon_key),
            ("HOMEDASH_MEALS_EMAIL", &mut self.meals.email),
            ("HOMEDASH_MEALS_PASSWORD", &mut self.meals.password),
            ("HOMEDASH_OCTOPUS_API_KEY", &mut self.energy.api_key),
            ("HOMEDASH_OCTOPUS_MPAN", &mut self.energy.mpan),
            ("HOMEDASH_OCTOPUS_ELEC_SERIAL", &mut self.energy.electricity_serial),
            ("HOMEDASH_OCTOPUS_MPRN", &mut self.energy.mprn),
            ("HOMEDASH_OCTOPUS_GAS_SERIAL", &mut self.energy.gas_serial),
            ("HOMEDASH_PURIFIER_API_URL", &mut self.purifier.api_url),
            ("HOMEDASH_LOCAL_API_URL", &mut self.devices.api_url),
        ];
        for (name, field) in overrides {
            if let Some(v) = get(name) {
                *field = v;
            }
        }
    }
}
