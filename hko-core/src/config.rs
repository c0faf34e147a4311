use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

pub const DEFAULT_STATION_ID: &str = "HKO";

/// Upstream URLs. Overridable so tests and mirrors can point elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_station_url")]
    pub station_url: String,
    /// Directory holding `{forecast_station_id}.xml`.
    #[serde(default = "default_forecast_base_url")]
    pub forecast_base_url: String,
    #[serde(default = "default_live_url")]
    pub live_url: String,
    #[serde(default = "default_warnings_url")]
    pub warnings_url: String,
}

fn default_station_url() -> String {
    "https://www.hko.gov.hk/wxinfo/awsgis/latestReadings_AWS1_v2.txt".to_string()
}

fn default_forecast_base_url() -> String {
    "https://maps.weather.gov.hk/ocf/dat".to_string()
}

fn default_live_url() -> String {
    "https://data.weather.gov.hk/weatherAPI/opendata/weather.php?dataType=rhrread&lang=en"
        .to_string()
}

fn default_warnings_url() -> String {
    "https://data.weather.gov.hk/weatherAPI/opendata/weather.php?dataType=warningInfo&lang=en"
        .to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            station_url: default_station_url(),
            forecast_base_url: default_forecast_base_url(),
            live_url: default_live_url(),
            warnings_url: default_warnings_url(),
        }
    }
}

impl Endpoints {
    /// All four feeds served from one base URL, under their production paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            station_url: format!("{base}/wxinfo/awsgis/latestReadings_AWS1_v2.txt"),
            forecast_base_url: format!("{base}/ocf/dat"),
            live_url: format!("{base}/weatherAPI/opendata/weather.php?dataType=rhrread&lang=en"),
            warnings_url: format!(
                "{base}/weatherAPI/opendata/weather.php?dataType=warningInfo&lang=en"
            ),
        }
    }
}

/// Everything one coordinator needs. Fixed once the coordinator is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub name: String,

    /// Automatic weather station code (the `STN` column), e.g. "HKO".
    #[serde(default = "default_station_id")]
    pub climate_station_id: String,

    /// Forecast area code, e.g. "HKO".
    #[serde(default = "default_station_id")]
    pub forecast_station_id: String,

    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Budget for all four fetches of one refresh together.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_station_id() -> String {
    DEFAULT_STATION_ID.to_string()
}

const fn default_update_interval() -> u64 {
    60
}

const fn default_timeout() -> u64 {
    10
}

impl Settings {
    pub fn new(
        name: impl Into<String>,
        climate_station_id: impl Into<String>,
        forecast_station_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            climate_station_id: climate_station_id.into(),
            forecast_station_id: forecast_station_id.into(),
            update_interval_secs: default_update_interval(),
            timeout_secs: default_timeout(),
            endpoints: Endpoints::default(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default site name.
    pub default_site: Option<String>,

    /// Example TOML:
    /// [sites.home]
    /// name = "home"
    /// climate_station_id = "HKO"
    /// forecast_station_id = "HKO"
    #[serde(default)]
    pub sites: HashMap<String, Settings>,
}

impl Config {
    /// Return the settings of the default site.
    pub fn default_site(&self) -> Result<&Settings> {
        let name = self.default_site.as_ref().ok_or_else(|| {
            anyhow!(
                "No default site configured.\n\
                 Hint: run `hko configure <name>` (e.g. `hko configure home`) first."
            )
        })?;

        self.site(name)
    }

    /// Return the settings of a named site.
    pub fn site(&self, name: &str) -> Result<&Settings> {
        self.sites.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown site '{name}'.\n\
                 Hint: run `hko configure {name}` to add it."
            )
        })
    }

    pub fn set_default_site(&mut self, name: &str) -> Result<()> {
        self.site(name)?;
        self.default_site = Some(name.to_string());
        Ok(())
    }

    /// Set/replace a site; the first site added becomes the default.
    pub fn upsert_site(&mut self, settings: Settings) {
        if self.default_site.is_none() {
            self.default_site = Some(settings.name.clone());
        }
        self.sites.insert(settings.name.clone(), settings);
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("hk", "hko", "hko-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
