use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{derive, extract};

/// Latest readings of one automatic weather station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub station_id: String,
    /// Observation time from the feed header.
    pub last_updated: DateTime<Utc>,
    /// Raw columns of the station's row, keyed by header name (`TEMP`, `RH`, ...).
    pub readings: BTreeMap<String, String>,
}

impl StationObservation {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.readings.get(key).map(String::as_str)
    }

    /// Reading parsed as a number; absent if missing or unparsable.
    pub fn number(&self, key: &str) -> Option<f64> {
        extract::reading(self.get(key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_bearing: Option<i64>,
    pub wind_speed: Option<f64>,
    pub weather_code: Option<i64>,
}

impl HourlyForecast {
    pub fn condition(&self) -> Option<derive::Condition> {
        self.weather_code.and_then(derive::Condition::from_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Local midnight of the forecast day.
    pub time: DateTime<Utc>,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    /// Free text such as `"30%"` or `"< 10%"`.
    pub chance_of_rain: Option<String>,
    pub weather_code: Option<i64>,
}

impl DailyForecast {
    pub fn condition(&self) -> Option<derive::Condition> {
        self.weather_code.and_then(derive::Condition::from_code)
    }

    pub fn precipitation_probability(&self) -> Option<f64> {
        self.chance_of_rain
            .as_deref()
            .and_then(derive::parse_chance_of_rain)
    }
}

/// Hourly and daily forecast for one forecast area, in upstream (chronological) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
    pub last_updated: DateTime<Utc>,
}

/// Regional readings document, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveConditions(pub Map<String, Value>);

impl LiveConditions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First entry of the `icon` array.
    pub fn icon_code(&self) -> Option<i64> {
        self.get("icon")?.as_array()?.first().and_then(extract::integer)
    }

    pub fn condition(&self) -> Option<derive::Condition> {
        self.icon_code().and_then(derive::Condition::from_code)
    }
}

/// One active warning from the warning information feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "warningStatementCode")]
    pub code: String,
    #[serde(default, deserialize_with = "extract::lenient_text")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub contents: Vec<String>,
    /// Remaining fields (`updateTime`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Warning {
    /// Content paragraphs separated by blank lines.
    pub fn contents_text(&self) -> Option<String> {
        (!self.contents.is_empty()).then(|| self.contents.join("\n\n"))
    }
}

/// Active warnings keyed by statement code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarningSet(BTreeMap<String, Warning>);

impl WarningSet {
    /// Insert a warning; a later warning with the same code replaces the earlier one.
    pub fn insert(&mut self, warning: Warning) {
        self.0.insert(warning.code.clone(), warning);
    }

    pub fn get(&self, code: &str) -> Option<&Warning> {
        self.0.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.values()
    }
}

impl FromIterator<Warning> for WarningSet {
    fn from_iter<I: IntoIterator<Item = Warning>>(iter: I) -> Self {
        let mut set = WarningSet::default();
        for warning in iter {
            set.insert(warning);
        }
        set
    }
}

/// Everything fetched in one refresh cycle. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub observation: StationObservation,
    pub forecast: ForecastSet,
    pub live: LiveConditions,
    pub warnings: WarningSet,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Current condition, from the live-conditions icon.
    pub fn condition(&self) -> Option<derive::Condition> {
        self.live.condition()
    }

    pub fn tropical_cyclone_level(&self) -> Option<u32> {
        derive::tropical_cyclone_level(&self.warnings)
    }
}
