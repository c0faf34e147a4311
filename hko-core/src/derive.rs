//! Mapping of raw upstream vocabulary onto normalized values.

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::WarningSet;

/// Offset of Hong Kong Time from UTC. Every upstream timestamp is naive local time in it.
pub const HKT_OFFSET_HOURS: i64 = 8;

/// Header line of the station feed.
pub const STATION_HEADER_FORMAT: &str = "Latest readings recorded at %H:%M Hong Kong Time %d %B %Y";
/// `LastModified` of the forecast document.
pub const LAST_MODIFIED_FORMAT: &str = "%Y%m%d%H%M%S";
/// `ForecastHour`, `YYYYMMDDHH`. Parsed with a zero minute appended.
pub const FORECAST_HOUR_FORMAT: &str = "%Y%m%d%H%M";
/// `ForecastDate`.
pub const FORECAST_DATE_FORMAT: &str = "%Y%m%d";

/// Warning statement code of the tropical cyclone signal.
pub const TROPICAL_CYCLONE_CODE: &str = "WTCSGNL";

static SIGNAL_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^TC(\d+)").expect("signal level pattern is valid"));

/// Semantic weather condition shown by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "sunny")]
    Sunny,
    #[serde(rename = "partlycloudy")]
    PartlyCloudy,
    #[serde(rename = "rainy")]
    Rainy,
    #[serde(rename = "cloudy")]
    Cloudy,
    #[serde(rename = "pouring")]
    Pouring,
    #[serde(rename = "lightning-rainy")]
    LightningRainy,
    #[serde(rename = "clear-night")]
    ClearNight,
    #[serde(rename = "windy")]
    Windy,
    #[serde(rename = "fog")]
    Fog,
}

impl Condition {
    /// Map an HKO weather icon code. See <https://www.hko.gov.hk/textonly/v2/explain/wxicon_e.htm>.
    ///
    /// Night codes 70..=75 are moon phases; their `x1`/`x2` sub-codes add cloud.
    pub fn from_code(code: i64) -> Option<Self> {
        let condition = match code {
            50 => Condition::Sunny,
            51 | 52 => Condition::PartlyCloudy,
            53 | 54 => Condition::Rainy,
            60 | 61 => Condition::Cloudy,
            62 | 63 => Condition::Rainy,
            64 => Condition::Pouring,
            65 => Condition::LightningRainy,
            70..=75 => Condition::ClearNight,
            701 | 711 | 721 | 731 | 741 | 751 => Condition::Cloudy,
            702 | 712 | 722 | 732 | 742 | 752 => Condition::PartlyCloudy,
            76 => Condition::Cloudy,
            77 => Condition::PartlyCloudy,
            80 => Condition::Windy,
            83..=85 => Condition::Fog,
            _ => return None,
        };
        Some(condition)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Sunny => "sunny",
            Condition::PartlyCloudy => "partlycloudy",
            Condition::Rainy => "rainy",
            Condition::Cloudy => "cloudy",
            Condition::Pouring => "pouring",
            Condition::LightningRainy => "lightning-rainy",
            Condition::ClearNight => "clear-night",
            Condition::Windy => "windy",
            Condition::Fog => "fog",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal number of a tropical cyclone subtype such as `TC8NE`.
pub fn signal_level(subtype: &str) -> Option<u32> {
    SIGNAL_LEVEL.captures(subtype)?.get(1)?.as_str().parse().ok()
}

/// Level of the tropical cyclone signal currently hoisted, if any.
pub fn tropical_cyclone_level(warnings: &WarningSet) -> Option<u32> {
    warnings
        .get(TROPICAL_CYCLONE_CODE)?
        .subtype
        .as_deref()
        .and_then(signal_level)
}

/// Approximate a chance-of-rain string as a percentage.
///
/// `"N%"` is N; `"<N%"` (with or without a space) is N/2.
pub fn parse_chance_of_rain(chance: &str) -> Option<f64> {
    let chance = chance.trim();
    let (below, rest) = match chance.strip_prefix('<') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, chance),
    };
    let percent: u32 = rest.strip_suffix('%')?.trim_end().parse().ok()?;
    let percent = f64::from(percent);
    Some(if below { percent / 2.0 } else { percent })
}

/// Interpret a naive Hong Kong Time timestamp as an absolute instant.
pub fn local_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::hours(HKT_OFFSET_HOURS)))
}

/// Parse a Hong Kong Time timestamp with the given format.
pub fn parse_local(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), format)
        .ok()
        .map(local_to_utc)
}

/// Parse the station feed header line into the observation time.
pub fn parse_station_header(line: &str) -> Option<DateTime<Utc>> {
    parse_local(line, STATION_HEADER_FORMAT)
}

/// Parse a `YYYYMMDDHH` forecast hour.
pub fn parse_forecast_hour(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.len() != 10 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    parse_local(&format!("{raw}00"), FORECAST_HOUR_FORMAT)
}

/// Parse a `YYYYMMDD` forecast date as local midnight.
pub fn parse_forecast_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), FORECAST_DATE_FORMAT)
        .ok()
        .map(|date| local_to_utc(date.and_time(NaiveTime::MIN)))
}
