use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{
    derive, extract,
    error::FetchError,
    model::{DailyForecast, ForecastSet, HourlyForecast},
    transport::Transport,
};

/// URL of the forecast document for one forecast area.
///
/// The document is served with an `.xml` suffix but its body is JSON.
pub fn forecast_url(base_url: &str, forecast_station_id: &str) -> String {
    format!("{}/{forecast_station_id}.xml", base_url.trim_end_matches('/'))
}

#[instrument(skip(transport))]
pub async fn fetch_forecast(
    transport: &dyn Transport,
    base_url: &str,
    forecast_station_id: &str,
) -> Result<ForecastSet, FetchError> {
    let url = forecast_url(base_url, forecast_station_id);
    let document = transport.get_json(&url).await?;
    parse_forecast(document)
}

pub fn parse_forecast(document: Value) -> Result<ForecastSet, FetchError> {
    let raw: OcfDocument = serde_json::from_value(document)
        .map_err(|e| FetchError::parse(format!("forecast document: {e}")))?;

    let last_modified = extract::text(&raw.last_modified)
        .ok_or_else(|| FetchError::parse("forecast LastModified is not a timestamp"))?;
    let last_updated = derive::parse_local(&last_modified, derive::LAST_MODIFIED_FORMAT)
        .ok_or_else(|| FetchError::parse(format!("invalid LastModified: {last_modified}")))?;

    let hourly = raw
        .hourly_weather_forecast
        .into_iter()
        .filter_map(OcfHour::into_forecast)
        .collect();

    let daily = raw
        .daily_forecast
        .into_iter()
        .filter_map(OcfDay::into_forecast)
        .collect();

    Ok(ForecastSet {
        hourly,
        daily,
        last_updated,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcfDocument {
    hourly_weather_forecast: Vec<OcfHour>,
    daily_forecast: Vec<OcfDay>,
    last_modified: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcfHour {
    #[serde(default, deserialize_with = "extract::lenient_text")]
    forecast_hour: Option<String>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_temperature: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_minimum_temperature: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_integer")]
    forecast_wind_direction: Option<i64>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_integer")]
    forecast_weather: Option<i64>,
}

impl OcfHour {
    /// `None` for an entry without a usable `ForecastHour`; the rest of the set is kept.
    fn into_forecast(self) -> Option<HourlyForecast> {
        let Some(time) = self.forecast_hour.as_deref().and_then(derive::parse_forecast_hour) else {
            warn!(forecast_hour = ?self.forecast_hour, "skipping hourly forecast entry");
            return None;
        };

        Some(HourlyForecast {
            time,
            temperature: self.forecast_temperature,
            min_temperature: self.forecast_minimum_temperature,
            relative_humidity: self.forecast_relative_humidity,
            wind_bearing: self.forecast_wind_direction,
            wind_speed: self.forecast_wind_speed,
            weather_code: self.forecast_weather,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcfDay {
    #[serde(default, deserialize_with = "extract::lenient_text")]
    forecast_date: Option<String>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_maximum_temperature: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_number")]
    forecast_minimum_temperature: Option<f64>,
    #[serde(default, deserialize_with = "extract::lenient_text")]
    forecast_chance_of_rain: Option<String>,
    #[serde(default, deserialize_with = "extract::lenient_integer")]
    forecast_daily_weather: Option<i64>,
}

impl OcfDay {
    fn into_forecast(self) -> Option<DailyForecast> {
        let Some(time) = self.forecast_date.as_deref().and_then(derive::parse_forecast_date) else {
            warn!(forecast_date = ?self.forecast_date, "skipping daily forecast entry");
            return None;
        };

        Some(DailyForecast {
            time,
            max_temperature: self.forecast_maximum_temperature,
            min_temperature: self.forecast_minimum_temperature,
            chance_of_rain: self.forecast_chance_of_rain,
            weather_code: self.forecast_daily_weather,
        })
    }
}
