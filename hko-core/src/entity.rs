//! Read-only views over the current snapshot, one adapter per entity kind.
//!
//! Which sensors exist is described by the static tables below; the adapters
//! hold a [`Coordinator`] handle and derive their state from
//! [`Coordinator::current_snapshot`] on every read.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    coordinator::Coordinator,
    derive::Condition,
    extract,
    model::{Snapshot, Warning},
};

pub const ATTRIBUTION: &str = "Data provided by Hong Kong Observatory";

pub const UNIT_CELSIUS: &str = "°C";
pub const UNIT_PERCENTAGE: &str = "%";
pub const UNIT_HPA: &str = "hPa";
pub const UNIT_KM: &str = "km";
pub const UNIT_KMH: &str = "km/h";
pub const UNIT_MM: &str = "mm";

/// Key of the derived tropical cyclone level sensor.
pub const TC_LEVEL_KEY: &str = "tclevel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    Heat,
    Cold,
    Moisture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: Option<DeviceClass>,
    pub unit: Option<&'static str>,
    pub state_class: Option<StateClass>,
    pub icon: Option<&'static str>,
    pub enabled_by_default: bool,
}

impl SensorDescription {
    const fn measurement(
        key: &'static str,
        name: &'static str,
        device_class: DeviceClass,
        unit: &'static str,
        enabled_by_default: bool,
    ) -> Self {
        Self {
            key,
            name,
            device_class: Some(device_class),
            unit: Some(unit),
            state_class: Some(StateClass::Measurement),
            icon: None,
            enabled_by_default,
        }
    }

    const fn warning(key: &'static str, name: &'static str, icon: &'static str) -> Self {
        Self {
            key,
            name,
            device_class: None,
            unit: None,
            state_class: None,
            icon: Some(icon),
            enabled_by_default: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarySensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: Option<DeviceClass>,
    pub icon: &'static str,
}

impl BinarySensorDescription {
    const fn new(key: &'static str, name: &'static str, icon: &'static str) -> Self {
        Self {
            key,
            name,
            device_class: None,
            icon,
        }
    }

    const fn with_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }
}

/// Station readings exposed as sensors, keyed by station feed column.
pub const SENSOR_TYPES: &[SensorDescription] = &[
    SensorDescription::measurement("TEMP", "Temperature", DeviceClass::Temperature, UNIT_CELSIUS, true),
    SensorDescription::measurement("RH", "Humidity", DeviceClass::Humidity, UNIT_PERCENTAGE, true),
    SensorDescription::measurement("PRESSURE", "Pressure", DeviceClass::Pressure, UNIT_HPA, true),
    SensorDescription::measurement("WINDSPEED", "Wind Speed", DeviceClass::WindSpeed, UNIT_KMH, false),
    SensorDescription::measurement("GUST", "Wind Gust", DeviceClass::WindSpeed, UNIT_KMH, false),
    SensorDescription {
        key: "WINDDIRECTION",
        name: "Wind Direction",
        device_class: None,
        unit: None,
        state_class: None,
        icon: Some("mdi:compass-outline"),
        enabled_by_default: false,
    },
];

/// Warnings exposed with their subtype as state, keyed by statement code.
pub const WARNING_SENSOR_TYPES: &[SensorDescription] = &[
    SensorDescription::warning("WTCSGNL", "Tropical Cyclone Warning Signal", "mdi:weather-hurricane"),
    SensorDescription::warning(TC_LEVEL_KEY, "Tropical Cyclone Warning Level", "mdi:weather-hurricane"),
    SensorDescription::warning("WRAIN", "Rainstorm Warning Signal", "mdi:weather-pouring"),
];

/// Warnings exposed as on/off, keyed by statement code.
pub const BINARY_WARNING_SENSOR_TYPES: &[BinarySensorDescription] = &[
    BinarySensorDescription::new("WFIRE", "Fire Danger Warning", "mdi:fire-alert"),
    BinarySensorDescription::new("WFROST", "Frost Warning", "mdi:snowflake-alert"),
    BinarySensorDescription::new("WHOT", "Hot Weather Warning", "mdi:weather-sunny-alert")
        .with_class(DeviceClass::Heat),
    BinarySensorDescription::new("WCOLD", "Cold Weather Warning", "mdi:snowflake-thermometer")
        .with_class(DeviceClass::Cold),
    BinarySensorDescription::new("WMSGNL", "Strong Monsoon Signal", "mdi:weather-windy"),
    BinarySensorDescription::new("WTCPRE8", "Pre-no.8 Special Announcement", "mdi:numeric-8-box"),
    BinarySensorDescription::new(
        "WFNTSA",
        "Special Announcement on Flooding in the northern New Territories",
        "mdi:home-flood",
    ),
    BinarySensorDescription::new("WL", "Landslip Warning", "mdi:landslide"),
    BinarySensorDescription::new("WTMW", "Tsunami Warning", "mdi:tsunami"),
    BinarySensorDescription::new("WTS", "Thunderstorm Warning", "mdi:weather-lightning-rainy")
        .with_class(DeviceClass::Moisture),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Number(n) => write!(f, "{n}"),
            StateValue::Text(s) => f.write_str(s),
            StateValue::Bool(true) => f.write_str("on"),
            StateValue::Bool(false) => f.write_str("off"),
        }
    }
}

pub type Attributes = BTreeMap<String, String>;

fn contents_attributes(warning: Option<&Warning>) -> Attributes {
    warning
        .and_then(Warning::contents_text)
        .map(|text| Attributes::from([("contents".to_string(), text)]))
        .unwrap_or_default()
}

/// A station reading.
#[derive(Debug, Clone)]
pub struct ObservationSensor {
    coordinator: Coordinator,
    description: &'static SensorDescription,
}

impl ObservationSensor {
    pub fn new(coordinator: Coordinator, description: &'static SensorDescription) -> Self {
        Self { coordinator, description }
    }

    pub fn description(&self) -> &'static SensorDescription {
        self.description
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.coordinator.climate_station_id(), self.description.key)
    }

    pub fn value(&self) -> Option<f64> {
        self.coordinator
            .current_snapshot()?
            .observation
            .number(self.description.key)
    }
}

/// A warning shown by its subtype, or the derived cyclone level.
#[derive(Debug, Clone)]
pub struct WarningSensor {
    coordinator: Coordinator,
    description: &'static SensorDescription,
}

impl WarningSensor {
    pub fn new(coordinator: Coordinator, description: &'static SensorDescription) -> Self {
        Self { coordinator, description }
    }

    pub fn description(&self) -> &'static SensorDescription {
        self.description
    }

    pub fn value(&self) -> Option<StateValue> {
        let snapshot = self.coordinator.current_snapshot()?;
        if self.description.key == TC_LEVEL_KEY {
            return snapshot
                .tropical_cyclone_level()
                .map(|level| StateValue::Number(f64::from(level)));
        }
        let warning = snapshot.warnings.get(self.description.key)?;
        Some(StateValue::Text(
            warning.subtype.clone().unwrap_or_else(|| "Active".to_string()),
        ))
    }

    pub fn attributes(&self) -> Attributes {
        let Some(snapshot) = self.coordinator.current_snapshot() else {
            return Attributes::new();
        };
        contents_attributes(snapshot.warnings.get(self.description.key))
    }
}

/// A warning shown as on while it is in force.
#[derive(Debug, Clone)]
pub struct BinaryWarningSensor {
    coordinator: Coordinator,
    description: &'static BinarySensorDescription,
}

impl BinaryWarningSensor {
    pub fn new(coordinator: Coordinator, description: &'static BinarySensorDescription) -> Self {
        Self { coordinator, description }
    }

    pub fn description(&self) -> &'static BinarySensorDescription {
        self.description
    }

    pub fn is_on(&self) -> bool {
        self.coordinator
            .current_snapshot()
            .is_some_and(|s| s.warnings.contains(self.description.key))
    }

    pub fn attributes(&self) -> Attributes {
        let Some(snapshot) = self.coordinator.current_snapshot() else {
            return Attributes::new();
        };
        contents_attributes(snapshot.warnings.get(self.description.key))
    }
}

/// One forecast row as shown by the weather entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub datetime: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub templow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_bearing: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    pub condition: Option<Condition>,
}

/// Current conditions plus hourly and daily forecast.
#[derive(Debug, Clone)]
pub struct WeatherEntity {
    coordinator: Coordinator,
}

impl WeatherEntity {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    pub fn unique_id(&self) -> String {
        format!(
            "{}-{}",
            self.coordinator.climate_station_id(),
            self.coordinator.forecast_station_id()
        )
    }

    fn reading(&self, key: &str) -> Option<f64> {
        self.coordinator.current_snapshot()?.observation.number(key)
    }

    pub fn condition(&self) -> Option<Condition> {
        self.coordinator.current_snapshot()?.condition()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.reading("TEMP")
    }

    pub fn pressure(&self) -> Option<f64> {
        self.reading("PRESSURE")
    }

    pub fn humidity(&self) -> Option<f64> {
        self.reading("RH")
    }

    /// Visibility in km; the feed reports metres.
    pub fn visibility(&self) -> Option<f64> {
        self.reading("VISIBILITY").map(|m| m / 1000.0)
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.reading("WINDSPEED")
    }

    pub fn wind_bearing(&self) -> Option<i64> {
        let snapshot = self.coordinator.current_snapshot()?;
        extract::reading(snapshot.observation.get("WINDDIRECTION"))
    }

    /// Hourly entries that carry a weather code.
    pub fn forecast_hourly(&self) -> Vec<ForecastEntry> {
        self.coordinator
            .current_snapshot()
            .map(|s| hourly_entries(&s))
            .unwrap_or_default()
    }

    /// Daily entries that carry a weather code.
    pub fn forecast_daily(&self) -> Vec<ForecastEntry> {
        self.coordinator
            .current_snapshot()
            .map(|s| daily_entries(&s))
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::from([
            ("attribution".to_string(), ATTRIBUTION.to_string()),
            ("precipitation_unit".to_string(), UNIT_MM.to_string()),
        ]);
        let readings = [
            ("temperature", self.temperature(), UNIT_CELSIUS),
            ("humidity", self.humidity(), UNIT_PERCENTAGE),
            ("pressure", self.pressure(), UNIT_HPA),
            ("visibility", self.visibility(), UNIT_KM),
            ("wind_speed", self.wind_speed(), UNIT_KMH),
        ];
        for (name, value, unit) in readings {
            if let Some(value) = value {
                attrs.insert(name.to_string(), format!("{value} {unit}"));
            }
        }
        if let Some(bearing) = self.wind_bearing() {
            attrs.insert("wind_bearing".to_string(), bearing.to_string());
        }
        attrs
    }
}

fn hourly_entries(snapshot: &Snapshot) -> Vec<ForecastEntry> {
    snapshot
        .forecast
        .hourly
        .iter()
        .filter(|h| h.weather_code.is_some())
        .map(|h| ForecastEntry {
            datetime: h.time,
            temperature: h.temperature,
            templow: h.min_temperature,
            wind_bearing: h.wind_bearing,
            wind_speed: h.wind_speed,
            precipitation_probability: None,
            condition: h.condition(),
        })
        .collect()
}

fn daily_entries(snapshot: &Snapshot) -> Vec<ForecastEntry> {
    snapshot
        .forecast
        .daily
        .iter()
        .filter(|d| d.weather_code.is_some())
        .map(|d| ForecastEntry {
            datetime: d.time,
            temperature: d.max_temperature,
            templow: d.min_temperature,
            wind_bearing: None,
            wind_speed: None,
            precipitation_probability: d.precipitation_probability(),
            condition: d.condition(),
        })
        .collect()
}

/// Every entity one coordinator backs.
#[derive(Debug, Clone)]
pub enum Entity {
    Sensor(ObservationSensor),
    Warning(WarningSensor),
    BinaryWarning(BinaryWarningSensor),
    Weather(WeatherEntity),
}

impl Entity {
    pub fn unique_id(&self) -> String {
        match self {
            Entity::Sensor(s) => s.unique_id(),
            Entity::Warning(s) => s.description.key.to_string(),
            Entity::BinaryWarning(s) => s.description.key.to_string(),
            Entity::Weather(w) => w.unique_id(),
        }
    }

    pub fn entity_id(&self) -> String {
        let id = match self {
            Entity::Sensor(s) => format!("sensor.{}", s.unique_id()),
            Entity::Warning(s) => format!("sensor.hko_{}", s.description.key),
            Entity::BinaryWarning(s) => format!("binary_sensor.hko_{}", s.description.key),
            Entity::Weather(w) => format!("weather.{}", w.coordinator.name()),
        };
        id.to_lowercase().replace(['-', ' '], "_")
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Sensor(s) => s.description.name,
            Entity::Warning(s) => s.description.name,
            Entity::BinaryWarning(s) => s.description.name,
            Entity::Weather(w) => w.coordinator.name(),
        }
    }

    pub fn enabled_by_default(&self) -> bool {
        match self {
            Entity::Sensor(s) => s.description.enabled_by_default,
            Entity::Warning(s) => s.description.enabled_by_default,
            Entity::BinaryWarning(_) | Entity::Weather(_) => true,
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Entity::Sensor(s) => s.description.unit,
            _ => None,
        }
    }

    pub fn state(&self) -> Option<StateValue> {
        match self {
            Entity::Sensor(s) => s.value().map(StateValue::Number),
            Entity::Warning(s) => s.value(),
            Entity::BinaryWarning(s) => Some(StateValue::Bool(s.is_on())),
            Entity::Weather(w) => w
                .condition()
                .map(|c| StateValue::Text(c.as_str().to_string())),
        }
    }

    pub fn attributes(&self) -> Attributes {
        match self {
            Entity::Sensor(_) => Attributes::new(),
            Entity::Warning(s) => s.attributes(),
            Entity::BinaryWarning(s) => s.attributes(),
            Entity::Weather(w) => w.attributes(),
        }
    }
}

/// Build the full entity set for a coordinator.
pub fn build_entities(coordinator: &Coordinator) -> Vec<Entity> {
    let sensors = SENSOR_TYPES
        .iter()
        .map(|d| Entity::Sensor(ObservationSensor::new(coordinator.clone(), d)));
    let warnings = WARNING_SENSOR_TYPES
        .iter()
        .map(|d| Entity::Warning(WarningSensor::new(coordinator.clone(), d)));
    let binaries = BINARY_WARNING_SENSOR_TYPES
        .iter()
        .map(|d| Entity::BinaryWarning(BinaryWarningSensor::new(coordinator.clone(), d)));

    sensors
        .chain(warnings)
        .chain(binaries)
        .chain(std::iter::once(Entity::Weather(WeatherEntity::new(coordinator.clone()))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{self, StubTransport},
        transport::Transport,
    };
    use std::sync::Arc;

    async fn refreshed() -> (Coordinator, Arc<StubTransport>) {
        let stub = StubTransport::with_fixtures();
        let coordinator =
            Coordinator::configure(testing::settings(), Arc::clone(&stub) as Arc<dyn Transport>);
        coordinator.first_refresh().await.expect("first refresh should succeed");
        (coordinator, stub)
    }

    fn find<'a>(entities: &'a [Entity], entity_id: &str) -> &'a Entity {
        entities
            .iter()
            .find(|e| e.entity_id() == entity_id)
            .unwrap_or_else(|| panic!("no entity {entity_id}"))
    }

    #[tokio::test]
    async fn builds_one_entity_per_description() {
        let (coordinator, _) = refreshed().await;
        let entities = build_entities(&coordinator);

        let expected = SENSOR_TYPES.len()
            + WARNING_SENSOR_TYPES.len()
            + BINARY_WARNING_SENSOR_TYPES.len()
            + 1;
        assert_eq!(entities.len(), expected);
    }

    #[tokio::test]
    async fn observation_sensors_read_station_columns() {
        let (coordinator, _) = refreshed().await;
        let entities = build_entities(&coordinator);

        let temp = find(&entities, "sensor.hko_temp");
        assert_eq!(temp.unique_id(), "HKO_TEMP");
        assert_eq!(temp.state(), Some(StateValue::Number(29.1)));
        assert_eq!(temp.unit(), Some(UNIT_CELSIUS));

        let gust = find(&entities, "sensor.hko_gust");
        assert!(!gust.enabled_by_default());
        assert_eq!(gust.state(), Some(StateValue::Number(25.0)));
    }

    #[tokio::test]
    async fn warning_sensors_show_subtype_and_level() {
        let (coordinator, _) = refreshed().await;
        let entities = build_entities(&coordinator);

        let signal = find(&entities, "sensor.hko_wtcsgnl");
        assert_eq!(signal.state(), Some(StateValue::Text("TC8NE".into())));
        assert_eq!(
            signal.attributes().get("contents").map(String::as_str),
            Some(
                "The No. 8 Northeast Gale or Storm Signal is in force.\n\n\
                 Members of the public should stay indoors."
            )
        );

        let level = find(&entities, "sensor.hko_tclevel");
        assert_eq!(level.state(), Some(StateValue::Number(8.0)));

        let rain = find(&entities, "sensor.hko_wrain");
        assert_eq!(rain.state(), Some(StateValue::Text("WRAINA".into())));
    }

    #[tokio::test]
    async fn warning_without_subtype_is_active() {
        let stub = StubTransport::with_fixtures();
        stub.serve(
            &testing::settings().endpoints.warnings_url,
            r#"{"details":[{"warningStatementCode":"WRAIN"}]}"#,
        );
        let coordinator =
            Coordinator::configure(testing::settings(), Arc::clone(&stub) as Arc<dyn Transport>);
        coordinator.first_refresh().await.expect("refresh");

        let sensor = WarningSensor::new(coordinator, &WARNING_SENSOR_TYPES[2]);
        assert_eq!(sensor.value(), Some(StateValue::Text("Active".into())));
        assert!(sensor.attributes().is_empty());
    }

    #[tokio::test]
    async fn binary_sensors_follow_presence() {
        let (coordinator, _) = refreshed().await;
        let entities = build_entities(&coordinator);

        let thunder = find(&entities, "binary_sensor.hko_wts");
        assert_eq!(thunder.state(), Some(StateValue::Bool(true)));
        assert!(thunder.attributes().contains_key("contents"));

        let frost = find(&entities, "binary_sensor.hko_wfrost");
        assert_eq!(frost.state(), Some(StateValue::Bool(false)));
        assert!(frost.attributes().is_empty());
    }

    #[tokio::test]
    async fn cleared_warnings_update_entities() {
        let (coordinator, stub) = refreshed().await;
        let entities = build_entities(&coordinator);

        stub.serve(&testing::settings().endpoints.warnings_url, testing::WARNINGS_EMPTY);
        coordinator.refresh().await.expect("refresh");

        assert_eq!(find(&entities, "sensor.hko_wtcsgnl").state(), None);
        assert_eq!(find(&entities, "sensor.hko_tclevel").state(), None);
        assert_eq!(find(&entities, "binary_sensor.hko_wts").state(), Some(StateValue::Bool(false)));
    }

    #[tokio::test]
    async fn weather_entity_current_conditions() {
        let (coordinator, _) = refreshed().await;
        let weather = WeatherEntity::new(coordinator);

        assert_eq!(weather.unique_id(), "HKO-HKO");
        assert_eq!(weather.condition(), Some(Condition::Rainy));
        assert_eq!(weather.temperature(), Some(29.1));
        assert_eq!(weather.humidity(), Some(78.0));
        assert_eq!(weather.pressure(), Some(1006.2));
        assert_eq!(weather.visibility(), Some(10.0));
        assert_eq!(weather.wind_speed(), Some(12.0));
        assert_eq!(weather.wind_bearing(), Some(90));
        assert_eq!(
            weather.attributes().get("attribution").map(String::as_str),
            Some(ATTRIBUTION)
        );
    }

    #[tokio::test]
    async fn weather_forecasts_skip_entries_without_code() {
        let (coordinator, _) = refreshed().await;
        let weather = WeatherEntity::new(coordinator);

        let hourly = weather.forecast_hourly();
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].datetime.to_rfc3339(), "2024-06-05T07:00:00+00:00");
        assert_eq!(hourly[0].condition, Some(Condition::Rainy));
        assert_eq!(hourly[1].templow, Some(27.9));
        assert_eq!(hourly[1].condition, Some(Condition::LightningRainy));

        let daily = weather.forecast_daily();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].precipitation_probability, Some(5.0));
        assert_eq!(daily[1].precipitation_probability, Some(60.0));
        assert_eq!(daily[1].condition, Some(Condition::Rainy));
    }

    #[test]
    fn states_render_like_the_host() {
        assert_eq!(StateValue::Bool(true).to_string(), "on");
        assert_eq!(StateValue::Number(29.1).to_string(), "29.1");
        assert_eq!(StateValue::Text("TC8NE".into()).to_string(), "TC8NE");
    }

    #[test]
    fn entities_without_snapshot_are_unknown() {
        let stub = StubTransport::with_fixtures();
        let coordinator = Coordinator::configure(testing::settings(), stub as Arc<dyn Transport>);

        for entity in build_entities(&coordinator) {
            match entity {
                Entity::BinaryWarning(_) => {
                    assert_eq!(entity.state(), Some(StateValue::Bool(false)))
                }
                _ => assert_eq!(entity.state(), None, "{}", entity.entity_id()),
            }
        }
    }
}
