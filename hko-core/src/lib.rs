//! Core library for polling the Hong Kong Observatory.
//!
//! This crate defines:
//! - Fetch adapters for the station, forecast, live-conditions and warning feeds
//! - A coordinator that refreshes all four into one immutable snapshot
//! - Derivation helpers (weather codes, cyclone signal level, chance of rain, HKT timestamps)
//! - Table-driven sensor and weather views over the current snapshot
//! - Configuration of named sites
//!
//! It is used by `hko-cli`, but can also be embedded by any other host.

pub mod config;
pub mod coordinator;
pub mod derive;
pub mod entity;
pub mod error;
pub mod extract;
pub mod feed;
pub mod model;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Config, Endpoints, Settings};
pub use coordinator::Coordinator;
pub use derive::Condition;
pub use entity::{Entity, StateValue, WeatherEntity, build_entities};
pub use error::{Feed, FetchError, RefreshError};
pub use model::{
    DailyForecast, ForecastSet, HourlyForecast, LiveConditions, Snapshot, StationObservation,
    Warning, WarningSet,
};
pub use transport::{HttpTransport, Transport};
