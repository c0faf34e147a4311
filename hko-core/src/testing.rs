//! In-memory transport and canned feed bodies for unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    config::{Endpoints, Settings},
    error::FetchError,
    feed::forecast::forecast_url,
    transport::Transport,
};

pub const STATION: &str = include_str!("../tests/fixtures/station.txt");
pub const FORECAST: &str = include_str!("../tests/fixtures/forecast.json");
pub const LIVE: &str = include_str!("../tests/fixtures/live.json");
pub const WARNINGS: &str = include_str!("../tests/fixtures/warnings.json");
pub const WARNINGS_EMPTY: &str = include_str!("../tests/fixtures/warnings_empty.json");

pub const BASE: &str = "http://stub.test";

pub fn settings() -> Settings {
    Settings {
        endpoints: Endpoints::with_base(BASE),
        ..Settings::new("test", "HKO", "HKO")
    }
}

/// Serves fixed bodies by URL; unknown URLs fail like a refused connection.
#[derive(Debug, Default)]
pub struct StubTransport {
    bodies: Mutex<HashMap<String, String>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubTransport {
    /// All four feeds answering with the fixtures for `settings()`.
    pub fn with_fixtures() -> Arc<Self> {
        let stub = Arc::new(Self::default());
        let endpoints = settings().endpoints;
        stub.serve(&endpoints.station_url, STATION);
        stub.serve(&forecast_url(&endpoints.forecast_base_url, "HKO"), FORECAST);
        stub.serve(&endpoints.live_url, LIVE);
        stub.serve(&endpoints.warnings_url, WARNINGS);
        stub
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.bodies.lock().insert(url.to_string(), body.to_string());
    }

    pub fn fail(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let body = self.bodies.lock().get(url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        body.ok_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}
