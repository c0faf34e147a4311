//! Periodic refresh of all four feeds into one published [`Snapshot`].
//!
//! A refresh runs the fetch adapters one after another under a single time
//! budget. Only a refresh where every adapter succeeded is published; any
//! failure leaves the previous snapshot in place. Refreshes never overlap:
//! explicit requests queue behind the one in flight, timer ticks are skipped.

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use arc_swap::ArcSwapOption;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Settings,
    error::{Feed, RefreshError},
    feed,
    model::Snapshot,
    transport::Transport,
};

type Listener = Box<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

/// Handle to one configured poller. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    transport: Arc<dyn Transport>,
    current: ArcSwapOption<Snapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
    listeners: RwLock<Vec<Listener>>,
    last_update_success: AtomicBool,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.inner.settings.name)
            .field("climate_station_id", &self.inner.settings.climate_station_id)
            .field("forecast_station_id", &self.inner.settings.forecast_station_id)
            .field("has_snapshot", &self.inner.current.load().is_some())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build a coordinator. Nothing is fetched until a refresh is requested.
    pub fn configure(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                transport,
                current: ArcSwapOption::empty(),
                refresh_lock: tokio::sync::Mutex::new(()),
                listeners: RwLock::new(Vec::new()),
                last_update_success: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Configure, perform the mandatory first refresh and start the timer.
    ///
    /// If the first refresh fails no coordinator is returned.
    pub async fn start(
        settings: Settings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RefreshError> {
        let coordinator = Self::configure(settings, transport);
        coordinator.first_refresh().await?;
        coordinator.spawn_periodic();
        Ok(coordinator)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    pub fn climate_station_id(&self) -> &str {
        &self.inner.settings.climate_station_id
    }

    pub fn forecast_station_id(&self) -> &str {
        &self.inner.settings.forecast_station_id
    }

    pub async fn first_refresh(&self) -> Result<(), RefreshError> {
        let snapshot = self.refresh().await?;
        info!(
            name = %self.name(),
            observed_at = %snapshot.observation.last_updated,
            "first refresh complete"
        );
        Ok(())
    }

    /// Run one refresh, waiting for any refresh already in flight to finish first.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        self.inner.ensure_running()?;
        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.ensure_running()?;
        self.inner.run_refresh().await
    }

    /// Run one refresh unless another is in flight, in which case `None`.
    pub async fn try_refresh(&self) -> Option<Result<Arc<Snapshot>, RefreshError>> {
        self.inner.try_refresh().await
    }

    /// Latest published snapshot; `None` before the first successful refresh.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.current.load_full()
    }

    /// Whether the most recent completed refresh was published.
    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::Acquire)
    }

    /// Register a callback run after every publish, in registration order.
    ///
    /// Callbacks must not register further callbacks.
    pub fn on_snapshot_updated<F>(&self, callback: F)
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(callback));
    }

    /// Start refreshing every `update_interval`. Replaces a previously spawned timer.
    pub fn spawn_periodic(&self) {
        if self.inner.stopped.load(Ordering::Acquire) {
            return;
        }

        let period = self.inner.settings.update_interval();
        let weak = Arc::downgrade(&self.inner);
        info!(name = %self.name(), interval_secs = period.as_secs(), "starting periodic refresh");

        let handle = tokio::spawn(run_periodic(weak, period));
        if let Some(previous) = self.inner.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the timer and abandon any refresh it is running.
    ///
    /// The last published snapshot stays readable; further refreshes fail with
    /// [`RefreshError::Stopped`].
    pub fn teardown(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
        }
        info!(name = %self.name(), "coordinator torn down");
    }
}

async fn run_periodic(inner: Weak<Inner>, period: std::time::Duration) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the first refresh already ran.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.stopped.load(Ordering::Acquire) {
            break;
        }
        // Failures are logged inside; the next tick simply tries again.
        let _ = inner.try_refresh().await;
    }
}

impl Inner {
    fn ensure_running(&self) -> Result<(), RefreshError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(RefreshError::Stopped);
        }
        Ok(())
    }

    async fn try_refresh(&self) -> Option<Result<Arc<Snapshot>, RefreshError>> {
        if let Err(e) = self.ensure_running() {
            return Some(Err(e));
        }
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!(name = %self.settings.name, "refresh already in flight, skipping");
            return None;
        };
        Some(self.run_refresh().await)
    }

    #[instrument(skip(self), fields(name = %self.settings.name))]
    async fn run_refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let budget = self.settings.timeout();
        let result = match time::timeout(budget, self.fetch_all()).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout { budget }),
        };

        if self.stopped.load(Ordering::Acquire) {
            debug!("torn down during refresh, discarding result");
            return Err(RefreshError::Stopped);
        }

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.current.store(Some(Arc::clone(&snapshot)));
                self.last_update_success.store(true, Ordering::Release);
                debug!(
                    hourly = snapshot.forecast.hourly.len(),
                    daily = snapshot.forecast.daily.len(),
                    warnings = snapshot.warnings.len(),
                    "published snapshot"
                );
                self.notify(&snapshot);
                Ok(snapshot)
            }
            Err(e) => {
                self.last_update_success.store(false, Ordering::Release);
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    async fn fetch_all(&self) -> Result<Snapshot, RefreshError> {
        let transport = self.transport.as_ref();
        let settings = &self.settings;
        let endpoints = &settings.endpoints;

        let observation =
            feed::fetch_station(transport, &endpoints.station_url, &settings.climate_station_id)
                .await
                .map_err(RefreshError::fetch(Feed::Station))?;

        let forecast = feed::fetch_forecast(
            transport,
            &endpoints.forecast_base_url,
            &settings.forecast_station_id,
        )
        .await
        .map_err(RefreshError::fetch(Feed::Forecast))?;

        let live = feed::fetch_live(transport, &endpoints.live_url)
            .await
            .map_err(RefreshError::fetch(Feed::Live))?;

        let warnings = feed::fetch_warnings(transport, &endpoints.warnings_url)
            .await
            .map_err(RefreshError::fetch(Feed::Warnings))?;

        Ok(Snapshot {
            observation,
            forecast,
            live,
            warnings,
            fetched_at: Utc::now(),
        })
    }

    fn notify(&self, snapshot: &Arc<Snapshot>) {
        for listener in self.listeners.read().iter() {
            listener(snapshot);
        }
    }
}
