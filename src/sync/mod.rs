//! Client-side sync coordinator.
//!
//! Polls the readings API on a fixed cadence and keeps the last good view
//! of recent history through transient failures. A rejected credential
//! halts polling until a fresh pin is supplied; a known-bad pin is never
//! resent automatically.

mod client;

pub use client::{ApiClient, FetchError, HealthView};

use crate::db::Reading;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::sync::broadcast;

/// Default cadence between sync cycles (20 minutes).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Default trailing window requested from the server.
pub const DEFAULT_WINDOW_HOURS: f64 = 24.0;

/// Where the coordinator currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Synced,
    Unauthorized,
    Error,
}

/// Snapshot of what a dashboard should render.
///
/// `latest` and `window` always hold the most recent successful fetch;
/// failed cycles change `phase` but never clear them.
#[derive(Debug, Clone)]
pub struct SyncView {
    pub phase: SyncPhase,
    pub latest: Option<Reading>,
    pub window: Vec<Reading>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: Option<DateTime<Utc>>,
    pub auth_ok: bool,
}

impl Default for SyncView {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            latest: None,
            window: Vec::new(),
            last_sync_at: None,
            next_sync_at: None,
            auth_ok: true,
        }
    }
}

/// Transport used by the coordinator to reach the readings API.
///
/// Factored as a trait so tests can script server behavior.
#[allow(async_fn_in_trait)]
pub trait ReadingsApi {
    async fn fetch_latest(&self, pin: Option<&str>) -> Result<Option<Reading>, FetchError>;
    async fn fetch_window(&self, pin: Option<&str>, hours: f64) -> Result<Vec<Reading>, FetchError>;
}

/// Fixed-cadence polling state machine over a [`ReadingsApi`] transport.
pub struct SyncCoordinator<A: ReadingsApi> {
    api: A,
    interval: Duration,
    window_hours: f64,
    pin: Option<String>,
    halted: bool,
    view: SyncView,
}

impl<A: ReadingsApi> SyncCoordinator<A> {
    pub fn new(api: A, interval: Duration, window_hours: f64, pin: Option<String>) -> Self {
        Self {
            api,
            interval,
            window_hours,
            pin,
            halted: false,
            view: SyncView::default(),
        }
    }

    /// The current view snapshot.
    pub fn view(&self) -> &SyncView {
        &self.view
    }

    /// Supply a fresh credential and resume polling.
    pub fn set_pin(&mut self, pin: Option<String>) {
        self.pin = pin;
        self.halted = false;
    }

    /// Run one sync cycle at the given instant.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        // Re-derived every cycle, so the estimate stays forward-looking
        // even when this cycle fails or is skipped.
        self.view.next_sync_at = Some(now + self.cadence());

        if self.halted {
            return;
        }

        self.view.phase = SyncPhase::Syncing;

        match self.fetch_cycle().await {
            Ok((latest, window)) => {
                self.view.latest = latest;
                self.view.window = window;
                self.view.last_sync_at = Some(now);
                self.view.auth_ok = true;
                self.view.phase = SyncPhase::Synced;
                tracing::debug!(readings = self.view.window.len(), "sync cycle complete");
            }
            Err(FetchError::Unauthorized) => {
                // The server rejected the pin. Drop it and wait for a new
                // one rather than resend a known-bad credential.
                self.pin = None;
                self.halted = true;
                self.view.auth_ok = false;
                self.view.phase = SyncPhase::Unauthorized;
                tracing::warn!("sync halted: pin no longer accepted");
            }
            Err(e) => {
                self.view.phase = SyncPhase::Error;
                tracing::warn!("sync failed, keeping cached view: {}", e);
            }
        }
    }

    async fn fetch_cycle(&self) -> Result<(Option<Reading>, Vec<Reading>), FetchError> {
        let pin = self.pin.as_deref();
        let latest = self.api.fetch_latest(pin).await?;
        let window = self.api.fetch_window(pin, self.window_hours).await?;
        Ok((latest, window))
    }

    /// Poll until the shutdown channel fires.
    ///
    /// One cycle at a time: the next sleep is armed only after the
    /// current cycle finishes, so overlapping cycles cannot happen.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let now = Utc::now();
            self.tick(now).await;
            tracing::info!(
                phase = ?self.view.phase,
                readings = self.view.window.len(),
                next_sync_at = %self.view.next_sync_at.unwrap_or(now),
                "sync cycle"
            );

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn cadence(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.interval)
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_SYNC_INTERVAL.as_secs() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted transport; clones share the same queues and call log.
    #[derive(Clone, Default)]
    struct ScriptedApi {
        latest: Rc<RefCell<VecDeque<Result<Option<Reading>, FetchError>>>>,
        window: Rc<RefCell<VecDeque<Result<Vec<Reading>, FetchError>>>>,
        pins_seen: Rc<RefCell<Vec<Option<String>>>>,
        hours_seen: Rc<RefCell<Vec<f64>>>,
    }

    impl ScriptedApi {
        fn push_latest(&self, response: Result<Option<Reading>, FetchError>) {
            self.latest.borrow_mut().push_back(response);
        }

        fn push_window(&self, response: Result<Vec<Reading>, FetchError>) {
            self.window.borrow_mut().push_back(response);
        }

        fn latest_call_count(&self) -> usize {
            self.pins_seen.borrow().len()
        }
    }

    impl ReadingsApi for ScriptedApi {
        async fn fetch_latest(&self, pin: Option<&str>) -> Result<Option<Reading>, FetchError> {
            self.pins_seen.borrow_mut().push(pin.map(String::from));
            self.latest
                .borrow_mut()
                .pop_front()
                .expect("unscripted fetch_latest call")
        }

        async fn fetch_window(&self, _pin: Option<&str>, hours: f64) -> Result<Vec<Reading>, FetchError> {
            self.hours_seen.borrow_mut().push(hours);
            self.window
                .borrow_mut()
                .pop_front()
                .expect("unscripted fetch_window call")
        }
    }

    fn reading(id: i64, battery: i64) -> Reading {
        Reading {
            id,
            timestamp: Utc::now(),
            allpowers_battery: Some(battery),
            allpowers_watts: None,
            allpowers_voltage: None,
            allpowers_240v_input: None,
            ecoflow_battery: None,
            ecoflow_watts: None,
            ecoflow_voltage: None,
            lifepo4_battery: None,
            lifepo4_voltage: None,
            solar_watts: None,
            solar_voltage: None,
            system_load_watts: None,
            charger_status: None,
        }
    }

    fn coordinator(api: ScriptedApi, pin: Option<&str>) -> SyncCoordinator<ScriptedApi> {
        SyncCoordinator::new(
            api,
            DEFAULT_SYNC_INTERVAL,
            DEFAULT_WINDOW_HOURS,
            pin.map(String::from),
        )
    }

    #[tokio::test]
    async fn test_successful_cycle_updates_view() {
        let api = ScriptedApi::default();
        let handle = api.clone();
        handle.push_latest(Ok(Some(reading(2, 80))));
        handle.push_window(Ok(vec![reading(2, 80), reading(1, 75)]));

        let mut coord = coordinator(api, Some("2468"));
        assert_eq!(coord.view().phase, SyncPhase::Idle);

        let now = Utc::now();
        coord.tick(now).await;

        let view = coord.view();
        assert_eq!(view.phase, SyncPhase::Synced);
        assert_eq!(view.latest.as_ref().unwrap().id, 2);
        assert_eq!(view.window.len(), 2);
        assert_eq!(view.last_sync_at, Some(now));
        assert_eq!(view.next_sync_at, Some(now + ChronoDuration::minutes(20)));
        assert!(view.auth_ok);

        assert_eq!(handle.pins_seen.borrow()[0].as_deref(), Some("2468"));
        assert_eq!(handle.hours_seen.borrow()[0], 24.0);
    }

    #[tokio::test]
    async fn test_empty_server_syncs_clean() {
        let api = ScriptedApi::default();
        let handle = api.clone();
        handle.push_latest(Ok(None));
        handle.push_window(Ok(vec![]));

        let mut coord = coordinator(api, None);
        coord.tick(Utc::now()).await;

        let view = coord.view();
        assert_eq!(view.phase, SyncPhase::Synced);
        assert!(view.latest.is_none());
        assert!(view.window.is_empty());
        assert!(view.auth_ok);
    }

    #[tokio::test]
    async fn test_credential_loss_then_recovery() {
        let api = ScriptedApi::default();
        let handle = api.clone();

        // One good cycle so there is a cached view to keep.
        handle.push_latest(Ok(Some(reading(1, 75))));
        handle.push_window(Ok(vec![reading(1, 75)]));

        let mut coord = coordinator(api, Some("1111"));
        coord.tick(Utc::now()).await;
        assert_eq!(coord.view().phase, SyncPhase::Synced);

        // The server rotates its pin: the next cycle is rejected.
        handle.push_latest(Err(FetchError::Unauthorized));
        coord.tick(Utc::now()).await;
        assert_eq!(coord.view().phase, SyncPhase::Unauthorized);
        assert!(!coord.view().auth_ok);
        // The stale view survives for rendering.
        assert_eq!(coord.view().latest.as_ref().unwrap().id, 1);

        // Halted: no fetch happens, the bad pin is never resent.
        let calls_before = handle.latest_call_count();
        coord.tick(Utc::now()).await;
        assert_eq!(handle.latest_call_count(), calls_before);

        // Fresh pin, but the network drops: cache still intact.
        coord.set_pin(Some("2468".to_string()));
        handle.push_latest(Err(FetchError::Status(500)));
        coord.tick(Utc::now()).await;
        assert_eq!(coord.view().phase, SyncPhase::Error);
        assert_eq!(coord.view().latest.as_ref().unwrap().id, 1);
        assert_eq!(coord.view().window.len(), 1);

        // The next cycle succeeds and replaces the view.
        handle.push_latest(Ok(Some(reading(3, 82))));
        handle.push_window(Ok(vec![reading(3, 82), reading(2, 78), reading(1, 75)]));
        coord.tick(Utc::now()).await;
        assert_eq!(coord.view().phase, SyncPhase::Synced);
        assert_eq!(coord.view().latest.as_ref().unwrap().id, 3);
        assert_eq!(coord.view().window.len(), 3);
        assert!(coord.view().auth_ok);

        assert_eq!(handle.pins_seen.borrow().last().unwrap().as_deref(), Some("2468"));
    }

    #[tokio::test]
    async fn test_next_sync_at_always_advances() {
        let api = ScriptedApi::default();
        let handle = api.clone();

        let mut coord = coordinator(api, Some("1111"));

        // Failed cycle.
        handle.push_latest(Err(FetchError::Status(503)));
        let t1 = Utc::now();
        coord.tick(t1).await;
        assert_eq!(coord.view().phase, SyncPhase::Error);
        assert_eq!(coord.view().next_sync_at, Some(t1 + ChronoDuration::minutes(20)));

        // Rejected cycle.
        handle.push_latest(Err(FetchError::Unauthorized));
        let t2 = t1 + ChronoDuration::minutes(20);
        coord.tick(t2).await;
        assert_eq!(coord.view().next_sync_at, Some(t2 + ChronoDuration::minutes(20)));

        // Halted cycle still re-derives the estimate.
        let t3 = t2 + ChronoDuration::minutes(20);
        coord.tick(t3).await;
        assert_eq!(coord.view().next_sync_at, Some(t3 + ChronoDuration::minutes(20)));
    }

    #[tokio::test]
    async fn test_window_failure_keeps_latest_and_window_consistent() {
        let api = ScriptedApi::default();
        let handle = api.clone();

        handle.push_latest(Ok(Some(reading(1, 70))));
        handle.push_window(Ok(vec![reading(1, 70)]));

        let mut coord = coordinator(api, None);
        coord.tick(Utc::now()).await;

        // Latest succeeds but the window fetch fails mid-cycle: the view
        // keeps the previous consistent pair instead of mixing cycles.
        handle.push_latest(Ok(Some(reading(2, 71))));
        handle.push_window(Err(FetchError::Status(500)));
        coord.tick(Utc::now()).await;

        assert_eq!(coord.view().phase, SyncPhase::Error);
        assert_eq!(coord.view().latest.as_ref().unwrap().id, 1);
        assert_eq!(coord.view().window.len(), 1);
    }
}
