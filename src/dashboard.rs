//! Everything the operator sees, owned by a single event loop.
//!
//! [`Dashboard`] holds the alert history, the report log, the current alert,
//! the toast queue, the connection indicator and the sensor panel. It never
//! awaits: the binary feeds it snapshot results, feed updates, timer ticks and
//! dismissals one at a time, so no locking is involved.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::feed::{FeedEvent, FeedUpdate};
use crate::history::{DEFAULT_HISTORY_CAP, HistoryStore};
use crate::reports::{DEFAULT_REPORT_CAP, Report, ReportLog};
use crate::sensor::{DEFAULT_SERIES_LEN, SensorPanel, SensorPoll};
use crate::toast::{ToastEvent, ToastId, ToastQueue, ToastSettings};
use crate::types::{Alert, ConnectionState};

const DEFAULT_DEDUP_CACHE: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

#[derive(Clone, Copy, Debug)]
pub struct DashboardSettings {
    pub history_cap: usize,
    pub report_cap: usize,
    pub toast: ToastSettings,
    pub dedup_cache_size: NonZeroUsize,
    pub series_len: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            report_cap: DEFAULT_REPORT_CAP,
            toast: ToastSettings::default(),
            dedup_cache_size: DEFAULT_DEDUP_CACHE,
            series_len: DEFAULT_SERIES_LEN,
        }
    }
}

impl From<&Config> for DashboardSettings {
    fn from(config: &Config) -> Self {
        Self {
            history_cap: config.store.history_cap,
            report_cap: config.store.report_cap,
            toast: config.toast,
            dedup_cache_size: NonZeroUsize::new(config.feed.dedup_cache_size)
                .unwrap_or(DEFAULT_DEDUP_CACHE),
            series_len: config.sensor.series_len,
        }
    }
}

#[derive(Debug)]
pub struct Dashboard {
    history: HistoryStore,
    reports: ReportLog,
    current: Option<Alert>,
    toasts: ToastQueue,
    connection: ConnectionState,
    sensor: SensorPanel,
    recent_ids: LruCache<String, ()>,
}

impl Dashboard {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            history: HistoryStore::new(settings.history_cap),
            reports: ReportLog::new(settings.report_cap),
            current: None,
            toasts: ToastQueue::new(settings.toast),
            connection: ConnectionState::Closed,
            sensor: SensorPanel::new(settings.series_len),
            recent_ids: LruCache::new(settings.dedup_cache_size),
        }
    }

    /// Merge the REST snapshot (newest-first) into the history.
    ///
    /// The newest snapshot alert becomes the current alert unless a live
    /// alert got there first.
    pub fn seed_history(&mut self, snapshot: Vec<Alert>) {
        for alert in &snapshot {
            self.recent_ids.put(alert.id.clone(), ());
        }
        if self.current.is_none() {
            self.current = snapshot.first().cloned();
        }
        let fetched = snapshot.len();
        self.history.seed(snapshot);
        info!(fetched, stored = self.history.len(), "history seeded");
    }

    pub fn seed_reports(&mut self, listing: Vec<Report>) {
        self.reports.seed(listing);
    }

    /// Apply one update from the live feed and return the resulting toast
    /// transitions.
    pub fn apply_update(&mut self, update: FeedUpdate, now: Instant) -> Vec<ToastEvent> {
        match update {
            FeedUpdate::State(state) => {
                self.set_connection(state);
                Vec::new()
            }
            FeedUpdate::Event(FeedEvent::Alert(alert)) => self.push_alert(alert, now),
            FeedUpdate::Event(FeedEvent::Report(report)) => {
                debug!(title = report.title(), "report received");
                self.reports.push(report);
                Vec::new()
            }
            FeedUpdate::Event(FeedEvent::Unknown { kind }) => {
                debug!(%kind, "ignoring feed event");
                Vec::new()
            }
        }
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            debug!(from = %self.connection, to = %state, "connection state changed");
            self.connection = state;
        }
    }

    fn push_alert(&mut self, alert: Alert, now: Instant) -> Vec<ToastEvent> {
        if self.recent_ids.put(alert.id.clone(), ()).is_some() {
            debug!(id = %alert.id, "dropping duplicate alert");
            return Vec::new();
        }
        info!(
            id = %alert.id,
            level = %alert.level,
            source = %alert.source,
            "alert received"
        );
        self.current = Some(alert.clone());
        if !self.history.insert(alert.clone()) {
            debug!(id = %alert.id, "alert older than the retained history");
        }
        let (_, events) = self.toasts.enqueue(alert, now);
        events
    }

    /// Fire toast timers due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<ToastEvent> {
        self.toasts.tick(now)
    }

    pub fn dismiss_toast(&mut self, id: ToastId, now: Instant) -> Option<ToastEvent> {
        self.toasts.dismiss(id, now)
    }

    pub fn record_sensor_poll(&mut self, outcome: Result<SensorPoll>, now: DateTime<Utc>) {
        self.sensor.record(outcome, now);
    }

    /// Abandon every toast timer. The feed itself is stopped by its handle.
    pub fn shutdown(&mut self) -> Vec<ToastEvent> {
        self.set_connection(ConnectionState::Closed);
        self.toasts.clear()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.toasts.next_deadline()
    }

    pub const fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub const fn reports(&self) -> &ReportLog {
        &self.reports
    }

    pub const fn current_alert(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    pub const fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub const fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub const fn sensor(&self) -> &SensorPanel {
        &self.sensor
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DashboardSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, DashboardSettings};
    use crate::feed::{FeedEvent, FeedUpdate, parse_frame};
    use crate::normalize::normalize_alert;
    use crate::reports::Report;
    use crate::toast::{ToastEvent, ToastSettings};
    use crate::types::{Alert, ConnectionState, Level};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::{Instant, advance};

    fn alert(id: &str, ts: &str) -> Alert {
        normalize_alert(&json!({"id": id, "ts": ts, "level": "warning", "message": id}))
    }

    fn frame(text: &str) -> FeedUpdate {
        match parse_frame(text) {
            Ok(event) => FeedUpdate::Event(event),
            Err(err) => panic!("frame rejected: {err}"),
        }
    }

    fn ids(dashboard: &Dashboard) -> Vec<&str> {
        dashboard.history().iter().map(|a| a.id.as_str()).collect()
    }

    #[tokio::test]
    async fn live_alert_lands_in_history_current_and_toasts() {
        let mut dashboard = Dashboard::default();
        dashboard.seed_history(vec![alert("old", "2024-01-01T00:00:00Z")]);

        let events = dashboard.apply_update(
            frame(r#"{"type":"alert","payload":{"level":"critical","message":"over temp"}}"#),
            Instant::now(),
        );

        assert!(matches!(events.as_slice(), [ToastEvent::Shown(_)]));
        let head = match dashboard.history().newest() {
            Some(alert) => alert,
            None => panic!("history is empty"),
        };
        assert_eq!(head.level, Level::Critical);
        assert_eq!(head.message, "over temp");
        assert!(!head.id.is_empty());
        assert_eq!(dashboard.current_alert().map(|a| a.id.as_str()), Some(head.id.as_str()));
        assert_eq!(dashboard.toasts().len(), 1);
        assert_eq!(dashboard.history().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_touch_neither_history_nor_toasts() {
        let mut dashboard = Dashboard::default();
        let now = Instant::now();
        let update = FeedUpdate::Event(FeedEvent::Alert(alert("a1", "2024-01-01T00:00:00Z")));

        dashboard.apply_update(update.clone(), now);
        let events = dashboard.apply_update(update, now);

        assert!(events.is_empty());
        assert_eq!(dashboard.history().len(), 1);
        assert_eq!(dashboard.toasts().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_does_not_replace_a_live_current_alert() {
        let mut dashboard = Dashboard::default();
        dashboard.apply_update(
            FeedUpdate::Event(FeedEvent::Alert(alert("live", "2024-01-01T00:00:00Z"))),
            Instant::now(),
        );
        dashboard.seed_history(vec![
            alert("s2", "2024-03-01T00:00:00Z"),
            alert("s1", "2023-12-01T00:00:00Z"),
        ]);

        assert_eq!(dashboard.current_alert().map(|a| a.id.as_str()), Some("live"));
        assert_eq!(ids(&dashboard), ["s2", "live", "s1"]);
    }

    #[test]
    fn snapshot_sets_current_alert_when_nothing_arrived_yet() {
        let mut dashboard = Dashboard::default();
        dashboard.seed_history(vec![
            alert("s2", "2024-03-01T00:00:00Z"),
            alert("s1", "2023-12-01T00:00:00Z"),
        ]);
        assert_eq!(dashboard.current_alert().map(|a| a.id.as_str()), Some("s2"));
    }

    #[tokio::test]
    async fn history_and_toasts_respect_their_caps() {
        let mut dashboard = Dashboard::new(DashboardSettings {
            history_cap: 3,
            toast: ToastSettings {
                cap: 2,
                ..ToastSettings::default()
            },
            ..DashboardSettings::default()
        });
        let now = Instant::now();
        for day in 1..=5 {
            let ts = format!("2024-01-0{day}T00:00:00Z");
            dashboard.apply_update(
                FeedUpdate::Event(FeedEvent::Alert(alert(&format!("a{day}"), &ts))),
                now,
            );
        }
        assert_eq!(ids(&dashboard), ["a5", "a4", "a3"]);
        let toast_ids: Vec<&str> = dashboard.toasts().iter().map(|t| t.alert.id.as_str()).collect();
        assert_eq!(toast_ids, ["a5", "a4"]);
    }

    #[tokio::test]
    async fn reports_are_prepended_and_capped() {
        let mut dashboard = Dashboard::new(DashboardSettings {
            report_cap: 2,
            ..DashboardSettings::default()
        });
        let now = Instant::now();
        for n in 1..=3 {
            dashboard.apply_update(
                FeedUpdate::Event(FeedEvent::Report(Report::new(json!({"id": n})))),
                now,
            );
        }
        let kept: Vec<Option<String>> = dashboard.reports().iter().map(Report::id).collect();
        assert_eq!(kept, [Some("3".to_string()), Some("2".to_string())]);
    }

    #[tokio::test]
    async fn connection_state_and_unknown_events() {
        let mut dashboard = Dashboard::default();
        let now = Instant::now();
        assert_eq!(dashboard.connection(), ConnectionState::Closed);

        dashboard.apply_update(FeedUpdate::State(ConnectionState::Open), now);
        assert!(dashboard.connection().is_open());

        let events = dashboard.apply_update(frame(r#"{"type":"heartbeat"}"#), now);
        assert!(events.is_empty());
        assert!(dashboard.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn toasts_expire_and_shutdown_clears_timers() {
        let mut dashboard = Dashboard::default();
        let events = dashboard.apply_update(
            FeedUpdate::Event(FeedEvent::Alert(alert("a1", "2024-01-01T00:00:00Z"))),
            Instant::now(),
        );
        let id = match events.as_slice() {
            [ToastEvent::Shown(id)] => *id,
            other => panic!("unexpected events: {other:?}"),
        };

        advance(Duration::from_secs(10)).await;
        assert_eq!(dashboard.tick(Instant::now()), [ToastEvent::Hiding(id)]);
        assert_eq!(dashboard.dismiss_toast(id, Instant::now()), None);

        advance(Duration::from_millis(450)).await;
        assert_eq!(dashboard.tick(Instant::now()), [ToastEvent::Removed(id)]);
        assert!(dashboard.next_deadline().is_none());

        dashboard.apply_update(
            FeedUpdate::Event(FeedEvent::Alert(alert("a2", "2024-01-02T00:00:00Z"))),
            Instant::now(),
        );
        assert!(dashboard.next_deadline().is_some());
        assert_eq!(dashboard.shutdown().len(), 1);
        assert!(dashboard.next_deadline().is_none());
    }
}
