use std::collections::HashSet;

use crate::normalize::by_newest;
use crate::types::Alert;

pub const DEFAULT_HISTORY_CAP: usize = 500;

/// Bounded alert history, always ordered newest-first by timestamp.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    cap: usize,
    alerts: Vec<Alert>,
}

impl HistoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            alerts: Vec::with_capacity(cap.clamp(1, DEFAULT_HISTORY_CAP)),
        }
    }

    /// Merge a REST snapshot with whatever is already stored.
    ///
    /// Entries already present win over snapshot entries with the same id.
    /// The result is stably sorted newest-first and truncated to the cap.
    pub fn seed(&mut self, snapshot: Vec<Alert>) {
        let mut seen: HashSet<String> = self.alerts.iter().map(|a| a.id.clone()).collect();
        for alert in snapshot {
            if seen.insert(alert.id.clone()) {
                self.alerts.push(alert);
            }
        }
        self.alerts.sort_by(by_newest);
        self.alerts.truncate(self.cap);
    }

    /// Insert a live alert at its timestamp position (ahead of equal
    /// timestamps). Returns `false` when the alert fell off the end because
    /// the store is full of newer entries.
    pub fn insert(&mut self, alert: Alert) -> bool {
        let idx = self
            .alerts
            .partition_point(|existing| existing.timestamp > alert.timestamp);
        if idx >= self.cap {
            return false;
        }
        self.alerts.insert(idx, alert);
        self.alerts.truncate(self.cap);
        true
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.alerts.iter().any(|a| a.id == id)
    }

    pub fn newest(&self) -> Option<&Alert> {
        self.alerts.first()
    }

    pub fn as_slice(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryStore;
    use crate::types::{Alert, Level};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        match Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single() {
            Some(ts) => ts,
            None => panic!("valid base timestamp"),
        }
    }

    fn alert(id: &str, offset_secs: i64) -> Alert {
        Alert {
            id: id.to_string(),
            level: Level::Warning,
            message: format!("alert {id}"),
            llm_summary: None,
            source: "edge".to_string(),
            timestamp: base() + Duration::seconds(offset_secs),
        }
    }

    fn ids(store: &HistoryStore) -> Vec<&str> {
        store.iter().map(|a| a.id.as_str()).collect()
    }

    fn assert_newest_first(store: &HistoryStore) {
        assert!(
            store
                .as_slice()
                .windows(2)
                .all(|w| w[0].timestamp >= w[1].timestamp)
        );
    }

    #[test]
    fn live_alerts_are_prepended() {
        let mut store = HistoryStore::new(10);
        store.seed(vec![alert("a", 10), alert("b", 5)]);
        assert!(store.insert(alert("c", 20)));
        assert_eq!(ids(&store), ["c", "a", "b"]);
        assert_eq!(store.newest().map(|a| a.id.as_str()), Some("c"));
    }

    #[test]
    fn out_of_order_live_alert_keeps_ordering() {
        let mut store = HistoryStore::new(10);
        store.seed(vec![alert("a", 30), alert("b", 10)]);
        assert!(store.insert(alert("late", 20)));
        assert_eq!(ids(&store), ["a", "late", "b"]);
        assert_newest_first(&store);
    }

    #[test]
    fn equal_timestamp_goes_before_existing() {
        let mut store = HistoryStore::new(10);
        store.seed(vec![alert("a", 10)]);
        store.insert(alert("b", 10));
        assert_eq!(ids(&store), ["b", "a"]);
    }

    #[test]
    fn cap_is_never_exceeded() {
        let mut store = HistoryStore::new(3);
        store.seed((0..5).map(|i| alert(&format!("s{i}"), i)).collect());
        assert_eq!(store.len(), 3);
        for i in 10..20 {
            store.insert(alert(&format!("l{i}"), i));
            assert!(store.len() <= 3);
            assert_newest_first(&store);
        }
        assert_eq!(ids(&store), ["l19", "l18", "l17"]);
    }

    #[test]
    fn alert_older_than_a_full_store_is_dropped() {
        let mut store = HistoryStore::new(2);
        store.seed(vec![alert("a", 10), alert("b", 9)]);
        assert!(!store.insert(alert("ancient", 0)));
        assert_eq!(ids(&store), ["a", "b"]);
    }

    #[test]
    fn seed_merges_with_live_entries_and_dedups() {
        let mut store = HistoryStore::new(10);
        let mut live = alert("x", 50);
        live.message = "live copy".to_string();
        store.insert(live);

        store.seed(vec![alert("x", 50), alert("y", 40), alert("z", 60)]);
        assert_eq!(ids(&store), ["z", "x", "y"]);
        let x = store.iter().find(|a| a.id == "x");
        assert_eq!(x.map(|a| a.message.as_str()), Some("live copy"));
        assert!(store.contains_id("y"));
    }

    #[test]
    fn seed_sort_is_stable_for_equal_timestamps() {
        let mut store = HistoryStore::new(10);
        store.seed(vec![alert("first", 1), alert("second", 1), alert("third", 1)]);
        assert_eq!(ids(&store), ["first", "second", "third"]);
    }
}
