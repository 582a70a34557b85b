use std::time::Duration;

pub(super) fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

pub(super) const fn default_history_limit() -> u32 {
    100
}

pub(super) const fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

pub(super) const fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

pub(super) fn default_ws_path() -> String {
    "/ws".to_string()
}

pub(super) const fn default_reconnect_base() -> Duration {
    crate::feed::reconnect::DEFAULT_RECONNECT_BASE
}

pub(super) const fn default_reconnect_max() -> Duration {
    crate::feed::reconnect::DEFAULT_RECONNECT_MAX
}

pub(super) const fn default_keepalive() -> Duration {
    crate::feed::DEFAULT_KEEPALIVE
}

pub(super) const fn default_queue_bound() -> usize {
    64
}

pub(super) const fn default_dedup_cache_size() -> usize {
    512
}

pub(super) const fn default_history_cap() -> usize {
    crate::history::DEFAULT_HISTORY_CAP
}

pub(super) const fn default_report_cap() -> usize {
    crate::reports::DEFAULT_REPORT_CAP
}

pub(super) const fn default_toast_cap() -> usize {
    crate::toast::DEFAULT_TOAST_CAP
}

pub(super) const fn default_toast_display() -> Duration {
    crate::toast::DEFAULT_DISPLAY
}

pub(super) const fn default_toast_exit() -> Duration {
    crate::toast::DEFAULT_EXIT
}

pub(super) fn default_appname() -> String {
    "Alertfeed".to_string()
}

pub(super) const fn default_poll_interval() -> Duration {
    crate::sensor::DEFAULT_POLL_INTERVAL
}

pub(super) const fn default_series_len() -> usize {
    crate::sensor::DEFAULT_SERIES_LEN
}
