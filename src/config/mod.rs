use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::Result;
use crate::error::ConfigError;
use crate::feed::ReconnectPolicy;
use crate::toast::ToastSettings;

mod defaults;
mod env;
mod raw;
mod serde;

use self::serde::HumantimeDuration;

const HISTORY_LIMIT_BOUNDS: RangeInclusive<u32> = 1..=1000;
const HTTP_SCHEMES: [&str; 2] = ["http", "https"];
const WS_SCHEMES: [&str; 2] = ["ws", "wss"];

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiSettings,
    pub feed: FeedSettings,
    pub store: StoreSettings,
    pub toast: ToastSettings,
    pub notify: NotifySettings,
    pub sensor: SensorSettings,
    pub grafana_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub history_limit: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub ws_url: Url,
    /// Path appended to the API base when `ws_url` is derived.
    pub ws_path: String,
    /// `true` when `ws_url` was configured rather than derived.
    pub ws_url_pinned: bool,
    pub reconnect: ReconnectPolicy,
    /// Deadline for the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
    /// Ping period on an open connection; two silent periods drop it.
    pub keepalive: Duration,
    pub queue_bound: usize,
    pub dedup_cache_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub history_cap: usize,
    pub report_cap: usize,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub appname: String,
    pub icon: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorSettings {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub series_len: usize,
}

impl Config {
    /// Load configuration from a file and the environment.
    ///
    /// The file is optional; `ALERTFEED__SECTION__KEY` variables override it
    /// and the flat variables (`API_BASE_URL`, `WS_URL`, ...) override both.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration file cannot be parsed, when
    /// environment overrides are invalid, or when the resulting values fail
    /// validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path)?;
        raw.apply_env_overrides()?;
        raw.validate_and_build()
    }

    /// Point the client at another backend. A derived `ws_url` follows the
    /// new base; a pinned one is kept.
    ///
    /// # Errors
    ///
    /// Returns an error unless `base` is an http(s) URL.
    pub fn set_api_base(&mut self, base: Url) -> Result<()> {
        check_scheme("api.base_url", &base, &HTTP_SCHEMES)?;
        if !self.feed.ws_url_pinned {
            self.feed.ws_url = derive_ws_url(&base, &self.feed.ws_path)?;
        }
        self.api.base_url = base;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error unless `url` is a ws(s) URL.
    pub fn set_ws_url(&mut self, url: Url) -> Result<()> {
        check_scheme("feed.ws_url", &url, &WS_SCHEMES)?;
        self.feed.ws_url = url;
        self.feed.ws_url_pinned = true;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error when `limit` is outside `1..=1000`.
    pub fn set_history_limit(&mut self, limit: u32) -> Result<()> {
        check_history_limit(limit)?;
        self.api.history_limit = limit;
        Ok(())
    }
}

/// Streaming endpoint for an API base: `http` becomes `ws`, `https` becomes
/// `wss`, and `ws_path` is appended to the base path.
///
/// # Errors
///
/// Returns an error unless `api_base` is an http(s) URL.
pub fn derive_ws_url(api_base: &Url, ws_path: &str) -> Result<Url> {
    let scheme = match api_base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ConfigError::InvalidField {
                field: "api.base_url",
                message: format!("cannot derive a websocket URL from scheme `{other}`"),
            }
            .into());
        }
    };

    let mut url = api_base.clone();
    url.set_scheme(scheme).map_err(|()| ConfigError::InvalidField {
        field: "feed.ws_path",
        message: format!("cannot switch {api_base} to {scheme}"),
    })?;
    let path = format!(
        "{}/{}",
        api_base.path().trim_end_matches('/'),
        ws_path.trim_start_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn check_scheme(field: &'static str, url: &Url, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&url.scheme()) {
        return Ok(());
    }
    Err(ConfigError::InvalidField {
        field,
        message: format!(
            "expected one of {} URLs, got `{}`",
            allowed.join("/"),
            url.scheme()
        ),
    }
    .into())
}

fn check_history_limit(limit: u32) -> Result<()> {
    if HISTORY_LIMIT_BOUNDS.contains(&limit) {
        return Ok(());
    }
    Err(ConfigError::InvalidField {
        field: "api.history_limit",
        message: format!(
            "expected between {} and {}, got {limit}",
            HISTORY_LIMIT_BOUNDS.start(),
            HISTORY_LIMIT_BOUNDS.end()
        ),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::derive_ws_url;
    use url::Url;

    fn url(raw: &str) -> Url {
        match Url::parse(raw) {
            Ok(url) => url,
            Err(err) => panic!("invalid test url {raw}: {err}"),
        }
    }

    fn derived(base: &str, path: &str) -> String {
        match derive_ws_url(&url(base), path) {
            Ok(url) => url.to_string(),
            Err(err) => panic!("derive failed: {err}"),
        }
    }

    #[test]
    fn websocket_url_follows_api_scheme() {
        assert_eq!(derived("http://localhost:8000", "/ws"), "ws://localhost:8000/ws");
        assert_eq!(derived("https://edge.plant/", "/ws"), "wss://edge.plant/ws");
        assert_eq!(
            derived("http://gateway/moby/?x=1", "ws/sensor"),
            "ws://gateway/moby/ws/sensor"
        );
    }

    #[test]
    fn websocket_url_needs_http_base() {
        assert!(derive_ws_url(&url("ftp://files.local"), "/ws").is_err());
    }
}
