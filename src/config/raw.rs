use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use url::Url;

use crate::Result;
use crate::error::ConfigError;
use crate::feed::ReconnectPolicy;
use crate::toast::ToastSettings;

use super::defaults::{
    default_appname, default_base_url, default_connect_timeout, default_dedup_cache_size,
    default_history_cap, default_history_limit, default_keepalive, default_poll_interval,
    default_queue_bound,
    default_reconnect_base, default_reconnect_max, default_report_cap, default_request_timeout,
    default_series_len, default_toast_cap, default_toast_display, default_toast_exit,
    default_ws_path,
};
use super::env::{env_duration, env_flag, env_parse, env_string};
use super::{
    ApiSettings, Config, FeedSettings, HTTP_SCHEMES, HumantimeDuration, NotifySettings,
    SensorSettings, StoreSettings, WS_SCHEMES, check_history_limit, check_scheme, derive_ws_url,
};

pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawConfig, ConfigError> {
    let builder = ::config::Config::builder()
        .add_source(::config::File::from(path.as_ref()).required(false))
        .add_source(
            ::config::Environment::with_prefix("ALERTFEED")
                .separator("__")
                .try_parsing(true),
        );
    deserialize(builder)
}

fn deserialize(
    builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
) -> std::result::Result<RawConfig, ConfigError> {
    builder
        .build()
        .map_err(|err| ConfigError::Other(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub(super) api: RawApi,
    #[serde(default)]
    pub(super) feed: RawFeed,
    #[serde(default)]
    pub(super) store: RawStore,
    #[serde(default)]
    pub(super) toast: RawToast,
    #[serde(default)]
    pub(super) sensor: RawSensor,
    #[serde(default)]
    pub(super) panel: RawPanel,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawApi {
    #[serde(default = "default_base_url")]
    pub(super) base_url: String,
    #[serde(default = "default_history_limit")]
    pub(super) history_limit: u32,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) connect_timeout: Duration,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) request_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawFeed {
    #[serde(default)]
    pub(super) ws_url: Option<String>,
    #[serde(default = "default_ws_path")]
    pub(super) ws_path: String,
    #[serde(default = "default_reconnect_base")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) reconnect_base: Duration,
    #[serde(default = "default_reconnect_max")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) reconnect_max: Duration,
    /// Handshake deadline; falls back to `api.connect_timeout`.
    #[serde(default)]
    #[serde_as(as = "Option<HumantimeDuration>")]
    pub(super) connect_timeout: Option<Duration>,
    #[serde(default = "default_keepalive")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) keepalive: Duration,
    #[serde(default = "default_queue_bound")]
    pub(super) queue_bound: usize,
    #[serde(default = "default_dedup_cache_size")]
    pub(super) dedup_cache_size: usize,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_history_cap")]
    pub(super) history_cap: usize,
    #[serde(default = "default_report_cap")]
    pub(super) report_cap: usize,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawToast {
    #[serde(default = "default_toast_cap")]
    pub(super) cap: usize,
    #[serde(default = "default_toast_display")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) display: Duration,
    #[serde(default = "default_toast_exit")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) exit: Duration,
    #[serde(default = "default_appname")]
    pub(super) appname: String,
    #[serde(default)]
    pub(super) icon: Option<PathBuf>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawSensor {
    #[serde(default)]
    pub(super) enabled: bool,
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) poll_interval: Duration,
    #[serde(default = "default_series_len")]
    pub(super) series_len: usize,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawPanel {
    #[serde(default)]
    pub(super) grafana_url: Option<String>,
}

impl RawConfig {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(url) = env_string("API_BASE_URL")? {
            self.api.base_url = url;
        }
        if let Some(url) = env_string("WS_URL")? {
            self.feed.ws_url = Some(url);
        }
        if let Some(url) = env_string("GRAFANA_EMBED_URL")? {
            self.panel.grafana_url = Some(url);
        }
        if let Some(limit) = env_parse::<u32>("HISTORY_LIMIT")? {
            self.api.history_limit = limit;
        }
        if let Some(display) = env_duration("TOAST_DISPLAY")? {
            self.toast.display = display;
        }
        if let Some(interval) = env_duration("SENSOR_POLL_INTERVAL")? {
            self.sensor.poll_interval = interval;
        }
        if let Some(enabled) = env_flag("SENSOR_POLLING")? {
            self.sensor.enabled = enabled;
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Config> {
        let base_url = parse_url("api.base_url", &self.api.base_url)?;
        check_scheme("api.base_url", &base_url, &HTTP_SCHEMES)?;
        check_history_limit(self.api.history_limit)?;
        positive_duration("api.connect_timeout", self.api.connect_timeout)?;
        positive_duration("api.request_timeout", self.api.request_timeout)?;

        let (ws_url, ws_url_pinned) = match self.feed.ws_url.as_deref() {
            Some(raw) => {
                let url = parse_url("feed.ws_url", raw)?;
                check_scheme("feed.ws_url", &url, &WS_SCHEMES)?;
                (url, true)
            }
            None => (derive_ws_url(&base_url, &self.feed.ws_path)?, false),
        };

        positive_duration("feed.reconnect_base", self.feed.reconnect_base)?;
        if self.feed.reconnect_base > self.feed.reconnect_max {
            return Err(ConfigError::InvalidField {
                field: "feed.reconnect_max",
                message: format!(
                    "must be at least reconnect_base ({})",
                    humantime::format_duration(self.feed.reconnect_base)
                ),
            }
            .into());
        }
        let feed_connect_timeout = self.feed.connect_timeout.unwrap_or(self.api.connect_timeout);
        positive_duration("feed.connect_timeout", feed_connect_timeout)?;
        positive_duration("feed.keepalive", self.feed.keepalive)?;
        positive_count("feed.queue_bound", self.feed.queue_bound)?;
        positive_count("feed.dedup_cache_size", self.feed.dedup_cache_size)?;
        positive_count("store.history_cap", self.store.history_cap)?;
        positive_count("store.report_cap", self.store.report_cap)?;
        positive_count("toast.cap", self.toast.cap)?;
        positive_duration("toast.display", self.toast.display)?;
        positive_duration("toast.exit", self.toast.exit)?;
        positive_duration("sensor.poll_interval", self.sensor.poll_interval)?;
        positive_count("sensor.series_len", self.sensor.series_len)?;

        let grafana_url = self
            .panel
            .grafana_url
            .as_deref()
            .map(|raw| parse_url("panel.grafana_url", raw))
            .transpose()?;

        Ok(Config {
            api: ApiSettings {
                base_url,
                history_limit: self.api.history_limit,
                connect_timeout: self.api.connect_timeout,
                request_timeout: self.api.request_timeout,
            },
            feed: FeedSettings {
                ws_url,
                ws_path: self.feed.ws_path,
                ws_url_pinned,
                reconnect: ReconnectPolicy {
                    base: self.feed.reconnect_base,
                    max: self.feed.reconnect_max,
                },
                connect_timeout: feed_connect_timeout,
                keepalive: self.feed.keepalive,
                queue_bound: self.feed.queue_bound,
                dedup_cache_size: self.feed.dedup_cache_size,
            },
            store: StoreSettings {
                history_cap: self.store.history_cap,
                report_cap: self.store.report_cap,
            },
            toast: ToastSettings {
                cap: self.toast.cap,
                display: self.toast.display,
                exit: self.toast.exit,
            },
            notify: NotifySettings {
                appname: self.toast.appname,
                icon: self.toast.icon,
            },
            sensor: SensorSettings {
                enabled: self.sensor.enabled,
                poll_interval: self.sensor.poll_interval,
                series_len: self.sensor.series_len,
            },
            grafana_url,
        })
    }
}

fn parse_url(field: &'static str, raw: &str) -> std::result::Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidField {
        field,
        message: format!("`{raw}`: {err}"),
    })
}

fn positive_count(field: &'static str, value: usize) -> std::result::Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn positive_duration(field: &'static str, value: Duration) -> std::result::Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidField {
            field,
            message: "duration must be greater than zero".to_string(),
        });
    }
    Ok(())
}

impl Default for RawApi {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            history_limit: default_history_limit(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for RawFeed {
    fn default() -> Self {
        Self {
            ws_url: None,
            ws_path: default_ws_path(),
            reconnect_base: default_reconnect_base(),
            reconnect_max: default_reconnect_max(),
            connect_timeout: None,
            keepalive: default_keepalive(),
            queue_bound: default_queue_bound(),
            dedup_cache_size: default_dedup_cache_size(),
        }
    }
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            report_cap: default_report_cap(),
        }
    }
}

impl Default for RawToast {
    fn default() -> Self {
        Self {
            cap: default_toast_cap(),
            display: default_toast_display(),
            exit: default_toast_exit(),
            appname: default_appname(),
            icon: None,
        }
    }
}

impl Default for RawSensor {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval: default_poll_interval(),
            series_len: default_series_len(),
        }
    }
}
