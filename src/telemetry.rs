use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

use crate::Result;
use crate::error::Error;

/// Used when neither `--log-filter` nor `RUST_LOG` yields a valid directive.
/// The websocket stack logs every frame at debug level.
const FALLBACK_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn";

/// Install the global subscriber.
///
/// The filter is the first valid candidate among `explicit_filter`,
/// `RUST_LOG` and [`FALLBACK_FILTER`].
///
/// # Errors
///
/// Returns an error when JSON output is requested from a build without the
/// `json-logs` feature, or when a global subscriber is already installed.
pub fn init_tracing(explicit_filter: Option<&str>, use_json: bool) -> Result<()> {
    let filter = resolve_filter(explicit_filter, std::env::var("RUST_LOG").ok().as_deref());

    #[cfg(feature = "json-logs")]
    if use_json {
        let subscriber = Registry::default().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .json()
                .flatten_event(true),
        );
        return tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| Error::Telemetry(err.to_string()));
    }

    #[cfg(not(feature = "json-logs"))]
    if use_json {
        return Err(Error::Telemetry(
            "JSON logs need a build with the `json-logs` feature".to_string(),
        ));
    }

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::Telemetry(err.to_string()))
}

fn resolve_filter(explicit: Option<&str>, from_env: Option<&str>) -> EnvFilter {
    explicit
        .into_iter()
        .chain(from_env)
        .find_map(|candidate| EnvFilter::try_new(candidate).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

#[cfg(test)]
mod tests {
    use super::resolve_filter;

    #[test]
    fn explicit_filter_wins_over_environment() {
        let filter = resolve_filter(Some("alertfeed=trace"), Some("warn"));
        assert_eq!(filter.to_string(), "alertfeed=trace");
    }

    #[test]
    fn invalid_candidates_are_skipped() {
        let filter = resolve_filter(Some("alertfeed=notalevel"), Some("debug"));
        assert_eq!(filter.to_string(), "debug");

        let filter = resolve_filter(None, None);
        assert!(filter.to_string().contains("tungstenite=warn"));
    }
}
