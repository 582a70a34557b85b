use std::fmt::Write as FmtWrite;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::Result;
use crate::error::ApiError;

use super::models::body_preview;

const MAX_ATTEMPTS: usize = 3;
const CORRELATION_HEADER: &str = "x-correlation-id";

/// REST client for the dashboard backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl ApiClient {
    /// Build an `ApiClient` rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(base: Url, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("alertfeed/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ApiError::Client { source: err })?;

        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    /// `base` with `segments` appended to its path.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Endpoint {
                base: self.base.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    #[allow(clippy::too_many_lines)]
    pub(super) async fn get_json<T>(&self, url: Url, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_multiplier(2.0)
            .with_randomization_factor(0.25)
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(self.timeout))
            .build();
        let path = url.path().to_string();

        for attempt in 1..=MAX_ATTEMPTS {
            let correlation_id = Uuid::now_v7().to_string();
            let started = Instant::now();
            let request = self
                .http
                .get(url.clone())
                .query(query)
                .header(CORRELATION_HEADER, &correlation_id);

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let aerr = ApiError::from(err);
                    if attempt == MAX_ATTEMPTS {
                        return Err(ApiError::RetryExhausted {
                            source: Box::new(aerr),
                        }
                        .into());
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(
                            %path,
                            %correlation_id,
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %aerr,
                            "retrying after transport error"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(aerr.into());
                }
            };

            let status = response.status();
            if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
                let aerr = ApiError::HttpStatus { status };
                if attempt == MAX_ATTEMPTS {
                    return Err(ApiError::RetryExhausted {
                        source: Box::new(aerr),
                    }
                    .into());
                }
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        %path,
                        %correlation_id,
                        attempt,
                        delay_ms = delay.as_millis(),
                        status = %status,
                        "retrying after server error"
                    );
                    sleep(delay).await;
                    continue;
                }
                return Err(aerr.into());
            }

            if !status.is_success() {
                return Err(ApiError::HttpStatus { status }.into());
            }

            let body = match response.bytes().await {
                Ok(body) => body,
                Err(err) => {
                    let aerr = ApiError::from(err);
                    if attempt == MAX_ATTEMPTS {
                        return Err(ApiError::RetryExhausted {
                            source: Box::new(aerr),
                        }
                        .into());
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(
                            %path,
                            %correlation_id,
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %aerr,
                            "retrying after body read error"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(aerr.into());
                }
            };

            return match serde_json::from_slice::<T>(&body) {
                Ok(value) => {
                    debug!(
                        %path,
                        %correlation_id,
                        attempt,
                        latency_ms = started.elapsed().as_millis(),
                        "api call succeeded"
                    );
                    Ok(value)
                }
                Err(err) => {
                    let preview = body_preview(&body);
                    let mut message =
                        format!("error decoding response body: {err}; body preview: ");
                    let _ = FmtWrite::write_str(&mut message, &preview);
                    Err(ApiError::Json { message }.into())
                }
            };
        }
        unreachable!("retry loop should have returned before reaching this point")
    }
}

#[cfg(test)]
mod tests {
    use super::ApiClient;
    use std::time::Duration;
    use url::Url;

    fn client(base: &str) -> ApiClient {
        let base = match Url::parse(base) {
            Ok(url) => url,
            Err(err) => panic!("invalid test url: {err}"),
        };
        match ApiClient::new(base, Duration::from_secs(1), Duration::from_secs(1)) {
            Ok(client) => client,
            Err(err) => panic!("client: {err}"),
        }
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let c = client("http://localhost:8000");
        let url = c.endpoint(&["api", "alerts", "history"]).ok();
        assert_eq!(
            url.as_ref().map(Url::as_str),
            Some("http://localhost:8000/api/alerts/history")
        );

        let c = client("http://gateway/moby/");
        let url = c.endpoint(&["api", "reports"]).ok();
        assert_eq!(
            url.as_ref().map(Url::as_str),
            Some("http://gateway/moby/api/reports")
        );
    }
}
