use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: reqwest::StatusCode },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
    #[error("cannot build endpoint URL from {base}")]
    Endpoint { base: String },
    #[error("retry budget exhausted")]
    RetryExhausted {
        #[source]
        source: Box<ApiError>,
    },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket connection failed: {source}")]
    Connect {
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    #[error("websocket handshake did not finish within {after:?}")]
    Timeout { after: std::time::Duration },
    #[error("no traffic from the feed for {after:?}")]
    Stalled { after: std::time::Duration },
    #[error("feed connection ended: {reason}")]
    Closed { reason: String },
    #[error("malformed feed message: {message}")]
    Decode { message: String },
    #[error("feed event `{kind}` carries no payload")]
    MissingPayload { kind: String },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification backend failed")]
    Backend,
    #[error("notification backend unavailable on this platform")]
    Unsupported,
}

impl From<reqwest::Error> for ApiError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_status() {
            if let Some(status) = source.status() {
                return Self::HttpStatus { status };
            }
        }
        Self::Request { source }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(source: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connect {
            source: Box::new(source),
        }
    }
}

impl Error {
    /// Whether trying the same operation again later may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api(ApiError::HttpStatus { status }) => {
                status.is_server_error() || *status == reqwest::StatusCode::REQUEST_TIMEOUT
            }
            Self::Api(ApiError::Request { .. } | ApiError::RetryExhausted { .. })
            | Self::Feed(
                FeedError::Connect { .. }
                | FeedError::Timeout { .. }
                | FeedError::Stalled { .. }
                | FeedError::Closed { .. },
            ) => true,
            _ => false,
        }
    }
}
