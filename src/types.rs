use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity as announced by the server.
///
/// Known levels are recognised case-insensitively. Anything else is kept
/// verbatim in [`Level::Other`] so it can still be displayed; renderers use
/// [`Level::style`] which falls back to the info style.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
    Other(String),
}

impl Level {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Other(raw) => raw,
        }
    }

    /// Known level used to pick colours, icons and urgency.
    #[must_use]
    pub const fn style(&self) -> Self {
        match self {
            Self::Warning => Self::Warning,
            Self::Error => Self::Error,
            Self::Critical => Self::Critical,
            Self::Info | Self::Other(_) => Self::Info,
        }
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for Level {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "info" | "information" => Self::Info,
            "warn" | "warning" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl From<String> for Level {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        match level {
            Level::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized alert. Built by [`crate::normalize::normalize_alert`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub id: String,
    pub level: Level,
    pub message: String,
    pub llm_summary: Option<String>,
    pub source: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
