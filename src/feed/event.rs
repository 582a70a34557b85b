use serde::Deserialize;
use serde_json::Value;

use crate::error::FeedError;
use crate::normalize::normalize_alert;
use crate::reports::Report;
use crate::types::Alert;

const PREVIEW_LIMIT: usize = 120;

/// A decoded feed message.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    Alert(Alert),
    Report(Report),
    Unknown { kind: String },
}

impl FeedEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Alert(_) => "alert",
            Self::Report(_) => "report",
            Self::Unknown { kind } => kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// Decode one text frame of shape `{ "type": ..., "payload": ... }`.
///
/// # Errors
///
/// Returns [`FeedError::Decode`] when the text is not a JSON object and
/// [`FeedError::MissingPayload`] for alert or report frames without a payload.
pub fn parse_frame(text: &str) -> Result<FeedEvent, FeedError> {
    let frame: RawFrame = serde_json::from_str(text).map_err(|err| FeedError::Decode {
        message: format!("{err}; frame preview: {}", preview(text)),
    })?;

    let kind = frame.kind.unwrap_or_default();
    match kind.as_str() {
        "alert" | "report" if frame.payload.is_null() => Err(FeedError::MissingPayload { kind }),
        "alert" => Ok(FeedEvent::Alert(normalize_alert(&frame.payload))),
        "report" => Ok(FeedEvent::Report(Report::new(frame.payload))),
        _ => Ok(FeedEvent::Unknown { kind }),
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_LIMIT).collect();
    if text.chars().nth(PREVIEW_LIMIT).is_some() {
        out.push_str("...");
    }
    out.replace('\n', "\\n")
}
