//! Latest sensor reading and its rolling history, fed by REST polling.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::Result;
use crate::error::ApiError;
use crate::normalize::parse_timestamp;

pub const DEFAULT_SERIES_LEN: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Vibration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub magnitude: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub sensor_type: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub vibration: Vibration,
    pub temperature: f64,
    pub rpm: f64,
}

/// Outcome of one `/api/sensor/latest` call.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorPoll {
    Reading(SensorReading),
    /// The server answered with a status message instead of data.
    NoData(String),
}

impl SensorPoll {
    /// Decode a response body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Json`] when the body is neither a status message
    /// nor a complete reading.
    pub fn from_value(body: Value) -> Result<Self> {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            return Ok(Self::NoData(message.to_string()));
        }
        serde_json::from_value(body)
            .map(Self::Reading)
            .map_err(|err| {
                ApiError::Json {
                    message: format!("invalid sensor reading: {err}"),
                }
                .into()
            })
    }
}

/// Oldest-first rolling window of readings.
#[derive(Clone, Debug)]
pub struct SensorSeries {
    cap: usize,
    readings: VecDeque<SensorReading>,
}

impl SensorSeries {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            readings: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, reading: SensorReading) {
        if self.readings.len() == self.cap {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.temperature).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PanelStatus {
    #[default]
    Loading,
    Receiving,
    NoData(String),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct SensorPanel {
    latest: Option<SensorReading>,
    series: SensorSeries,
    status: PanelStatus,
    last_update: Option<DateTime<Utc>>,
}

impl SensorPanel {
    pub fn new(series_len: usize) -> Self {
        Self {
            latest: None,
            series: SensorSeries::new(series_len),
            status: PanelStatus::Loading,
            last_update: None,
        }
    }

    /// Apply one poll result. Failures and no-data answers only change the
    /// status; the last good reading stays on display.
    pub fn record(&mut self, outcome: Result<SensorPoll>, now: DateTime<Utc>) {
        match outcome {
            Ok(SensorPoll::Reading(reading)) => {
                self.series.push(reading.clone());
                self.latest = Some(reading);
                self.status = PanelStatus::Receiving;
                self.last_update = Some(now);
            }
            Ok(SensorPoll::NoData(message)) => self.status = PanelStatus::NoData(message),
            Err(err) => self.status = PanelStatus::Failed(err.to_string()),
        }
    }

    pub const fn latest(&self) -> Option<&SensorReading> {
        self.latest.as_ref()
    }

    pub const fn series(&self) -> &SensorSeries {
        &self.series
    }

    pub const fn status(&self) -> &PanelStatus {
        &self.status
    }

    pub const fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}

impl Default for SensorPanel {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_LEN)
    }
}

fn deserialize_timestamp<'de, D>(de: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(de)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid sensor timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::{PanelStatus, SensorPanel, SensorPoll};
    use crate::error::{ApiError, Error};
    use chrono::Utc;
    use serde_json::{Value, json};

    fn reading(temp: f64) -> Value {
        json!({
            "device_id": "rpi-01",
            "sensor_type": "adxl345",
            "timestamp": "2024-05-01T08:00:00",
            "vibration": { "x": 0.1, "y": 0.2, "z": 9.8, "magnitude": 9.81 },
            "temperature": temp,
            "rpm": 1450
        })
    }

    fn poll(body: Value) -> SensorPoll {
        match SensorPoll::from_value(body) {
            Ok(poll) => poll,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn message_body_means_no_data() {
        assert_eq!(
            poll(json!({"message": "No data available yet"})),
            SensorPoll::NoData("No data available yet".to_string())
        );
    }

    #[test]
    fn reading_body_is_decoded() {
        match poll(reading(41.5)) {
            SensorPoll::Reading(r) => {
                assert_eq!(r.device_id, "rpi-01");
                assert!((r.temperature - 41.5).abs() < f64::EPSILON);
                assert!((r.rpm - 1450.0).abs() < f64::EPSILON);
            }
            other @ SensorPoll::NoData(_) => panic!("unexpected poll: {other:?}"),
        }
    }

    #[test]
    fn incomplete_reading_is_an_error() {
        assert!(SensorPoll::from_value(json!({"temperature": 3})).is_err());
    }

    #[test]
    fn panel_keeps_a_bounded_series_and_last_good_reading() {
        let mut panel = SensorPanel::new(3);
        for i in 0..5 {
            panel.record(Ok(poll(reading(f64::from(i)))), Utc::now());
        }
        assert_eq!(panel.series().len(), 3);
        assert_eq!(panel.series().temperatures(), [2.0, 3.0, 4.0]);
        assert_eq!(panel.status(), &PanelStatus::Receiving);

        panel.record(
            Err(Error::from(ApiError::Json {
                message: "boom".to_string(),
            })),
            Utc::now(),
        );
        assert!(matches!(panel.status(), PanelStatus::Failed(_)));
        assert!(panel.latest().is_some());
        assert_eq!(panel.series().len(), 3);

        panel.record(Ok(SensorPoll::NoData("idle".to_string())), Utc::now());
        assert_eq!(panel.status(), &PanelStatus::NoData("idle".to_string()));
    }
}
