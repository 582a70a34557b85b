use serde_json::Value;
use tracing::warn;

use crate::Result;
use crate::reports::Report;
use crate::sensor::SensorPoll;

use super::ApiClient;
use super::models::unwrap_list;

impl ApiClient {
    /// Raw alert records from `/api/alerts/history`.
    ///
    /// An unexpected body shape is logged and yields an empty list.
    pub async fn fetch_alert_history(&self, limit: u32) -> Result<Vec<Value>> {
        let url = self.endpoint(&["api", "alerts", "history"])?;
        let body: Value = self
            .get_json(url, &[("limit", limit.to_string())])
            .await?;
        Ok(listing_or_empty(body, "alert history"))
    }

    pub async fn fetch_reports(&self) -> Result<Vec<Report>> {
        let url = self.endpoint(&["api", "reports"])?;
        let body: Value = self.get_json(url, &[]).await?;
        Ok(listing_or_empty(body, "reports")
            .into_iter()
            .map(Report::new)
            .collect())
    }

    pub async fn latest_sensor_reading(&self) -> Result<SensorPoll> {
        let url = self.endpoint(&["api", "sensor", "latest"])?;
        let body: Value = self.get_json(url, &[]).await?;
        SensorPoll::from_value(body)
    }
}

fn listing_or_empty(body: Value, what: &'static str) -> Vec<Value> {
    let shape = json_kind(&body);
    unwrap_list(body).unwrap_or_else(|| {
        warn!(listing = what, shape, "unexpected listing payload shape, using empty list");
        Vec::new()
    })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
