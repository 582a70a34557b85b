use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::parse_timestamp;

pub const DEFAULT_REPORT_CAP: usize = 20;
const DEFAULT_REPORT_TITLE: &str = "Automatic summary report";

/// A server-generated report, kept exactly as received.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report(Value);

impl Report {
    pub const fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Report identifier rendered as text, if the server sent one.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> &str {
        self.0
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_REPORT_TITLE)
    }

    pub fn llm_summary(&self) -> Option<&str> {
        self.0.get("llm_summary").and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0.get("ts").and_then(parse_timestamp)
    }
}

/// Newest-first, bounded list of reports.
#[derive(Debug, Clone)]
pub struct ReportLog {
    cap: usize,
    reports: VecDeque<Report>,
}

impl ReportLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            reports: VecDeque::new(),
        }
    }

    pub fn push(&mut self, report: Report) {
        self.reports.push_front(report);
        self.reports.truncate(self.cap);
    }

    /// Append a REST listing, assumed newest-first, behind the reports
    /// already held. Duplicates are skipped and the cap still applies.
    pub fn seed(&mut self, listing: Vec<Report>) {
        for report in listing {
            if self.reports.len() >= self.cap {
                break;
            }
            if !self.reports.contains(&report) {
                self.reports.push_back(report);
            }
        }
    }

    pub fn latest(&self) -> Option<&Report> {
        self.reports.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl Default for ReportLog {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_CAP)
    }
}
