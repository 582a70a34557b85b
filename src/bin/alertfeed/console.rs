//! Plain-text rendering of the dashboard for terminals and logs.

use std::fmt::Write as _;

use alertfeed::dashboard::Dashboard;
use alertfeed::reports::Report;
use alertfeed::sensor::{PanelStatus, SensorPanel};
use alertfeed::types::Alert;
use url::Url;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn alert_line(alert: &Alert) -> String {
    let mut line = format!(
        "{} [{:<8}] {}: {}",
        alert.timestamp.format(TIME_FORMAT),
        alert.level.as_str().to_ascii_uppercase(),
        alert.source,
        alert.message
    );
    if let Some(summary) = alert.llm_summary.as_deref() {
        let _ = write!(line, " ({summary})");
    }
    line
}

pub fn report_line(report: &Report) -> String {
    let when = report
        .timestamp()
        .map_or_else(|| "-".to_string(), |ts| ts.format(TIME_FORMAT).to_string());
    match report.llm_summary() {
        Some(summary) => format!("{when} {}: {summary}", report.title()),
        None => format!("{when} {}", report.title()),
    }
}

pub fn sensor_line(panel: &SensorPanel) -> String {
    match (panel.status(), panel.latest()) {
        (PanelStatus::Loading, _) => "sensor: waiting for data".to_string(),
        (PanelStatus::NoData(message), _) => format!("sensor: {message}"),
        (PanelStatus::Failed(err), _) => format!("sensor: unavailable ({err})"),
        (PanelStatus::Receiving, None) => "sensor: receiving".to_string(),
        (PanelStatus::Receiving, Some(r)) => format!(
            "sensor {} ({}): {:.1} °C, {:.0} rpm, vibration {:.2} over {} samples",
            r.device_id,
            r.sensor_type,
            r.temperature,
            r.rpm,
            r.vibration.magnitude,
            panel.series().len()
        ),
    }
}

/// Full dashboard as printed by `--once`.
pub fn render(dashboard: &Dashboard, grafana: Option<&Url>) -> String {
    let mut out = String::new();
    match dashboard.current_alert() {
        Some(alert) => {
            let _ = writeln!(out, "current: {}", alert_line(alert));
        }
        None => out.push_str("current: no alert\n"),
    }

    let _ = writeln!(out, "\nhistory ({}):", dashboard.history().len());
    for alert in dashboard.history().iter() {
        let _ = writeln!(out, "  {}", alert_line(alert));
    }

    let _ = writeln!(out, "\nreports ({}):", dashboard.reports().len());
    for report in dashboard.reports().iter() {
        let _ = writeln!(out, "  {}", report_line(report));
    }

    if dashboard.sensor().last_update().is_some()
        || dashboard.sensor().status() != &PanelStatus::Loading
    {
        let _ = writeln!(out, "\n{}", sensor_line(dashboard.sensor()));
    }
    if let Some(url) = grafana {
        let _ = writeln!(out, "\ngrafana: {url}");
    }
    out
}
