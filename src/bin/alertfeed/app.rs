use std::path::PathBuf;
use std::time::Duration;

use alertfeed::Result;
use alertfeed::api::{ApiClient, load_history_snapshot, load_reports};
use alertfeed::config::Config;
use alertfeed::dashboard::{Dashboard, DashboardSettings};
use alertfeed::feed::{FeedUpdate, LiveFeed};
use alertfeed::reports::Report;
use alertfeed::sensor::SensorPoll;
use alertfeed::telemetry::init_tracing;
use alertfeed::toast::{ToastEvent, sleep_until_deadline};
use alertfeed::types::Alert;
use async_channel::{Sender, TrySendError, bounded};
use chrono::Utc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::cli::Cli;
use super::console;
use super::notifier::{NotifierCommand, ToastRequest, run_notifier};

const DEFAULT_CONFIG: &str = "alertfeed.toml";
const DISMISS_QUEUE: usize = 16;
const SENSOR_QUEUE: usize = 4;

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config = load_config(&cli)?;
    let client = ApiClient::new(
        config.api.base_url.clone(),
        config.api.request_timeout,
        config.api.connect_timeout,
    )?;
    let mut dashboard = Dashboard::new(DashboardSettings::from(&config));

    if cli.once {
        print_once(&client, &config, &mut dashboard).await;
        return Ok(());
    }

    info!(
        api = %config.api.base_url,
        ws = %config.feed.ws_url,
        sensor = config.sensor.enabled,
        "starting dashboard"
    );

    let (feed_tx, feed_rx) = bounded(config.feed.queue_bound);
    let feed = LiveFeed::new(config.feed.ws_url.clone(), config.feed.reconnect)
        .with_connect_timeout(config.feed.connect_timeout)
        .with_keepalive(config.feed.keepalive)
        .start(feed_tx);

    let mut snapshot = spawn_snapshot(client.clone(), config.api.history_limit);
    let mut snapshot_pending = true;

    let (toast_tx, toast_rx) = bounded(config.toast.cap.saturating_mul(2));
    let (dismiss_tx, dismiss_rx) = bounded(DISMISS_QUEUE);
    let notifier = tokio::spawn(run_notifier(
        toast_rx,
        dismiss_tx,
        config.notify.clone(),
        config.toast.display,
        cli.dry_run,
    ));
    let mut dismiss_open = true;

    let (sensor_tx, sensor_rx) = bounded(SENSOR_QUEUE);
    let poller = config
        .sensor
        .enabled
        .then(|| spawn_sensor_poller(client.clone(), config.sensor.poll_interval, sensor_tx));
    let mut sensor_open = poller.is_some();

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                info!("shutdown signal received, stopping");
                break;
            }
            res = &mut snapshot, if snapshot_pending => {
                snapshot_pending = false;
                match res {
                    Ok((history, reports)) => {
                        dashboard.seed_history(history);
                        dashboard.seed_reports(reports);
                        if let Some(alert) = dashboard.current_alert() {
                            info!("current: {}", console::alert_line(alert));
                        }
                    }
                    Err(err) => warn!(error = %err, "snapshot task terminated unexpectedly"),
                }
            }
            update = feed_rx.recv() => {
                let Ok(update) = update else {
                    warn!("feed stopped unexpectedly");
                    break;
                };
                if let FeedUpdate::State(state) = &update {
                    info!(%state, "feed connection");
                }
                let events = dashboard.apply_update(update, Instant::now());
                dispatch(&dashboard, &events, &toast_tx);
            }
            id = dismiss_rx.recv(), if dismiss_open => match id {
                Ok(id) => {
                    if let Some(event) = dashboard.dismiss_toast(id, Instant::now()) {
                        dispatch(&dashboard, &[event], &toast_tx);
                    }
                }
                Err(_) => dismiss_open = false,
            },
            () = sleep_until_deadline(dashboard.next_deadline()) => {
                let events = dashboard.tick(Instant::now());
                dispatch(&dashboard, &events, &toast_tx);
            }
            poll = sensor_rx.recv(), if sensor_open => match poll {
                Ok(outcome) => {
                    dashboard.record_sensor_poll(outcome, Utc::now());
                    debug!("{}", console::sensor_line(dashboard.sensor()));
                }
                Err(_) => sensor_open = false,
            },
        }
    }

    feed.stop().await;
    let cleared = dashboard.shutdown();
    debug!(toasts = cleared.len(), "toast timers cleared");
    dispatch(&dashboard, &cleared, &toast_tx);
    if snapshot_pending {
        snapshot.abort();
    }
    if let Some(poller) = poller {
        poller.abort();
    }
    toast_tx.close();
    if let Err(err) = notifier.await {
        warn!(error = %err, "notifier task terminated unexpectedly");
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = Config::from_env_and_file(&config_path)?;

    if let Some(base) = cli.api_base.clone() {
        config.set_api_base(base)?;
    }
    if let Some(ws_url) = cli.ws_url.clone() {
        config.set_ws_url(ws_url)?;
    }
    if let Some(limit) = cli.history_limit {
        config.set_history_limit(limit)?;
    }
    if cli.sensor {
        config.sensor.enabled = true;
    }
    Ok(config)
}

async fn print_once(client: &ApiClient, config: &Config, dashboard: &mut Dashboard) {
    let (history, reports) = tokio::join!(
        load_history_snapshot(client, config.api.history_limit),
        load_reports(client)
    );
    dashboard.seed_history(history);
    dashboard.seed_reports(reports);
    if config.sensor.enabled {
        dashboard.record_sensor_poll(client.latest_sensor_reading().await, Utc::now());
    }
    print!("{}", console::render(dashboard, config.grafana_url.as_ref()));
}

fn spawn_snapshot(client: ApiClient, limit: u32) -> JoinHandle<(Vec<Alert>, Vec<Report>)> {
    tokio::spawn(async move {
        tokio::join!(load_history_snapshot(&client, limit), load_reports(&client))
    })
}

fn spawn_sensor_poller(
    client: ApiClient,
    every: Duration,
    tx: Sender<Result<SensorPoll>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let outcome = client.latest_sensor_reading().await;
            if let Err(err) = &outcome {
                if err.is_retriable() {
                    debug!(error = %err, "sensor poll failed, will retry");
                } else {
                    warn!(error = %err, "sensor poll failed");
                }
            }
            if tx.send(outcome).await.is_err() {
                break;
            }
        }
    })
}

/// Mirror toast lifecycle events on the notifier: shown toasts go up,
/// removed ones come down.
fn dispatch(dashboard: &Dashboard, events: &[ToastEvent], toasts: &Sender<NotifierCommand>) {
    for event in events {
        let command = match *event {
            ToastEvent::Shown(id) => {
                let Some(toast) = dashboard.toasts().get(id) else {
                    continue;
                };
                NotifierCommand::Show(ToastRequest {
                    id,
                    alert: toast.alert.clone(),
                })
            }
            ToastEvent::Hiding(id) => {
                debug!(toast = id, "toast hiding");
                continue;
            }
            ToastEvent::Removed(id) => NotifierCommand::Close(id),
        };
        match toasts.try_send(command) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(NotifierCommand::Show(request))) => {
                warn!(toast = request.id, "notifier is behind, skipping desktop toast");
            }
            Err(TrySendError::Full(NotifierCommand::Close(id))) => {
                warn!(toast = id, "notifier is behind, desktop toast left open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::dispatch;
    use crate::notifier::NotifierCommand;
    use alertfeed::dashboard::Dashboard;
    use alertfeed::feed::{FeedEvent, FeedUpdate};
    use alertfeed::normalize::normalize_alert;
    use alertfeed::toast::ToastEvent;
    use async_channel::bounded;
    use serde_json::json;
    use tokio::time::Instant;

    fn push(dashboard: &mut Dashboard, id: &str) -> Vec<ToastEvent> {
        let alert = normalize_alert(&json!({"id": id, "level": "error", "message": id}));
        dashboard.apply_update(FeedUpdate::Event(FeedEvent::Alert(alert)), Instant::now())
    }

    #[tokio::test]
    async fn shown_toasts_reach_the_notifier() {
        let mut dashboard = Dashboard::default();
        let (tx, rx) = bounded(4);

        let events = push(&mut dashboard, "a1");
        dispatch(&dashboard, &events, &tx);

        let request = match rx.try_recv() {
            Ok(NotifierCommand::Show(request)) => request,
            Ok(other) => panic!("unexpected command: {other:?}"),
            Err(err) => panic!("no toast request: {err}"),
        };
        assert_eq!(request.alert.id, "a1");
        assert!(matches!(events.as_slice(), [ToastEvent::Shown(id)] if *id == request.id));
    }

    #[tokio::test]
    async fn full_notifier_queue_does_not_block() {
        let mut dashboard = Dashboard::default();
        let (tx, rx) = bounded(1);

        for id in ["a1", "a2", "a3"] {
            let events = push(&mut dashboard, id);
            dispatch(&dashboard, &events, &tx);
        }

        assert_eq!(rx.len(), 1);
        assert_eq!(dashboard.toasts().len(), 3);
    }

    #[tokio::test]
    async fn evicted_and_cleared_toasts_close_their_desktop_copy() {
        let mut dashboard = Dashboard::default();
        let (tx, rx) = bounded(32);

        let mut shown = Vec::new();
        for n in 0..6 {
            let events = push(&mut dashboard, &format!("a{n}"));
            dispatch(&dashboard, &events, &tx);
        }
        while let Ok(command) = rx.try_recv() {
            shown.push(command);
        }
        let first = match shown.first() {
            Some(NotifierCommand::Show(request)) => request.id,
            other => panic!("unexpected first command: {other:?}"),
        };
        assert!(
            shown
                .iter()
                .any(|command| matches!(command, NotifierCommand::Close(id) if *id == first)),
            "cap eviction closes the oldest desktop toast"
        );

        let cleared = dashboard.shutdown();
        dispatch(&dashboard, &cleared, &tx);
        let closes = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|command| matches!(command, NotifierCommand::Close(_)))
            .count();
        assert_eq!(closes, 5);
    }
}
