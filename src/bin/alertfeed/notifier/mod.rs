mod backends;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alertfeed::config::NotifySettings;
use alertfeed::toast::ToastId;
use alertfeed::types::{Alert, Level};
use async_channel::{Receiver, Sender};
use tokio::task::{JoinSet, spawn_blocking};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::console::alert_line;
use backends::{Desktop, ToastParams};

/// Bound on waiting for desktop listeners once the dashboard has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A toast the dashboard just made visible.
#[derive(Debug)]
pub struct ToastRequest {
    pub id: ToastId,
    pub alert: Alert,
}

/// Work for the notifier task, in dashboard order.
#[derive(Debug)]
pub enum NotifierCommand {
    Show(ToastRequest),
    /// The toast left the dashboard; take its desktop copy down too.
    Close(ToastId),
}

/// Mirror dashboard toasts as desktop notifications. Dismissals made from
/// the desktop are reported back on `dismissed`.
pub async fn run_notifier(
    rx: Receiver<NotifierCommand>,
    dismissed: Sender<ToastId>,
    notify: NotifySettings,
    display: Duration,
    dry_run: bool,
) {
    let notifier = Notifier {
        desktop: Arc::new(backends::System),
        enabled: !dry_run,
        notify,
        display,
    };
    notifier.run(rx, dismissed).await;
}

struct Notifier<D: Desktop> {
    desktop: Arc<D>,
    enabled: bool,
    notify: NotifySettings,
    display: Duration,
}

impl<D: Desktop> Notifier<D> {
    async fn run(mut self, rx: Receiver<NotifierCommand>, dismissed: Sender<ToastId>) {
        let mut open: HashMap<ToastId, D::Toast> = HashMap::new();
        let mut listeners = JoinSet::new();

        while let Ok(command) = rx.recv().await {
            while listeners.try_join_next().is_some() {}
            match command {
                NotifierCommand::Show(request) => {
                    if let Some(toast) = self.show(&request).await {
                        let server_id = D::server_id(&toast);
                        open.insert(request.id, toast);
                        listeners.spawn_blocking(self.listener(request.id, server_id, &dismissed));
                    }
                }
                NotifierCommand::Close(id) => {
                    if let Some(toast) = open.remove(&id) {
                        self.close(id, toast).await;
                    }
                }
            }
        }

        for (id, toast) in open.drain() {
            self.close(id, toast).await;
        }
        let drained = timeout(SHUTDOWN_GRACE, async {
            while listeners.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                pending = listeners.len(),
                "desktop notification listeners still running at shutdown"
            );
            listeners.detach_all();
        }
        debug!("notifier stopped");
    }

    async fn show(&mut self, request: &ToastRequest) -> Option<D::Toast> {
        if !self.enabled {
            info!(toast = request.id, "toast: {}", alert_line(&request.alert));
            return None;
        }
        if !self.desktop.is_supported() {
            warn!("desktop notifications are not supported here, logging toasts instead");
            self.enabled = false;
            info!(toast = request.id, "toast: {}", alert_line(&request.alert));
            return None;
        }

        let params = ToastParams {
            summary: summary(&request.alert),
            body: body(&request.alert),
            urgency: urgency(&request.alert.level),
            timeout: self.display,
            appname: self.notify.appname.clone(),
            icon: self.notify.icon.clone(),
        };
        let desktop = Arc::clone(&self.desktop);
        match spawn_blocking(move || desktop.show(&params)).await {
            Ok(Ok(toast)) => Some(toast),
            Ok(Err(err)) => {
                warn!(toast = request.id, error = %err, "failed to show desktop notification");
                None
            }
            Err(err) => {
                warn!(toast = request.id, error = %err, "desktop notification task failed");
                None
            }
        }
    }

    async fn close(&self, id: ToastId, toast: D::Toast) {
        let desktop = Arc::clone(&self.desktop);
        if let Err(err) = spawn_blocking(move || desktop.close(toast)).await {
            warn!(toast = id, error = %err, "failed to close desktop notification");
        }
    }

    /// Blocking job reporting a desktop dismissal of toast `id` back to the
    /// dashboard. Ends once the notification is acted on or closed.
    fn listener(
        &self,
        id: ToastId,
        server_id: u32,
        dismissed: &Sender<ToastId>,
    ) -> impl FnOnce() + Send + 'static {
        let desktop = Arc::clone(&self.desktop);
        let dismissed = dismissed.clone();
        move || {
            let outcome = desktop.wait_for_dismiss(server_id, || {
                if dismissed.send_blocking(id).is_err() {
                    debug!(toast = id, "dashboard gone before dismissal");
                }
            });
            if let Err(err) = outcome {
                debug!(toast = id, error = %err, "stopped listening for toast actions");
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToastUrgency {
    Low,
    Normal,
    Critical,
}

fn urgency(level: &Level) -> ToastUrgency {
    match level.style() {
        Level::Critical | Level::Error => ToastUrgency::Critical,
        Level::Warning => ToastUrgency::Normal,
        Level::Info | Level::Other(_) => ToastUrgency::Low,
    }
}

fn summary(alert: &Alert) -> String {
    format!("{} – {}", alert.level.as_str().to_ascii_uppercase(), alert.source)
}

fn body(alert: &Alert) -> String {
    match alert.llm_summary.as_deref() {
        Some(extra) if !extra.is_empty() => format!("{}\n{extra}", alert.message),
        _ => alert.message.clone(),
    }
}
