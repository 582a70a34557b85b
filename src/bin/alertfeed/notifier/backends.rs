use std::path::PathBuf;
use std::time::Duration;

use alertfeed::Result;

use super::ToastUrgency;

pub(super) struct ToastParams {
    pub summary: String,
    pub body: String,
    pub urgency: ToastUrgency,
    pub timeout: Duration,
    pub appname: String,
    pub icon: Option<PathBuf>,
}

/// The desktop notification server, seen from the notifier task.
///
/// `show` and `close` are short blocking calls; `wait_for_dismiss` blocks
/// until the notification with the given server id is acted on or closed.
pub(super) trait Desktop: Send + Sync + 'static {
    type Toast: Send + 'static;

    fn is_supported(&self) -> bool;

    fn show(&self, params: &ToastParams) -> Result<Self::Toast>;

    fn server_id(toast: &Self::Toast) -> u32;

    fn close(&self, toast: Self::Toast);

    fn wait_for_dismiss(&self, server_id: u32, on_dismiss: impl FnOnce()) -> Result<()>;
}

#[cfg(target_os = "linux")]
pub(super) use linux::System;

#[cfg(not(target_os = "linux"))]
pub(super) use fallback::System;

#[cfg(target_os = "linux")]
mod linux {
    use alertfeed::Result;
    use alertfeed::error::NotifyError;
    use notify_rust::{
        ActionResponse, Notification, NotificationHandle, Timeout as LibTimeout,
        Urgency as LibUrgency,
    };
    use tracing::trace;

    use super::super::ToastUrgency;
    use super::{Desktop, ToastParams};

    const DISMISS_KEY: &str = "dismiss";
    const DISMISS_LABEL: &str = "Dismiss";

    /// Freedesktop notification server over D-Bus.
    pub struct System;

    impl Desktop for System {
        type Toast = NotificationHandle;

        fn is_supported(&self) -> bool {
            true
        }

        fn show(&self, params: &ToastParams) -> Result<NotificationHandle> {
            let mut builder = Notification::new();
            builder
                .summary(&params.summary)
                .body(&params.body)
                .appname(&params.appname)
                .urgency(map_urgency(params.urgency))
                .timeout(LibTimeout::Milliseconds(
                    u32::try_from(params.timeout.as_millis()).unwrap_or(u32::MAX),
                ))
                .action(DISMISS_KEY, DISMISS_LABEL);

            if let Some(icon_path) = params.icon.as_deref() {
                builder.icon(&icon_path.to_string_lossy());
            }

            builder.show().map_err(|err| {
                trace!(error = %err, "notification server rejected toast");
                NotifyError::Backend.into()
            })
        }

        fn server_id(toast: &NotificationHandle) -> u32 {
            toast.id()
        }

        fn close(&self, toast: NotificationHandle) {
            toast.close();
        }

        fn wait_for_dismiss(&self, server_id: u32, on_dismiss: impl FnOnce()) -> Result<()> {
            notify_rust::handle_action(server_id, |response| {
                trace!(server_id, ?response, "toast action");
                if matches!(response, ActionResponse::Custom(key) if *key == DISMISS_KEY) {
                    on_dismiss();
                }
            })
            .map_err(|err| {
                trace!(error = %err, "lost notification action listener");
                NotifyError::Backend.into()
            })
        }
    }

    const fn map_urgency(urgency: ToastUrgency) -> LibUrgency {
        match urgency {
            ToastUrgency::Low => LibUrgency::Low,
            ToastUrgency::Normal => LibUrgency::Normal,
            ToastUrgency::Critical => LibUrgency::Critical,
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod fallback {
    use std::convert::Infallible;

    use alertfeed::Result;
    use alertfeed::error::NotifyError;

    use super::{Desktop, ToastParams};

    pub struct System;

    impl Desktop for System {
        type Toast = Infallible;

        fn is_supported(&self) -> bool {
            false
        }

        fn show(&self, _params: &ToastParams) -> Result<Infallible> {
            Err(NotifyError::Unsupported.into())
        }

        fn server_id(toast: &Infallible) -> u32 {
            match *toast {}
        }

        fn close(&self, toast: Infallible) {
            match toast {}
        }

        fn wait_for_dismiss(&self, _server_id: u32, _on_dismiss: impl FnOnce()) -> Result<()> {
            Err(NotifyError::Unsupported.into())
        }
    }
}
