//! Self-expiring notifications.
//!
//! Each toast walks `Visible -> Leaving -> removed`. Timers are plain
//! deadlines stored on the entries, so dropping an entry cancels its timer and
//! the owner only has to sleep until [`ToastQueue::next_deadline`] and call
//! [`ToastQueue::tick`].

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::types::Alert;

pub const DEFAULT_TOAST_CAP: usize = 5;
pub const DEFAULT_DISPLAY: Duration = Duration::from_secs(10);
pub const DEFAULT_EXIT: Duration = Duration::from_millis(450);

pub type ToastId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToastSettings {
    pub cap: usize,
    pub display: Duration,
    pub exit: Duration,
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            cap: DEFAULT_TOAST_CAP,
            display: DEFAULT_DISPLAY,
            exit: DEFAULT_EXIT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastPhase {
    Visible { until: Instant },
    Leaving { remove_at: Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastEvent {
    Shown(ToastId),
    Hiding(ToastId),
    Removed(ToastId),
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub id: ToastId,
    pub alert: Alert,
    pub phase: ToastPhase,
}

impl Toast {
    pub const fn is_visible(&self) -> bool {
        matches!(self.phase, ToastPhase::Visible { .. })
    }

    const fn deadline(&self) -> Instant {
        match self.phase {
            ToastPhase::Visible { until } => until,
            ToastPhase::Leaving { remove_at } => remove_at,
        }
    }
}

/// Newest-first queue of toasts.
#[derive(Debug)]
pub struct ToastQueue {
    settings: ToastSettings,
    entries: VecDeque<Toast>,
    next_id: ToastId,
}

impl ToastQueue {
    pub fn new(settings: ToastSettings) -> Self {
        Self {
            settings: ToastSettings {
                cap: settings.cap.max(1),
                ..settings
            },
            entries: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Show a toast for `alert`. Entries beyond the cap are removed
    /// immediately, oldest first.
    pub fn enqueue(&mut self, alert: Alert, now: Instant) -> (ToastId, Vec<ToastEvent>) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_front(Toast {
            id,
            alert,
            phase: ToastPhase::Visible {
                until: now + self.settings.display,
            },
        });

        let mut events = vec![ToastEvent::Shown(id)];
        while self.entries.len() > self.settings.cap {
            if let Some(evicted) = self.entries.pop_back() {
                events.push(ToastEvent::Removed(evicted.id));
            }
        }
        (id, events)
    }

    /// Start hiding a visible toast. Unknown ids and toasts already leaving
    /// are left untouched.
    pub fn dismiss(&mut self, id: ToastId, now: Instant) -> Option<ToastEvent> {
        let exit = self.settings.exit;
        let toast = self.entries.iter_mut().find(|t| t.id == id)?;
        match toast.phase {
            ToastPhase::Visible { .. } => {
                toast.phase = ToastPhase::Leaving {
                    remove_at: now + exit,
                };
                Some(ToastEvent::Hiding(id))
            }
            ToastPhase::Leaving { .. } => None,
        }
    }

    /// Fire every timer due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<ToastEvent> {
        let exit = self.settings.exit;
        let mut events = Vec::new();
        for toast in &mut self.entries {
            if let ToastPhase::Visible { until } = toast.phase {
                if until <= now {
                    toast.phase = ToastPhase::Leaving {
                        remove_at: until + exit,
                    };
                    events.push(ToastEvent::Hiding(toast.id));
                }
            }
        }
        self.entries.retain(|toast| match toast.phase {
            ToastPhase::Leaving { remove_at } if remove_at <= now => {
                events.push(ToastEvent::Removed(toast.id));
                false
            }
            _ => true,
        });
        events
    }

    /// Earliest pending timer, if any toast is alive.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(Toast::deadline).min()
    }

    /// Drop every toast and its timer.
    pub fn clear(&mut self) -> Vec<ToastEvent> {
        self.entries
            .drain(..)
            .map(|toast| ToastEvent::Removed(toast.id))
            .collect()
    }

    pub fn get(&self, id: ToastId) -> Option<&Toast> {
        self.entries.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(ToastSettings::default())
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
