use std::time::Duration;

use async_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, FeedError};
use crate::types::ConnectionState;

use super::event::{FeedEvent, parse_frame};
use super::reconnect::{Reconnect, ReconnectPolicy};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// What the connector pushes to its consumer, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedUpdate {
    State(ConnectionState),
    Event(FeedEvent),
}

/// Reconnecting WebSocket client for the alert feed.
#[derive(Clone, Debug)]
pub struct LiveFeed {
    url: Url,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    keepalive: Duration,
}

/// Handle on a running connector. Dropping it also stops the connector.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Shutdown,
    ConsumerGone,
}

impl LiveFeed {
    pub const fn new(url: Url, policy: ReconnectPolicy) -> Self {
        Self {
            url,
            policy,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive: DEFAULT_KEEPALIVE,
        }
    }

    /// Give up on a handshake that has not completed after `limit`.
    #[must_use]
    pub const fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Ping an open connection every `period` and drop it after two periods
    /// without any inbound frame.
    #[must_use]
    pub const fn with_keepalive(mut self, period: Duration) -> Self {
        self.keepalive = period;
        self
    }

    /// Spawn the connection loop. Updates are delivered on `tx`; the loop
    /// ends on [`FeedHandle::stop`] or once `tx` is closed.
    pub fn start(self, tx: Sender<FeedUpdate>) -> FeedHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut shutdown_rx = shutdown_rx;
            let stop = self.drive(&tx, &mut shutdown_rx).await;
            if stop == Stop::Shutdown {
                let _ = tx.try_send(FeedUpdate::State(ConnectionState::Closed));
            }
            info!(url = %self.url, reason = ?stop, "feed stopped");
        });
        FeedHandle { shutdown, task }
    }

    async fn drive(&self, tx: &Sender<FeedUpdate>, shutdown: &mut watch::Receiver<bool>) -> Stop {
        let mut reconnect = Reconnect::new(self.policy);
        loop {
            if let Err(stop) = self.session(&mut reconnect, tx, shutdown).await {
                return stop;
            }

            let delay = reconnect.on_failure();
            warn!(
                url = %self.url,
                attempt = reconnect.failures(),
                delay_ms = delay.as_millis(),
                "feed closed, scheduling reconnect"
            );
            tokio::select! {
                biased;
                _ = shutdown.changed() => return Stop::Shutdown,
                () = sleep(delay) => {}
            }
        }
    }

    /// One connect attempt and, when it succeeds, the life of that
    /// connection. Returns `Ok` when a reconnect should be scheduled.
    async fn session(
        &self,
        reconnect: &mut Reconnect,
        tx: &Sender<FeedUpdate>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), Stop> {
        if *shutdown.borrow() {
            return Err(Stop::Shutdown);
        }
        emit(tx, FeedUpdate::State(ConnectionState::Connecting), shutdown).await?;

        let attempt = tokio::select! {
            biased;
            _ = shutdown.changed() => return Err(Stop::Shutdown),
            res = timeout(self.connect_timeout, connect_async(self.url.as_str())) => res,
        };
        let attempt = match attempt {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(err)) => Err(Error::from(FeedError::from(err))),
            Err(_elapsed) => Err(Error::from(FeedError::Timeout {
                after: self.connect_timeout,
            })),
        };

        match attempt {
            Ok(socket) => {
                reconnect.on_open();
                info!(url = %self.url, "feed connected");
                emit(tx, FeedUpdate::State(ConnectionState::Open), shutdown).await?;
                let reason = pump(socket, self.keepalive, tx, shutdown).await?;
                warn!(url = %self.url, %reason, "feed disconnected");
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "feed connection failed");
            }
        }

        emit(tx, FeedUpdate::State(ConnectionState::Closed), shutdown).await
    }
}

impl FeedHandle {
    /// Close the connection on purpose. No reconnect is attempted afterwards.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "feed task terminated unexpectedly");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Read frames until the connection ends. `Ok` carries the disconnect reason.
async fn pump(
    mut socket: Socket,
    keepalive: Duration,
    tx: &Sender<FeedUpdate>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Error, Stop> {
    let keepalive = keepalive.max(Duration::from_millis(1));
    let silence_limit = keepalive.saturating_mul(2);
    let mut ping = interval_at(Instant::now() + keepalive, keepalive);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if let Err(err) = socket.close(None).await {
                    debug!(error = %err, "error while closing feed socket");
                }
                return Err(Stop::Shutdown);
            }
            frame = socket.next() => frame,
            _ = ping.tick() => {
                if last_seen.elapsed() >= silence_limit {
                    return Ok(FeedError::Stalled { after: silence_limit }.into());
                }
                if let Err(err) = socket.send(Message::Ping(Vec::new())).await {
                    return Ok(FeedError::from(err).into());
                }
                continue;
            }
        };
        last_seen = Instant::now();

        match frame {
            None => {
                let reason = "stream ended".to_string();
                return Ok(FeedError::Closed { reason }.into());
            }
            Some(Err(err)) => return Ok(FeedError::from(err).into()),
            Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                Ok(FeedEvent::Unknown { kind }) => {
                    debug!(%kind, "ignoring feed event of unknown kind");
                }
                Ok(event) => emit(tx, FeedUpdate::Event(event), shutdown).await?,
                Err(err) => {
                    warn!(error = %err, "discarding malformed feed message");
                }
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "closed by server".to_string(),
                    |f| format!("closed by server ({}): {}", f.code, f.reason),
                );
                return Ok(FeedError::Closed { reason }.into());
            }
            // pings are answered by tungstenite itself, pongs only reset the silence clock
            Some(Ok(_)) => {}
        }
    }
}

async fn emit(
    tx: &Sender<FeedUpdate>,
    update: FeedUpdate,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), Stop> {
    tokio::select! {
        biased;
        _ = shutdown.changed() => Err(Stop::Shutdown),
        res = tx.send(update) => res.map_err(|_| {
            debug!("feed consumer went away, stopping");
            Stop::ConsumerGone
        }),
    }
}
