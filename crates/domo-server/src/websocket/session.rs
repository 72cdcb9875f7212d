//! WebSocket subscriber lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastError;
use super::heartbeat::{Liveness, watch_liveness};
use super::subscriber::{Frame, Subscriber};
use crate::config::ServerConfig;
use crate::gas::GasMonitor;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Per-connection timing and buffering.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Outbound queue depth.
    pub send_buffer: usize,
    /// Socket write timeout.
    pub send_timeout: Duration,
    /// Ping interval.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before closing.
    pub heartbeat_timeout: Duration,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(c: &ServerConfig) -> Self {
        Self {
            send_buffer: c.send_buffer.max(1),
            send_timeout: c.send_timeout(),
            heartbeat_interval: c.heartbeat_interval(),
            heartbeat_timeout: c.heartbeat_timeout(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Close frame or end of stream from the client.
    ClientClosed,
    /// Transport error while reading.
    ReadError,
    /// Transport error while writing.
    WriteFailed,
    /// A write did not finish within the send timeout.
    WriteTimeout,
    /// Removed by the broadcaster for a full or closed queue.
    Evicted,
    /// No inbound traffic within the heartbeat timeout.
    HeartbeatTimeout,
    /// The server is shutting down.
    Shutdown,
}

impl DisconnectReason {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::ReadError => "read_error",
            Self::WriteFailed => "write_failed",
            Self::WriteTimeout => "write_timeout",
            Self::Evicted => "evicted",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Whether an inbound text frame is an application-level ping.
///
/// Accepts `ping` in any case with surrounding whitespace, or a JSON object
/// whose `type` is `"ping"`.
pub fn is_ping(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|v| v.get("type")?.as_str().map(|t| t.eq_ignore_ascii_case("ping")))
        .unwrap_or(false)
}

/// Run one live subscriber.
///
/// 1. Registers through [`GasMonitor::attach`], which queues the current value
/// 2. Forwards queued frames and periodic pings to the socket
/// 3. Answers application pings with `pong`; nothing else inbound is used
/// 4. Ends on close, error, eviction, heartbeat timeout, or shutdown
/// 5. Unsubscribes
#[instrument(skip_all, fields(subscriber_id = tracing::field::Empty))]
pub async fn run_subscriber_session(
    mut socket: WebSocket,
    monitor: Arc<GasMonitor>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (tx, rx) = mpsc::channel::<Frame>(config.send_buffer);
    let subscriber = match monitor.attach(tx) {
        Ok(s) => s,
        Err(e) => {
            reject(&mut socket, &e, config.send_timeout).await;
            return;
        }
    };
    let subscriber_id = subscriber.id.clone();
    let _ = tracing::Span::current().record("subscriber_id", subscriber_id.as_str());

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(subscribers = monitor.broadcaster().count(), "subscriber connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        sink,
        rx,
        WriterControl {
            evicted: subscriber.eviction_token(),
            shutdown,
            send_timeout: config.send_timeout,
            ping_interval: config.heartbeat_interval,
        },
    ));
    let mut reader = tokio::spawn(read_loop(stream, subscriber.clone()));
    let heartbeat_cancel = CancellationToken::new();
    let mut heartbeat = tokio::spawn(watch_liveness(
        subscriber.clone(),
        config.heartbeat_interval,
        config.heartbeat_timeout,
        heartbeat_cancel.clone(),
    ));

    let reason = tokio::select! {
        r = &mut writer => r.unwrap_or(DisconnectReason::WriteFailed),
        r = &mut reader => r.unwrap_or(DisconnectReason::ReadError),
        r = &mut heartbeat => match r {
            Ok(Liveness::Lost { silent_for }) => {
                warn!(silent_ms = u64::try_from(silent_for.as_millis()).unwrap_or(u64::MAX), "subscriber went silent");
                DisconnectReason::HeartbeatTimeout
            }
            _ => DisconnectReason::ReadError,
        },
    };

    heartbeat_cancel.cancel();
    writer.abort();
    reader.abort();
    heartbeat.abort();

    let removed = monitor.detach(&subscriber_id);
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    info!(
        reason = reason.as_str(),
        removed,
        age_ms = u64::try_from(subscriber.age().as_millis()).unwrap_or(u64::MAX),
        subscribers = monitor.broadcaster().count(),
        "subscriber disconnected"
    );
}

async fn reject(socket: &mut WebSocket, err: &BroadcastError, send_timeout: Duration) {
    warn!(error = %err, "closing new subscriber");
    let frame = CloseFrame {
        code: close_code::AGAIN,
        reason: Utf8Bytes::from(err.to_string()),
    };
    let _ = time::timeout(send_timeout, socket.send(Message::Close(Some(frame)))).await;
}

struct WriterControl {
    evicted: CancellationToken,
    shutdown: CancellationToken,
    send_timeout: Duration,
    ping_interval: Duration,
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Frame>,
    ctl: WriterControl,
) -> DisconnectReason {
    let mut ping = time::interval(ctl.ping_interval);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        let message = tokio::select! {
            biased;
            () = ctl.shutdown.cancelled() => {
                close(&mut sink, close_code::AWAY, "server shutting down", ctl.send_timeout).await;
                return DisconnectReason::Shutdown;
            }
            () = ctl.evicted.cancelled() => {
                close(&mut sink, close_code::POLICY, "subscriber too slow", ctl.send_timeout).await;
                return DisconnectReason::Evicted;
            }
            frame = rx.recv() => match frame {
                Some(frame) => Message::Text(frame),
                None => return DisconnectReason::Evicted,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match time::timeout(ctl.send_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "socket write failed");
                return DisconnectReason::WriteFailed;
            }
            Err(_) => {
                warn!(timeout_ms = u64::try_from(ctl.send_timeout.as_millis()).unwrap_or(u64::MAX), "socket write timed out");
                return DisconnectReason::WriteTimeout;
            }
        }
    }
}

async fn close(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str, send_timeout: Duration) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    let _ = time::timeout(send_timeout, sink.send(Message::Close(Some(frame)))).await;
}

async fn read_loop(mut stream: SplitStream<WebSocket>, subscriber: Arc<Subscriber>) -> DisconnectReason {
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "socket read failed");
                return DisconnectReason::ReadError;
            }
        };
        subscriber.mark_alive();
        match msg {
            Message::Text(text) => {
                if is_ping(text.as_str()) {
                    if let Err(reason) = subscriber.try_send(Frame::from_static("pong")) {
                        debug!(reason = reason.as_str(), "pong not queued");
                    }
                }
            }
            Message::Close(_) => return DisconnectReason::ClientClosed,
            // Transport pings are answered by the WebSocket layer
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    DisconnectReason::ClientClosed
}
