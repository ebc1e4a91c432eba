//! Per-connection driver: framing, the outbound queue, and keepalive.
//!
//! # How a connection runs (for beginners)
//!
//! Every accepted (and TLS-authenticated) stream gets three tasks:
//!
//! ```text
//!            ┌──────────── reader ─────────────┐
//!  socket ──►│ FramedRead ─► Relay::message_.. │
//!            └─────────────────────────────────┘
//!            ┌──────────── writer ─────────────┐
//!  socket ◄──│ FramedWrite ◄── mpsc::Receiver  │◄── Client::send (any task)
//!            └─────────────────────────────────┘
//!            ┌────────── keepalive ────────────┐
//!            │ idle timer ─► queue ping        │
//!            └─────────────────────────────────┘
//! ```
//!
//! Whichever task stops first decides how the rest stop.  A reader that hits
//! EOF lets the writer flush what is already queued; anything else cancels
//! all three.  Teardown then runs once: the client leaves its channel and is
//! removed from the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relay_core::protocol::{FrameCodec, PING_FRAME};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::application::{Client, Outbound, Relay};
use crate::domain::ConnectionSettings;

/// Keepalive cycles without any I/O progress before the connection is closed.
const MISSED_CYCLES_BEFORE_CLOSE: u32 = 2;

/// Which of the connection's tasks finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Reader,
    Writer,
    Keepalive,
}

/// I/O progress shared by the three tasks.
#[derive(Debug)]
struct Activity {
    last_io: Mutex<Instant>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            last_io: Mutex::new(Instant::now()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        *self.last_io.lock() = Instant::now();
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        *self.last_io.lock() = Instant::now();
    }

    fn last_io(&self) -> Instant {
        *self.last_io.lock()
    }

    fn progress(&self) -> (u64, u64) {
        (
            self.reads.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
        )
    }
}

/// Runs one client connection to completion.
///
/// Registers a client for `peer_ip`, serves it until the peer goes away, a
/// write fails, keepalive gives up, or `shutdown` fires, then tears the client
/// down.  Returns once all of the connection's tasks have stopped.
pub async fn serve_connection<S>(
    stream: S,
    peer_ip: String,
    relay: Arc<Relay>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (tx, rx) = mpsc::channel(settings.send_buffer.max(1));
    let client = relay
        .registry()
        .add_client(peer_ip, tx, shutdown.child_token());
    let activity = Arc::new(Activity::new());

    let codec = FrameCodec::new(settings.message_terminator, settings.max_frame_size);
    let (read_half, write_half) = tokio::io::split(stream);
    let frames = FramedRead::new(read_half, codec.clone());
    let sink = FramedWrite::new(write_half, codec);

    let mut tasks = JoinSet::new();
    {
        let (client, relay, activity) = (client.clone(), relay.clone(), activity.clone());
        tasks.spawn(async move {
            read_loop(frames, client, relay, activity).await;
            Task::Reader
        });
    }
    {
        let (client, relay, activity) = (client.clone(), relay.clone(), activity.clone());
        let write_timeout = settings.write_timeout;
        tasks.spawn(async move {
            write_loop(sink, rx, client, relay, activity, write_timeout).await;
            Task::Writer
        });
    }
    {
        let (client, activity) = (client.clone(), activity.clone());
        let idle = settings.keepalive;
        tasks.spawn(async move {
            keepalive_loop(client, activity, idle).await;
            Task::Keepalive
        });
    }

    if let Some(Ok(Task::Reader)) = tasks.join_next().await {
        client.close_after_flush();
        while let Some(done) = tasks.join_next().await {
            if !matches!(done, Ok(Task::Keepalive)) {
                break;
            }
        }
    }

    client.close();
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}

    relay.registry().remove_client(&client);
    client.mark_closed();
}

// ── Tasks ────────────────────────────────────────────────────────────────────

async fn read_loop<R>(
    mut frames: FramedRead<R, FrameCodec>,
    client: Arc<Client>,
    relay: Arc<Relay>,
    activity: Arc<Activity>,
) where
    R: AsyncRead + Unpin,
{
    let cancel = client.cancellation().clone();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(frame)) => {
                activity.record_read();
                if frame.is_empty() {
                    debug!("Received empty message from client {}", client.id());
                    continue;
                }
                if !client.is_open() {
                    continue;
                }
                trace!(
                    "Data received from client {}: {}",
                    client.id(),
                    String::from_utf8_lossy(&frame)
                );
                relay.message_received(&client, frame.freeze());
            }
            Some(Err(e)) => {
                if !relay.is_stopping() {
                    debug!(
                        "Error receiving message from client {}: {e}. Closing connection.",
                        client.id()
                    );
                }
                break;
            }
            None => {
                debug!("Client {} closed the connection.", client.id());
                break;
            }
        }
    }
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, FrameCodec>,
    mut rx: mpsc::Receiver<Outbound>,
    client: Arc<Client>,
    relay: Arc<Relay>,
    activity: Arc<Activity>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let cancel = client.cancellation().clone();
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = rx.recv() => item,
        };
        let frame = match item {
            Some(Outbound::Frame(frame)) => frame,
            Some(Outbound::Close) | None => break,
        };

        trace!(
            "Data sending to client {}: {}",
            client.id(),
            String::from_utf8_lossy(&frame)
        );
        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => activity.record_write(),
            Ok(Err(e)) => {
                if !relay.is_stopping() {
                    debug!(
                        "Error sending message to client {}: {e}. Closing connection.",
                        client.id()
                    );
                }
                client.close();
                break;
            }
            Err(_) => {
                debug!(
                    "Sending to client {} timed out after {write_timeout:?}. Closing connection.",
                    client.id()
                );
                client.close();
                break;
            }
        }
    }

    rx.close();
    if let Ok(Err(e)) = timeout(write_timeout, sink.close()).await {
        debug!("Error closing connection to client {}: {e}", client.id());
    }
}

async fn keepalive_loop(client: Arc<Client>, activity: Arc<Activity>, idle: Duration) {
    let cancel = client.cancellation().clone();
    let mut last_tick = Instant::now();
    let mut ping_mark: Option<(u64, u64)> = None;
    let mut missed = 0u32;

    loop {
        // An idle period past the end of the clock never expires.
        let Some(deadline) = activity.last_io().max(last_tick).checked_add(idle) else {
            cancel.cancelled().await;
            break;
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => {}
        }
        if activity.last_io().max(last_tick) + idle > Instant::now() {
            continue;
        }

        last_tick = Instant::now();
        let progress = activity.progress();
        if ping_mark == Some(progress) {
            missed += 1;
        } else {
            missed = 0;
        }
        if missed >= MISSED_CYCLES_BEFORE_CLOSE {
            info!(
                "Client {} missed {missed} keepalive cycles. Closing connection.",
                client.id()
            );
            client.close();
            break;
        }

        if !client.send(Bytes::from_static(PING_FRAME)) {
            break;
        }
        ping_mark = Some(progress);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
