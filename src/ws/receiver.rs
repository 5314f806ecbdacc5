//! Socket owner for one session.
//!
//! The receiver reads frames from the client, forwards text to the
//! preparer's inbox and writes back replies and pushes. It also supervises
//! the preparer and ticker tasks: when the socket ends, for whatever reason,
//! it cancels both, closes the socket and waits for them to exit.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::messages::{Inbound, Outbound};
use super::preparer::Preparer;
use super::session::Session;
use super::ticker::run_ticker;
use crate::app_state::AppState;
use crate::domain::SessionId;
use crate::error::is_peer_closing;

/// Why a session ended.
#[derive(Debug, thiserror::Error)]
enum Exit {
    #[error("peer closed")]
    PeerClosed,
    #[error("read failed: {0}")]
    ReadError(String),
    #[error("read timed out")]
    ReadTimeout,
    #[error("client stopped answering pings")]
    ClientTimeout,
    #[error("peer connection closing")]
    PeerClosing,
    #[error("write timed out")]
    WriteTimeout,
    #[error("preparer stopped")]
    PreparerGone,
    #[error("server shutdown")]
    Shutdown,
}

/// Outcome of one socket read.
enum Frame {
    Text(String),
    Skip,
    End(Exit),
}

/// Sink half of the socket plus the session's channel ends.
struct Link {
    session: SessionId,
    sink: SplitSink<WebSocket, Message>,
    write_timeout: Option<Duration>,
    inbox: mpsc::Sender<Inbound>,
    outbound: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
}

/// Runs one session until its socket closes, then tears down the
/// preparer and ticker.
///
/// Any frame from the client counts as a sign of life. The read deadline
/// runs from the last frame received, and a pinged client that stays
/// silent for longer than the client timeout is dropped.
pub async fn run_receiver(socket: WebSocket, session: Session, state: AppState) {
    let _connection = state.connections.acquire();
    let id = session.id();
    let peer: SocketAddr = session.peer();
    let settings = state.settings;
    let cancel = state.shutdown.child_token();
    tracing::debug!(session = %id, %peer, "spawn receiver");

    let (inbox_tx, inbox_rx) = mpsc::channel(settings.queue_capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(settings.queue_capacity);

    let preparer = tokio::spawn(Preparer::new(session, state.registry).run(
        inbox_rx,
        outbound_tx,
        cancel.child_token(),
    ));
    let ticker = tokio::spawn(run_ticker(
        id,
        settings.tick_interval,
        inbox_tx.clone(),
        cancel.child_token(),
    ));

    let (sink, mut stream) = socket.split();
    let mut link = Link {
        session: id,
        sink,
        write_timeout: settings.write_timeout,
        inbox: inbox_tx,
        outbound: outbound_rx,
        cancel: cancel.clone(),
    };

    let mut last_seen = Instant::now();
    let mut ping = settings.ping_interval.map(|period| {
        let mut interval = tokio::time::interval_at(last_seen + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let exit = loop {
        let read_deadline = settings.read_timeout.map(|limit| last_seen + limit);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Exit::Shutdown,
            frame = read_frame(&mut stream, read_deadline) => {
                last_seen = Instant::now();
                match frame {
                    Frame::Text(text) => {
                        if let Err(exit) = link.exchange(text).await {
                            break exit;
                        }
                    }
                    Frame::Skip => {}
                    Frame::End(exit) => break exit,
                }
            }
            outbound = link.outbound.recv() => match outbound {
                Some(outbound) => {
                    if let Err(exit) = link.write(outbound.text()).await {
                        break exit;
                    }
                }
                None => break Exit::PreparerGone,
            },
            () = next_ping(&mut ping) => {
                if settings
                    .client_timeout
                    .is_some_and(|limit| last_seen.elapsed() >= limit)
                {
                    break Exit::ClientTimeout;
                }
                if let Err(exit) = link.ping().await {
                    break exit;
                }
            }
        }
    };

    tracing::debug!(session = %id, %peer, reason = %exit, "close receiver");

    cancel.cancel();
    let Link {
        mut sink,
        inbox,
        outbound,
        write_timeout,
        ..
    } = link;
    drop(inbox);
    drop(outbound);
    let closed = match write_timeout {
        Some(limit) => tokio::time::timeout(limit, sink.close())
            .await
            .unwrap_or(Ok(())),
        None => sink.close().await,
    };
    if let Err(e) = closed {
        tracing::debug!(session = %id, error = %e, "socket close failed");
    }
    drop(stream);

    for (task, handle) in [("preparer", preparer), ("ticker", ticker)] {
        if let Err(e) = handle.await {
            tracing::warn!(session = %id, task, error = %e, "session task failed");
        }
    }

    tracing::info!(session = %id, %peer, reason = %exit, "session closed");
}

async fn read_frame(stream: &mut SplitStream<WebSocket>, deadline: Option<Instant>) -> Frame {
    let next = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => return Frame::End(Exit::ReadTimeout),
        },
        None => stream.next().await,
    };
    match next {
        Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_owned()),
        Some(Ok(Message::Close(_))) | None => Frame::End(Exit::PeerClosed),
        Some(Ok(_)) => Frame::Skip,
        Some(Err(e)) => Frame::End(Exit::ReadError(e.to_string())),
    }
}

impl Link {
    /// Hands one client frame to the preparer and writes everything it
    /// produces up to and including the reply. Pushes arriving meanwhile
    /// are written in order.
    async fn exchange(&mut self, text: String) -> Result<(), Exit> {
        {
            let send = self.inbox.send(Inbound::Text(text));
            tokio::pin!(send);
            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(Exit::Shutdown),
                    sent = &mut send => {
                        sent.map_err(|_| Exit::PreparerGone)?;
                        break;
                    }
                    outbound = self.outbound.recv() => {
                        let outbound = outbound.ok_or(Exit::PreparerGone)?;
                        write_frame(&mut self.sink, self.write_timeout, self.session, outbound.text())
                            .await?;
                    }
                }
            }
        }

        loop {
            let outbound = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Exit::Shutdown),
                outbound = self.outbound.recv() => outbound.ok_or(Exit::PreparerGone)?,
            };
            self.write(outbound.text()).await?;
            if let Outbound::Reply(_) = outbound {
                return Ok(());
            }
        }
    }

    async fn write(&mut self, text: &str) -> Result<(), Exit> {
        write_frame(&mut self.sink, self.write_timeout, self.session, text).await
    }

    async fn ping(&mut self) -> Result<(), Exit> {
        let ping = Message::Ping(axum::body::Bytes::new());
        send_frame(&mut self.sink, self.write_timeout, self.session, ping)
            .await
            .map(drop)
    }
}

/// Resolves on the next ping tick, or never when pings are disabled.
async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Writes one text frame. Empty text means nothing to send.
async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    timeout: Option<Duration>,
    session: SessionId,
    text: &str,
) -> Result<(), Exit> {
    if text.is_empty() {
        return Ok(());
    }
    if send_frame(sink, timeout, session, Message::text(text.to_owned())).await? {
        tracing::debug!(session = %session, frame = text, "sent");
    }
    Ok(())
}

/// Sends one frame and reports whether it went out. Failures other than
/// the peer closing are logged and the frame is dropped.
async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    timeout: Option<Duration>,
    session: SessionId,
    message: Message,
) -> Result<bool, Exit> {
    let send = sink.send(message);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, send).await {
            Ok(result) => result,
            Err(_) => return Err(Exit::WriteTimeout),
        },
        None => send.await,
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if is_peer_closing(&e) => Err(Exit::PeerClosing),
        Err(e) => {
            tracing::warn!(session = %session, error = %e, "frame not sent");
            Ok(false)
        }
    }
}
