//! Connection handler
//!
//! Drives one client connection: registration, the read loop with idle
//! supervision, the writer task draining the outbound queue, and teardown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{ChatCodec, Inbound};
use crate::error::ChatError;
use crate::message::ServerMessage;
use crate::server::ServerContext;
use crate::session::{CloseReason, Session, SessionHandle};

/// Deadline used when `now + idle_timeout` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// When a session that is active now becomes idle
fn idle_deadline(idle_timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(idle_timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Handle a new TCP connection
pub async fn handle_connection(stream: TcpStream, ctx: ServerContext) -> CloseReason {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (reader, writer) = stream.into_split();
    run_session(reader, writer, peer_addr, ctx).await
}

/// Run a session over any byte stream until it goes offline
///
/// The identity starts as `peer_addr`. Returns why the session ended.
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    peer_addr: String,
    ctx: ServerContext,
) -> CloseReason
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let config = Arc::clone(&ctx.config);
    let codec = ChatCodec::new(config.max_line_length);
    let mut lines = FramedRead::new(reader, codec.clone());
    let sink = FramedWrite::new(writer, codec);

    let (handle, outbound_rx) = SessionHandle::new(peer_addr, config.outbound_capacity);
    let handle = Arc::new(handle);
    let mut write_task = tokio::spawn(write_outbound(sink, outbound_rx, handle.shutdown_token()));

    let mut session = Session::new(Arc::clone(&handle), ctx.registry.clone(), ctx.delivery.clone());

    let reason = match session.go_online().await {
        Ok(()) => {
            let reason = supervise(&mut session, &mut lines, &ctx).await;
            session.go_offline(reason).await;
            reason
        }
        Err(e) => {
            warn!("Session {} could not come online: {}", handle.id(), e);
            session.reply(e.into());
            handle.kick();
            CloseReason::Refused
        }
    };

    // Give the writer a bounded window to flush queued lines (e.g. the farewell)
    if time::timeout(config.shutdown_grace, &mut write_task)
        .await
        .is_err()
    {
        debug!("Writer for session {} did not drain in time", handle.id());
        write_task.abort();
    }

    reason
}

/// Read lines and dispatch them until EOF, error, kick, or idle timeout
///
/// Readiness is checked in order: kick, input, then the idle timer, so a
/// line that arrives together with the deadline still counts as activity.
async fn supervise<R>(
    session: &mut Session,
    lines: &mut FramedRead<R, ChatCodec>,
    ctx: &ServerContext,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    let idle_timeout = ctx.config.idle_timeout;
    let shutdown = session.handle().shutdown_token();
    let idle = time::sleep_until(idle_deadline(idle_timeout));
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("Session {} kicked", session.id());
                return CloseReason::Kicked;
            }

            frame = lines.next() => match frame {
                Some(Ok(Inbound::Line(line))) => {
                    idle.as_mut().reset(idle_deadline(idle_timeout));
                    ctx.dispatcher.dispatch(session, &line).await;
                }
                Some(Ok(Inbound::TooLong)) => {
                    debug!("Session {} sent an oversized line", session.id());
                    session.reply(ServerMessage::LineTooLong {
                        max: lines.decoder().max_length(),
                    });
                }
                Some(Ok(Inbound::InvalidUtf8)) => {
                    debug!("Session {} sent invalid UTF-8", session.id());
                    session.reply(ServerMessage::InvalidEncoding);
                }
                Some(Err(e)) => {
                    let e = ChatError::from(e);
                    warn!("Read error for session {}: {}", session.id(), e);
                    return CloseReason::ReadError;
                }
                None => {
                    debug!("Session {} closed by peer", session.id());
                    return CloseReason::Eof;
                }
            },

            _ = &mut idle => {
                info!("Session {} ('{}') idle, kicking", session.id(), session.identity());
                return CloseReason::IdleTimeout;
            }
        }
    }
}

/// Drain the outbound queue to the transport, in order
///
/// On shutdown the queue is closed and whatever is already in it is still
/// written before the write half is shut down.
async fn write_outbound<W>(
    mut sink: FramedWrite<W, ChatCodec>,
    mut outbound: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(line) => {
                    if let Err(e) = sink.send(line).await {
                        debug!("Write failed, ending writer: {}", e);
                        shutdown.cancel();
                        return;
                    }
                }
                None => break,
            },
            _ = shutdown.cancelled() => {
                outbound.close();
                while let Some(line) = outbound.recv().await {
                    if sink.send(line).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
    debug!("Writer ended");
}
