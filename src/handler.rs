//! WebSocket connection pump
//!
//! Per connection: accept the upgrade, then run the read pump inline while
//! a spawned write pump drains the outbound queue. The read pump enforces
//! the inactivity deadline and frame cap and feeds decoded envelopes into
//! the session; the write pump coalesces queued frames into single writes
//! and keeps the peer alive with periodic pings.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::UserActivity;
use crate::error::AppError;
use crate::envelope::Envelope;
use crate::outbound::{outbound_queue, Outbound};
use crate::server::ServerHandle;
use crate::user::Session;

/// Deadline for any single write or ping
const WRITE_WAIT: Duration = Duration::from_secs(10);
/// Inactivity deadline; any inbound frame (pong included) resets it
const PONG_WAIT: Duration = Duration::from_secs(60);
/// Ping cadence, kept inside the inactivity window
const PING_PERIOD: Duration = Duration::from_secs(54);
/// Inbound frame size cap; oversized frames are a transport error
const MAX_FRAME_SIZE: usize = 10_000;

/// Handle a new TCP connection for its whole lifetime
///
/// Performs the WebSocket handshake, runs both pumps, and executes the
/// disconnect sequence when the read side ends for any reason.
pub async fn handle_connection(
    stream: TcpStream,
    server: ServerHandle,
    activity: mpsc::UnboundedSender<UserActivity>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_SIZE);

    let ws_stream = tokio_tungstenite::accept_async_with_config(stream, Some(config)).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();

    let conn_id = Uuid::new_v4();
    info!(conn = %conn_id, peer = %peer_addr, "connection established");

    let (outbound, outbound_rx) = outbound_queue();
    let mut session = Session::new(conn_id, server, outbound, activity);

    let write_task = tokio::spawn(write_pump(conn_id, ws_sender, outbound_rx));

    read_pump(conn_id, ws_receiver, &mut session).await;

    // Read side is done: unregister, shut the queue down, let the write
    // pump send its Close frame and finish.
    session.disconnect().await;
    let _ = write_task.await;

    info!(conn = %conn_id, "connection closed");
    Ok(())
}

/// Inbound duty: frames → envelopes → session dispatch
///
/// Returns on transport error, clean close, inactivity, or a malformed
/// envelope (decode failures are fatal to the connection).
async fn read_pump(
    conn_id: Uuid,
    mut ws_receiver: SplitStream<WebSocketStream<TcpStream>>,
    session: &mut Session,
) {
    loop {
        let frame = match timeout(PONG_WAIT, ws_receiver.next()).await {
            Err(_) => {
                warn!(conn = %conn_id, "connection idle past liveness deadline");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                match e {
                    WsError::ConnectionClosed | WsError::AlreadyClosed => {
                        debug!(conn = %conn_id, "connection closed");
                    }
                    e => error!(conn = %conn_id, "websocket error: {}", e),
                }
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                let envelope = match Envelope::decode(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(conn = %conn_id, "malformed envelope, closing: {}", e);
                        break;
                    }
                };
                if let Err(e) = session.handle_envelope(envelope).await {
                    error!(conn = %conn_id, "dispatch failed: {}", e);
                    break;
                }
            }
            Message::Close(_) => {
                debug!(conn = %conn_id, "close frame received");
                break;
            }
            // Pings are answered by tungstenite; any frame resets the
            // deadline by reaching the next loop iteration.
            Message::Ping(_) | Message::Pong(_) => {}
            _ => {}
        }
    }
}

/// Outbound duty: queue → coalesced writes, plus keepalive pings
async fn write_pump(
    conn_id: Uuid,
    mut ws_sender: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) {
    let mut ticker = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    'pump: loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(Outbound::Frame(text)) => {
                    // Coalesce everything queued at this instant into one
                    // newline-joined write.
                    let mut payload = text;
                    let mut shutdown = false;
                    loop {
                        match rx.try_recv() {
                            Ok(Outbound::Frame(next)) => {
                                payload.push('\n');
                                payload.push_str(&next);
                            }
                            Ok(Outbound::Shutdown) => {
                                shutdown = true;
                                break;
                            }
                            Err(_) => break,
                        }
                    }

                    if !write_bounded(conn_id, &mut ws_sender, Message::Text(payload.into())).await {
                        break 'pump;
                    }
                    if shutdown {
                        send_close(conn_id, &mut ws_sender).await;
                        break 'pump;
                    }
                }
                // The session closed the queue: final Close frame, done.
                Some(Outbound::Shutdown) | None => {
                    send_close(conn_id, &mut ws_sender).await;
                    break 'pump;
                }
            },
            _ = ticker.tick() => {
                if !write_bounded(conn_id, &mut ws_sender, Message::Ping(Vec::new())).await {
                    break 'pump;
                }
            }
        }
    }

    let _ = ws_sender.close().await;
    debug!(conn = %conn_id, "write pump ended");
}

/// Perform one write under the per-operation deadline; false on failure
async fn write_bounded(
    conn_id: Uuid,
    ws_sender: &mut SplitSink<WebSocketStream<TcpStream>, Message>,
    message: Message,
) -> bool {
    match timeout(WRITE_WAIT, ws_sender.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(conn = %conn_id, "write failed: {}", e);
            false
        }
        Err(_) => {
            warn!(conn = %conn_id, "write deadline exceeded");
            false
        }
    }
}

async fn send_close(
    conn_id: Uuid,
    ws_sender: &mut SplitSink<WebSocketStream<TcpStream>, Message>,
) {
    if timeout(WRITE_WAIT, ws_sender.send(Message::Close(None)))
        .await
        .is_err()
    {
        warn!(conn = %conn_id, "close frame write deadline exceeded");
    }
}
