//! Per-client WebSocket session.
//!
//! Outbound: the `message` of every `frontend`-targeted command, as a JSON
//! text frame. Inbound: text frames holding `{target, message}`, published
//! on the command channel as-is.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::constants;
use crate::core::command::{Command, CommandChannel, Target};
use crate::error::{AppError, Result};

/// Parse an inbound text frame into a command
pub fn parse_command(text: &str) -> Result<Command> {
    serde_json::from_str(text).map_err(|e| AppError::MalformedCommand(e.to_string()))
}

/// Serve one client until it closes, errors, or `shutdown` fires
pub async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    channel: CommandChannel,
    shutdown: CancellationToken,
) {
    // Subscribe before the handshake so nothing published after accept is missed
    let mut rx = channel.receiver();

    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = %peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    info!(peer = %peer, "WebSocket client connected");

    let (mut sink, mut source) = ws_stream.split();

    let period = constants::ws_heartbeat_interval();
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            command = rx.recv() => {
                match command {
                    Ok(command) if command.target == Target::Frontend => {
                        match serde_json::to_string(&command.message) {
                            Ok(json) => {
                                if sink.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(peer = %peer, error = %e, "Failed to serialize command"),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(peer = %peer, skipped = n, "WS client lagged, skipped commands");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match parse_command(&text) {
                        Ok(command) => {
                            debug!(peer = %peer, target = %command.target, "Command received from client");
                            channel.publish(command.target, command.message);
                        }
                        Err(e) => warn!(peer = %peer, error = %e, "Dropping malformed frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(peer = %peer, error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(peer = %peer, "WebSocket client disconnected");
}
