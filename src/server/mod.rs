//! WebSocket bridge between the command channel and frontend clients.
//!
//! Plain `tokio-tungstenite` server on the root path; the frontend connects
//! to `ws://<host>:<port>`.

pub mod ws;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::command::CommandChannel;
use crate::error::Result;

pub use ws::parse_command;

/// Bind the bridge's listening socket
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "WebSocket bridge listening");
    Ok(listener)
}

/// Accept clients until `shutdown` fires, then wait for every session to end
pub async fn serve(listener: TcpListener, channel: CommandChannel, shutdown: CancellationToken) {
    let sessions = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        sessions.spawn(ws::handle_client(
                            stream,
                            peer,
                            channel.clone(),
                            shutdown.child_token(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                }
            }
        }
    }

    sessions.close();
    info!(sessions = sessions.len(), "WebSocket bridge stopping");
    sessions.wait().await;
    info!("WebSocket bridge stopped");
}
