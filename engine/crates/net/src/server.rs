use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::handler::{handle_connection, ConnectionContext, Dispatcher};
use crate::limiter::{ConnectionLimiter, RateLimitRejection};
use crate::line::encode;
use crate::protocol::ServerMessage;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept connections, one task each, until the shutdown signal fires.
/// Then stop accepting and wait for every connection task to finish.
pub async fn serve<D: Dispatcher>(
    listener: TcpListener,
    ctx: ConnectionContext<D>,
    limiter: Arc<ConnectionLimiter>,
) {
    let mut shutdown = ctx.shutdown.clone();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "connection task failed");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => match limiter.try_admit(peer_addr.ip()) {
                    Ok(permit) => {
                        let ctx = ctx.clone();
                        connections.spawn(async move {
                            let _permit = permit;
                            handle_connection(stream, peer_addr, ctx).await;
                        });
                    }
                    Err(rejection) => {
                        connections.spawn(reject(stream, peer_addr, rejection));
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    tracing::info!(in_flight = connections.len(), "listener stopped, draining connections");
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "connection task failed");
        }
    }
    tracing::info!("all connections closed");
}

async fn reject(mut stream: TcpStream, peer_addr: SocketAddr, rejection: RateLimitRejection) {
    tracing::warn!(%peer_addr, reason = %rejection, "connection rejected");
    let mut line = encode(&ServerMessage::error(&rejection));
    line.push('\n');
    let _ = stream.write_all(line.as_bytes()).await;
    let _ = stream.shutdown().await;
}
