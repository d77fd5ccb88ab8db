use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use session::{SessionHandle, SessionId, SessionRegistry, SessionWriteRx};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::line::{decode_line, encode, is_blank, FrameError, LineBuffer};
use crate::protocol::{ClientRequest, ServerMessage};
use crate::shutdown::ShutdownRx;

/// How long a closing connection may take to flush its queued output.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A single write taking longer than this ends the session's writer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns decoded requests into responses for the requesting session.
///
/// Called synchronously from the connection's read loop; implementations
/// must not block on network I/O.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, session_id: SessionId, request: ClientRequest) -> ServerMessage;
}

/// Everything a connection task needs besides its stream.
pub struct ConnectionContext<D> {
    pub dispatcher: Arc<D>,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: ShutdownRx,
    pub max_input_length: usize,
}

impl<D> Clone for ConnectionContext<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            registry: Arc::clone(&self.registry),
            shutdown: self.shutdown.clone(),
            max_input_length: self.max_input_length,
        }
    }
}

/// Why a connection's read loop ended.
#[derive(Debug, thiserror::Error)]
pub enum CloseReason {
    #[error("client closed the connection")]
    ClientClosed,

    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("decode failure: {0}")]
    Decode(#[from] FrameError),

    #[error("server is shutting down")]
    ShutdownInProgress,

    #[error("session writer closed")]
    WriterClosed,
}

/// Serve one client until it disconnects, sends an undecodable line, or
/// the server shuts down.
///
/// The session is registered for broadcasts for the lifetime of the call
/// and unregistered before the stream is released.
pub async fn handle_connection<D: Dispatcher>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: ConnectionContext<D>,
) -> CloseReason {
    let session_id = ctx.registry.next_session_id();
    tracing::info!(%session_id, %peer_addr, "new connection");

    let (reader, writer) = stream.into_split();
    let (session, write_rx) = SessionHandle::channel(session_id);
    let writer_task = tokio::spawn(run_writer(writer, write_rx, session_id));

    ctx.registry.register(session.clone());
    let reason = read_loop(reader, &session, &ctx).await;
    ctx.registry.unregister(session_id);

    // Last sender gone: the writer drains what is queued, then closes.
    drop(session);
    let abort = writer_task.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_task)
        .await
        .is_err()
    {
        tracing::warn!(%session_id, "writer did not drain in time, aborting");
        abort.abort();
    }

    match &reason {
        CloseReason::Read(_) | CloseReason::Decode(_) => {
            tracing::info!(%session_id, reason = %reason, "session ended with error")
        }
        _ => tracing::info!(%session_id, reason = %reason, "session ended"),
    }
    reason
}

async fn read_loop<D: Dispatcher>(
    mut reader: OwnedReadHalf,
    session: &SessionHandle,
    ctx: &ConnectionContext<D>,
) -> CloseReason {
    let mut shutdown = ctx.shutdown.clone();
    let mut lines = LineBuffer::new(ctx.max_input_length);
    let mut buf = [0u8; 4096];

    loop {
        let n = tokio::select! {
            biased;
            _ = shutdown.wait() => return refuse(session),
            read = reader.read(&mut buf) => match read {
                Ok(0) => return CloseReason::ClientClosed,
                Ok(n) => n,
                Err(e) => return CloseReason::Read(e),
            },
        };

        for line in lines.feed(&buf[..n]) {
            if shutdown.is_shutdown() {
                return refuse(session);
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => return CloseReason::Decode(e),
            };
            if is_blank(&line) {
                continue;
            }
            let envelope = match decode_line(&line) {
                Ok(envelope) => envelope,
                Err(e) => return CloseReason::Decode(e),
            };
            tracing::debug!(session_id = %session.id(), kind = %envelope.kind, "request");

            let response = ctx.dispatcher.dispatch(session.id(), envelope.into_request());
            if session.send(encode(&response)).is_err() {
                return CloseReason::WriterClosed;
            }
        }
    }
}

/// Tell the client the server is going away.
fn refuse(session: &SessionHandle) -> CloseReason {
    let reason = CloseReason::ShutdownInProgress;
    let _ = session.send(encode(&ServerMessage::error(&reason)));
    reason
}

/// Sole writer for one connection: sends queued lines in order until every
/// sender is dropped or a write fails or stalls.
async fn run_writer(mut writer: OwnedWriteHalf, mut write_rx: SessionWriteRx, session_id: SessionId) {
    while let Some(mut line) = write_rx.recv().await {
        line.push('\n');
        match tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(%session_id, error = %e, "write failed");
                return;
            }
            Err(_) => {
                tracing::info!(%session_id, "client stopped reading, closing writer");
                return;
            }
        }
    }
    let _ = writer.shutdown().await;
}
