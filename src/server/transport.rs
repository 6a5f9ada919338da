use crate::server::connection::Connection;
use crate::server::server::RingMasterServer;
use crate::server::shutdown::ServerShutdownSignal;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

/// Largest packet accepted from or sent to a client.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub fn packet_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .little_endian()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

struct TcpConnection {
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Bytes>,
    closed: CancellationToken,
}

impl Connection for TcpConnection {
    fn remote_identity(&self) -> String {
        self.remote.to_string()
    }

    fn send(&self, packet: Bytes) {
        let _ = self.outbound.send(packet);
    }

    fn disconnect(&self) {
        self.closed.cancel();
    }
}

/// Accepts connections until `shutdown` fires, then disconnects every client.
pub async fn serve_tcp(
    logger: slog::Logger,
    listener: TcpListener,
    server: Arc<RingMasterServer>,
    mut shutdown: ServerShutdownSignal,
) {
    match listener.local_addr() {
        Ok(addr) => slog::info!(logger, "Listening on '{}'", addr),
        Err(e) => slog::warn!(logger, "Listening on unknown address: {}", e),
    }

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let _ = stream.set_nodelay(true);
                    connections.spawn(handle_connection(logger.clone(), server.clone(), stream, remote));
                }
                Err(e) => slog::warn!(logger, "Accept failed: {}", e),
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    slog::error!(logger, "Connection task failed: {}", e);
                }
            }
        }
    }

    slog::info!(logger, "Shutting down listener");
    server.close().await;
    while connections.join_next().await.is_some() {}
}

async fn handle_connection(logger: slog::Logger, server: Arc<RingMasterServer>, stream: TcpStream, remote: SocketAddr) {
    let (mut sink, mut frames) = Framed::new(stream, packet_codec()).split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    let closed = CancellationToken::new();

    let connection = Arc::new(TcpConnection {
        remote,
        outbound,
        closed: closed.clone(),
    });
    let session = server.on_new_connection(connection);

    let writer_closed = closed.clone();
    let writer = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if sink.send(packet).await.is_err() {
                break;
            }
        }
        writer_closed.cancel();
    });

    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            frame = frames.next() => match frame {
                Some(Ok(frame)) => {
                    let server = server.clone();
                    let session = session.clone();
                    in_flight.spawn(async move { server.dispatch(session, frame.freeze()).await });
                }
                Some(Err(e)) => {
                    slog::warn!(logger, "Read from '{}' failed: {}", remote, e);
                    break;
                }
                None => break,
            },
            Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = finished {
                    slog::error!(logger, "Dispatch for '{}' failed: {}", remote, e);
                }
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    server.on_connection_lost(session.id()).await;

    // Dropping the last session handle closes the outbound channel, which ends the writer.
    drop(session);
    if time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        slog::debug!(logger, "Gave up flushing responses to '{}'", remote);
    }
}
