//! TCP command server.
//!
//! Followers connect here, receive broadcast commands, and may report back.
//! Each accepted connection is registered in the [`FollowerRegistry`] and
//! served by its own task that decodes inbound reports and forwards them to
//! the [`StatusSink`].
//!
//! ## Protocol
//!
//! Leader → follower (one JSON object per line):
//! ```json
//! {"Type":"COMMAND","Command":"STASH_ITEMS","Data":{"StashMaps":true},"Timestamp":"2025-01-01T12:00:00Z"}
//! ```
//!
//! Follower → leader (one JSON object per line):
//! ```json
//! {"Type":"STATUS","Data":"town, 3 maps left","Timestamp":"2025-01-01T12:00:01Z"}
//! {"Type":"COMMAND_COMPLETE","Data":"STASH_ITEMS"}
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::connection::FollowerConnection;
use super::registry::FollowerRegistry;
use crate::models::follower::FollowerMessage;
use crate::protocol::codec::{self, WireCodec};
use crate::sink::StatusSink;
use crate::{AppError, Result};

/// Pause after a failed accept before trying again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bytes reserved for each socket read.
const READ_CHUNK_BYTES: usize = 4096;

/// Bind the command listener on `addr`.
///
/// # Errors
///
/// Returns `AppError::Network` if the address is in use or not bindable.
pub async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Network(format!("failed to bind command listener on {addr}: {err}")))
}

/// Spawn the accept loop.
///
/// The loop runs until `ct` is cancelled, then drops the listener. Connection
/// handlers watch child tokens of `ct`, so cancelling it also ends them.
#[must_use]
pub fn spawn_command_server(
    listener: TcpListener,
    registry: Arc<FollowerRegistry>,
    sink: Arc<dyn StatusSink>,
    ct: CancellationToken,
) -> JoinHandle<()> {
    let local = listener
        .local_addr()
        .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());

    tokio::spawn(
        accept_loop(listener, registry, sink, ct).instrument(info_span!("command_server", addr = %local)),
    )
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<FollowerRegistry>,
    sink: Arc<dyn StatusSink>,
    ct: CancellationToken,
) {
    info!("command server listening");

    loop {
        tokio::select! {
            () = ct.cancelled() => {
                info!("command server shutting down");
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let (connection, reader) = match FollowerConnection::from_stream(stream, &ct) {
                            Ok(parts) => parts,
                            Err(err) => {
                                warn!(%err, "dropping follower connection");
                                continue;
                            }
                        };
                        registry.add(Arc::clone(&connection));
                        let peer = connection.peer();
                        info!(%peer, followers = registry.len(), "follower connected");

                        tokio::spawn(
                            handle_connection(connection, reader, Arc::clone(&registry), Arc::clone(&sink))
                                .instrument(info_span!("follower", %peer)),
                        );
                    }
                    Err(err) => {
                        warn!(%err, "accept failed");
                        tokio::select! {
                            () = ct.cancelled() => {
                                info!("command server shutting down");
                                break;
                            }
                            () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Unregisters and closes a connection however its handler exits.
struct Registration {
    connection: Arc<FollowerConnection>,
    registry: Arc<FollowerRegistry>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.connection);
        self.connection.close();
        info!(
            peer = %self.connection.peer(),
            followers = self.registry.len(),
            "follower disconnected"
        );
    }
}

/// Serve one follower until EOF, a read error, or cancellation.
async fn handle_connection(
    connection: Arc<FollowerConnection>,
    mut reader: OwnedReadHalf,
    registry: Arc<FollowerRegistry>,
    sink: Arc<dyn StatusSink>,
) {
    let peer = connection.peer();
    let cancel = connection.cancel_token().clone();
    let _registration = Registration {
        connection,
        registry,
    };

    let mut codec = WireCodec::new();
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_BYTES);

    loop {
        drain_lines(&mut codec, &mut buffer, peer, sink.as_ref());

        buffer.reserve(READ_CHUNK_BYTES);
        let read = tokio::select! {
            () = cancel.cancelled() => {
                debug!("connection handler cancelled");
                break;
            }
            read = reader.read_buf(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                // A final report may arrive without its newline.
                match codec.decode_eof(&mut buffer) {
                    Ok(Some(line)) => route_line(&line, peer, sink.as_ref()),
                    Ok(None) => {}
                    Err(err) => debug!(%err, "discarding trailing follower input"),
                }
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "follower read failed");
                break;
            }
        }
    }
}

/// Route every complete line currently buffered.
fn drain_lines(codec: &mut WireCodec, buffer: &mut BytesMut, peer: SocketAddr, sink: &dyn StatusSink) {
    loop {
        match codec.decode(buffer) {
            Ok(Some(line)) => route_line(&line, peer, sink),
            Ok(None) => break,
            Err(err) => warn!(%err, "discarding follower input"),
        }
    }
}

fn route_line(line: &str, peer: SocketAddr, sink: &dyn StatusSink) {
    if line.trim().is_empty() {
        return;
    }
    match codec::decode::<FollowerMessage>(line) {
        Ok(message) => sink.deliver(peer, &message),
        Err(err) => warn!(%err, "ignoring undecodable follower message"),
    }
}
