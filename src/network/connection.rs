//! A single accepted follower connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{AppError, Result};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Write side of a follower's TCP stream plus its lifecycle state.
///
/// The read half is handed to the connection handler; this value is what
/// the registry stores and the dispatcher writes to. Writes are serialized
/// by an async mutex so concurrent frames never interleave on the wire.
#[derive(Debug)]
pub struct FollowerConnection {
    id: u64,
    peer: SocketAddr,
    writer: Mutex<Option<OwnedWriteHalf>>,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl FollowerConnection {
    /// Split an accepted stream into a registrable connection and the read
    /// half for its handler.
    ///
    /// The connection's cancellation token is a child of `parent`, so
    /// cancelling the parent stops every connection handler.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Network` if the peer address cannot be read,
    /// which happens when the peer already hung up.
    pub fn from_stream(
        stream: TcpStream,
        parent: &CancellationToken,
    ) -> Result<(Arc<Self>, OwnedReadHalf)> {
        let peer = stream
            .peer_addr()
            .map_err(|err| AppError::Network(format!("peer address unavailable: {err}")))?;
        // Commands are tiny; do not let Nagle hold them back.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, %err, "failed to disable nagle");
        }

        let (reader, writer) = stream.into_split();
        let connection = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
            cancel: parent.child_token(),
        });
        Ok((connection, reader))
    }

    /// Process-unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address of the follower.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Token cancelled when this connection is closed or the server stops.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Write one complete frame and flush it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the connection is closed or the write or
    /// flush fails.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(AppError::Io(format!("connection to {} is closed", self.peer)));
        }

        let mut guard = self.writer.lock().await;
        // close() may have run while this call waited for the lock.
        if self.is_closed() {
            guard.take();
            return Err(AppError::Io(format!("connection to {} is closed", self.peer)));
        }
        let Some(writer) = guard.as_mut() else {
            return Err(AppError::Io(format!("connection to {} is closed", self.peer)));
        };

        let result = async {
            writer.write_all(frame).await?;
            writer.flush().await
        }
        .await
        .map_err(|err| AppError::Io(format!("write to {} failed: {err}", self.peer)));

        // close() ran while this write held the lock.
        if self.is_closed() {
            guard.take();
        }
        result
    }

    /// Close the connection.
    ///
    /// Idempotent: returns `true` only for the call that actually closed it.
    /// Cancels the handler's token and shuts down the write side; the read
    /// side closes when the handler drops it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();
        if let Ok(mut writer) = self.writer.try_lock() {
            // Dropping the write half sends FIN.
            writer.take();
        }
        true
    }
}
