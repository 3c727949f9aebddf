//! Thread-safe set of live follower connections.
//!
//! The lock guards only the `Vec`; it is never held across a network call.
//! Fan-out works on a [`snapshot`](FollowerRegistry::snapshot), so one slow
//! follower cannot stall accepts or removals happening on other tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use super::connection::FollowerConnection;
use crate::AppError;

/// Result of writing one frame to every registered follower.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Followers that received the frame.
    pub sent: usize,
    /// Followers whose write failed, timed out, or that were already closed.
    /// The caller removes them from the registry.
    pub failed: Vec<Arc<FollowerConnection>>,
}

impl BroadcastReport {
    /// Total followers the broadcast was attempted on.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.sent + self.failed.len()
    }
}

/// Registry of connected followers.
#[derive(Debug, Default)]
pub struct FollowerRegistry {
    followers: Mutex<Vec<Arc<FollowerConnection>>>,
}

impl FollowerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<FollowerConnection>>> {
        // Every critical section is a single Vec operation, so a poisoned
        // lock still guards a consistent list.
        self.followers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly accepted connection.
    pub fn add(&self, connection: Arc<FollowerConnection>) {
        self.lock().push(connection);
    }

    /// Remove `connection` if present. Returns whether it was registered.
    pub fn remove(&self, connection: &FollowerConnection) -> bool {
        let mut followers = self.lock();
        let before = followers.len();
        followers.retain(|entry| entry.id() != connection.id());
        followers.len() != before
    }

    /// Copy of the current connection list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<FollowerConnection>> {
        self.lock().clone()
    }

    /// Number of registered followers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no follower is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Unregister and close every connection. Returns how many were closed
    /// by this call.
    pub fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        drained.iter().filter(|connection| connection.close()).count()
    }

    /// Write `frame` to every follower in a snapshot of the registry.
    ///
    /// Writes run concurrently, each bounded by `write_timeout`. Failures are
    /// collected in the report, never propagated, and nothing is removed
    /// here.
    pub async fn broadcast_write(&self, frame: &[u8], write_timeout: Duration) -> BroadcastReport {
        let targets = self.snapshot();
        let attempts = targets.into_iter().map(|connection| async move {
            let outcome = match tokio::time::timeout(write_timeout, connection.send(frame)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Io(format!(
                    "write to {} timed out after {write_timeout:?}",
                    connection.peer()
                ))),
            };
            (connection, outcome)
        });

        let mut report = BroadcastReport::default();
        for (connection, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    if connection.is_closed() {
                        debug!(peer = %connection.peer(), %err, "skipped closed follower");
                    } else {
                        warn!(peer = %connection.peer(), %err, "failed to send to follower");
                    }
                    report.failed.push(connection);
                }
            }
        }
        report
    }
}
