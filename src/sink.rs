//! Destination for follower reports.

use std::net::SocketAddr;

use tracing::{debug, info};

use crate::models::follower::FollowerMessage;
use crate::models::MessageKind;

/// Receives every decoded follower report.
///
/// The network layer only forwards; interpretation beyond the message kind
/// belongs to the implementor.
pub trait StatusSink: Send + Sync {
    /// Handle one report from the follower at `peer`.
    fn deliver(&self, peer: SocketAddr, message: &FollowerMessage);
}

/// Sink that writes reports to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn deliver(&self, peer: SocketAddr, message: &FollowerMessage) {
        match message.kind {
            MessageKind::Status => info!(%peer, data = %message.data, "follower status"),
            MessageKind::CommandComplete => {
                info!(%peer, data = %message.data, "command completed");
            }
            other => debug!(%peer, kind = %other, "ignoring unexpected follower message"),
        }
    }
}
