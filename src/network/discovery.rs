//! UDP presence broadcaster.
//!
//! Announces the leader's name, address and command port on a fixed
//! interval so followers on the LAN can connect without configuration.
//! The first announcement goes out as soon as the task starts.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::address::resolve_local_ipv4;
use crate::identity::LeaderIdentity;
use crate::models::discovery::DiscoveryMessage;
use crate::protocol::codec;
use crate::{AppError, Result};

/// Time between two announcements.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);

/// A bound broadcast socket that has not started announcing yet.
///
/// Call [`spawn`](Self::spawn) to start the announce loop.
pub struct DiscoveryBroadcaster {
    socket: UdpSocket,
    target: SocketAddr,
    server_port: u16,
    interval: Duration,
    identity: Arc<dyn LeaderIdentity>,
}

impl DiscoveryBroadcaster {
    /// Bind an ephemeral broadcast-enabled UDP socket.
    ///
    /// `target` is normally `255.255.255.255:<discovery port>`;
    /// `server_port` is the TCP command port advertised to followers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Network` if the socket cannot be bound or
    /// broadcast cannot be enabled.
    pub async fn bind(
        target: SocketAddr,
        server_port: u16,
        identity: Arc<dyn LeaderIdentity>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|err| AppError::Network(format!("failed to bind discovery socket: {err}")))?;
        socket
            .set_broadcast(true)
            .map_err(|err| AppError::Network(format!("failed to enable broadcast: {err}")))?;

        Ok(Self {
            socket,
            target,
            server_port,
            interval: DISCOVERY_INTERVAL,
            identity,
        })
    }

    /// Override the announce interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Compose and send one announcement.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Codec` if encoding fails or `AppError::Network`
    /// if the datagram cannot be sent.
    pub async fn announce(&self) -> Result<DiscoveryMessage> {
        let message = DiscoveryMessage::new(
            self.identity.display_name(),
            resolve_local_ipv4().to_string(),
            self.server_port,
        );
        let datagram = codec::encode(&message)?;
        self.socket
            .send_to(&datagram, self.target)
            .await
            .map_err(|err| AppError::Network(format!("send to {} failed: {err}", self.target)))?;
        Ok(message)
    }

    /// Start announcing until `ct` is cancelled.
    ///
    /// A failed announcement is logged and retried on the next tick; only
    /// cancellation ends the loop, which also closes the socket.
    #[must_use]
    pub fn spawn(self, ct: CancellationToken) -> JoinHandle<()> {
        let span = info_span!("discovery", target = %self.target);
        tokio::spawn(
            async move {
                info!(interval = ?self.interval, "discovery broadcaster started");
                let mut ticker = tokio::time::interval(self.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        () = ct.cancelled() => {
                            info!("discovery broadcaster shutting down");
                            break;
                        }
                        _ = ticker.tick() => {
                            match self.announce().await {
                                Ok(message) => debug!(
                                    leader = %message.leader_name,
                                    ip = %message.ip_address,
                                    port = message.port,
                                    "discovery announced"
                                ),
                                Err(err) => warn!(%err, "discovery broadcast failed"),
                            }
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}
