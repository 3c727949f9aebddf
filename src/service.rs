//! Leader network service lifecycle.
//!
//! [`LeaderService::start`] brings up the command server and, when enabled,
//! the discovery broadcaster. Startup failures are logged and leave the
//! service running without the failed component: dispatch still works and
//! simply reaches zero followers. [`LeaderService::stop`] cancels every
//! task, closes every follower once, and waits briefly for the background
//! tasks to finish.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::GlobalConfig;
use crate::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::identity::LeaderIdentity;
use crate::models::command::CommandKind;
use crate::network::discovery::DiscoveryBroadcaster;
use crate::network::registry::FollowerRegistry;
use crate::network::server;
use crate::payload::CommandPayloads;
use crate::sink::StatusSink;

/// How long [`LeaderService::stop`] waits for each background task.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Point-in-time view of the service for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// `network.enabled` from the config.
    pub network_enabled: bool,
    /// `network.discovery_enabled` from the config.
    pub discovery_enabled: bool,
    /// Configured command port.
    pub server_port: u16,
    /// Address the command server is bound to, if it started.
    pub listening_addr: Option<SocketAddr>,
    /// Whether the discovery task is running.
    pub discovery_running: bool,
    /// Currently registered followers.
    pub connected_followers: usize,
}

/// The leader's network services.
pub struct LeaderService {
    config: Arc<GlobalConfig>,
    registry: Arc<FollowerRegistry>,
    dispatcher: CommandDispatcher,
    payloads: CommandPayloads,
    ct: CancellationToken,
    listening_addr: Option<SocketAddr>,
    server_handle: Option<JoinHandle<()>>,
    discovery_handle: Option<JoinHandle<()>>,
}

impl LeaderService {
    /// Start the services described by `config`.
    ///
    /// Never fails; a component that cannot bind is logged and skipped.
    pub async fn start(
        config: Arc<GlobalConfig>,
        identity: Arc<dyn LeaderIdentity>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let registry = Arc::new(FollowerRegistry::new());
        let mut service = Self {
            dispatcher: CommandDispatcher::from_config(Arc::clone(&registry), &config),
            payloads: CommandPayloads::from_config(&config),
            registry,
            ct: CancellationToken::new(),
            listening_addr: None,
            server_handle: None,
            discovery_handle: None,
            config,
        };

        if !service.config.network.enabled {
            info!("network communication disabled");
            return service;
        }

        let network = &service.config.network;
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, network.server_port));
        match server::bind_listener(bind_addr).await {
            Ok(listener) => {
                service.listening_addr = listener.local_addr().ok();
                service.server_handle = Some(server::spawn_command_server(
                    listener,
                    Arc::clone(&service.registry),
                    sink,
                    service.ct.clone(),
                ));
            }
            Err(err) => error!(%err, "command server unavailable, commands will reach no followers"),
        }

        if network.discovery_enabled {
            let target = SocketAddr::from((network.broadcast_address, network.discovery_port));
            match DiscoveryBroadcaster::bind(target, network.server_port, identity).await {
                Ok(broadcaster) => {
                    service.discovery_handle = Some(broadcaster.spawn(service.ct.clone()));
                }
                Err(err) => error!(%err, "discovery broadcaster unavailable"),
            }
        }

        info!(
            listening = service.listening_addr.is_some(),
            discovery = service.discovery_handle.is_some(),
            "network services started"
        );
        service
    }

    /// Shared follower registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<FollowerRegistry> {
        &self.registry
    }

    /// Command dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Address the command server is bound to, if it started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening_addr
    }

    /// Dispatch `command` with its configured payload.
    pub async fn trigger(&self, command: CommandKind) -> DispatchOutcome {
        self.dispatcher
            .dispatch(command, || self.payloads.payload_for(command))
            .await
    }

    /// Periodic entry point for the embedding application: dispatch every
    /// command whose trigger fired since the last poll, in order.
    pub async fn poll(&self, fired: &[CommandKind]) -> Vec<(CommandKind, DispatchOutcome)> {
        let mut outcomes = Vec::with_capacity(fired.len());
        for &command in fired {
            outcomes.push((command, self.trigger(command).await));
        }
        outcomes
    }

    /// Current service status.
    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            network_enabled: self.config.network.enabled,
            discovery_enabled: self.config.network.discovery_enabled,
            server_port: self.config.network.server_port,
            listening_addr: self.listening_addr,
            discovery_running: self
                .discovery_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
            connected_followers: self.registry.len(),
        }
    }

    /// Stop every task and close every follower connection.
    pub async fn stop(mut self) {
        self.ct.cancel();
        let closed = self.registry.close_all();

        let tasks = [
            ("command server", self.server_handle.take()),
            ("discovery", self.discovery_handle.take()),
        ];
        for (task, handle) in tasks {
            let Some(handle) = handle else {
                continue;
            };
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(task, %err, "task ended abnormally"),
                Err(_) => warn!(task, "task did not stop within the grace period"),
            }
        }

        info!(closed, "network services stopped");
    }
}

impl Drop for LeaderService {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}
