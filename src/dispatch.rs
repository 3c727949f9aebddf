//! Rate-limited command fan-out.
//!
//! A dispatch passes two gates before anything is sent: the command must be
//! enabled, and its cooldown must have elapsed since the last broadcast of
//! the same command. The frame is then encoded once and written to every
//! registered follower; followers whose write fails are unregistered and
//! closed. Delivery is best effort and there is no acknowledgement.
//!
//! Each command has its own ledger slot, so a dispatch stuck on a slow
//! follower delays only later dispatches of the same command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::{CommandGates, GlobalConfig};
use crate::models::command::{CommandData, CommandKind, CommandMessage};
use crate::network::registry::{BroadcastReport, FollowerRegistry};
use crate::protocol::codec;

/// Default bound for one write to one follower.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// What a call to [`CommandDispatcher::dispatch`] did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The command is administratively disabled; nothing was sent.
    Disabled,
    /// The command was sent too recently; nothing was sent.
    CoolingDown {
        /// Time left until the command may be sent again.
        remaining: Duration,
    },
    /// A broadcast was attempted (possibly to zero followers).
    Sent(BroadcastReport),
}

impl DispatchOutcome {
    /// Whether a broadcast was attempted.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Gatekeeper and fan-out for leader commands.
#[derive(Debug)]
pub struct CommandDispatcher {
    registry: Arc<FollowerRegistry>,
    gates: CommandGates,
    cooldown: Duration,
    write_timeout: Duration,
    /// Last broadcast per command, indexed by `slot_index`. A slot is held
    /// for the whole dispatch of its command so check-then-record is atomic.
    ledger: [Mutex<Option<Instant>>; 4],
}

fn slot_index(command: CommandKind) -> usize {
    match command {
        CommandKind::StashItems => 0,
        CommandKind::SellItems => 1,
        CommandKind::AcceptTrade => 2,
        CommandKind::EmergencyStop => 3,
    }
}

impl CommandDispatcher {
    /// Create a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<FollowerRegistry>, gates: CommandGates, cooldown: Duration) -> Self {
        Self {
            registry,
            gates,
            cooldown,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ledger: std::array::from_fn(|_| Mutex::new(None)),
        }
    }

    /// Create a dispatcher using the gates, cooldown and write timeout
    /// from `config`.
    #[must_use]
    pub fn from_config(registry: Arc<FollowerRegistry>, config: &GlobalConfig) -> Self {
        Self::new(registry, config.command_gates(), config.cooldown())
            .with_write_timeout(config.write_timeout())
    }

    /// Override the per-follower write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Configured cooldown.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// When `command` was last broadcast, if ever.
    pub async fn last_sent(&self, command: CommandKind) -> Option<Instant> {
        *self.slot(command).lock().await
    }

    fn slot(&self, command: CommandKind) -> &Mutex<Option<Instant>> {
        &self.ledger[slot_index(command)]
    }

    /// Send `command` to every follower unless it is disabled or cooling
    /// down.
    ///
    /// `build_payload` runs only when the command will actually be sent.
    /// Never fails: write errors are logged and the failing followers are
    /// dropped from the registry.
    pub async fn dispatch<F>(&self, command: CommandKind, build_payload: F) -> DispatchOutcome
    where
        F: FnOnce() -> CommandData + Send,
    {
        let span = info_span!("dispatch", command = %command);
        async move {
            if !self.gates.is_enabled(command) {
                info!("command is disabled, suppressed");
                return DispatchOutcome::Disabled;
            }

            let mut last_sent = self.slot(command).lock().await;
            if let Some(last) = *last_sent {
                let elapsed = last.elapsed();
                if elapsed < self.cooldown {
                    let remaining = self.cooldown - elapsed;
                    debug!(?remaining, "command cooling down");
                    return DispatchOutcome::CoolingDown { remaining };
                }
            }

            let message = CommandMessage::new(command, build_payload());
            let report = match codec::encode(&message) {
                Ok(frame) => {
                    self.registry
                        .broadcast_write(&frame, self.write_timeout)
                        .await
                }
                Err(err) => {
                    error!(%err, "failed to encode command");
                    BroadcastReport::default()
                }
            };

            for connection in &report.failed {
                self.registry.remove(connection);
                connection.close();
            }

            *last_sent = Some(Instant::now());
            info!(
                sent = report.sent,
                failed = report.failed.len(),
                followers = self.registry.len(),
                "command dispatched"
            );
            DispatchOutcome::Sent(report)
        }
        .instrument(span)
        .await
    }
}
