//! Leader presence announcement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageKind, WireMessage};

/// Datagram a leader broadcasts so followers can find its command port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryMessage {
    /// Always [`MessageKind::LeaderDiscovery`].
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    /// Display name of the leader's character.
    pub leader_name: String,
    /// Address followers should connect to.
    pub ip_address: String,
    /// TCP command port.
    pub port: u16,
    /// When the announcement was composed.
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryMessage {
    /// Build an announcement stamped with the current time.
    #[must_use]
    pub fn new(leader_name: impl Into<String>, ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            kind: MessageKind::LeaderDiscovery,
            leader_name: leader_name.into(),
            ip_address: ip_address.into(),
            port,
            timestamp: Utc::now(),
        }
    }
}

impl WireMessage for DiscoveryMessage {
    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn accepts(kind: MessageKind) -> bool {
        kind == MessageKind::LeaderDiscovery
    }
}
