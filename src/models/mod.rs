//! Wire message models exchanged between the leader and its followers.
//!
//! All three message shapes carry a `Type` discriminator so a decoder can
//! tell them apart without any out-of-band schema negotiation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod command;
pub mod discovery;
pub mod follower;

/// Discriminator carried in the `Type` field of every wire message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Leader → follower command.
    Command,
    /// Follower → leader free-form status report.
    Status,
    /// Follower → leader report that a command finished.
    CommandComplete,
    /// Leader presence announcement over UDP.
    LeaderDiscovery,
}

impl MessageKind {
    /// Wire spelling of the discriminator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "COMMAND",
            Self::Status => "STATUS",
            Self::CommandComplete => "COMMAND_COMPLETE",
            Self::LeaderDiscovery => "LEADER_DISCOVERY",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message shape that can travel over the wire.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Discriminator of this instance.
    fn kind(&self) -> MessageKind;

    /// Whether a decoded `Type` belongs to this shape.
    fn accepts(kind: MessageKind) -> bool;
}
