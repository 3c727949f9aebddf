//! Leader → follower command message.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageKind, WireMessage};
use crate::AppError;

/// Command-specific payload: field name → scalar, boolean, number or list.
pub type CommandData = serde_json::Map<String, serde_json::Value>;

/// The fixed command vocabulary understood by followers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Move configured item categories into stash.
    StashItems,
    /// Vendor items matching the configured filters.
    SellItems,
    /// Accept a pending trade from a whitelisted character.
    AcceptTrade,
    /// Stop whatever the follower is doing. Always enabled.
    EmergencyStop,
}

impl CommandKind {
    /// Every command, in hotkey order.
    pub const ALL: [Self; 4] = [
        Self::StashItems,
        Self::SellItems,
        Self::AcceptTrade,
        Self::EmergencyStop,
    ];

    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StashItems => "STASH_ITEMS",
            Self::SellItems => "SELL_ITEMS",
            Self::AcceptTrade => "ACCEPT_TRADE",
            Self::EmergencyStop => "EMERGENCY_STOP",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = AppError;

    /// Accepts the wire name (any case) or the short trigger names
    /// `stash`, `sell`, `trade` and `stop`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stash" | "stash_items" => Ok(Self::StashItems),
            "sell" | "sell_items" => Ok(Self::SellItems),
            "trade" | "accept_trade" => Ok(Self::AcceptTrade),
            "stop" | "emergency_stop" => Ok(Self::EmergencyStop),
            other => Err(AppError::Codec(format!("unknown command: {other}"))),
        }
    }
}

/// A command broadcast to every connected follower.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CommandMessage {
    /// Always [`MessageKind::Command`].
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    /// Which command to execute.
    pub command: CommandKind,
    /// Command-specific parameters; empty for `EMERGENCY_STOP`.
    #[serde(default)]
    pub data: CommandData,
    /// When the leader issued the command.
    pub timestamp: DateTime<Utc>,
}

impl CommandMessage {
    /// Build a command stamped with the current time.
    #[must_use]
    pub fn new(command: CommandKind, data: CommandData) -> Self {
        Self {
            kind: MessageKind::Command,
            command,
            data,
            timestamp: Utc::now(),
        }
    }
}

impl WireMessage for CommandMessage {
    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn accepts(kind: MessageKind) -> bool {
        kind == MessageKind::Command
    }
}
