//! Global configuration parsing and validation.
//!
//! Every section is optional in the TOML file; missing values fall back to
//! the defaults the leader ships with. The parsed [`GlobalConfig`] is
//! immutable once loaded and is shared behind an `Arc`.

use std::fs;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::models::command::CommandKind;
use crate::{AppError, Result};

/// Ports accepted for both the command and discovery channels.
const PORT_RANGE: RangeInclusive<u16> = 1024..=65535;

/// Accepted command cooldown, in milliseconds.
const COOLDOWN_RANGE_MS: RangeInclusive<u64> = 500..=10_000;

/// Accepted item level bounds for sell filters.
const ITEM_LEVEL_RANGE: RangeInclusive<u32> = 1..=100;

fn default_true() -> bool {
    true
}

fn default_server_port() -> u16 {
    7777
}

fn default_discovery_port() -> u16 {
    7778
}

fn default_broadcast_address() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_write_timeout_ms() -> u64 {
    1000
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_sell_min_level() -> u32 {
    1
}

fn default_sell_max_level() -> u32 {
    60
}

/// Network channel settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NetworkConfig {
    /// Whether the command server runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TCP port followers connect to.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Whether the leader announces itself over UDP broadcast.
    #[serde(default = "default_true")]
    pub discovery_enabled: bool,
    /// UDP port discovery announcements are sent to.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Destination address for discovery datagrams.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: Ipv4Addr,
    /// Upper bound for a single write+flush to one follower.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_port: default_server_port(),
            discovery_enabled: true,
            discovery_port: default_discovery_port(),
            broadcast_address: default_broadcast_address(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

/// Per-command enable flags and the shared cooldown.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CommandsConfig {
    /// Allow `STASH_ITEMS`.
    #[serde(default = "default_true")]
    pub stash_enabled: bool,
    /// Allow `SELL_ITEMS`.
    #[serde(default = "default_true")]
    pub sell_enabled: bool,
    /// Allow `ACCEPT_TRADE`.
    #[serde(default = "default_true")]
    pub trade_enabled: bool,
    /// Minimum time between two dispatches of the same command.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            stash_enabled: true,
            sell_enabled: true,
            trade_enabled: true,
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Item categories followers should move to stash.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
#[allow(clippy::struct_excessive_bools)] // One toggle per stash category.
pub struct StashConfig {
    /// Currency items.
    pub currency: bool,
    /// Maps.
    pub maps: bool,
    /// Gems.
    pub gems: bool,
    /// Unique items.
    pub uniques: bool,
    /// Rare items.
    pub rares: bool,
    /// Divination cards.
    pub div_cards: bool,
    /// Fragments.
    pub fragments: bool,
    /// Essences.
    pub essences: bool,
    /// Fossils.
    pub fossils: bool,
    /// Resonators.
    pub resonators: bool,
    /// Scarabs.
    pub scarabs: bool,
    /// Incubators.
    pub incubators: bool,
    /// Flasks.
    pub flasks: bool,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            currency: true,
            maps: true,
            gems: true,
            uniques: true,
            rares: false,
            div_cards: true,
            fragments: true,
            essences: true,
            fossils: true,
            resonators: true,
            scarabs: true,
            incubators: true,
            flasks: false,
        }
    }
}

/// Vendor filters followers apply when selling.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[allow(clippy::struct_excessive_bools)] // One toggle per item class.
pub struct SellConfig {
    /// Normal (white) items.
    #[serde(default = "default_true")]
    pub white_items: bool,
    /// Magic (blue) items.
    #[serde(default = "default_true")]
    pub blue_items: bool,
    /// Rare (yellow) items.
    #[serde(default)]
    pub yellow_items: bool,
    /// Lowest item level to sell.
    #[serde(default = "default_sell_min_level")]
    pub min_level: u32,
    /// Highest item level to sell.
    #[serde(default = "default_sell_max_level")]
    pub max_level: u32,
    /// Weapons.
    #[serde(default = "default_true")]
    pub weapons: bool,
    /// Armour pieces.
    #[serde(default = "default_true")]
    pub armor: bool,
    /// Rings, amulets and belts.
    #[serde(default = "default_true")]
    pub accessories: bool,
}

impl Default for SellConfig {
    fn default() -> Self {
        Self {
            white_items: true,
            blue_items: true,
            yellow_items: false,
            min_level: default_sell_min_level(),
            max_level: default_sell_max_level(),
            weapons: true,
            armor: true,
            accessories: true,
        }
    }
}

/// Trade acceptance settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TradeConfig {
    /// Comma-separated list of character names followers may trade with.
    #[serde(default)]
    pub whitelist: String,
}

/// Which commands may be dispatched.
///
/// `EMERGENCY_STOP` has no flag; it is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommandGates {
    /// Allow `STASH_ITEMS`.
    pub stash: bool,
    /// Allow `SELL_ITEMS`.
    pub sell: bool,
    /// Allow `ACCEPT_TRADE`.
    pub trade: bool,
}

impl CommandGates {
    /// Gates with every command enabled.
    #[must_use]
    pub fn all_enabled() -> Self {
        Self {
            stash: true,
            sell: true,
            trade: true,
        }
    }

    /// Whether `command` may be dispatched.
    #[must_use]
    pub fn is_enabled(&self, command: CommandKind) -> bool {
        match command {
            CommandKind::StashItems => self.stash,
            CommandKind::SellItems => self.sell,
            CommandKind::AcceptTrade => self.trade,
            CommandKind::EmergencyStop => true,
        }
    }
}

impl Default for CommandGates {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Name announced in discovery when the game state has none.
    #[serde(default)]
    pub leader_name: Option<String>,
    /// Command and discovery channel settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Command enable flags and cooldown.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// `STASH_ITEMS` payload.
    #[serde(default)]
    pub stash: StashConfig,
    /// `SELL_ITEMS` payload.
    #[serde(default)]
    pub sell: SellConfig,
    /// `ACCEPT_TRADE` payload.
    #[serde(default)]
    pub trade: TradeConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate ranges.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Enable flags for the dispatcher.
    #[must_use]
    pub fn command_gates(&self) -> CommandGates {
        CommandGates {
            stash: self.commands.stash_enabled,
            sell: self.commands.sell_enabled,
            trade: self.commands.trade_enabled,
        }
    }

    /// Minimum spacing between two dispatches of the same command.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.commands.cooldown_ms)
    }

    /// Upper bound for one write to one follower.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.network.write_timeout_ms)
    }

    /// Normalized trade whitelist: trimmed, lower-cased, empties dropped.
    #[must_use]
    pub fn trade_whitelist(&self) -> Vec<String> {
        self.trade
            .whitelist
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        check_port("network.server_port", self.network.server_port)?;
        check_port("network.discovery_port", self.network.discovery_port)?;

        if self.network.write_timeout_ms == 0 {
            return Err(AppError::Config(
                "network.write_timeout_ms must be greater than zero".into(),
            ));
        }

        if !COOLDOWN_RANGE_MS.contains(&self.commands.cooldown_ms) {
            return Err(AppError::Config(format!(
                "commands.cooldown_ms must be within {}..={}, got {}",
                COOLDOWN_RANGE_MS.start(),
                COOLDOWN_RANGE_MS.end(),
                self.commands.cooldown_ms
            )));
        }

        for (field, level) in [
            ("sell.min_level", self.sell.min_level),
            ("sell.max_level", self.sell.max_level),
        ] {
            if !ITEM_LEVEL_RANGE.contains(&level) {
                return Err(AppError::Config(format!(
                    "{field} must be within {}..={}, got {level}",
                    ITEM_LEVEL_RANGE.start(),
                    ITEM_LEVEL_RANGE.end()
                )));
            }
        }

        Ok(())
    }
}

fn check_port(field: &str, port: u16) -> Result<()> {
    if PORT_RANGE.contains(&port) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{field} must be within {}..={}, got {port}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        )))
    }
}
