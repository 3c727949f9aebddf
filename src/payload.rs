//! Per-command payloads built from configuration.
//!
//! Keys use the names followers already understand (`StashCurrency`,
//! `SellMinLevel`, `TradeWhitelist`, ...).

use serde_json::Value;

use crate::config::{GlobalConfig, SellConfig, StashConfig};
use crate::models::command::{CommandData, CommandKind};

/// Builds the `Data` object for each command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayloads {
    stash: StashConfig,
    sell: SellConfig,
    trade_whitelist: Vec<String>,
}

impl CommandPayloads {
    /// Capture the payload-relevant parts of `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            stash: config.stash.clone(),
            sell: config.sell.clone(),
            trade_whitelist: config.trade_whitelist(),
        }
    }

    /// Payload for `command`. `EMERGENCY_STOP` carries an empty object.
    #[must_use]
    pub fn payload_for(&self, command: CommandKind) -> CommandData {
        match command {
            CommandKind::StashItems => stash_payload(&self.stash),
            CommandKind::SellItems => sell_payload(&self.sell),
            CommandKind::AcceptTrade => {
                let mut data = CommandData::new();
                data.insert(
                    "TradeWhitelist".into(),
                    Value::from(self.trade_whitelist.clone()),
                );
                data
            }
            CommandKind::EmergencyStop => CommandData::new(),
        }
    }
}

fn stash_payload(stash: &StashConfig) -> CommandData {
    [
        ("StashCurrency", stash.currency),
        ("StashMaps", stash.maps),
        ("StashGems", stash.gems),
        ("StashUniques", stash.uniques),
        ("StashRares", stash.rares),
        ("StashDivCards", stash.div_cards),
        ("StashFragments", stash.fragments),
        ("StashEssences", stash.essences),
        ("StashFossils", stash.fossils),
        ("StashResonators", stash.resonators),
        ("StashScarabs", stash.scarabs),
        ("StashIncubators", stash.incubators),
        ("StashFlasks", stash.flasks),
    ]
    .into_iter()
    .map(|(key, enabled)| (key.to_owned(), Value::Bool(enabled)))
    .collect()
}

fn sell_payload(sell: &SellConfig) -> CommandData {
    let mut data = CommandData::new();
    data.insert("SellWhiteItems".into(), sell.white_items.into());
    data.insert("SellBlueItems".into(), sell.blue_items.into());
    data.insert("SellYellowItems".into(), sell.yellow_items.into());
    data.insert("SellMinLevel".into(), sell.min_level.into());
    data.insert("SellMaxLevel".into(), sell.max_level.into());
    data.insert("SellWeapons".into(), sell.weapons.into());
    data.insert("SellArmor".into(), sell.armor.into());
    data.insert("SellAccessories".into(), sell.accessories.into());
    data
}
