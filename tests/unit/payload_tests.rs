//! Unit tests for per-command payload construction.

use serde_json::json;

use leader_commands::models::command::CommandKind;
use leader_commands::payload::CommandPayloads;
use leader_commands::GlobalConfig;

fn payloads(raw: &str) -> CommandPayloads {
    CommandPayloads::from_config(&GlobalConfig::from_toml_str(raw).expect("config parses"))
}

#[test]
fn stash_payload_lists_every_category() {
    let data = payloads("").payload_for(CommandKind::StashItems);

    assert_eq!(data.len(), 13);
    assert_eq!(data["StashCurrency"], json!(true));
    assert_eq!(data["StashRares"], json!(false));
    assert_eq!(data["StashDivCards"], json!(true));
    assert_eq!(data["StashFlasks"], json!(false));
    assert!(data.values().all(serde_json::Value::is_boolean));
}

#[test]
fn stash_payload_reflects_config() {
    let data = payloads("[stash]\ncurrency = false\nrares = true\n").payload_for(CommandKind::StashItems);

    assert_eq!(data["StashCurrency"], json!(false));
    assert_eq!(data["StashRares"], json!(true));
}

#[test]
fn sell_payload_carries_filters_and_level_range() {
    let data = payloads("[sell]\nyellow_items = true\nmin_level = 5\nmax_level = 70\narmor = false\n")
        .payload_for(CommandKind::SellItems);

    assert_eq!(data.len(), 8);
    assert_eq!(data["SellWhiteItems"], json!(true));
    assert_eq!(data["SellBlueItems"], json!(true));
    assert_eq!(data["SellYellowItems"], json!(true));
    assert_eq!(data["SellMinLevel"], json!(5));
    assert_eq!(data["SellMaxLevel"], json!(70));
    assert_eq!(data["SellWeapons"], json!(true));
    assert_eq!(data["SellArmor"], json!(false));
    assert_eq!(data["SellAccessories"], json!(true));
}

#[test]
fn trade_payload_carries_normalized_whitelist() {
    let data = payloads("[trade]\nwhitelist = \"Alice, Bob\"\n").payload_for(CommandKind::AcceptTrade);

    assert_eq!(data.len(), 1);
    assert_eq!(data["TradeWhitelist"], json!(["alice", "bob"]));
}

#[test]
fn trade_payload_with_empty_whitelist_is_an_empty_list() {
    let data = payloads("").payload_for(CommandKind::AcceptTrade);
    assert_eq!(data["TradeWhitelist"], json!([]));
}

#[test]
fn emergency_stop_has_no_payload() {
    assert!(payloads("").payload_for(CommandKind::EmergencyStop).is_empty());
}
