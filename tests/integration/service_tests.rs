//! Integration tests for the leader service lifecycle.
//!
//! Each test starts a full service on a free loopback port and drives it
//! with real follower clients.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::UdpSocket;

use leader_commands::dispatch::DispatchOutcome;
use leader_commands::identity::{ConfiguredIdentity, LeaderIdentity};
use leader_commands::models::command::CommandKind;
use leader_commands::models::discovery::DiscoveryMessage;
use leader_commands::protocol::codec;
use leader_commands::{GlobalConfig, LeaderService};

use super::test_helpers::{channel_sink, free_port, next_report, test_config, wait_for, Follower};

fn identity(config: &GlobalConfig) -> Arc<dyn LeaderIdentity> {
    Arc::new(ConfiguredIdentity::new(config.leader_name.clone()))
}

async fn start(config: GlobalConfig) -> LeaderService {
    let identity = identity(&config);
    let (sink, _reports) = channel_sink();
    LeaderService::start(Arc::new(config), identity, sink).await
}

fn loopback(service: &LeaderService) -> SocketAddr {
    let port = service.local_addr().expect("server listening").port();
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[tokio::test]
async fn disabled_network_starts_nothing() {
    let config = GlobalConfig::from_toml_str("[network]\nenabled = false\n").expect("config");
    let service = start(config).await;

    let status = service.status();
    assert!(!status.network_enabled);
    assert!(status.listening_addr.is_none());
    assert!(!status.discovery_running);
    assert_eq!(status.connected_followers, 0);

    match service.trigger(CommandKind::StashItems).await {
        DispatchOutcome::Sent(report) => assert_eq!(report.attempted(), 0),
        other => panic!("expected Sent, got {other:?}"),
    }
    service.stop().await;
}

#[tokio::test]
async fn trigger_delivers_configured_payload_to_followers() {
    let service = start(test_config(free_port(), free_port(), false)).await;
    let addr = loopback(&service);
    let mut first = Follower::connect(addr).await;
    let mut second = Follower::connect(addr).await;
    let registry = Arc::clone(service.registry());
    assert!(wait_for(|| registry.len() == 2).await);

    assert!(service.trigger(CommandKind::AcceptTrade).await.was_sent());

    for follower in [&mut first, &mut second] {
        let frame = follower.read_frame().await;
        assert_eq!(frame["Type"], "COMMAND");
        assert_eq!(frame["Command"], "ACCEPT_TRADE");
        assert_eq!(frame["Data"], json!({"TradeWhitelist": ["alice", "bob"]}));
    }
    service.stop().await;
}

#[tokio::test]
async fn poll_dispatches_each_fired_command_in_order() {
    let service = start(test_config(free_port(), free_port(), false)).await;
    let mut follower = Follower::connect(loopback(&service)).await;
    let registry = Arc::clone(service.registry());
    assert!(wait_for(|| registry.len() == 1).await);

    let outcomes = service
        .poll(&[CommandKind::StashItems, CommandKind::SellItems, CommandKind::StashItems])
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].1.was_sent());
    assert!(outcomes[1].1.was_sent());
    assert!(matches!(outcomes[2].1, DispatchOutcome::CoolingDown { .. }));

    assert_eq!(follower.read_frame().await["Command"], "STASH_ITEMS");
    let sell = follower.read_frame().await;
    assert_eq!(sell["Command"], "SELL_ITEMS");
    assert_eq!(sell["Data"]["SellMaxLevel"], 60);
    service.stop().await;
}

#[tokio::test]
async fn reports_flow_to_the_sink() {
    let config = test_config(free_port(), free_port(), false);
    let identity = identity(&config);
    let (sink, mut reports) = channel_sink();
    let service = LeaderService::start(Arc::new(config), identity, sink).await;

    let mut follower = Follower::connect(loopback(&service)).await;
    follower
        .send_raw(b"{\"Type\":\"STATUS\",\"Data\":\"mapping\"}\n")
        .await;

    let (_, report) = next_report(&mut reports).await;
    assert_eq!(report.data, "mapping");
    service.stop().await;
}

#[tokio::test]
async fn status_counts_connected_followers() {
    let service = start(test_config(free_port(), free_port(), false)).await;
    let _follower = Follower::connect(loopback(&service)).await;
    let registry = Arc::clone(service.registry());
    assert!(wait_for(|| registry.len() == 1).await);

    let status = service.status();
    assert!(status.network_enabled);
    assert!(status.listening_addr.is_some());
    assert!(!status.discovery_running);
    assert_eq!(status.connected_followers, 1);
    service.stop().await;
}

#[tokio::test]
async fn stop_closes_every_follower() {
    let service = start(test_config(free_port(), free_port(), false)).await;
    let addr = loopback(&service);
    let mut first = Follower::connect(addr).await;
    let mut second = Follower::connect(addr).await;
    let registry = Arc::clone(service.registry());
    assert!(wait_for(|| registry.len() == 2).await);

    tokio::time::timeout(Duration::from_secs(3), service.stop())
        .await
        .expect("stop completes promptly");

    assert!(first.is_closed_by_leader().await);
    assert!(second.is_closed_by_leader().await);
    assert!(registry.is_empty());
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn port_in_use_leaves_service_running_without_followers() {
    let holder = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("bind holder");
    let port = holder.local_addr().expect("holder addr").port();

    let service = start(test_config(port, free_port(), false)).await;

    assert!(service.local_addr().is_none());
    match service.trigger(CommandKind::EmergencyStop).await {
        DispatchOutcome::Sent(report) => assert_eq!(report.attempted(), 0),
        other => panic!("expected Sent, got {other:?}"),
    }
    service.stop().await;
}

#[tokio::test]
async fn discovery_announces_the_command_port() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
    let discovery_port = receiver.local_addr().expect("receiver addr").port();
    let server_port = free_port();
    let service = start(test_config(server_port, discovery_port, true)).await;

    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .expect("announcement before timeout")
        .expect("recv");
    let announcement: DiscoveryMessage = codec::decode_bytes(&buf[..len]).expect("valid announcement");

    assert_eq!(announcement.leader_name, "Ranger");
    assert_eq!(announcement.port, server_port);
    assert!(service.status().discovery_running);
    service.stop().await;
}
