//! Unit tests for the follower registry and broadcast fan-out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use leader_commands::network::FollowerRegistry;

use super::support::{assert_closed, follower_pair, read_frame};

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn add_remove_and_snapshot() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let first = follower_pair(&ct).await;
    let second = follower_pair(&ct).await;

    assert!(registry.is_empty());
    registry.add(Arc::clone(&first.connection));
    registry.add(Arc::clone(&second.connection));
    assert_eq!(registry.len(), 2);

    let ids: Vec<u64> = registry.snapshot().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![first.connection.id(), second.connection.id()]);

    assert!(registry.remove(&first.connection));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.snapshot()[0].id(), second.connection.id());
}

#[tokio::test]
async fn remove_is_idempotent() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let pair = follower_pair(&ct).await;
    registry.add(Arc::clone(&pair.connection));

    assert!(registry.remove(&pair.connection));
    assert!(!registry.remove(&pair.connection), "second remove is a no-op");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn snapshot_is_detached_from_later_changes() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let pair = follower_pair(&ct).await;
    registry.add(Arc::clone(&pair.connection));

    let snapshot = registry.snapshot();
    registry.remove(&pair.connection);

    assert_eq!(snapshot.len(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn broadcast_reaches_every_follower() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let mut pairs = Vec::new();
    for _ in 0..3 {
        let pair = follower_pair(&ct).await;
        registry.add(Arc::clone(&pair.connection));
        pairs.push(pair);
    }

    let report = registry
        .broadcast_write(b"{\"Type\":\"COMMAND\"}\n", WRITE_TIMEOUT)
        .await;

    assert_eq!(report.sent, 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.attempted(), 3);
    for pair in &mut pairs {
        assert_eq!(read_frame(&mut pair.follower).await["Type"], "COMMAND");
    }
}

#[tokio::test]
async fn broadcast_reports_closed_follower_without_removing_it() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let mut healthy = follower_pair(&ct).await;
    let closed = follower_pair(&ct).await;
    registry.add(Arc::clone(&healthy.connection));
    registry.add(Arc::clone(&closed.connection));
    closed.connection.close();

    let report = registry.broadcast_write(b"{}\n", WRITE_TIMEOUT).await;

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id(), closed.connection.id());
    assert_eq!(registry.len(), 2, "removal is left to the caller");
    assert_eq!(read_frame(&mut healthy.follower).await, serde_json::json!({}));
}

#[tokio::test]
async fn broadcast_to_empty_registry_is_a_no_op() {
    let registry = FollowerRegistry::new();
    let report = registry.broadcast_write(b"{}\n", WRITE_TIMEOUT).await;
    assert_eq!(report.attempted(), 0);
}

#[tokio::test]
async fn close_all_closes_each_connection_once() {
    let ct = CancellationToken::new();
    let registry = FollowerRegistry::new();
    let mut first = follower_pair(&ct).await;
    let mut second = follower_pair(&ct).await;
    registry.add(Arc::clone(&first.connection));
    registry.add(Arc::clone(&second.connection));

    // Already closed elsewhere; close_all must not count it again.
    second.connection.close();

    assert_eq!(registry.close_all(), 1);
    assert!(registry.is_empty());
    assert!(first.connection.is_closed());
    assert!(first.connection.cancel_token().is_cancelled());
    assert!(!first.connection.close(), "close is idempotent");

    assert_closed(&mut first.follower).await;
    assert_closed(&mut second.follower).await;
}

#[tokio::test]
async fn closing_the_parent_token_cancels_connections() {
    let ct = CancellationToken::new();
    let pair = follower_pair(&ct).await;

    ct.cancel();

    assert!(pair.connection.cancel_token().is_cancelled());
    assert!(!pair.connection.is_closed(), "cancellation alone does not close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_remove_and_broadcast_stay_consistent() {
    let ct = CancellationToken::new();
    let registry = Arc::new(FollowerRegistry::new());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        let ct = ct.clone();
        tasks.push(tokio::spawn(async move {
            let mut kept = Vec::new();
            let mut removed = Vec::new();
            for round in 0..5 {
                let pair = follower_pair(&ct).await;
                registry.add(Arc::clone(&pair.connection));
                registry.broadcast_write(b"{}\n", WRITE_TIMEOUT).await;
                let _ = registry.snapshot();
                if round % 2 == 0 {
                    assert!(registry.remove(&pair.connection));
                    removed.push(pair.connection.id());
                } else {
                    kept.push(pair);
                }
            }
            (kept, removed)
        }));
    }

    let mut kept_ids = HashSet::new();
    let mut removed_ids = HashSet::new();
    let mut kept_pairs = Vec::new();
    for task in tasks {
        let (kept, removed) = task.await.expect("task");
        kept_ids.extend(kept.iter().map(|pair| pair.connection.id()));
        removed_ids.extend(removed);
        kept_pairs.extend(kept);
    }

    let snapshot_ids: Vec<u64> = registry.snapshot().iter().map(|c| c.id()).collect();
    let unique: HashSet<u64> = snapshot_ids.iter().copied().collect();

    assert_eq!(snapshot_ids.len(), 8);
    assert_eq!(unique.len(), snapshot_ids.len(), "no duplicate entries");
    assert_eq!(unique, kept_ids, "exactly the kept connections remain");
    assert_eq!(removed_ids.len(), 12);
    assert!(unique.is_disjoint(&removed_ids), "no removed connection lingers");
    assert_eq!(registry.len(), kept_pairs.len());
}
