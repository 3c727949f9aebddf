//! Loopback socket helpers shared by the unit tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use leader_commands::network::FollowerConnection;

/// Leader-side connection, its read half, and the follower's end.
pub struct FollowerPair {
    pub connection: Arc<FollowerConnection>,
    pub _reader: OwnedReadHalf,
    pub follower: BufReader<TcpStream>,
}

/// Open a real loopback TCP connection and wrap the accepted side.
pub async fn follower_pair(ct: &CancellationToken) -> FollowerPair {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let follower = TcpStream::connect(addr).await.expect("connect");
    let (accepted, _) = listener.accept().await.expect("accept");
    let (connection, reader) = FollowerConnection::from_stream(accepted, ct).expect("split");
    FollowerPair {
        connection,
        _reader: reader,
        follower: BufReader::new(follower),
    }
}

/// Read one frame on the follower side and parse it as JSON.
pub async fn read_frame(follower: &mut BufReader<TcpStream>) -> serde_json::Value {
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(2), follower.read_line(&mut line))
        .await
        .expect("frame should arrive before timeout")
        .expect("read should succeed");
    assert!(read > 0, "connection closed before a frame arrived");
    assert!(line.ends_with('\n'), "frame must be newline-terminated");
    serde_json::from_str(&line).expect("frame must be valid json")
}

/// Assert nothing arrives on the follower side within `wait`.
pub async fn assert_no_frame(follower: &mut BufReader<TcpStream>, wait: Duration) {
    let mut line = String::new();
    let result = tokio::time::timeout(wait, follower.read_line(&mut line)).await;
    assert!(result.is_err(), "unexpected frame: {line:?}");
}

/// Assert the leader closed the follower's connection.
pub async fn assert_closed(follower: &mut BufReader<TcpStream>) {
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(2), follower.read_line(&mut line))
        .await
        .expect("close should be observed before timeout");
    match read {
        Ok(0) | Err(_) => {}
        Ok(_) => panic!("expected EOF, got frame: {line:?}"),
    }
}
