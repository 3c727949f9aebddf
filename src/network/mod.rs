//! Network services: follower registry, TCP command server and UDP
//! discovery broadcaster.

pub mod address;
pub mod connection;
pub mod discovery;
pub mod registry;
pub mod server;

pub use connection::FollowerConnection;
pub use registry::{BroadcastReport, FollowerRegistry};
