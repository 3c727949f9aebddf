#![forbid(unsafe_code)]

//! Leader-side network services: broadcast commands to follower processes
//! over TCP, collect their status reports, and announce the leader over UDP
//! so followers can find it.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod identity;
pub mod models;
pub mod network;
pub mod payload;
pub mod protocol;
pub mod service;
pub mod sink;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use service::LeaderService;
