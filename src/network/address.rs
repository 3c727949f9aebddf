//! Outward-facing address resolution for discovery announcements.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, warn};

/// IPv4 address of the first non-loopback interface on the host.
///
/// Falls back to `127.0.0.1` when no such interface exists or the
/// interface list cannot be read.
#[must_use]
pub fn resolve_local_ipv4() -> Ipv4Addr {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let found = first_lan_ipv4(
                interfaces
                    .iter()
                    .filter(|interface| !interface.is_loopback())
                    .map(if_addrs::Interface::ip),
            );
            found.unwrap_or_else(|| {
                debug!("no non-loopback IPv4 interface, using loopback");
                Ipv4Addr::LOCALHOST
            })
        }
        Err(err) => {
            warn!(%err, "failed to list network interfaces, using loopback");
            Ipv4Addr::LOCALHOST
        }
    }
}

/// First IPv4 address in `addrs` that a follower on the LAN could reach.
///
/// Interface order is preserved; IPv6, loopback and unspecified addresses
/// are skipped.
#[must_use]
pub fn first_lan_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4),
        _ => None,
    })
}
