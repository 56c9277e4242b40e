//! Local address discovery for the default bind host.

use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};

use nix::ifaddrs::getifaddrs;

/// First private (RFC 1918) IPv4 address bound to any local interface.
pub fn local_ipaddress() -> Option<Ipv4Addr> {
    let addrs = match getifaddrs() {
        Ok(addrs) => addrs,
        Err(_) => return None,
    };
    addrs
        .filter_map(|ifaddr| ifaddr.address)
        .filter_map(|addr| addr.as_sockaddr_in().map(|sin| *SocketAddrV4::from(*sin).ip()))
        .find(|ip| ip.is_private())
}

/// Bind/target host when none is configured: [`local_ipaddress`], else loopback.
pub fn default_host() -> IpAddr {
    match local_ipaddress() {
        Some(ip) => IpAddr::V4(ip),
        None => {
            tracing::warn!("no private IPv4 address found, using 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
