use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};

use log::info;

use crate::error::{Error, Result};

/// A host as the user named it, plus the IPv4 address it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub addr: Ipv4Addr,
}

impl Target {
    pub fn new(hostname: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self { hostname: hostname.into(), addr }
    }
}

/// Resolves `hostname` once through the platform resolver, keeping the
/// first IPv4 address. Literal addresses skip the lookup.
pub fn resolve(hostname: &str) -> Result<Target> {
    if let Ok(addr) = hostname.parse::<Ipv4Addr>() {
        return Ok(Target::new(hostname, addr));
    }

    let addrs = dns_lookup::lookup_host(hostname).map_err(|e| Error::Resolution {
        host: hostname.to_string(),
        reason: e.to_string(),
    })?;

    let addr = addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::NoIpv4Address { host: hostname.to_string() })?;

    info!("resolved {} to {}", hostname, addr);
    Ok(Target::new(hostname, addr))
}

/// Reverse lookup used for traceroute hops; `None` when the address has
/// no name or the lookup fails.
pub fn reverse_lookup(addr: Ipv4Addr) -> Option<String> {
    let ip = IpAddr::V4(addr);
    match dns_lookup::lookup_addr(&ip) {
        Ok(name) if name != ip.to_string() => Some(name),
        _ => None,
    }
}

/// Common capability of the ping and traceroute engines.
pub trait Probe {
    type Summary;

    /// Runs against an already resolved target, writing the console
    /// report to `out`.
    fn run(&mut self, target: &Target, out: &mut dyn Write) -> Result<Self::Summary>;
}

/// Resolves `hostname` and runs `probe` against it.
pub fn run_host<P: Probe>(probe: &mut P, hostname: &str, out: &mut dyn Write) -> Result<P::Summary> {
    let target = resolve(hostname)?;
    probe.run(&target, out)
}
