use std::time::Duration;

use clap::ValueEnum;

use crate::cli::{PingArgs, TraceArgs};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);
pub const DEFAULT_MAX_HOPS: u8 = 30;
pub const DEFAULT_ATTEMPTS: u8 = 3;

/// Probe protocol requested on the command line. Only ICMP is implemented;
/// `Udp` is accepted and falls back to ICMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Protocol {
    #[default]
    Icmp,
    Udp,
}

/// ICMP identifier for this process: the PID, masked to 16 bits.
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

/// Runtime configuration shared by both engines
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Echo identifier used to recognise our replies
    pub identifier: u16,
    /// Echo sequence number (constant for every request)
    pub sequence: u16,
    /// Bounded wait for each attempt
    pub timeout: Duration,
    /// Echo requests sent by ping
    pub count: u64,
    /// Pause between ping requests
    pub interval: Duration,
    /// Highest TTL traceroute tries
    pub max_hops: u8,
    /// Attempts per hop before it is reported as unresolved
    pub attempts: u8,
    /// Reverse-resolve hop addresses
    pub resolve_hops: bool,
    pub protocol: Protocol,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier: process_identifier(),
            sequence: 1,
            timeout: DEFAULT_TIMEOUT,
            count: 1,
            interval: Duration::from_secs(1),
            max_hops: DEFAULT_MAX_HOPS,
            attempts: DEFAULT_ATTEMPTS,
            resolve_hops: false,
            protocol: Protocol::Icmp,
        }
    }
}

impl From<&PingArgs> for Config {
    fn from(args: &PingArgs) -> Self {
        Self {
            count: args.count,
            timeout: Duration::from_secs_f64(args.timeout),
            interval: Duration::from_secs_f64(args.interval),
            ..Self::default()
        }
    }
}

impl From<&TraceArgs> for Config {
    fn from(args: &TraceArgs) -> Self {
        Self {
            timeout: Duration::from_secs_f64(args.timeout),
            max_hops: args.max_hops,
            attempts: args.attempts,
            resolve_hops: args.resolve,
            protocol: args.protocol,
            ..Self::default()
        }
    }
}
