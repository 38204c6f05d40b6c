//! ICMP echo ("ping") and hop discovery ("traceroute") over raw IPv4
//! sockets.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod packet;
pub mod ping;
pub mod probe;
pub mod report;
pub mod traceroute;
pub mod transport;

pub use error::{Error, Result};
pub use probe::{Probe, Target};
