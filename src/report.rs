//! Console lines shared by ping and traceroute. Field order and units are
//! stable so the output can be scraped.

use std::fmt::Display;
use std::io::Write;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// `"<bytes> bytes from <addr> (<hostname>): ttl=<ttl> time=<ms> ms"`; the
/// parenthesised name is left out when there is none.
pub fn reply_line(bytes: u16, addr: Ipv4Addr, hostname: Option<&str>, ttl: u8, time_ms: f64) -> String {
    match hostname {
        Some(name) => format!(
            "{} bytes from {} ({}): ttl={} time={:.2} ms",
            bytes, addr, name, ttl, time_ms
        ),
        None => format!("{} bytes from {}: ttl={} time={:.2} ms", bytes, addr, ttl, time_ms),
    }
}

/// Line for a traceroute hop nobody answered.
pub fn unresolved_hop_line(ttl: u8) -> String {
    format!("ttl={} * * *", ttl)
}

pub fn loss_line(loss_percent: f64) -> String {
    format!("{:.2}% packet loss", loss_percent)
}

pub fn rtt_line(min_ms: f64, avg_ms: f64, max_ms: f64) -> String {
    format!("rtt min/avg/max = {:.2}/{:.2}/{:.2} ms", min_ms, avg_ms, max_ms)
}

/// Closing line of a traceroute.
pub fn trace_summary_line(hops: usize, reached: bool) -> String {
    if reached {
        format!("destination reached in {} hops", hops)
    } else {
        format!("destination not reached after {} hops", hops)
    }
}

/// Writes one line to the report sink.
pub fn emit(out: &mut dyn Write, line: impl Display) -> Result<()> {
    writeln!(out, "{}", line).map_err(Error::Output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_with_hostname() {
        let line = reply_line(84, Ipv4Addr::new(93, 184, 216, 34), Some("example.com"), 56, 12.3456);
        assert_eq!(line, "84 bytes from 93.184.216.34 (example.com): ttl=56 time=12.35 ms");
    }

    #[test]
    fn reply_without_hostname() {
        let line = reply_line(56, Ipv4Addr::new(10, 0, 0, 1), None, 3, 0.5);
        assert_eq!(line, "56 bytes from 10.0.0.1: ttl=3 time=0.50 ms");
    }

    #[test]
    fn loss_and_rtt() {
        assert_eq!(loss_line(100.0), "100.00% packet loss");
        assert_eq!(loss_line(100.0 / 3.0), "33.33% packet loss");
        assert_eq!(rtt_line(1.0, 2.5, 4.0), "rtt min/avg/max = 1.00/2.50/4.00 ms");
        // Sub-10µs loopback replies round to zero and are still reported.
        assert_eq!(rtt_line(0.0, 0.0, 0.0), "rtt min/avg/max = 0.00/0.00/0.00 ms");
    }

    #[test]
    fn trace_summary() {
        assert_eq!(trace_summary_line(3, true), "destination reached in 3 hops");
        assert_eq!(trace_summary_line(30, false), "destination not reached after 30 hops");
    }

    #[test]
    fn unresolved_hop() {
        assert_eq!(unresolved_hop_line(7), "ttl=7 * * *");
    }

    #[test]
    fn emit_appends_newline() {
        let mut out = Vec::new();
        emit(&mut out, "hello").unwrap();
        emit(&mut out, loss_line(0.0)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n0.00% packet loss\n");
    }
}
