use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

use crate::config::{DEFAULT_ATTEMPTS, DEFAULT_MAX_HOPS, Protocol};

/// ICMP ping and traceroute over raw sockets
#[derive(Parser, Debug)]
#[command(name = "icmprobe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send echo requests to a host
    #[command(visible_alias = "p")]
    Ping(PingArgs),
    /// Discover the hops towards a host
    #[command(visible_alias = "t")]
    Traceroute(TraceArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PingArgs {
    /// Host to ping (hostname or IPv4 address)
    pub hostname: String,

    /// Number of echo requests to send
    #[arg(short = 'c', long = "count", default_value_t = 1)]
    pub count: u64,

    /// Seconds to wait for each reply
    #[arg(short = 't', long = "timeout", default_value_t = 4.0)]
    pub timeout: f64,

    /// Seconds between echo requests
    #[arg(short = 'i', long = "interval", default_value_t = 1.0)]
    pub interval: f64,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TraceArgs {
    /// Host to trace (hostname or IPv4 address)
    pub hostname: String,

    /// Seconds to wait for each reply
    #[arg(short = 't', long = "timeout", default_value_t = 4.0)]
    pub timeout: f64,

    /// Probe protocol (only icmp is implemented)
    #[arg(short = 'p', long = "protocol", value_enum, ignore_case = true, default_value_t = Protocol::Icmp)]
    pub protocol: Protocol,

    /// Maximum TTL
    #[arg(short = 'm', long = "max-hops", default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: u8,

    /// Attempts per hop
    #[arg(short = 'q', long = "attempts", default_value_t = DEFAULT_ATTEMPTS)]
    pub attempts: u8,

    /// Reverse-resolve hop addresses
    #[arg(short = 'r', long = "resolve")]
    pub resolve: bool,
}

impl Args {
    pub fn hostname(&self) -> &str {
        match &self.command {
            Command::Ping(args) => &args.hostname,
            Command::Traceroute(args) => &args.hostname,
        }
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Ping(args) => {
                check_timeout(args.timeout)?;
                if args.count == 0 {
                    return Err("Count must be at least 1".into());
                }
                if !args.interval.is_finite() || args.interval < 0.0 {
                    return Err("Interval must not be negative".into());
                }
                if args.interval > MAX_SECONDS {
                    return Err(format!("Interval cannot exceed {} seconds", MAX_SECONDS));
                }
            }
            Command::Traceroute(args) => {
                check_timeout(args.timeout)?;
                if args.attempts == 0 {
                    return Err("Attempts must be at least 1".into());
                }
                const MAX_SAFE_HOPS: u8 = 64;
                if args.max_hops == 0 || args.max_hops > MAX_SAFE_HOPS {
                    return Err(format!("Max hops must be between 1 and {}", MAX_SAFE_HOPS));
                }
            }
        }
        Ok(())
    }
}

/// Upper bound for timeout and interval (one day); larger values overflow
/// `Duration`/`Instant` arithmetic.
const MAX_SECONDS: f64 = 86_400.0;

fn check_timeout(timeout: f64) -> Result<(), String> {
    if !timeout.is_finite() || timeout <= 0.0 {
        return Err("Timeout must be positive".into());
    }
    if timeout > MAX_SECONDS {
        return Err(format!("Timeout cannot exceed {} seconds", MAX_SECONDS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn ping_defaults() {
        let args = parse(&["icmprobe", "ping", "example.com"]);
        let Command::Ping(ping) = &args.command else {
            panic!("expected ping");
        };
        assert_eq!(ping.hostname, "example.com");
        assert_eq!(ping.count, 1);
        assert_eq!(ping.timeout, 4.0);
        assert_eq!(args.verbose, 0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn traceroute_alias_and_options() {
        let args = parse(&["icmprobe", "-vv", "t", "example.com", "-t", "2", "-p", "UDP", "-m", "10"]);
        let Command::Traceroute(trace) = &args.command else {
            panic!("expected traceroute");
        };
        assert_eq!(trace.protocol, Protocol::Udp);
        assert_eq!(trace.timeout, 2.0);
        assert_eq!(trace.max_hops, 10);
        assert_eq!(trace.attempts, 3);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.hostname(), "example.com");
    }

    #[test]
    fn rejects_unknown_protocol() {
        assert!(Args::try_parse_from(["icmprobe", "traceroute", "h", "-p", "tcp"]).is_err());
    }

    #[test]
    fn validation() {
        assert!(parse(&["icmprobe", "p", "h", "-t", "0"]).validate().is_err());
        assert!(parse(&["icmprobe", "p", "h", "-c", "0"]).validate().is_err());
        assert!(parse(&["icmprobe", "t", "h", "-q", "0"]).validate().is_err());
        assert!(parse(&["icmprobe", "t", "h", "-m", "65"]).validate().is_err());
        assert!(parse(&["icmprobe", "t", "h", "-m", "64"]).validate().is_ok());
    }

    #[test]
    fn huge_durations_are_rejected() {
        assert!(parse(&["icmprobe", "p", "h", "-t", "1e30"]).validate().is_err());
        assert!(parse(&["icmprobe", "p", "h", "-i", "1e30"]).validate().is_err());
        assert!(parse(&["icmprobe", "t", "h", "-t", "1e30"]).validate().is_err());
        assert!(parse(&["icmprobe", "p", "h", "-t", "86400", "-i", "86400"]).validate().is_ok());
    }
}
