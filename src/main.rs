// Ergonomic error handling
use anyhow::{Context, Result};

use clap::Parser;
use env_logger::Env;
use log::warn;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use icmprobe::cli::{Args, Command};
use icmprobe::config::{Config, Protocol};
use icmprobe::ping::Ping;
use icmprobe::probe::run_host;
use icmprobe::traceroute::Traceroute;
use icmprobe::transport::RawIcmpTransport;

/// Runs one ping or traceroute against a single host.
/// Raw ICMP sockets need root (or CAP_NET_RAW on Linux).
fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);
    args.validate().map_err(anyhow::Error::msg)?;

    // Ctrl+C stops between probes; the summary is still printed
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let hostname = args.hostname();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &args.command {
        Command::Ping(ping_args) => {
            let mut ping = Ping::new(RawIcmpTransport::new(), Config::from(ping_args)).with_stop_flag(running);
            run_host(&mut ping, hostname, &mut out).with_context(|| format!("ping {} failed", hostname))?;
        }
        Command::Traceroute(trace_args) => {
            let config = Config::from(trace_args);
            if config.protocol == Protocol::Udp {
                warn!("UDP probes are not implemented, tracing with ICMP");
            }
            let mut trace = Traceroute::new(RawIcmpTransport::new(), config).with_stop_flag(running);
            run_host(&mut trace, hostname, &mut out)
                .with_context(|| format!("traceroute {} failed", hostname))?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise each `-v` raises the level one step from `warn`.
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
