use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::packet::EchoRequest;
use crate::probe::{Probe, Target, reverse_lookup};
use crate::report::{emit, reply_line, trace_summary_line, unresolved_hop_line};
use crate::transport::{Attempt, ProbeResult, ReplyFilter, Transport};

/// One TTL worth of probing.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub ttl: u8,
    /// Attempts spent on this hop, including the one that got an answer.
    pub attempts: u8,
    /// `None` when every attempt timed out.
    pub result: Option<ProbeResult>,
    pub hostname: Option<String>,
}

impl Hop {
    pub fn reached_destination(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.reached_destination)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSummary {
    pub hops: Vec<Hop>,
    pub reached: bool,
}

/// Hop discovery: TTL 1, 2, ... up to `max_hops`, each hop retried up to
/// `attempts` times until someone answers.
pub struct Traceroute<T: Transport> {
    transport: T,
    config: Config,
    running: Arc<AtomicBool>,
}

impl<T: Transport> Traceroute<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stops before the next hop once `running` is cleared.
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn probe_hop(&mut self, attempt: &Attempt, ttl: u8) -> Result<Hop> {
        let mut hop = Hop { ttl, attempts: 0, result: None, hostname: None };

        while hop.attempts < self.config.attempts {
            hop.attempts += 1;
            if let Some(result) = self.transport.probe(attempt)? {
                hop.result = Some(result);
                break;
            }
            debug!("ttl {}: attempt {} timed out", ttl, hop.attempts);
        }

        if self.config.resolve_hops {
            hop.hostname = hop.result.as_ref().and_then(|r| reverse_lookup(r.source));
        }
        Ok(hop)
    }
}

impl<T: Transport> Probe for Traceroute<T> {
    type Summary = TraceSummary;

    fn run(&mut self, target: &Target, out: &mut dyn Write) -> Result<TraceSummary> {
        emit(out, format!("Traceroute to: {}...", target.hostname))?;

        let mut summary = TraceSummary::default();
        for ttl in 1..=self.config.max_hops {
            if !self.running.load(Ordering::SeqCst) {
                debug!("traceroute interrupted before ttl {}", ttl);
                break;
            }

            let attempt = Attempt {
                destination: target.addr,
                request: EchoRequest::new(self.config.identifier, self.config.sequence),
                ttl: Some(ttl as u32),
                timeout: self.config.timeout,
                filter: ReplyFilter::Hop {
                    identifier: self.config.identifier,
                    destination: target.addr,
                },
            };
            let hop = self.probe_hop(&attempt, ttl)?;

            match &hop.result {
                Some(result) => emit(
                    out,
                    reply_line(
                        result.total_length,
                        result.source,
                        hop.hostname.as_deref(),
                        ttl,
                        result.round_trip_ms(),
                    ),
                )?,
                None => emit(out, unresolved_hop_line(ttl))?,
            }

            let reached = hop.reached_destination();
            summary.hops.push(hop);
            if reached {
                summary.reached = true;
                break;
            }
        }

        info!("traceroute to {} finished", target.addr);
        emit(out, trace_summary_line(summary.hops.len(), summary.reached))?;
        Ok(summary)
    }
}
