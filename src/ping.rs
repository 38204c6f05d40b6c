use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::packet::EchoRequest;
use crate::probe::{Probe, Target};
use crate::report::{emit, loss_line, reply_line, rtt_line};
use crate::transport::{Attempt, ReplyFilter, Transport};

/// Outcome of a ping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingSummary {
    pub transmitted: u64,
    pub received: u64,
    /// Round-trip time of every reply, in milliseconds.
    pub rtts_ms: Vec<f64>,
}

impl PingSummary {
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        (self.transmitted - self.received) as f64 / self.transmitted as f64 * 100.0
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.rtts_ms.iter().copied().reduce(f64::min)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.rtts_ms.iter().copied().reduce(f64::max)
    }

    pub fn avg_ms(&self) -> Option<f64> {
        if self.rtts_ms.is_empty() {
            return None;
        }
        Some(self.rtts_ms.iter().sum::<f64>() / self.rtts_ms.len() as f64)
    }
}

/// Echo request loop: `count` requests, one bounded wait each.
pub struct Ping<T: Transport> {
    transport: T,
    config: Config,
    running: Arc<AtomicBool>,
}

impl<T: Transport> Ping<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stops the loop between requests once `running` is cleared.
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl<T: Transport> Probe for Ping<T> {
    type Summary = PingSummary;

    fn run(&mut self, target: &Target, out: &mut dyn Write) -> Result<PingSummary> {
        emit(out, format!("Ping to: {}...", target.hostname))?;

        let attempt = Attempt {
            destination: target.addr,
            request: EchoRequest::new(self.config.identifier, self.config.sequence),
            ttl: None,
            timeout: self.config.timeout,
            filter: ReplyFilter::Echo { identifier: self.config.identifier },
        };
        // Don't echo a literal address back as its own name.
        let display_name = (target.hostname != target.addr.to_string()).then_some(target.hostname.as_str());

        let mut summary = PingSummary::default();
        for n in 0..self.config.count {
            if n > 0 && !self.config.interval.is_zero() {
                std::thread::sleep(self.config.interval);
            }
            if !self.running() {
                debug!("ping interrupted after {} requests", summary.transmitted);
                break;
            }

            summary.transmitted += 1;
            match self.transport.probe(&attempt)? {
                Some(result) => {
                    let rtt_ms = result.round_trip_ms();
                    summary.received += 1;
                    summary.rtts_ms.push(rtt_ms);
                    emit(
                        out,
                        reply_line(result.total_length, result.source, display_name, result.ttl, rtt_ms),
                    )?;
                }
                None => {
                    info!("echo request {} to {} timed out", n + 1, target.addr);
                    emit(out, "Request timed out.")?;
                }
            }
        }

        emit(out, loss_line(summary.loss_percent()))?;
        if let (Some(min), Some(avg), Some(max)) = (summary.min_ms(), summary.avg_ms(), summary.max_ms()) {
            emit(out, rtt_line(min, avg, max))?;
        }

        Ok(summary)
    }
}
