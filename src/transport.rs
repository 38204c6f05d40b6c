//! Raw ICMP socket handling: one request out, one bounded wait for the
//! matching reply.
//!
//! Every attempt opens its own socket and drops it before returning, so
//! nothing is shared between pings or between traceroute hops.
//!
//! The wait is a true deadline: packets that do not match are discarded
//! and polling resumes with whatever is left of the timeout, never a fresh
//! one. A flood of unrelated ICMP traffic therefore cannot stretch a
//! probe past its timeout.

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use log::{debug, trace};
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};
use crate::packet::{EchoRequest, IcmpKind, Reply};

/// Receive buffer size. Larger datagrams are truncated by the kernel,
/// which is harmless since only the headers are read.
pub const RECV_BUF_LEN: usize = 1024;

/// A reply that satisfied the attempt's [`ReplyFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub round_trip: Duration,
    /// IPv4 total length of the reply.
    pub total_length: u16,
    /// TTL left in the reply's IPv4 header.
    pub ttl: u8,
    pub source: Ipv4Addr,
    /// The reply came from the probed host itself (Echo Reply).
    pub reached_destination: bool,
}

impl ProbeResult {
    pub fn round_trip_secs(&self) -> f64 {
        self.round_trip.as_secs_f64()
    }

    pub fn round_trip_ms(&self) -> f64 {
        self.round_trip.as_secs_f64() * 1000.0
    }
}

/// Decides whether an inbound packet is the one an attempt waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFilter {
    /// Ping: an Echo Reply carrying our identifier.
    Echo { identifier: u16 },
    /// Traceroute: our Echo Reply from the destination, or a Time Exceeded
    /// quoting our request on its way there.
    Hop { identifier: u16, destination: Ipv4Addr },
}

impl ReplyFilter {
    /// `Some(reached_destination)` when `reply` matches, `None` otherwise.
    pub fn accepts(&self, reply: &Reply) -> Option<bool> {
        match (*self, reply.kind()) {
            (ReplyFilter::Echo { identifier }, IcmpKind::EchoReply)
            | (ReplyFilter::Hop { identifier, .. }, IcmpKind::EchoReply)
                if reply.identifier == identifier =>
            {
                Some(true)
            }
            (ReplyFilter::Hop { identifier, destination }, IcmpKind::TimeExceeded) => {
                let quoted = reply.quoted?;
                (quoted.identifier == identifier && quoted.destination == destination)
                    .then_some(false)
            }
            _ => None,
        }
    }
}

/// Readiness and receive primitives [`await_reply`] needs from a socket.
pub trait Channel {
    /// Blocks until a datagram is readable or `timeout` elapses.
    /// Returns `false` on timeout.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Waits up to `timeout` for a packet accepted by `filter`.
///
/// `Ok(None)` means the deadline passed without a match. Packets that fail
/// to decode or do not match are dropped and the wait goes on.
pub fn await_reply<C: Channel>(
    chan: &mut C,
    filter: &ReplyFilter,
    timeout: Duration,
    sent_at: Instant,
) -> Result<Option<ProbeResult>> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; RECV_BUF_LEN];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !chan.wait_readable(remaining)? {
            return Ok(None);
        }

        let received_at = Instant::now();
        let n = match chan.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let reply = match Reply::decode(&buf[..n]) {
            Ok(reply) => reply,
            Err(e) => {
                debug!("dropping undecodable packet: {}", e);
                continue;
            }
        };

        match filter.accepts(&reply) {
            Some(reached_destination) => {
                return Ok(Some(ProbeResult {
                    round_trip: received_at.saturating_duration_since(sent_at),
                    total_length: reply.total_length,
                    ttl: reply.ttl,
                    source: reply.source,
                    reached_destination,
                }));
            }
            None => trace!(
                "ignoring ICMP type {} code {} from {} (id {})",
                reply.icmp_type, reply.code, reply.source, reply.identifier
            ),
        }
    }
}

/// Everything needed for one send/receive attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub destination: Ipv4Addr,
    pub request: EchoRequest,
    /// Outgoing IP TTL; `None` keeps the OS default.
    pub ttl: Option<u32>,
    pub timeout: Duration,
    pub filter: ReplyFilter,
}

/// Where the engines send their probes.
pub trait Transport {
    /// Performs one attempt. `Ok(None)` is a timeout.
    fn probe(&mut self, attempt: &Attempt) -> Result<Option<ProbeResult>>;
}

/// A raw `AF_INET`/`SOCK_RAW`/`IPPROTO_ICMP` socket.
pub struct IcmpSocket {
    socket: Socket,
}

impl IcmpSocket {
    pub fn open(ttl: Option<u32>) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(Error::socket_open)?;
        if let Some(ttl) = ttl {
            socket.set_ttl_v4(ttl)?;
        }
        debug!("opened raw ICMP socket fd={} ttl={:?}", socket.as_raw_fd(), ttl);
        Ok(Self { socket })
    }

    /// Sends `request` and returns the instant the send call came back.
    pub fn send_probe(&self, destination: Ipv4Addr, request: &EchoRequest) -> Result<Instant> {
        let pkt = request.encode();

        // ICMP has no ports
        let dst = SocketAddr::new(IpAddr::V4(destination), 0);
        self.socket.send_to(&pkt, &dst.into())?;

        Ok(Instant::now())
    }
}

impl Channel for IcmpSocket {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // Round up so a sub-millisecond remainder still waits.
            let millis = remaining.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128);

            let mut pfd = libc::pollfd {
                fd: self.socket.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: `pfd` is a valid pollfd and we pass a count of 1.
            let rc = unsafe { libc::poll(&mut pfd, 1, millis as libc::c_int) };
            match rc {
                0 => return Ok(false),
                n if n > 0 => return Ok(true),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                    if remaining.is_zero() {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }
}

/// [`Transport`] over real raw sockets, one socket per attempt.
#[derive(Debug, Default)]
pub struct RawIcmpTransport;

impl RawIcmpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for RawIcmpTransport {
    fn probe(&mut self, attempt: &Attempt) -> Result<Option<ProbeResult>> {
        let mut socket = IcmpSocket::open(attempt.ttl)?;
        let sent_at = socket.send_probe(attempt.destination, &attempt.request)?;
        // `socket` is dropped (closed) on every return path below.
        await_reply(&mut socket, &attempt.filter, attempt.timeout, sent_at)
    }
}
