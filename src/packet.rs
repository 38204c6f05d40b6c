//! ICMPv4 wire format (RFC 792) on top of the IPv4 header (RFC 791).
//!
//! Outbound we only ever build Echo Requests. Inbound, a raw ICMP socket
//! hands us the whole IP datagram, so [`Reply::decode`] walks the IPv4
//! header first and then the ICMP header behind it.

use std::fmt;
use std::net::Ipv4Addr;

use crate::checksum::checksum;

/// ICMP type of an Echo Request.
pub const ECHO_REQUEST: u8 = 8;
/// ICMP type of an Echo Reply.
pub const ECHO_REPLY: u8 = 0;
/// ICMP type of Destination Unreachable.
pub const DESTINATION_UNREACHABLE: u8 = 3;
/// ICMP type of Time Exceeded.
pub const TIME_EXCEEDED: u8 = 11;

/// Size of an ICMP header (and of our echo requests, which carry no payload).
pub const ICMP_HEADER_LEN: usize = 8;
/// Size of an IPv4 header without options.
pub const IPV4_HEADER_LEN: usize = 20;
/// Smallest buffer [`Reply::decode`] accepts.
pub const MIN_REPLY_LEN: usize = IPV4_HEADER_LEN + ICMP_HEADER_LEN;

const IPPROTO_ICMP: u8 = 1;

/// ICMP message types this crate tells apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl From<u8> for IcmpKind {
    fn from(value: u8) -> Self {
        match value {
            ECHO_REPLY => IcmpKind::EchoReply,
            DESTINATION_UNREACHABLE => IcmpKind::DestinationUnreachable,
            ECHO_REQUEST => IcmpKind::EchoRequest,
            TIME_EXCEEDED => IcmpKind::TimeExceeded,
            other => IcmpKind::Other(other),
        }
    }
}

/// Echo Request header (type 8, code 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoRequest {
    pub identifier: u16,
    pub sequence: u16,
}

impl EchoRequest {
    pub fn new(identifier: u16, sequence: u16) -> Self {
        Self { identifier, sequence }
    }

    /// Serializes the header with its checksum filled in.
    pub fn encode(&self) -> [u8; ICMP_HEADER_LEN] {
        let mut pkt = [0u8; ICMP_HEADER_LEN];

        // Type, code, checksum placeholder
        pkt[0] = ECHO_REQUEST;
        pkt[1] = 0;

        pkt[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        pkt[6..8].copy_from_slice(&self.sequence.to_be_bytes());

        let csum = checksum(&pkt);
        pkt[2..4].copy_from_slice(&csum.to_be_bytes());

        pkt
    }
}

/// Why an inbound buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Truncated { len: usize, needed: usize },
    NotIpv4 { version: u8 },
    BadHeaderLength { ihl: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Truncated { len, needed } => {
                write!(f, "packet too short: {} bytes, need {}", len, needed)
            }
            DecodeError::NotIpv4 { version } => write!(f, "not an IPv4 packet (version {})", version),
            DecodeError::BadHeaderLength { ihl } => write!(f, "invalid IPv4 header length {}", ihl),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Echo Request quoted back inside an ICMP error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedEcho {
    pub destination: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
}

/// An inbound IPv4 + ICMP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// IPv4 total length field.
    pub total_length: u16,
    pub ttl: u8,
    pub source: Ipv4Addr,
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: i16,
    /// Our original request, when this is an ICMP error that quotes one.
    pub quoted: Option<QuotedEcho>,
}

impl Reply {
    pub fn decode(buf: &[u8]) -> Result<Reply, DecodeError> {
        if buf.len() < MIN_REPLY_LEN {
            return Err(DecodeError::Truncated { len: buf.len(), needed: MIN_REPLY_LEN });
        }

        let version = buf[0] >> 4;
        if version != 4 {
            return Err(DecodeError::NotIpv4 { version });
        }
        let ihl = buf[0] & 0x0F;
        let header_len = ihl as usize * 4;
        if header_len < IPV4_HEADER_LEN {
            return Err(DecodeError::BadHeaderLength { ihl });
        }
        if buf.len() < header_len + ICMP_HEADER_LEN {
            return Err(DecodeError::Truncated {
                len: buf.len(),
                needed: header_len + ICMP_HEADER_LEN,
            });
        }

        let icmp = &buf[header_len..];
        let icmp_type = icmp[0];
        let quoted = match IcmpKind::from(icmp_type) {
            IcmpKind::TimeExceeded | IcmpKind::DestinationUnreachable => {
                quoted_echo(&icmp[ICMP_HEADER_LEN..])
            }
            _ => None,
        };

        Ok(Reply {
            total_length: u16::from_be_bytes([buf[2], buf[3]]),
            ttl: buf[8],
            source: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            icmp_type,
            code: icmp[1],
            checksum: u16::from_be_bytes([icmp[2], icmp[3]]),
            identifier: u16::from_be_bytes([icmp[4], icmp[5]]),
            sequence: i16::from_be_bytes([icmp[6], icmp[7]]),
            quoted,
        })
    }

    pub fn kind(&self) -> IcmpKind {
        IcmpKind::from(self.icmp_type)
    }
}

/// Parses the original datagram an ICMP error carries (IP header + first
/// 8 bytes), keeping it only if it was an Echo Request.
fn quoted_echo(inner: &[u8]) -> Option<QuotedEcho> {
    if inner.len() < IPV4_HEADER_LEN || inner[0] >> 4 != 4 {
        return None;
    }
    let header_len = (inner[0] & 0x0F) as usize * 4;
    if header_len < IPV4_HEADER_LEN || inner[9] != IPPROTO_ICMP {
        return None;
    }
    let icmp = inner.get(header_len..header_len + ICMP_HEADER_LEN)?;
    if icmp[0] != ECHO_REQUEST {
        return None;
    }

    Some(QuotedEcho {
        destination: Ipv4Addr::new(inner[16], inner[17], inner[18], inner[19]),
        identifier: u16::from_be_bytes([icmp[4], icmp[5]]),
        sequence: u16::from_be_bytes([icmp[6], icmp[7]]),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::checksum::verify;

    /// Builds a minimal IPv4 header (no options) for tests.
    pub(crate) fn ipv4_header(total_length: u16, ttl: u8, src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
        let mut h = vec![0u8; IPV4_HEADER_LEN];
        h[0] = 0x45;
        h[2..4].copy_from_slice(&total_length.to_be_bytes());
        h[8] = ttl;
        h[9] = IPPROTO_ICMP;
        h[12..16].copy_from_slice(&src);
        h[16..20].copy_from_slice(&dst);
        h
    }

    pub(crate) fn echo_reply(src: [u8; 4], ttl: u8, identifier: u16, sequence: u16) -> Vec<u8> {
        let mut pkt = ipv4_header(28, ttl, src, [10, 0, 0, 1]);
        pkt.extend_from_slice(&[ECHO_REPLY, 0, 0, 0]);
        pkt.extend_from_slice(&identifier.to_be_bytes());
        pkt.extend_from_slice(&sequence.to_be_bytes());
        pkt
    }

    pub(crate) fn time_exceeded(src: [u8; 4], dst: [u8; 4], identifier: u16) -> Vec<u8> {
        let mut pkt = ipv4_header(56, 254, src, [10, 0, 0, 1]);
        pkt.extend_from_slice(&[TIME_EXCEEDED, 0, 0, 0, 0, 0, 0, 0]);
        pkt.extend_from_slice(&ipv4_header(28, 1, [10, 0, 0, 1], dst));
        pkt.extend_from_slice(&EchoRequest::new(identifier, 1).encode());
        pkt
    }

    #[test]
    fn encode_layout() {
        let pkt = EchoRequest::new(0x1234, 1).encode();
        assert_eq!(pkt[0], 8);
        assert_eq!(pkt[1], 0);
        assert_eq!(&pkt[4..6], &[0x12, 0x34]);
        assert_eq!(&pkt[6..8], &[0x00, 0x01]);
        assert_eq!(u16::from_be_bytes([pkt[2], pkt[3]]), 0xE5CA);
    }

    #[test]
    fn encoded_request_verifies() {
        for identifier in [0, 1, 0x00FF, 0xFF00, 0xFFFF] {
            let pkt = EchoRequest::new(identifier, 1).encode();
            assert!(verify(&pkt), "identifier {:#06x}", identifier);

            // Zero the checksum again and the recomputed one must match.
            let mut zeroed = pkt;
            zeroed[2] = 0;
            zeroed[3] = 0;
            assert_eq!(checksum(&zeroed).to_be_bytes(), [pkt[2], pkt[3]]);
        }
    }

    #[test]
    fn decode_echo_reply() {
        let buf = echo_reply([93, 184, 216, 34], 57, 0xBEEF, 1);
        let reply = Reply::decode(&buf).unwrap();

        assert_eq!(reply.kind(), IcmpKind::EchoReply);
        assert_eq!(reply.total_length, 28);
        assert_eq!(reply.ttl, 57);
        assert_eq!(reply.source, Ipv4Addr::new(93, 184, 216, 34));
        assert_eq!(reply.identifier, 0xBEEF);
        assert_eq!(reply.sequence, 1);
        assert_eq!(reply.quoted, None);
    }

    #[test]
    fn decode_signed_sequence() {
        let buf = echo_reply([127, 0, 0, 1], 64, 7, 0xFFFF);
        assert_eq!(Reply::decode(&buf).unwrap().sequence, -1);
    }

    #[test]
    fn decode_time_exceeded_quotes_request() {
        let buf = time_exceeded([192, 168, 1, 1], [8, 8, 8, 8], 0x4242);
        let reply = Reply::decode(&buf).unwrap();

        assert_eq!(reply.kind(), IcmpKind::TimeExceeded);
        assert_eq!(reply.source, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(
            reply.quoted,
            Some(QuotedEcho {
                destination: Ipv4Addr::new(8, 8, 8, 8),
                identifier: 0x4242,
                sequence: 1,
            })
        );
    }

    #[test]
    fn decode_time_exceeded_with_short_quote() {
        let mut buf = time_exceeded([192, 168, 1, 1], [8, 8, 8, 8], 0x4242);
        buf.truncate(MIN_REPLY_LEN + IPV4_HEADER_LEN + 4);
        let reply = Reply::decode(&buf).unwrap();
        assert_eq!(reply.kind(), IcmpKind::TimeExceeded);
        assert_eq!(reply.quoted, None);
    }

    #[test]
    fn decode_truncated_buffer() {
        let err = Reply::decode(&[0x45; 10]).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { len: 10, needed: MIN_REPLY_LEN });
    }

    #[test]
    fn decode_honours_ip_options() {
        let mut buf = echo_reply([127, 0, 0, 1], 64, 9, 1);
        buf[0] = 0x46;
        buf.splice(IPV4_HEADER_LEN..IPV4_HEADER_LEN, [1, 1, 1, 0]);
        let reply = Reply::decode(&buf).unwrap();
        assert_eq!(reply.identifier, 9);

        // Options push the ICMP header past the end.
        buf.truncate(30);
        assert_eq!(
            Reply::decode(&buf).unwrap_err(),
            DecodeError::Truncated { len: 30, needed: 32 }
        );
    }

    #[test]
    fn decode_rejects_other_versions() {
        let mut buf = echo_reply([127, 0, 0, 1], 64, 9, 1);
        buf[0] = 0x65;
        assert_eq!(Reply::decode(&buf).unwrap_err(), DecodeError::NotIpv4 { version: 6 });

        buf[0] = 0x44;
        assert_eq!(Reply::decode(&buf).unwrap_err(), DecodeError::BadHeaderLength { ihl: 4 });
    }
}
