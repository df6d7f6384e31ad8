//! Best-effort recovery of the UDP four-tuple from a captured ethernet frame.
//!
//! The frame is assumed to be Ethernet II carrying IPv4 carrying UDP. Nothing
//! in the default mode checks that assumption: the values are display data for
//! the operator, not a statement about what the packet really is.

use chrono::DateTime;
use chrono::Local;
use std::fmt;
use std::net::Ipv4Addr;
use std::net::SocketAddrV4;

/// Destination MAC (6) + source MAC (6) + EtherType (2).
pub const ETHPKT_HEADER_LEN: usize = 14;
pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

const ETHERTYPE_IPV4: u16 = 0x0800;
const IP_PROTO_UDP: u8 = 17;

/// How much the parser trusts the frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolCheck {
    /// Parse every frame as Ethernet/IPv4/UDP without looking at the type fields.
    #[default]
    Permissive,
    /// Skip frames whose EtherType, IP version or IP protocol is not IPv4/UDP.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSummary {
    pub src: SocketAddrV4,
    pub dst: SocketAddrV4,
    pub ts_sec: u32,
    pub ts_usec: u32,
}

impl EndpointSummary {
    /// Capture time rendered in the local timezone.
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        DateTime::from_timestamp(self.ts_sec as i64, self.ts_usec * 1000)
            .map(|utc| utc.with_timezone(&Local))
    }
}

impl fmt::Display for EndpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let clock = match self.local_time() {
            Some(t) => t.format("%H:%M:%S").to_string(),
            None => String::from("??:??:??"),
        };
        write!(
            f,
            "{} -> {} [{}.{:06}]",
            self.src, self.dst, clock, self.ts_usec
        )
    }
}

fn read_u16(frame: &[u8], offset: usize) -> Option<u16> {
    let b = frame.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn read_ipv4(frame: &[u8], offset: usize) -> Option<Ipv4Addr> {
    let b = frame.get(offset..offset + 4)?;
    Some(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
}

/// Walk Ethernet -> IPv4 -> UDP and return the endpoints.
///
/// Only the first `captured_len` bytes of `frame` are considered. Returns
/// `None` whenever a header the walk needs lies past that bound.
pub fn parse_endpoint(
    frame: &[u8],
    captured_len: usize,
    ts_sec: u32,
    ts_usec: u32,
    check: ProtocolCheck,
) -> Option<EndpointSummary> {
    let frame = &frame[..captured_len.min(frame.len())];
    if frame.len() < ETHPKT_HEADER_LEN {
        return None;
    }
    let ip = &frame[ETHPKT_HEADER_LEN..];
    let ver_ihl = *ip.first()?;
    // header length must be known before the udp header can be located
    let ip_len = ((ver_ihl & 0x0f) as usize) * 4;

    if check == ProtocolCheck::Strict {
        if read_u16(frame, 12)? != ETHERTYPE_IPV4
            || ver_ihl >> 4 != 4
            || ip_len < IPV4_MIN_HEADER_LEN
            || *ip.get(9)? != IP_PROTO_UDP
        {
            return None;
        }
    }

    // addresses live in the fixed part of the header, even when ihl is bogus
    let src_ip = read_ipv4(ip, 12)?;
    let dst_ip = read_ipv4(ip, 16)?;
    let udp = ip.get(ip_len..ip_len + UDP_HEADER_LEN)?;
    let sport = u16::from_be_bytes([udp[0], udp[1]]);
    let dport = u16::from_be_bytes([udp[2], udp[3]]);

    Some(EndpointSummary {
        src: SocketAddrV4::new(src_ip, sport),
        dst: SocketAddrV4::new(dst_ip, dport),
        ts_sec,
        ts_usec,
    })
}
