//! Datalink decoding for captured frames.
//!
//! Live interfaces hand us Ethernet frames, but tunnels and loopback devices (and pcap files
//! recorded on them) carry raw IP packets or a 4-byte NULL header, so every frame is tried
//! against those layouts in turn.
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;

const ETHERNET_HEADER_LEN: usize = 14;
const NULL_HEADER_LEN: usize = 4;

/// IP layer located inside a captured frame.
#[derive(Debug)]
pub enum IpPacket<'a> {
    Ipv4(Ipv4Packet<'a>),
    Ipv6(Ipv6Packet<'a>),
    None,
}

/// Locate the IP layer of a frame, trying Ethernet, raw IP and NULL datalink layouts.
pub fn parse_packet(frame: &[u8]) -> IpPacket<'_> {
    ethernet(frame)
        .or_else(|| raw_ip(frame))
        .or_else(|| null_datalink(frame))
        .unwrap_or(IpPacket::None)
}

fn ethernet(frame: &[u8]) -> Option<IpPacket<'_>> {
    let ethernet = EthernetPacket::new(frame)?;
    let payload = frame.get(ETHERNET_HEADER_LEN..)?;
    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 if version_nibble(payload) == Some(4) => {
            Ipv4Packet::new(payload).map(IpPacket::Ipv4)
        }
        EtherTypes::Ipv6 if version_nibble(payload) == Some(6) => {
            Ipv6Packet::new(payload).map(IpPacket::Ipv6)
        }
        _ => None,
    }
}

fn raw_ip(frame: &[u8]) -> Option<IpPacket<'_>> {
    match version_nibble(frame)? {
        4 if frame.len() >= 20 => Ipv4Packet::new(frame).map(IpPacket::Ipv4),
        6 if frame.len() >= 40 => Ipv6Packet::new(frame).map(IpPacket::Ipv6),
        _ => None,
    }
}

/// BSD loopback: 4-byte address family in host order (2 = AF_INET, 24/28/30 = AF_INET6).
fn null_datalink(frame: &[u8]) -> Option<IpPacket<'_>> {
    let family = frame.get(..NULL_HEADER_LEN)?;
    if !matches!(family[0], 2 | 24 | 28 | 30) || family[1..] != [0, 0, 0] {
        return None;
    }
    raw_ip(&frame[NULL_HEADER_LEN..])
}

fn version_nibble(packet: &[u8]) -> Option<u8> {
    packet.first().map(|b| b >> 4)
}
