use crate::error::TrackmeError;
use crate::packet_parser::{parse_packet, IpPacket};
use crate::tcp::{IpDetails, TcpDetails, TcpIpRecord, TcpOption};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::{
    ipv4::{Ipv4Flags, Ipv4Packet},
    ipv6::Ipv6Packet,
    tcp::{TcpFlags, TcpOptionNumbers::*, TcpOptionPacket, TcpPacket},
    Packet,
};

/// Decode a captured frame and keep it only if it is an ACK towards `dst_port`.
///
/// `Err` means the frame could not be decoded down to TCP; `Ok(None)` means it decoded but
/// did not match the capture filter.
pub fn process_packet(frame: &[u8], dst_port: u16) -> Result<Option<TcpIpRecord>, TrackmeError> {
    match parse_packet(frame) {
        IpPacket::Ipv4(ipv4) => process_tcp_ipv4(&ipv4, frame.len(), dst_port),
        IpPacket::Ipv6(ipv6) => process_tcp_ipv6(&ipv6, frame.len(), dst_port),
        IpPacket::None => Err(TrackmeError::UnexpectedPackage("no IP layer".to_string())),
    }
}

pub fn process_tcp_ipv4(
    packet: &Ipv4Packet,
    cap_length: usize,
    dst_port: u16,
) -> Result<Option<TcpIpRecord>, TrackmeError> {
    if packet.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return Err(TrackmeError::UnsupportedProtocol("IPv4".to_string()));
    }

    if packet.get_fragment_offset() > 0
        || (packet.get_flags() & Ipv4Flags::MoreFragments) == Ipv4Flags::MoreFragments
    {
        return Err(TrackmeError::UnexpectedPackage("IPv4 fragment".to_string()));
    }

    let ip = IpDetails::V4 {
        src_ip: packet.get_source(),
        dst_ip: packet.get_destination(),
        ttl: packet.get_ttl(),
        id: packet.get_identification(),
        tos: (packet.get_dscp() << 2) | packet.get_ecn(),
    };

    TcpPacket::new(packet.payload())
        .ok_or_else(|| TrackmeError::UnexpectedPackage("TCP packet too short".to_string()))
        .map(|tcp| visit_tcp(&tcp, ip, cap_length, dst_port))
}

pub fn process_tcp_ipv6(
    packet: &Ipv6Packet,
    cap_length: usize,
    dst_port: u16,
) -> Result<Option<TcpIpRecord>, TrackmeError> {
    if packet.get_next_header() != IpNextHeaderProtocols::Tcp {
        return Err(TrackmeError::UnsupportedProtocol("IPv6".to_string()));
    }

    let ip = IpDetails::V6 {
        src_ip: packet.get_source(),
        dst_ip: packet.get_destination(),
        hop_limit: packet.get_hop_limit(),
        traffic_class: packet.get_traffic_class(),
        flow_label: packet.get_flow_label(),
    };

    TcpPacket::new(packet.payload())
        .ok_or_else(|| TrackmeError::UnexpectedPackage("TCP packet too short".to_string()))
        .map(|tcp| visit_tcp(&tcp, ip, cap_length, dst_port))
}

fn visit_tcp(
    tcp: &TcpPacket,
    ip: IpDetails,
    cap_length: usize,
    dst_port: u16,
) -> Option<TcpIpRecord> {
    let flags: u8 = tcp.get_flags();
    if flags & TcpFlags::ACK == 0 || tcp.get_destination() != dst_port {
        return None;
    }

    let details = TcpDetails::new(
        tcp.get_sequence(),
        tcp.get_acknowledgement(),
        tcp.get_checksum(),
        tcp.get_window(),
        flags,
        parse_tcp_options(tcp.get_options_raw()),
    );

    Some(TcpIpRecord {
        cap_length,
        src_port: tcp.get_source(),
        dst_port: tcp.get_destination(),
        ip,
        tcp: details,
    })
}

/// Decode the options area in wire order.
///
/// Decoding stops at EOL or at the first option whose declared length does not fit the
/// remaining bytes; options already decoded are kept.
pub fn parse_tcp_options(raw: &[u8]) -> Vec<TcpOption> {
    let mut buf = raw;
    let mut options = vec![];

    while let Some(&kind) = buf.first() {
        let size = match kind {
            0 | 1 => 1,
            _ => match buf.get(1) {
                Some(&len) if len >= 2 && usize::from(len) <= buf.len() => usize::from(len),
                _ => break,
            },
        };

        let Some(opt) = TcpOptionPacket::new(&buf[..size]) else {
            break;
        };
        buf = &buf[size..];
        let data: &[u8] = opt.payload();

        match opt.get_number() {
            EOL => {
                options.push(TcpOption::Eol);
                break;
            }
            NOP => options.push(TcpOption::Nop),
            MSS => match data {
                [hi, lo, ..] => options.push(TcpOption::Mss(u16::from_be_bytes([*hi, *lo]))),
                _ => break,
            },
            WSCALE => match data.first() {
                Some(shift) => options.push(TcpOption::WindowScale(*shift)),
                None => break,
            },
            SACK_PERMITTED => options.push(TcpOption::SackPermitted),
            SACK => options.push(TcpOption::Sack),
            TIMESTAMPS => {
                if data.len() < 8 {
                    break;
                }
                options.push(TcpOption::Timestamps {
                    value: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    echo: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                });
            }
            other => options.push(TcpOption::Unknown(other.0)),
        }
    }

    options
}
