#![allow(dead_code)]

use std::net::Ipv4Addr;

pub const TCP_ACK: u8 = 0x10;
pub const TCP_SYN: u8 = 0x02;

fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn with_u16_len(body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

fn with_u8_len(body: &[u8]) -> Vec<u8> {
    let mut out = vec![body.len() as u8];
    out.extend_from_slice(body);
    out
}

/// `type || u16 length || body`
pub fn extension(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_be_bytes().to_vec();
    out.extend(with_u16_len(body));
    out
}

pub fn sni_extension(host: &str) -> Vec<u8> {
    let mut entry = vec![0x00];
    entry.extend(with_u16_len(host.as_bytes()));
    extension(0x0000, &with_u16_len(&entry))
}

pub fn alpn_extension(protocols: &[&str]) -> Vec<u8> {
    let list: Vec<u8> = protocols.iter().flat_map(|p| with_u8_len(p.as_bytes())).collect();
    extension(0x0010, &with_u16_len(&list))
}

/// Extension block of a Chrome-like ClientHello, GREASE first.
///
/// Order: GREASE, server_name, supported_groups, ec_point_formats, signature_algorithms, ALPN,
/// supported_versions, psk_key_exchange_modes, compress_certificate.
pub fn chrome_like_extensions() -> Vec<Vec<u8>> {
    vec![
        extension(0x0a0a, &[]),
        sni_extension("example.com"),
        extension(0x000a, &with_u16_len(&u16_bytes(&[0x2a2a, 0x001d, 0x0017, 0x0018]))),
        extension(0x000b, &with_u8_len(&[0x00])),
        extension(0x000d, &with_u16_len(&u16_bytes(&[0x0403, 0x0804, 0x0401]))),
        alpn_extension(&["h2", "http/1.1"]),
        extension(0x002b, &with_u8_len(&u16_bytes(&[0x3a3a, 0x0304, 0x0303]))),
        extension(0x002d, &with_u8_len(&[0x01])),
        extension(0x001b, &with_u8_len(&u16_bytes(&[0x0002]))),
    ]
}

pub const CHROME_LIKE_CIPHERS: [u16; 4] = [0x1a1a, 0x1301, 0x1302, 0xc02b];

/// Bare handshake message (`0x01 ...`).
pub fn client_hello_handshake(ciphers: &[u16], extensions: &[Vec<u8>]) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend((0u8..32).collect::<Vec<u8>>());
    body.extend(with_u8_len(&[0xab; 32]));
    body.extend(with_u16_len(&u16_bytes(ciphers)));
    body.extend(with_u8_len(&[0x00]));
    body.extend(with_u16_len(&extensions.concat()));

    let len = (body.len() as u32).to_be_bytes();
    let mut handshake = vec![0x01, len[1], len[2], len[3]];
    handshake.extend(body);
    handshake
}

/// Full TLS record (`0x16 0x03 0x01 ...`).
pub fn client_hello_record(ciphers: &[u16], extensions: &[Vec<u8>]) -> Vec<u8> {
    let handshake = client_hello_handshake(ciphers, extensions);
    let mut record = vec![0x16, 0x03, 0x01];
    record.extend(with_u16_len(&handshake));
    record
}

pub fn chrome_like_client_hello() -> Vec<u8> {
    client_hello_record(&CHROME_LIKE_CIPHERS, &chrome_like_extensions())
}

/// TCP header with `options` (padded with NOPs to a 4-byte boundary).
pub fn tcp_segment(src_port: u16, dst_port: u16, flags: u8, options: &[u8]) -> Vec<u8> {
    let mut options = options.to_vec();
    while options.len() % 4 != 0 {
        options.push(0x01);
    }
    let header_len = 20 + options.len();
    let mut tcp = Vec::with_capacity(header_len);
    tcp.extend(src_port.to_be_bytes());
    tcp.extend(dst_port.to_be_bytes());
    tcp.extend(1000u32.to_be_bytes());
    tcp.extend(2000u32.to_be_bytes());
    tcp.push(((header_len / 4) as u8) << 4);
    tcp.push(flags);
    tcp.extend(64240u16.to_be_bytes());
    tcp.extend([0x00, 0x00, 0x00, 0x00]);
    tcp.extend(options);
    tcp
}

pub fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, payload: &[u8]) -> Vec<u8> {
    let total = (20 + payload.len()) as u16;
    let mut ip = vec![0x45, 0x00];
    ip.extend(total.to_be_bytes());
    ip.extend([0x12, 0x34, 0x40, 0x00, ttl, 0x06, 0x00, 0x00]);
    ip.extend(src.octets());
    ip.extend(dst.octets());
    ip.extend_from_slice(payload);
    ip
}

pub fn ethernet_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
    frame.extend(ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// MSS 1460, NOP, window scale 7, SACK permitted, timestamps.
pub const LINUX_OPTIONS: [u8; 20] = [
    0x02, 0x04, 0x05, 0xb4, 0x01, 0x03, 0x03, 0x07, 0x04, 0x02, 0x08, 0x0a, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x00,
];

pub fn ack_frame(src: Ipv4Addr, src_port: u16, dst_port: u16) -> Vec<u8> {
    let tcp = tcp_segment(src_port, dst_port, TCP_ACK, &LINUX_OPTIONS);
    let ip = ipv4_packet(src, Ipv4Addr::new(10, 0, 0, 1), 64, &tcp);
    ethernet_frame(0x0800, &ip)
}
