mod common;

use common::*;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use trackme::http2_parser::parse_frames;
use trackme::tls::TlsHandshakeRecord;
use trackme::tls_process::parse_client_hello;
use trackme::{Config, Context, HttpRecord, RequestMeta, ResponseAssembler, Transport};

fn context() -> Context {
    Context::new(Config::default()).unwrap_or_else(|e| panic!("context: {e}"))
}

fn client_hello() -> TlsHandshakeRecord {
    parse_client_hello(&chrome_like_client_hello())
        .unwrap_or_else(|e| panic!("ClientHello: {e}"))
        .with_negotiated_version(0x0304)
}

fn request(transport: Transport) -> RequestMeta {
    RequestMeta::new(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 51000),
        "GET",
        "/api/all",
        transport,
    )
    .with_user_agent("Mozilla/5.0")
}

#[test]
fn test_response_without_capture_record() {
    let ctx = context();
    let assembler = ResponseAssembler::new(&ctx);
    let tls = client_hello();

    let response = assembler.assemble_at(&request(Transport::Http1), Some(&tls), None, 1_700_000_000_000);

    assert!(response.tcpip.is_none());
    let details = response.tls.as_ref().unwrap_or_else(|| panic!("TLS block"));
    assert_eq!(details.ja3_hash, "5f9f1a6a5baf0898214ac11636ae39b9");
    assert!(!details.ja4.is_empty());
    assert!(!details.peetprint.is_empty());
    assert_eq!(details.negotiated_version, "772");
    assert_eq!(response.timestamp, 1_700_000_000_000);
    assert_eq!(response.ip, "10.0.0.5:51000");
    assert_eq!(response.user_agent.as_deref(), Some("Mozilla/5.0"));
}

#[test]
fn test_response_joins_capture_record() {
    let ctx = context();
    let frame = ack_frame(Ipv4Addr::new(10, 0, 0, 5), 51000, 443);
    let record = trackme::tcp_process::process_packet(&frame, 443)
        .unwrap_or_else(|e| panic!("decode: {e}"))
        .unwrap_or_else(|| panic!("ACK to 443 should match"));
    ctx.store.insert(record.identity(), record);

    let response = ResponseAssembler::new(&ctx).assemble(&request(Transport::Http2), None, None);
    let tcpip = response.tcpip.unwrap_or_else(|| panic!("capture record attached"));
    assert_eq!(tcpip.src_port, 51000);
    assert!(response.tls.is_none());
}

#[test]
fn test_ipv4_mapped_client_address_matches_capture() {
    let ctx = context();
    let frame = ack_frame(Ipv4Addr::new(10, 0, 0, 5), 51000, 443);
    if let Ok(Some(record)) = trackme::tcp_process::process_packet(&frame, 443) {
        ctx.store.insert(record.identity(), record);
    }

    let mapped = SocketAddr::new(IpAddr::V6(Ipv4Addr::new(10, 0, 0, 5).to_ipv6_mapped()), 51000);
    assert!(ResponseAssembler::new(&ctx).lookup_tcpip(mapped).is_some());
}

#[test]
fn test_h3_selects_quic_ja4() {
    let ctx = context();
    let assembler = ResponseAssembler::new(&ctx);
    let tls = client_hello();

    let h2 = assembler.assemble(&request(Transport::Http2), Some(&tls), None);
    let h3 = assembler.assemble(&request(Transport::Http3), Some(&tls), None);
    let ja4 = |r: &trackme::Response| r.tls.as_ref().map(|t| t.ja4.clone()).unwrap_or_default();

    assert!(ja4(&h2).starts_with('t'));
    assert!(ja4(&h3).starts_with('q'));
    assert_eq!(ja4(&h2)[1..], ja4(&h3)[1..]);
}

#[test]
fn test_http2_block_carries_akamai() {
    let ctx = context();
    let mut data = Vec::new();
    // SETTINGS INITIAL_WINDOW_SIZE=65535, WINDOW_UPDATE 1000
    data.extend([0x00, 0x00, 0x06, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]);
    data.extend([0x00, 0x04, 0x00, 0x00, 0xff, 0xff]);
    data.extend([0x00, 0x00, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00]);
    data.extend(1000u32.to_be_bytes());
    let frames = parse_frames(&data);

    let response = ResponseAssembler::new(&ctx).assemble(
        &request(Transport::Http2),
        Some(&client_hello()),
        Some(HttpRecord::Http2(&frames)),
    );
    let http2 = response.http2.unwrap_or_else(|| panic!("HTTP/2 block"));
    assert_eq!(http2.akamai_fingerprint, "4:65535|1000||");
    assert_eq!(http2.sent_frames.len(), 2);
    assert_eq!(http2.sent_frames[0].settings, Some(vec!["INITIAL_WINDOW_SIZE = 65535".to_string()]));
    assert_eq!(http2.sent_frames[1].increment, Some(1000));
    assert!(response.http1.is_none());
}
