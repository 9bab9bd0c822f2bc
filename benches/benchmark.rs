use criterion::{criterion_group, criterion_main, Criterion};
use pcap_file::pcap::PcapReader;
use std::fs::File;
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use trackme::fingerprint::{FingerprintSet, TlsFingerprints};
use trackme::http2_parser::{parse_frames, CONNECTION_PREFACE};
use trackme::tcp_process::process_packet;
use trackme::tls_process::parse_client_hello;
use trackme::{Config, Context, HttpRecord, RequestMeta, ResponseAssembler, Transport};

/// Set to a capture file to include the capture path in the run.
const PCAP_ENV: &str = "TRACKME_BENCH_PCAP";

fn u16_list(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn prefixed(body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

fn extension(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_be_bytes().to_vec();
    out.extend(prefixed(body));
    out
}

fn client_hello() -> Vec<u8> {
    let mut sni = vec![0x00];
    sni.extend(prefixed(b"example.com"));
    let extensions = [
        extension(0x0a0a, &[]),
        extension(0x0000, &prefixed(&sni)),
        extension(0x000a, &prefixed(&u16_list(&[0x2a2a, 0x001d, 0x0017, 0x0018]))),
        extension(0x000b, &[0x01, 0x00]),
        extension(0x000d, &prefixed(&u16_list(&[0x0403, 0x0804, 0x0401, 0x0503]))),
        extension(0x0010, &prefixed(b"\x02h2\x08http/1.1")),
        extension(0x002b, &[0x06, 0x3a, 0x3a, 0x03, 0x04, 0x03, 0x03]),
        extension(0x002d, &[0x01, 0x01]),
    ]
    .concat();

    let mut body = vec![0x03, 0x03];
    body.extend([0x42; 32]);
    body.push(0);
    body.extend(prefixed(&u16_list(&[0x1a1a, 0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f])));
    body.extend([0x01, 0x00]);
    body.extend(prefixed(&extensions));

    let len = (body.len() as u32).to_be_bytes();
    let mut handshake = vec![0x01, len[1], len[2], len[3]];
    handshake.extend(body);
    let mut record = vec![0x16, 0x03, 0x01];
    record.extend(prefixed(&handshake));
    record
}

fn http2_stream() -> Vec<u8> {
    let frame = |frame_type: u8, flags: u8, stream: u32, payload: &[u8]| {
        let len = (payload.len() as u32).to_be_bytes();
        let mut out = vec![len[1], len[2], len[3], frame_type, flags];
        out.extend(stream.to_be_bytes());
        out.extend_from_slice(payload);
        out
    };
    let settings: Vec<u8> = [(1u16, 65536u32), (2, 0), (4, 6291456), (6, 262144)]
        .iter()
        .flat_map(|(id, value)| id.to_be_bytes().into_iter().chain(value.to_be_bytes()))
        .collect();

    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend(frame(0x4, 0x0, 0, &settings));
    data.extend(frame(0x8, 0x0, 0, &15663105u32.to_be_bytes()));
    data.extend(frame(0x1, 0x05, 1, &[0x82, 0x84, 0x87, 0x41, 0x03, b'a', b'.', b'b']));
    data
}

fn load_packets_from_pcap(path: &str) -> Vec<Vec<u8>> {
    let Ok(file) = File::open(path) else {
        eprintln!("Skipping capture benchmark: cannot open {path}");
        return Vec::new();
    };
    let Ok(mut reader) = PcapReader::new(file) else {
        eprintln!("Skipping capture benchmark: {path} is not a pcap file");
        return Vec::new();
    };
    let mut packets = Vec::new();
    while let Some(Ok(pkt)) = reader.next_packet() {
        packets.push(pkt.data.to_vec());
    }
    packets
}

fn bench_tls(c: &mut Criterion) {
    let data = client_hello();
    let record = match parse_client_hello(&data) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Skipping TLS benchmark: {e}");
            return;
        }
    };

    let mut group = c.benchmark_group("tls");
    group.bench_function("parse_client_hello", |b| b.iter(|| parse_client_hello(black_box(&data))));
    group.bench_function("tls_fingerprints", |b| {
        b.iter(|| TlsFingerprints::compute(black_box(&record), Transport::Http2))
    });
    group.finish();
}

fn bench_http2(c: &mut Criterion) {
    let data = http2_stream();
    let frames = parse_frames(&data);

    let mut group = c.benchmark_group("http2");
    group.bench_function("parse_frames", |b| b.iter(|| parse_frames(black_box(&data))));
    group.bench_function("akamai", |b| {
        b.iter(|| FingerprintSet::compute(None, Some(black_box(&frames)), Transport::Http2))
    });
    group.finish();
}

fn bench_request(c: &mut Criterion) {
    let ctx = match Context::new(Config::default()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Skipping request benchmark: {e}");
            return;
        }
    };
    let Ok(tls) = parse_client_hello(&client_hello()) else {
        return;
    };
    let frames = parse_frames(&http2_stream());
    let assembler = ResponseAssembler::new(&ctx);
    let request = RequestMeta::new(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 51000),
        "GET",
        "/api/all",
        Transport::Http2,
    );

    c.bench_function("assemble_and_route", |b| {
        b.iter(|| {
            let response =
                assembler.assemble_at(&request, Some(&tls), Some(HttpRecord::Http2(&frames)), 0);
            trackme::handle(black_box("/api/all"), &response)
        })
    });
}

fn bench_capture(c: &mut Criterion) {
    let Ok(path) = std::env::var(PCAP_ENV) else {
        return;
    };
    let packets = load_packets_from_pcap(&path);
    if packets.is_empty() {
        return;
    }

    let matched = packets
        .iter()
        .filter(|pkt| matches!(process_packet(pkt, 443), Ok(Some(_))))
        .count();
    println!("Capture file: {} packets, {} handshake ACKs to 443", packets.len(), matched);

    let mut group = c.benchmark_group("capture");
    group.measurement_time(Duration::from_secs(20));
    group.bench_function("process_packet", |b| {
        b.iter(|| {
            for pkt in &packets {
                let _ = process_packet(black_box(pkt), 443);
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_tls, bench_http2, bench_request, bench_capture);
criterion_main!(benches);
