//! JA4 and JA4_r as published by FoxIO.
//!
//! `ja4_a` is `{t|q}{version}{d|i}{ciphers:02}{extensions:02}{alpn}`; `ja4_b` is the sorted
//! cipher list; `ja4_c` is the sorted extension list without SNI and ALPN, followed by the
//! signature algorithms in ClientHello order. JA4 hashes `b` and `c` with truncated SHA-256,
//! JA4_r keeps them verbatim.
use crate::tls::{filter_grease, TlsHandshakeRecord, TlsVersion, EXT_ALPN, EXT_SERVER_NAME};
use sha2::{Digest, Sha256};

const EMPTY_HASH: &str = "000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ja4Transport {
    Tcp,
    Quic,
}

impl Ja4Transport {
    fn prefix(&self) -> char {
        match self {
            Ja4Transport::Tcp => 't',
            Ja4Transport::Quic => 'q',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja4Payload {
    pub ja4_a: String,
    /// Sorted ciphers, comma-separated 4-digit hex.
    pub ja4_b: String,
    /// Sorted extensions and signature algorithms.
    pub ja4_c: String,
    /// `ja4_a_hash(b)_hash(c)`
    pub full: String,
    /// `ja4_a_b_c`
    pub raw: String,
}

/// First 12 hex characters of SHA-256; an empty section hashes to zeros.
pub fn hash12(input: &str) -> String {
    if input.is_empty() {
        return EMPTY_HASH.to_string();
    }
    format!("{:x}", Sha256::digest(input.as_bytes()))[..12].to_string()
}

/// First and last character of the first ALPN value, or of its hex form when either is not
/// alphanumeric. `00` without ALPN.
pub fn alpn_code(alpn: Option<&str>) -> String {
    let Some(value) = alpn.map(str::as_bytes).filter(|v| !v.is_empty()) else {
        return "00".to_string();
    };
    let (first, last) = (value[0], value[value.len() - 1]);
    if first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric() {
        return format!("{}{}", char::from(first), char::from(last));
    }
    let hex = hex::encode(value);
    let hex = hex.as_bytes();
    format!("{}{}", char::from(hex[0]), char::from(hex[hex.len() - 1]))
}

fn hex_list(values: &[u16]) -> String {
    values.iter().map(|v| format!("{v:04x}")).collect::<Vec<String>>().join(",")
}

pub fn ja4(record: &TlsHandshakeRecord, transport: Ja4Transport) -> Ja4Payload {
    match transport {
        Ja4Transport::Tcp => ja4_tcp(record),
        Ja4Transport::Quic => ja4_quic(record),
    }
}

/// TLS over TCP. The version comes from `supported_versions`, or the ClientHello version
/// when the extension is absent.
pub fn ja4_tcp(record: &TlsHandshakeRecord) -> Ja4Payload {
    build(record, Ja4Transport::Tcp, record.max_version())
}

/// TLS inside QUIC. QUIC requires TLS 1.3, so a ClientHello lacking `supported_versions`
/// still reports `13`.
pub fn ja4_quic(record: &TlsHandshakeRecord) -> Ja4Payload {
    let version = if record.supported_versions().is_empty() {
        TlsVersion::V1_3
    } else {
        record.max_version()
    };
    build(record, Ja4Transport::Quic, version)
}

fn build(record: &TlsHandshakeRecord, transport: Ja4Transport, version: TlsVersion) -> Ja4Payload {
    let mut ciphers = filter_grease(&record.cipher_suites);
    let extensions = filter_grease(&record.extension_ids());
    let sig_algs = filter_grease(record.signature_algorithms());

    let sni = if record.has_extension(EXT_SERVER_NAME) { 'd' } else { 'i' };
    let alpn = alpn_code(record.alpn().first().map(String::as_str));
    let ja4_a = format!(
        "{}{}{}{:02}{:02}{}",
        transport.prefix(),
        version,
        sni,
        ciphers.len().min(99),
        extensions.len().min(99),
        alpn
    );

    ciphers.sort_unstable();
    let ja4_b = hex_list(&ciphers);

    let mut sorted_extensions: Vec<u16> = extensions
        .into_iter()
        .filter(|&ext| ext != EXT_SERVER_NAME && ext != EXT_ALPN)
        .collect();
    sorted_extensions.sort_unstable();
    let extensions_str = hex_list(&sorted_extensions);
    let ja4_c = if sig_algs.is_empty() {
        extensions_str
    } else {
        format!("{extensions_str}_{}", hex_list(&sig_algs))
    };

    let full = format!("{ja4_a}_{}_{}", hash12(&ja4_b), hash12(&ja4_c));
    let raw = format!("{ja4_a}_{ja4_b}_{ja4_c}");

    Ja4Payload { ja4_a, ja4_b, ja4_c, full, raw }
}
