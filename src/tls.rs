use serde::Serialize;
use std::fmt;
use tls_parser::TlsCipherSuite;

pub const EXT_SERVER_NAME: u16 = 0x0000;
pub const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
pub const EXT_EC_POINT_FORMATS: u16 = 0x000b;
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
pub const EXT_ALPN: u16 = 0x0010;
pub const EXT_COMPRESS_CERTIFICATE: u16 = 0x001b;
pub const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
pub const EXT_PSK_KEY_EXCHANGE_MODES: u16 = 0x002d;
pub const EXT_KEY_SHARE: u16 = 0x0033;

/// See <https://datatracker.ietf.org/doc/html/rfc8701>
pub const TLS_GREASE_VALUES: [u16; 16] = [
    0x0a0a, 0x1a1a, 0x2a2a, 0x3a3a, 0x4a4a, 0x5a5a, 0x6a6a, 0x7a7a, 0x8a8a, 0x9a9a, 0xaaaa, 0xbaba,
    0xcaca, 0xdada, 0xeaea, 0xfafa,
];

pub fn is_grease(value: u16) -> bool {
    TLS_GREASE_VALUES.contains(&value)
}

pub fn filter_grease(values: &[u16]) -> Vec<u16> {
    values.iter().copied().filter(|&v| !is_grease(v)).collect()
}

/// TLS protocol version as used in the JA4 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsVersion {
    V1_3,
    V1_2,
    V1_1,
    V1_0,
    Ssl3_0,
    Ssl2_0,
    Unknown(u16),
}

impl From<u16> for TlsVersion {
    fn from(value: u16) -> Self {
        match value {
            0x0304 => TlsVersion::V1_3,
            0x0303 => TlsVersion::V1_2,
            0x0302 => TlsVersion::V1_1,
            0x0301 => TlsVersion::V1_0,
            0x0300 => TlsVersion::Ssl3_0,
            0x0002 => TlsVersion::Ssl2_0,
            other => TlsVersion::Unknown(other),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::V1_3 => write!(f, "13"),
            TlsVersion::V1_2 => write!(f, "12"),
            TlsVersion::V1_1 => write!(f, "11"),
            TlsVersion::V1_0 => write!(f, "10"),
            TlsVersion::Ssl3_0 => write!(f, "s3"),
            TlsVersion::Ssl2_0 => write!(f, "s2"),
            TlsVersion::Unknown(_) => write!(f, "00"),
        }
    }
}

/// Decoded body of a ClientHello extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtensionParams {
    ServerName(String),
    SupportedGroups(Vec<u16>),
    EcPointFormats(Vec<u8>),
    SignatureAlgorithms(Vec<u16>),
    Alpn(Vec<String>),
    SupportedVersions(Vec<u16>),
    PskKeyExchangeModes(Vec<u8>),
    CompressCertificate(Vec<u16>),
    /// Groups of the offered key shares.
    KeyShare(Vec<u16>),
    /// Extension without a typed decoder; only its body length is kept.
    Opaque { length: usize },
}

/// One ClientHello extension. `params` is `None` when the body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsExtensionRecord {
    pub id: u16,
    pub params: Option<ExtensionParams>,
}

impl TlsExtensionRecord {
    pub fn new(id: u16, params: Option<ExtensionParams>) -> Self {
        Self { id, params }
    }

    pub fn name(&self) -> String {
        extension_name(self.id)
    }
}

/// Normalised ClientHello as handed over by the TLS termination layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlsHandshakeRecord {
    /// Version in the record layer header.
    pub record_version: u16,
    /// `legacy_version` field of the ClientHello.
    pub client_version: u16,
    /// Version the server negotiated, when known.
    pub negotiated_version: Option<u16>,
    pub client_random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<TlsExtensionRecord>,
    /// ClientHello bytes as received.
    pub raw: Vec<u8>,
}

impl TlsHandshakeRecord {
    pub fn with_negotiated_version(mut self, version: u16) -> Self {
        self.negotiated_version = Some(version);
        self
    }

    pub fn extension_ids(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.id).collect()
    }

    pub fn has_extension(&self, id: u16) -> bool {
        self.extensions.iter().any(|e| e.id == id)
    }

    fn params(&self, id: u16) -> Option<&ExtensionParams> {
        self.extensions.iter().find(|e| e.id == id).and_then(|e| e.params.as_ref())
    }

    pub fn server_name(&self) -> Option<&str> {
        match self.params(EXT_SERVER_NAME) {
            Some(ExtensionParams::ServerName(name)) => Some(name),
            _ => None,
        }
    }

    pub fn supported_groups(&self) -> &[u16] {
        match self.params(EXT_SUPPORTED_GROUPS) {
            Some(ExtensionParams::SupportedGroups(groups)) => groups,
            _ => &[],
        }
    }

    pub fn ec_point_formats(&self) -> &[u8] {
        match self.params(EXT_EC_POINT_FORMATS) {
            Some(ExtensionParams::EcPointFormats(formats)) => formats,
            _ => &[],
        }
    }

    pub fn signature_algorithms(&self) -> &[u16] {
        match self.params(EXT_SIGNATURE_ALGORITHMS) {
            Some(ExtensionParams::SignatureAlgorithms(algs)) => algs,
            _ => &[],
        }
    }

    pub fn alpn(&self) -> &[String] {
        match self.params(EXT_ALPN) {
            Some(ExtensionParams::Alpn(protocols)) => protocols,
            _ => &[],
        }
    }

    pub fn supported_versions(&self) -> &[u16] {
        match self.params(EXT_SUPPORTED_VERSIONS) {
            Some(ExtensionParams::SupportedVersions(versions)) => versions,
            _ => &[],
        }
    }

    pub fn psk_key_exchange_modes(&self) -> &[u8] {
        match self.params(EXT_PSK_KEY_EXCHANGE_MODES) {
            Some(ExtensionParams::PskKeyExchangeModes(modes)) => modes,
            _ => &[],
        }
    }

    pub fn cert_compression_algorithms(&self) -> &[u16] {
        match self.params(EXT_COMPRESS_CERTIFICATE) {
            Some(ExtensionParams::CompressCertificate(algs)) => algs,
            _ => &[],
        }
    }

    /// Highest non-GREASE entry of `supported_versions`, else the ClientHello version.
    pub fn max_version(&self) -> TlsVersion {
        filter_grease(self.supported_versions())
            .into_iter()
            .max()
            .map(TlsVersion::from)
            .unwrap_or_else(|| TlsVersion::from(self.client_version))
    }
}

pub fn cipher_suite_name(id: u16) -> String {
    if is_grease(id) {
        return format!("TLS_GREASE (0x{id:04X})");
    }
    TlsCipherSuite::from_id(id)
        .map(|suite| suite.name.to_string())
        .unwrap_or_else(|| format!("0x{id:04X}"))
}

pub fn extension_name(id: u16) -> String {
    if is_grease(id) {
        return format!("TLS_GREASE (0x{id:04x})");
    }
    let name = match id {
        EXT_SERVER_NAME => "server_name",
        0x0005 => "status_request",
        EXT_SUPPORTED_GROUPS => "supported_groups",
        EXT_EC_POINT_FORMATS => "ec_point_formats",
        EXT_SIGNATURE_ALGORITHMS => "signature_algorithms",
        EXT_ALPN => "application_layer_protocol_negotiation",
        0x0012 => "signed_certificate_timestamp",
        0x0015 => "padding",
        0x0016 => "encrypt_then_mac",
        0x0017 => "extended_master_secret",
        EXT_COMPRESS_CERTIFICATE => "compress_certificate",
        0x001c => "record_size_limit",
        0x0023 => "session_ticket",
        0x0029 => "pre_shared_key",
        0x002a => "early_data",
        EXT_SUPPORTED_VERSIONS => "supported_versions",
        EXT_PSK_KEY_EXCHANGE_MODES => "psk_key_exchange_modes",
        EXT_KEY_SHARE => "key_share",
        0x0039 => "quic_transport_parameters",
        0x4469 | 0x44cd => "application_settings",
        0xfe0d => "encrypted_client_hello",
        0xff01 => "renegotiation_info",
        _ => return format!("unknown (0x{id:04x})"),
    };
    format!("{name} ({id})")
}
