use crate::fingerprint::{dash_join, md5_hex};
use crate::tls::{filter_grease, TlsHandshakeRecord};

/// Extended TLS fingerprint: JA3's ordered cipher and extension view plus the extension
/// sub-parameters JA3 drops.
///
/// `supported_versions|alpn|groups|sig_algs|psk_modes|cert_compression|ciphers|extensions`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeetPrint {
    pub fingerprint: String,
    pub hash: String,
}

fn alpn_token(protocol: &str) -> &str {
    match protocol {
        "h2" => "2",
        "http/1.1" => "1.1",
        "http/1.0" => "1.0",
        other => other,
    }
}

pub fn peetprint(record: &TlsHandshakeRecord) -> PeetPrint {
    let fields = [
        dash_join(filter_grease(record.supported_versions())),
        dash_join(record.alpn().iter().map(|p| alpn_token(p))),
        dash_join(filter_grease(record.supported_groups())),
        dash_join(filter_grease(record.signature_algorithms())),
        dash_join(record.psk_key_exchange_modes().iter()),
        dash_join(record.cert_compression_algorithms().iter()),
        dash_join(filter_grease(&record.cipher_suites)),
        dash_join(filter_grease(&record.extension_ids())),
    ];
    let fingerprint = fields.join("|");
    let hash = md5_hex(&fingerprint);
    PeetPrint { fingerprint, hash }
}
