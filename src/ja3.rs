use crate::fingerprint::{dash_join, md5_hex};
use crate::tls::{filter_grease, TlsHandshakeRecord};

/// JA3 string and its MD5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3 {
    pub fingerprint: String,
    pub hash: String,
}

/// `version,ciphers,extensions,groups,point_formats`, lists in ClientHello order with GREASE
/// removed. Missing lists leave their field empty.
pub fn ja3(record: &TlsHandshakeRecord) -> Ja3 {
    let fingerprint = format!(
        "{},{},{},{},{}",
        record.client_version,
        dash_join(filter_grease(&record.cipher_suites)),
        dash_join(filter_grease(&record.extension_ids())),
        dash_join(filter_grease(record.supported_groups())),
        dash_join(record.ec_point_formats().iter()),
    );
    let hash = md5_hex(&fingerprint);
    Ja3 { fingerprint, hash }
}
