use crate::akamai::{akamai_fingerprint, AkamaiFingerprint};
use crate::http2_parser::Http2FrameRecord;
use crate::ja3::{ja3, Ja3};
use crate::ja4::{ja4, Ja4Payload, Ja4Transport};
use crate::peetprint::{peetprint, PeetPrint};
use crate::tls::TlsHandshakeRecord;
use md5::{Digest, Md5};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Lowercase hex MD5 digest.
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// `values` rendered in decimal and joined with `-`.
pub(crate) fn dash_join<T: fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    values.into_iter().map(|v| v.to_string()).collect::<Vec<String>>().join("-")
}

/// Negotiated application transport of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Http1,
    Http2,
    Http3,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http1 => "h1",
            Transport::Http2 => "h2",
            Transport::Http3 => "h3",
        }
    }

    /// HTTP/3 runs over QUIC; everything else over TCP.
    pub fn ja4_transport(&self) -> Ja4Transport {
        match self {
            Transport::Http3 => Ja4Transport::Quic,
            Transport::Http1 | Transport::Http2 => Ja4Transport::Tcp,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h1" | "http/1.1" | "http/1.0" => Ok(Transport::Http1),
            "h2" => Ok(Transport::Http2),
            "h3" => Ok(Transport::Http3),
            other => Err(format!("unknown transport tag: {other}")),
        }
    }
}

impl Serialize for Transport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// TLS fingerprints of one ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFingerprints {
    pub ja3: Ja3,
    pub ja4: Ja4Payload,
    pub peetprint: PeetPrint,
}

impl TlsFingerprints {
    pub fn compute(record: &TlsHandshakeRecord, transport: Transport) -> Self {
        Self {
            ja3: ja3(record),
            ja4: ja4(record, transport.ja4_transport()),
            peetprint: peetprint(record),
        }
    }
}

/// Every fingerprint derivable from the records of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintSet {
    pub tls: Option<TlsFingerprints>,
    pub akamai: Option<AkamaiFingerprint>,
}

impl FingerprintSet {
    pub fn compute(
        tls: Option<&TlsHandshakeRecord>,
        http2: Option<&Http2FrameRecord>,
        transport: Transport,
    ) -> Self {
        Self {
            tls: tls.map(|record| TlsFingerprints::compute(record, transport)),
            akamai: http2.map(akamai_fingerprint),
        }
    }
}
