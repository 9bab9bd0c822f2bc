use crate::akamai::AkamaiFingerprint;
use crate::fingerprint::{TlsFingerprints, Transport};
use crate::http1_process::Http1Request;
use crate::http2_parser::{FramePayload, Http2Frame, Http2FrameRecord, Http2Priority};
use crate::tcp::TcpIpRecord;
use crate::tls::{cipher_suite_name, ExtensionParams, TlsHandshakeRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

/// Shown in place of a fingerprint that does not apply to the request.
pub const NOT_AVAILABLE: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ExtensionParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsDetails {
    pub ciphers: Vec<String>,
    pub extensions: Vec<ExtensionDetails>,
    #[serde(rename = "tls_version_record")]
    pub record_version: String,
    #[serde(rename = "tls_version_negotiated")]
    pub negotiated_version: String,
    pub ja3: String,
    pub ja3_hash: String,
    pub ja4: String,
    pub ja4_r: String,
    pub peetprint: String,
    pub peetprint_hash: String,
    pub client_random: String,
    pub session_id: String,
    /// ClientHello bytes, hex.
    pub raw: String,
    pub raw_b64: String,
}

impl TlsDetails {
    pub fn new(record: &TlsHandshakeRecord, fingerprints: &TlsFingerprints) -> Self {
        Self {
            ciphers: record.cipher_suites.iter().map(|&c| cipher_suite_name(c)).collect(),
            extensions: record
                .extensions
                .iter()
                .map(|e| ExtensionDetails { name: e.name(), params: e.params.clone() })
                .collect(),
            record_version: record.record_version.to_string(),
            negotiated_version: record
                .negotiated_version
                .map(|v| v.to_string())
                .unwrap_or_default(),
            ja3: fingerprints.ja3.fingerprint.clone(),
            ja3_hash: fingerprints.ja3.hash.clone(),
            ja4: fingerprints.ja4.full.clone(),
            ja4_r: fingerprints.ja4.raw.clone(),
            peetprint: fingerprints.peetprint.fingerprint.clone(),
            peetprint_hash: fingerprints.peetprint.hash.clone(),
            client_random: hex::encode(&record.client_random),
            session_id: hex::encode(&record.session_id),
            raw: hex::encode(&record.raw),
            raw_b64: STANDARD.encode(&record.raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Http1Details {
    pub headers: Vec<String>,
}

impl From<&Http1Request> for Http1Details {
    fn from(request: &Http1Request) -> Self {
        Self { headers: request.header_lines() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityDetails {
    /// Effective weight, 1-256.
    pub weight: u16,
    pub depends_on: u32,
    pub exclusive: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoAwayDetails {
    pub last_stream_id: u32,
    pub error_code: u32,
    pub debug_data: String,
}

/// One HTTP/2 frame as reported under `sent_frames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameDetails {
    pub frame_type: String,
    pub stream_id: u32,
    pub length: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goaway: Option<GoAwayDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
    /// PING opaque data, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl From<&Http2Frame> for FrameDetails {
    fn from(frame: &Http2Frame) -> Self {
        let mut details = FrameDetails {
            frame_type: frame.frame_type.to_string(),
            stream_id: frame.stream_id,
            length: frame.length,
            flags: frame.flag_names(),
            headers: None,
            settings: None,
            increment: None,
            priority: None,
            goaway: None,
            error_code: None,
            payload: None,
        };
        let priority_details = |p: &Http2Priority| PriorityDetails {
            weight: p.effective_weight(),
            depends_on: p.depends_on,
            exclusive: u8::from(p.exclusive),
        };
        match &frame.payload {
            Some(FramePayload::Settings(settings)) => {
                details.settings = Some(settings.iter().map(|s| s.to_string()).collect());
            }
            Some(FramePayload::WindowUpdate(increment)) => details.increment = Some(*increment),
            Some(FramePayload::Priority(priority)) => {
                details.priority = Some(priority_details(priority));
            }
            Some(FramePayload::Headers { headers, priority, .. }) => {
                details.headers = Some(headers.clone());
                details.priority = priority.as_ref().map(priority_details);
            }
            Some(FramePayload::GoAway(goaway)) => {
                details.goaway = Some(GoAwayDetails {
                    last_stream_id: goaway.last_stream_id,
                    error_code: goaway.error_code,
                    debug_data: String::from_utf8_lossy(&goaway.debug_data).into_owned(),
                });
            }
            Some(FramePayload::RstStream(code)) => details.error_code = Some(*code),
            Some(FramePayload::Ping(data)) => details.payload = Some(hex::encode(data)),
            Some(FramePayload::Data) | Some(FramePayload::Other) | None => {}
        }
        details
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Http2Details {
    pub akamai_fingerprint: String,
    pub akamai_fingerprint_hash: String,
    pub sent_frames: Vec<FrameDetails>,
}

impl Http2Details {
    pub fn new(record: &Http2FrameRecord, akamai: &AkamaiFingerprint) -> Self {
        Self {
            akamai_fingerprint: akamai.fingerprint.clone(),
            akamai_fingerprint_hash: akamai.hash.clone(),
            sent_frames: record.frames.iter().map(FrameDetails::from).collect(),
        }
    }
}

/// Everything observed about one request. Built once by the assembler and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Unix time in milliseconds.
    pub timestamp: u64,
    /// Client socket address as seen by the server.
    pub ip: String,
    pub http_version: Transport,
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http1: Option<Http1Details>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2: Option<Http2Details>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcpip: Option<TcpIpRecord>,
}

impl Response {
    /// Pretty-printed JSON, two-space indentation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Compact JSON, used for log lines.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn ja3_hash(&self) -> Option<&str> {
        self.tls.as_ref().map(|t| t.ja3_hash.as_str())
    }
}

/// `/api/tls` body: only the TLS block.
#[derive(Debug, Serialize)]
pub struct TlsResponse<'a> {
    pub tls: &'a TlsDetails,
}

impl<'a> TlsResponse<'a> {
    /// `None` when the request carried no ClientHello.
    pub fn new(response: &'a Response) -> Option<Self> {
        response.tls.as_ref().map(|tls| Self { tls })
    }
}

/// `/api/clean` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmallResponse {
    pub ja3: String,
    pub ja3_hash: String,
    pub ja4: String,
    pub ja4_r: String,
    pub akamai: String,
    pub akamai_hash: String,
    pub peetprint: String,
    pub peetprint_hash: String,
    pub http_version: Transport,
}

impl From<&Response> for SmallResponse {
    fn from(response: &Response) -> Self {
        let (akamai, akamai_hash) = match (&response.http2, response.http_version) {
            (Some(h2), Transport::Http2) => {
                (h2.akamai_fingerprint.clone(), h2.akamai_fingerprint_hash.clone())
            }
            _ => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        let tls = response.tls.as_ref();
        let field = |f: fn(&TlsDetails) -> &String| tls.map(f).cloned().unwrap_or_default();
        Self {
            ja3: field(|t| &t.ja3),
            ja3_hash: field(|t| &t.ja3_hash),
            ja4: field(|t| &t.ja4),
            ja4_r: field(|t| &t.ja4_r),
            akamai,
            akamai_hash,
            peetprint: field(|t| &t.peetprint),
            peetprint_hash: field(|t| &t.peetprint_hash),
            http_version: response.http_version,
        }
    }
}

impl SmallResponse {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
