#![forbid(unsafe_code)]

// ============================================================================
// CAPTURE SIDE (interface, datalink decoding, TCP/IP features, correlation store)
// ============================================================================
pub mod capture;
pub mod packet_parser;
pub mod store;
pub mod tcp;
pub mod tcp_process;

// ============================================================================
// PROTOCOL FEATURE EXTRACTORS
// ============================================================================
pub mod http1_process;
pub mod http2_parser;
pub mod tls;
pub mod tls_process;

// ============================================================================
// FINGERPRINT ENGINE
// ============================================================================
pub mod akamai;
pub mod fingerprint;
pub mod ja3;
pub mod ja4;
pub mod peetprint;

// ============================================================================
// REQUEST SIDE
// ============================================================================
pub mod output;
pub mod process;
pub mod router;

pub mod config;
pub mod error;

pub use capture::{CaptureListener, CaptureStats, ListenerHandle};
pub use config::{Config, Context};
pub use error::{RouteError, TrackmeError};
pub use fingerprint::{FingerprintSet, Transport};
pub use output::Response;
pub use process::{HttpRecord, RequestMeta, ResponseAssembler};
pub use router::{handle, route, RouteReply};
pub use store::ConnectionStore;
pub use tcp::{ConnectionIdentity, TcpIpRecord};
pub use tls::TlsHandshakeRecord;
