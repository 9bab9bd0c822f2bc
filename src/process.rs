use crate::config::Context;
use crate::fingerprint::{FingerprintSet, Transport};
use crate::http1_process::Http1Request;
use crate::http2_parser::Http2FrameRecord;
use crate::output::{Http1Details, Http2Details, Response, TlsDetails};
use crate::store::ConnectionStore;
use crate::tcp::{ConnectionIdentity, TcpIpRecord};
use crate::tls::TlsHandshakeRecord;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Per-request facts supplied by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// Client address as accepted by the server.
    pub client: SocketAddr,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub transport: Transport,
}

impl RequestMeta {
    pub fn new(client: SocketAddr, method: &str, path: &str, transport: Transport) -> Self {
        Self {
            client,
            method: method.to_string(),
            path: path.to_string(),
            user_agent: None,
            transport,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }
}

/// Application-layer record of the request, whichever protocol carried it.
#[derive(Debug, Clone, Copy)]
pub enum HttpRecord<'a> {
    Http1(&'a Http1Request),
    Http2(&'a Http2FrameRecord),
}

/// Joins capture-side TCP/IP features with the TLS and HTTP records of a request.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    store: ConnectionStore,
    tls_port: u16,
}

impl ResponseAssembler {
    pub fn new(ctx: &Context) -> Self {
        Self { store: ctx.store.clone(), tls_port: ctx.config.tls_port }
    }

    /// Capture record for `client`, if the listener has seen its handshake ACK.
    pub fn lookup_tcpip(&self, client: SocketAddr) -> Option<TcpIpRecord> {
        let identity = ConnectionIdentity::new(client.ip().to_canonical(), client.port(), self.tls_port);
        let record = self.store.lookup(&identity);
        if record.is_none() {
            debug!("No capture record for {}", identity);
        }
        record
    }

    pub fn assemble(
        &self,
        request: &RequestMeta,
        tls: Option<&TlsHandshakeRecord>,
        http: Option<HttpRecord<'_>>,
    ) -> Response {
        self.assemble_at(request, tls, http, unix_millis())
    }

    /// As [`assemble`](Self::assemble) with an explicit timestamp.
    pub fn assemble_at(
        &self,
        request: &RequestMeta,
        tls: Option<&TlsHandshakeRecord>,
        http: Option<HttpRecord<'_>>,
        timestamp: u64,
    ) -> Response {
        let (http1, http2) = match http {
            Some(HttpRecord::Http1(request)) => (Some(request), None),
            Some(HttpRecord::Http2(record)) => (None, Some(record)),
            None => (None, None),
        };

        let fingerprints = FingerprintSet::compute(tls, http2, request.transport);
        let tls_details = tls
            .zip(fingerprints.tls.as_ref())
            .map(|(record, fps)| TlsDetails::new(record, fps));
        let http2_details = http2
            .zip(fingerprints.akamai.as_ref())
            .map(|(record, akamai)| Http2Details::new(record, akamai));

        let user_agent = request
            .user_agent
            .clone()
            .or_else(|| http1.and_then(Http1Request::user_agent).map(str::to_string));

        let response = Response {
            timestamp,
            ip: request.client.to_string(),
            http_version: request.transport,
            path: request.path.clone(),
            method: request.method.clone(),
            user_agent,
            tls: tls_details,
            http1: http1.map(Http1Details::from),
            http2: http2_details,
            tcpip: self.lookup_tcpip(request.client),
        };

        info!("{}", access_line(&response, request));
        response
    }
}

/// `ip method version path ja3_hash`, with `-` when there was no ClientHello.
pub fn access_line(response: &Response, request: &RequestMeta) -> String {
    format!(
        "{} {} {} {} {}",
        request.client.ip(),
        response.method,
        response.http_version,
        response.path,
        response.ja3_hash().unwrap_or("-")
    )
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
