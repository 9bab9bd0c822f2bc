use crate::error::TrackmeError;
use httparse::{Request, Status, EMPTY_HEADER};
use tracing::debug;

const MAX_HEADERS: usize = 64;

/// HTTP/1.x request head with headers in the order the client sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http1Request {
    pub method: String,
    pub path: String,
    /// Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub version: u8,
    pub headers: Vec<(String, String)>,
}

impl Http1Request {
    /// `Name: value` lines, original casing and order.
    pub fn header_lines(&self) -> Vec<String> {
        self.headers.iter().map(|(name, value)| format!("{name}: {value}")).collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("User-Agent")
    }
}

/// Parse a request head. `Ok(None)` means more bytes are needed.
pub fn parse_http1_request(data: &[u8]) -> Result<Option<Http1Request>, TrackmeError> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut req = Request::new(&mut headers);

    match req.parse(data) {
        Ok(Status::Complete(_)) => Ok(Some(Http1Request {
            method: req.method.unwrap_or_default().to_string(),
            path: req.path.unwrap_or_default().to_string(),
            version: req.version.unwrap_or(1),
            headers: req
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect(),
        })),
        Ok(Status::Partial) => {
            debug!("Incomplete HTTP/1 request ({} bytes)", data.len());
            Ok(None)
        }
        Err(e) => Err(TrackmeError::Parse(format!("Failed to parse HTTP/1 request: {e}"))),
    }
}
