use crate::error::RouteError;
use crate::output::{Response, SmallResponse, TlsResponse};
use tracing::info;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_GIF: &str = "image/gif";

/// 1x1 transparent GIF89a.
pub const PIXEL_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub const NOT_FOUND_BODY: &str = r#"{"error": "page not found"}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl RouteReply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, content_type, body: body.into() }
    }

    fn not_found() -> Self {
        Self { status: 404, content_type: CONTENT_TYPE_JSON, body: NOT_FOUND_BODY.into() }
    }
}

impl From<&RouteError> for RouteReply {
    fn from(err: &RouteError) -> Self {
        let message = serde_json::Value::String(err.to_string());
        Self {
            status: err.status(),
            content_type: CONTENT_TYPE_JSON,
            body: format!(r#"{{"error": {message}}}"#).into_bytes(),
        }
    }
}

/// Path without query string or fragment.
pub fn route_path(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Reply for `path`. Unknown paths get the 404 body; only endpoint failures are errors.
pub fn route(path: &str, response: &Response) -> Result<RouteReply, RouteError> {
    match route_path(path) {
        "/api/all" => Ok(RouteReply::ok(CONTENT_TYPE_JSON, response.to_json()?)),
        "/api/tls" => api_tls(response),
        "/api/clean" => Ok(RouteReply::ok(
            CONTENT_TYPE_JSON,
            SmallResponse::from(response).to_json()?,
        )),
        "/api/raw" => api_raw(response),
        "/pixel.gif" | "/analytics.gif" => {
            info!("{}", response.to_json_line()?);
            Ok(RouteReply::ok(CONTENT_TYPE_GIF, PIXEL_GIF.to_vec()))
        }
        _ => Ok(RouteReply::not_found()),
    }
}

/// [`route`] with errors rendered as JSON replies.
pub fn handle(path: &str, response: &Response) -> RouteReply {
    route(path, response).unwrap_or_else(|err| RouteReply::from(&err))
}

fn api_tls(response: &Response) -> Result<RouteReply, RouteError> {
    let tls = TlsResponse::new(response).ok_or(RouteError::TlsNotAvailable)?;
    Ok(RouteReply::ok(CONTENT_TYPE_JSON, serde_json::to_string_pretty(&tls)?))
}

fn api_raw(response: &Response) -> Result<RouteReply, RouteError> {
    let tls = response.tls.as_ref().ok_or(RouteError::TlsNotAvailable)?;
    let body = format!(r#"{{"raw": "{}", "raw_b64": "{}"}}"#, tls.raw, tls.raw_b64);
    Ok(RouteReply::ok(CONTENT_TYPE_JSON, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path_strips_query() {
        assert_eq!(route_path("/api/all?by=ja3"), "/api/all");
        assert_eq!(route_path("/pixel.gif#x"), "/pixel.gif");
        assert_eq!(route_path("/"), "/");
    }

    #[test]
    fn test_error_reply_body() {
        let reply = RouteReply::from(&RouteError::TlsNotAvailable);
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body, br#"{"error": "TLS details not available"}"#.to_vec());
    }
}
