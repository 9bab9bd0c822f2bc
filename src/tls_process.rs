use crate::error::TrackmeError;
use crate::tls::{
    ExtensionParams, TlsExtensionRecord, TlsHandshakeRecord, EXT_COMPRESS_CERTIFICATE,
    EXT_KEY_SHARE, EXT_PSK_KEY_EXCHANGE_MODES,
};
use tls_parser::{
    parse_tls_extension, parse_tls_plaintext, TlsClientHelloContents, TlsExtension, TlsMessage,
    TlsMessageHandshake,
};
use tracing::debug;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;

/// Normalise a ClientHello into a [`TlsHandshakeRecord`].
///
/// Accepts either a complete TLS record or a bare handshake message. Only a missing or
/// undecodable ClientHello is an error; an extension whose body cannot be decoded is kept with
/// its id and no parameters.
pub fn parse_client_hello(data: &[u8]) -> Result<TlsHandshakeRecord, TrackmeError> {
    let framed;
    let record: &[u8] = match data.first() {
        Some(&CONTENT_TYPE_HANDSHAKE) => data,
        Some(&HANDSHAKE_CLIENT_HELLO) => {
            framed = frame_handshake(data)?;
            &framed
        }
        Some(other) => {
            return Err(TrackmeError::UnsupportedProtocol(format!(
                "not a TLS handshake (first byte 0x{other:02x})"
            )))
        }
        None => return Err(TrackmeError::Parse("empty ClientHello".to_string())),
    };

    let (_, plaintext) = parse_tls_plaintext(record)
        .map_err(|e| TrackmeError::Parse(format!("TLS parsing failed: {e:?}")))?;

    let client_hello = plaintext
        .msg
        .iter()
        .find_map(|message| match message {
            TlsMessage::Handshake(TlsMessageHandshake::ClientHello(ch)) => Some(ch),
            _ => None,
        })
        .ok_or_else(|| TrackmeError::Parse("no ClientHello in TLS record".to_string()))?;

    Ok(build_record(plaintext.hdr.version.0, client_hello, data))
}

fn frame_handshake(handshake: &[u8]) -> Result<Vec<u8>, TrackmeError> {
    let len = u16::try_from(handshake.len())
        .map_err(|_| TrackmeError::Parse("handshake message too large".to_string()))?;
    let mut record = Vec::with_capacity(handshake.len() + 5);
    record.extend_from_slice(&[CONTENT_TYPE_HANDSHAKE, 0x03, 0x01]);
    record.extend_from_slice(&len.to_be_bytes());
    record.extend_from_slice(handshake);
    Ok(record)
}

fn build_record(
    record_version: u16,
    client_hello: &TlsClientHelloContents,
    raw: &[u8],
) -> TlsHandshakeRecord {
    TlsHandshakeRecord {
        record_version,
        client_version: client_hello.version.0,
        negotiated_version: None,
        client_random: client_hello.random.to_vec(),
        session_id: client_hello.session_id.map(<[u8]>::to_vec).unwrap_or_default(),
        cipher_suites: client_hello.ciphers.iter().map(|c| c.0).collect(),
        compression_methods: client_hello.comp.iter().map(|c| c.0).collect(),
        extensions: client_hello.ext.map(parse_extensions).unwrap_or_default(),
        raw: raw.to_vec(),
    }
}

/// Walk the extension block keeping wire order. A truncated trailing extension is dropped.
pub fn parse_extensions(mut data: &[u8]) -> Vec<TlsExtensionRecord> {
    let mut extensions = Vec::new();

    while data.len() >= 4 {
        let id = u16::from_be_bytes([data[0], data[1]]);
        let len = usize::from(u16::from_be_bytes([data[2], data[3]]));
        let Some(whole) = data.get(..4 + len) else {
            debug!("Extension 0x{:04x} truncated ({} of {} bytes)", id, data.len() - 4, len);
            break;
        };
        let body = &whole[4..];
        extensions.push(TlsExtensionRecord::new(id, decode_extension(id, whole, body)));
        data = &data[4 + len..];
    }

    extensions
}

fn decode_extension(id: u16, whole: &[u8], body: &[u8]) -> Option<ExtensionParams> {
    match id {
        EXT_PSK_KEY_EXCHANGE_MODES => u8_list(body).map(ExtensionParams::PskKeyExchangeModes),
        EXT_COMPRESS_CERTIFICATE => {
            u8_prefixed_u16_list(body).map(ExtensionParams::CompressCertificate)
        }
        EXT_KEY_SHARE => key_share_groups(body).map(ExtensionParams::KeyShare),
        _ => match parse_tls_extension(whole) {
            Ok((_, extension)) => Some(typed_params(&extension, body.len())),
            Err(e) => {
                debug!("Failed to decode extension 0x{:04x}: {:?}", id, e);
                None
            }
        },
    }
}

fn typed_params(extension: &TlsExtension, length: usize) -> ExtensionParams {
    match extension {
        TlsExtension::SNI(names) => match names.first() {
            Some((_, host)) => ExtensionParams::ServerName(String::from_utf8_lossy(host).into_owned()),
            None => ExtensionParams::Opaque { length },
        },
        TlsExtension::EllipticCurves(groups) => {
            ExtensionParams::SupportedGroups(groups.iter().map(|g| g.0).collect())
        }
        TlsExtension::EcPointFormats(formats) => ExtensionParams::EcPointFormats(formats.to_vec()),
        TlsExtension::SignatureAlgorithms(algs) => ExtensionParams::SignatureAlgorithms(algs.clone()),
        TlsExtension::ALPN(protocols) => ExtensionParams::Alpn(
            protocols.iter().map(|p| String::from_utf8_lossy(p).into_owned()).collect(),
        ),
        TlsExtension::SupportedVersions(versions) => {
            ExtensionParams::SupportedVersions(versions.iter().map(|v| v.0).collect())
        }
        _ => ExtensionParams::Opaque { length },
    }
}

/// `u8 length || u8 items`
fn u8_list(body: &[u8]) -> Option<Vec<u8>> {
    let (&len, rest) = body.split_first()?;
    rest.get(..usize::from(len)).map(<[u8]>::to_vec)
}

/// `u8 length || u16 items`
fn u8_prefixed_u16_list(body: &[u8]) -> Option<Vec<u16>> {
    let items = u8_list(body)?;
    if items.len() % 2 != 0 {
        return None;
    }
    Some(items.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
}

/// Client `key_share`: `u16 length || (u16 group, u16 key length, key)*`
fn key_share_groups(body: &[u8]) -> Option<Vec<u16>> {
    let len = usize::from(u16::from_be_bytes([*body.first()?, *body.get(1)?]));
    let mut entries = body.get(2..2 + len)?;
    let mut groups = Vec::new();
    while !entries.is_empty() {
        let header = entries.get(..4)?;
        let group = u16::from_be_bytes([header[0], header[1]]);
        let key_len = usize::from(u16::from_be_bytes([header[2], header[3]]));
        groups.push(group);
        entries = entries.get(4 + key_len..)?;
    }
    Some(groups)
}
