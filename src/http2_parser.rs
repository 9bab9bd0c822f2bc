//! HTTP/2 connection-setup decoding.
//!
//! Turns the client side of an HTTP/2 connection (optionally starting with the connection
//! preface) into an ordered [`Http2FrameRecord`]. Each frame keeps its header; its typed
//! payload is `None` when the payload cannot be decoded.
use hpack_patched::Decoder;
use nom::bytes::complete::take;
use nom::number::complete::{be_u24, be_u32, be_u8, be_u16};
use nom::IResult;
use std::fmt;
use tracing::debug;

pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

const FLAG_END_STREAM: u8 = 0x1;
const FLAG_ACK: u8 = 0x1;
const FLAG_END_HEADERS: u8 = 0x4;
const FLAG_PADDED: u8 = 0x8;
const FLAG_PRIORITY: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Http2FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl From<u8> for Http2FrameType {
    fn from(value: u8) -> Self {
        match value {
            0x0 => Self::Data,
            0x1 => Self::Headers,
            0x2 => Self::Priority,
            0x3 => Self::RstStream,
            0x4 => Self::Settings,
            0x5 => Self::PushPromise,
            0x6 => Self::Ping,
            0x7 => Self::GoAway,
            0x8 => Self::WindowUpdate,
            0x9 => Self::Continuation,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Http2FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "DATA"),
            Self::Headers => write!(f, "HEADERS"),
            Self::Priority => write!(f, "PRIORITY"),
            Self::RstStream => write!(f, "RST_STREAM"),
            Self::Settings => write!(f, "SETTINGS"),
            Self::PushPromise => write!(f, "PUSH_PROMISE"),
            Self::Ping => write!(f, "PING"),
            Self::GoAway => write!(f, "GOAWAY"),
            Self::WindowUpdate => write!(f, "WINDOW_UPDATE"),
            Self::Continuation => write!(f, "CONTINUATION"),
            Self::Unknown(t) => write!(f, "UNKNOWN_{t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    EnableConnectProtocol,
    NoRfc7540Priorities,
    Unknown(u16),
}

impl From<u16> for SettingId {
    fn from(id: u16) -> Self {
        match id {
            1 => Self::HeaderTableSize,
            2 => Self::EnablePush,
            3 => Self::MaxConcurrentStreams,
            4 => Self::InitialWindowSize,
            5 => Self::MaxFrameSize,
            6 => Self::MaxHeaderListSize,
            8 => Self::EnableConnectProtocol,
            9 => Self::NoRfc7540Priorities,
            other => Self::Unknown(other),
        }
    }
}

impl SettingId {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::HeaderTableSize => 1,
            Self::EnablePush => 2,
            Self::MaxConcurrentStreams => 3,
            Self::InitialWindowSize => 4,
            Self::MaxFrameSize => 5,
            Self::MaxHeaderListSize => 6,
            Self::EnableConnectProtocol => 8,
            Self::NoRfc7540Priorities => 9,
            Self::Unknown(id) => id,
        }
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTableSize => write!(f, "HEADER_TABLE_SIZE"),
            Self::EnablePush => write!(f, "ENABLE_PUSH"),
            Self::MaxConcurrentStreams => write!(f, "MAX_CONCURRENT_STREAMS"),
            Self::InitialWindowSize => write!(f, "INITIAL_WINDOW_SIZE"),
            Self::MaxFrameSize => write!(f, "MAX_FRAME_SIZE"),
            Self::MaxHeaderListSize => write!(f, "MAX_HEADER_LIST_SIZE"),
            Self::EnableConnectProtocol => write!(f, "ENABLE_CONNECT_PROTOCOL"),
            Self::NoRfc7540Priorities => write!(f, "NO_RFC7540_PRIORITIES"),
            Self::Unknown(id) => write!(f, "UNKNOWN_SETTING_{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingParameter {
    pub id: SettingId,
    pub value: u32,
}

impl fmt::Display for SettingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.id, self.value)
    }
}

/// Stream priority as sent in a PRIORITY frame or a HEADERS priority block.
///
/// `weight` is the wire byte (0-255), meaning an effective weight of 1-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Http2Priority {
    pub stream_id: u32,
    pub exclusive: bool,
    pub depends_on: u32,
    pub weight: u8,
}

impl Http2Priority {
    pub fn effective_weight(&self) -> u16 {
        u16::from(self.weight) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoHeader {
    Method,
    Path,
    Authority,
    Scheme,
    Status,
    Protocol,
    Unknown(String),
}

impl From<&str> for PseudoHeader {
    fn from(s: &str) -> Self {
        match s {
            ":method" => Self::Method,
            ":path" => Self::Path,
            ":authority" => Self::Authority,
            ":scheme" => Self::Scheme,
            ":status" => Self::Status,
            ":protocol" => Self::Protocol,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PseudoHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => write!(f, "m"),
            Self::Path => write!(f, "p"),
            Self::Authority => write!(f, "a"),
            Self::Scheme => write!(f, "s"),
            Self::Status => write!(f, "st"),
            Self::Protocol => write!(f, "pr"),
            Self::Unknown(name) => write!(f, "?{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAway {
    pub last_stream_id: u32,
    pub error_code: u32,
    pub debug_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Settings(Vec<SettingParameter>),
    WindowUpdate(u32),
    Priority(Http2Priority),
    Headers {
        /// Decoded `name: value` lines in block order.
        headers: Vec<String>,
        pseudo_header_order: Vec<PseudoHeader>,
        priority: Option<Http2Priority>,
    },
    GoAway(GoAway),
    RstStream(u32),
    Ping(Vec<u8>),
    Data,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http2Frame {
    pub frame_type: Http2FrameType,
    pub flags: u8,
    pub stream_id: u32,
    pub length: u32,
    pub payload: Option<FramePayload>,
}

impl Http2Frame {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag == flag
    }

    /// Flags meaningful for this frame type, e.g. `EndHeaders (0x4)`.
    pub fn flag_names(&self) -> Vec<String> {
        let known: &[(u8, &str)] = match self.frame_type {
            Http2FrameType::Data => &[(FLAG_END_STREAM, "EndStream"), (FLAG_PADDED, "Padded")],
            Http2FrameType::Headers => &[
                (FLAG_END_STREAM, "EndStream"),
                (FLAG_END_HEADERS, "EndHeaders"),
                (FLAG_PADDED, "Padded"),
                (FLAG_PRIORITY, "Priority"),
            ],
            Http2FrameType::Settings | Http2FrameType::Ping => &[(FLAG_ACK, "Ack")],
            Http2FrameType::PushPromise => {
                &[(FLAG_END_HEADERS, "EndHeaders"), (FLAG_PADDED, "Padded")]
            }
            Http2FrameType::Continuation => &[(FLAG_END_HEADERS, "EndHeaders")],
            _ => &[],
        };
        known
            .iter()
            .filter(|(bit, _)| self.has_flag(*bit))
            .map(|(bit, name)| format!("{name} (0x{bit:x})"))
            .collect()
    }
}

/// Frames of one connection in the order they were sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Http2FrameRecord {
    pub frames: Vec<Http2Frame>,
}

impl Http2FrameRecord {
    pub fn new(frames: Vec<Http2Frame>) -> Self {
        Self { frames }
    }

    /// Parameters of the first non-ACK SETTINGS frame.
    pub fn settings(&self) -> &[SettingParameter] {
        self.frames
            .iter()
            .filter(|f| f.frame_type == Http2FrameType::Settings && !f.has_flag(FLAG_ACK))
            .find_map(|f| match &f.payload {
                Some(FramePayload::Settings(settings)) => Some(settings.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Increment of the first connection-level WINDOW_UPDATE.
    pub fn window_update(&self) -> Option<u32> {
        self.frames.iter().filter(|f| f.stream_id == 0).find_map(|f| match f.payload {
            Some(FramePayload::WindowUpdate(increment)) => Some(increment),
            _ => None,
        })
    }

    /// Standalone PRIORITY frames in send order.
    pub fn priorities(&self) -> Vec<Http2Priority> {
        self.frames
            .iter()
            .filter_map(|f| match f.payload {
                Some(FramePayload::Priority(priority)) => Some(priority),
                _ => None,
            })
            .collect()
    }

    /// Pseudo-header order of the first request HEADERS frame.
    pub fn pseudo_header_order(&self) -> &[PseudoHeader] {
        self.frames
            .iter()
            .filter(|f| f.stream_id > 0)
            .find_map(|f| match &f.payload {
                Some(FramePayload::Headers { pseudo_header_order, .. }) => {
                    Some(pseudo_header_order.as_slice())
                }
                _ => None,
            })
            .unwrap_or(&[])
    }
}

struct FrameHeader {
    length: u32,
    frame_type: Http2FrameType,
    flags: u8,
    stream_id: u32,
}

fn frame_header(input: &[u8]) -> IResult<&[u8], FrameHeader> {
    let (input, length) = be_u24(input)?;
    let (input, frame_type) = be_u8(input)?;
    let (input, flags) = be_u8(input)?;
    let (input, stream_id) = be_u32(input)?;
    Ok((
        input,
        FrameHeader {
            length,
            frame_type: Http2FrameType::from(frame_type),
            flags,
            stream_id: stream_id & 0x7fff_ffff,
        },
    ))
}

fn frame(input: &[u8]) -> IResult<&[u8], (FrameHeader, &[u8])> {
    let (input, header) = frame_header(input)?;
    let (input, payload) = take(header.length)(input)?;
    Ok((input, (header, payload)))
}

fn setting(input: &[u8]) -> IResult<&[u8], SettingParameter> {
    let (input, id) = be_u16(input)?;
    let (input, value) = be_u32(input)?;
    Ok((input, SettingParameter { id: SettingId::from(id), value }))
}

/// `E(1) | dependency(31) | weight(8)`
fn priority_fields(input: &[u8]) -> IResult<&[u8], (bool, u32, u8)> {
    let (input, dependency) = be_u32(input)?;
    let (input, weight) = be_u8(input)?;
    Ok((input, (dependency & 0x8000_0000 != 0, dependency & 0x7fff_ffff, weight)))
}

fn settings_payload(mut input: &[u8]) -> Option<Vec<SettingParameter>> {
    if input.len() % 6 != 0 {
        return None;
    }
    let mut settings = Vec::with_capacity(input.len() / 6);
    while !input.is_empty() {
        let (rest, parameter) = setting(input).ok()?;
        settings.push(parameter);
        input = rest;
    }
    Some(settings)
}

fn error_code_payload(input: &[u8]) -> Option<u32> {
    be_u32::<_, nom::error::Error<&[u8]>>(input).ok().map(|(_, code)| code)
}

fn window_update_payload(input: &[u8]) -> Option<u32> {
    error_code_payload(input).map(|v| v & 0x7fff_ffff)
}

fn priority_payload(stream_id: u32, input: &[u8]) -> Option<Http2Priority> {
    let (_, (exclusive, depends_on, weight)) = priority_fields(input).ok()?;
    Some(Http2Priority { stream_id, exclusive, depends_on, weight })
}

fn goaway_payload(input: &[u8]) -> Option<GoAway> {
    let (debug_data, (last_stream_id, error_code)) = goaway_fields(input).ok()?;
    Some(GoAway { last_stream_id: last_stream_id & 0x7fff_ffff, error_code, debug_data: debug_data.to_vec() })
}

fn goaway_fields(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    let (input, last_stream_id) = be_u32(input)?;
    let (input, error_code) = be_u32(input)?;
    Ok((input, (last_stream_id, error_code)))
}

/// Header block fragment of a HEADERS frame plus its optional priority block.
fn headers_fragment(header: &FrameHeader, payload: &[u8]) -> Option<(Option<Http2Priority>, Vec<u8>)> {
    let mut body = payload;
    let mut pad_len = 0usize;
    if header.flags & FLAG_PADDED != 0 {
        let (&pad, rest) = body.split_first()?;
        pad_len = usize::from(pad);
        body = rest;
    }

    let mut priority = None;
    if header.flags & FLAG_PRIORITY != 0 {
        let (rest, (exclusive, depends_on, weight)) = priority_fields(body).ok()?;
        priority = Some(Http2Priority { stream_id: header.stream_id, exclusive, depends_on, weight });
        body = rest;
    }

    let end = body.len().checked_sub(pad_len)?;
    Some((priority, body[..end].to_vec()))
}

fn decode_header_block(decoder: &mut Decoder<'_>, block: &[u8]) -> Option<(Vec<String>, Vec<PseudoHeader>)> {
    let decoded = match decoder.decode(block) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("HPACK decoding failed: {:?}", e);
            return None;
        }
    };

    let mut lines = Vec::with_capacity(decoded.len());
    let mut pseudo = Vec::new();
    for (name, value) in &decoded {
        let name = String::from_utf8_lossy(name);
        if name.starts_with(':') {
            pseudo.push(PseudoHeader::from(name.as_ref()));
        }
        lines.push(format!("{}: {}", name, String::from_utf8_lossy(value)));
    }
    Some((lines, pseudo))
}

/// Decode a client-to-server HTTP/2 byte stream.
///
/// Decoding stops at the first incomplete frame; everything before it is returned.
pub fn parse_frames(data: &[u8]) -> Http2FrameRecord {
    let mut input = data.strip_prefix(CONNECTION_PREFACE).unwrap_or(data);
    let mut decoder = Decoder::new();
    let mut frames: Vec<Http2Frame> = Vec::new();
    // HEADERS frame index waiting for CONTINUATION, with the block collected so far.
    let mut pending: Option<(usize, Option<Http2Priority>, Vec<u8>)> = None;

    while !input.is_empty() {
        let (rest, (header, payload)) = match frame(input) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!("Incomplete HTTP/2 frame, {} trailing bytes ignored", input.len());
                break;
            }
        };
        input = rest;

        let decoded = match header.frame_type {
            Http2FrameType::Settings if header.flags & FLAG_ACK != 0 => Some(FramePayload::Other),
            Http2FrameType::Settings => settings_payload(payload).map(FramePayload::Settings),
            Http2FrameType::WindowUpdate => {
                window_update_payload(payload).map(FramePayload::WindowUpdate)
            }
            Http2FrameType::Priority => {
                priority_payload(header.stream_id, payload).map(FramePayload::Priority)
            }
            Http2FrameType::GoAway => goaway_payload(payload).map(FramePayload::GoAway),
            Http2FrameType::RstStream => error_code_payload(payload).map(FramePayload::RstStream),
            Http2FrameType::Ping => Some(FramePayload::Ping(payload.to_vec())),
            Http2FrameType::Data => Some(FramePayload::Data),
            Http2FrameType::Headers => {
                pending = None;
                match headers_fragment(&header, payload) {
                    Some((priority, block)) if header.flags & FLAG_END_HEADERS != 0 => {
                        decode_header_block(&mut decoder, &block).map(|(headers, pseudo_header_order)| {
                            FramePayload::Headers { headers, pseudo_header_order, priority }
                        })
                    }
                    Some((priority, block)) => {
                        pending = Some((frames.len(), priority, block));
                        None
                    }
                    None => None,
                }
            }
            Http2FrameType::Continuation => {
                if let Some((index, priority, mut block)) = pending.take() {
                    block.extend_from_slice(payload);
                    if header.flags & FLAG_END_HEADERS != 0 {
                        if let Some((headers, pseudo_header_order)) =
                            decode_header_block(&mut decoder, &block)
                        {
                            if let Some(headers_frame) = frames.get_mut(index) {
                                headers_frame.payload = Some(FramePayload::Headers {
                                    headers,
                                    pseudo_header_order,
                                    priority,
                                });
                            }
                        }
                    } else {
                        pending = Some((index, priority, block));
                    }
                }
                Some(FramePayload::Other)
            }
            _ => Some(FramePayload::Other),
        };

        if decoded.is_none() {
            debug!(
                "Undecodable {} payload on stream {} ({} bytes)",
                header.frame_type, header.stream_id, header.length
            );
        }

        frames.push(Http2Frame {
            frame_type: header.frame_type,
            flags: header.flags,
            stream_id: header.stream_id,
            length: header.length,
            payload: decoded,
        });
    }

    Http2FrameRecord::new(frames)
}
