use trackme::akamai::akamai_fingerprint;
use trackme::http2_parser::{
    parse_frames, FramePayload, Http2FrameType, Http2Priority, PseudoHeader, SettingId,
    CONNECTION_PREFACE,
};

fn frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() as u32).to_be_bytes();
    let mut out = vec![len[1], len[2], len[3], frame_type, flags];
    out.extend(stream_id.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn settings(pairs: &[(u16, u32)]) -> Vec<u8> {
    let payload: Vec<u8> = pairs
        .iter()
        .flat_map(|(id, value)| id.to_be_bytes().into_iter().chain(value.to_be_bytes()))
        .collect();
    frame(0x4, 0x0, 0, &payload)
}

/// `:method GET`, `:authority example.com`, `:scheme https`, `:path /`
fn chrome_header_block() -> Vec<u8> {
    let mut block = vec![0x82, 0x41, 0x0b];
    block.extend_from_slice(b"example.com");
    block.extend([0x87, 0x84]);
    block
}

fn chrome_like_stream() -> Vec<u8> {
    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend(settings(&[(1, 65536), (2, 0), (4, 6291456), (6, 262144)]));
    data.extend(frame(0x8, 0x0, 0, &15663105u32.to_be_bytes()));
    data.extend(frame(0x1, 0x05, 1, &chrome_header_block()));
    data
}

#[test]
fn test_chrome_like_connection() {
    let record = parse_frames(&chrome_like_stream());
    assert_eq!(record.frames.len(), 3);

    let settings = record.settings();
    assert_eq!(settings.len(), 4);
    assert_eq!(settings[0].id, SettingId::HeaderTableSize);
    assert_eq!(settings[3].value, 262144);
    assert_eq!(record.window_update(), Some(15663105));
    assert_eq!(
        record.pseudo_header_order(),
        &[PseudoHeader::Method, PseudoHeader::Authority, PseudoHeader::Scheme, PseudoHeader::Path]
    );

    let headers = &record.frames[2];
    assert_eq!(headers.frame_type, Http2FrameType::Headers);
    assert_eq!(headers.flag_names(), vec!["EndStream (0x1)", "EndHeaders (0x4)"]);
    match &headers.payload {
        Some(FramePayload::Headers { headers, priority, .. }) => {
            assert_eq!(headers[1], ":authority: example.com");
            assert_eq!(*priority, None);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn test_akamai_fingerprint() {
    let fp = akamai_fingerprint(&parse_frames(&chrome_like_stream()));
    assert_eq!(fp.fingerprint, "1:65536;2:0;4:6291456;6:262144|15663105||m,a,s,p");
    assert_eq!(fp.hash, "7914497f0744eafde1226048608c4330");
}

#[test]
fn test_priority_frames_and_absent_window_update() {
    let mut data = settings(&[(3, 100)]);
    // stream 3 depends exclusively on stream 0, weight byte 200
    data.extend(frame(0x2, 0x0, 3, &[0x80, 0x00, 0x00, 0x00, 200]));
    data.extend(frame(0x2, 0x0, 5, &[0x00, 0x00, 0x00, 0x03, 0]));
    let record = parse_frames(&data);

    assert_eq!(
        record.priorities(),
        vec![
            Http2Priority { stream_id: 3, exclusive: true, depends_on: 0, weight: 200 },
            Http2Priority { stream_id: 5, exclusive: false, depends_on: 3, weight: 0 },
        ]
    );
    assert_eq!(record.window_update(), None);
    assert_eq!(akamai_fingerprint(&record).fingerprint, "3:100||3:1:0:201,5:0:3:1|");
}

#[test]
fn test_settings_ack_is_not_the_client_settings() {
    let mut data = frame(0x4, 0x1, 0, &[]);
    data.extend(settings(&[(4, 131072)]));
    let record = parse_frames(&data);
    assert_eq!(record.settings().len(), 1);
    assert_eq!(record.settings()[0].value, 131072);
    assert_eq!(record.frames[0].flag_names(), vec!["Ack (0x1)"]);
}

#[test]
fn test_continuation_completes_header_block() {
    let block = chrome_header_block();
    let mut data = frame(0x1, 0x01, 1, &block[..3]);
    data.extend(frame(0x9, 0x04, 1, &block[3..]));
    let record = parse_frames(&data);

    assert_eq!(record.frames.len(), 2);
    assert_eq!(record.pseudo_header_order().len(), 4);
}

#[test]
fn test_goaway_rst_and_ping() {
    let mut goaway = 7u32.to_be_bytes().to_vec();
    goaway.extend(2u32.to_be_bytes());
    goaway.extend_from_slice(b"bye");
    let mut data = frame(0x7, 0x0, 0, &goaway);
    data.extend(frame(0x3, 0x0, 1, &8u32.to_be_bytes()));
    data.extend(frame(0x6, 0x0, 0, &[1, 2, 3, 4, 5, 6, 7, 8]));
    let record = parse_frames(&data);

    match &record.frames[0].payload {
        Some(FramePayload::GoAway(g)) => {
            assert_eq!((g.last_stream_id, g.error_code), (7, 2));
            assert_eq!(g.debug_data, b"bye".to_vec());
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert_eq!(record.frames[1].payload, Some(FramePayload::RstStream(8)));
    assert_eq!(record.frames[2].payload, Some(FramePayload::Ping(vec![1, 2, 3, 4, 5, 6, 7, 8])));
}

#[test]
fn test_incomplete_trailing_frame_is_dropped() {
    let mut data = chrome_like_stream();
    data.extend([0x00, 0x00, 0x10, 0x00]);
    let record = parse_frames(&data);
    assert_eq!(record.frames.len(), 3);
}

#[test]
fn test_undecodable_settings_keep_frame_header() {
    let record = parse_frames(&frame(0x4, 0x0, 0, &[0x00, 0x01, 0x00]));
    assert_eq!(record.frames.len(), 1);
    assert_eq!(record.frames[0].payload, None);
    assert!(record.settings().is_empty());
}

#[test]
fn test_truncated_table_size_update_drops_headers_payload() {
    // 0x3f starts a dynamic table size update whose integer continues past the block end
    let record = parse_frames(&frame(0x1, 0x04, 1, &[0x3f, 0xab]));
    assert_eq!(record.frames.len(), 1);
    assert_eq!(record.frames[0].frame_type, Http2FrameType::Headers);
    assert_eq!(record.frames[0].stream_id, 1);
    assert_eq!(record.frames[0].payload, None);
    assert!(record.pseudo_header_order().is_empty());
}

#[test]
fn test_corrupt_header_block_keeps_following_frames() {
    let mut data = settings(&[(4, 6291456)]);
    // indexed field 62: first dynamic table slot, while the table is still empty
    data.extend(frame(0x1, 0x05, 1, &[0xbe]));
    data.extend(frame(0x8, 0x0, 0, &1000u32.to_be_bytes()));
    let record = parse_frames(&data);

    assert_eq!(record.frames.len(), 3);
    assert_eq!(record.frames[1].payload, None);
    assert!(record.pseudo_header_order().is_empty());
    assert_eq!(record.window_update(), Some(1000));
    assert_eq!(akamai_fingerprint(&record).fingerprint, "4:6291456|1000||");
}

#[test]
fn test_corrupt_continuation_block_leaves_headers_undecoded() {
    let mut data = frame(0x1, 0x01, 1, &[0x82]);
    data.extend(frame(0x9, 0x04, 1, &[0x3f]));
    let record = parse_frames(&data);

    assert_eq!(record.frames.len(), 2);
    assert_eq!(record.frames[0].payload, None);
    assert!(record.pseudo_header_order().is_empty());
}
