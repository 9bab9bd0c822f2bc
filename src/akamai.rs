//! Akamai HTTP/2 fingerprint.
//!
//! Based on: https://www.blackhat.com/docs/eu-17/materials/eu-17-Shuster-Passive-Fingerprinting-Of-HTTP2-Clients-wp.pdf
//!
//! Format: `S[;]|WU|P[,]|PS[,]`
//! - S: SETTINGS parameters (`id:value`, send order)
//! - WU: connection-level WINDOW_UPDATE increment
//! - P: PRIORITY frames (`stream:exclusive:depends_on:weight`)
//! - PS: pseudo-header order (`m,a,s,p`)
//!
//! A component the client never sent leaves its segment empty.
//!
//! Example: `1:65536;2:0;4:6291456;6:262144|15663105||m,a,s,p`
use crate::fingerprint::md5_hex;
use crate::http2_parser::{Http2FrameRecord, Http2Priority, PseudoHeader, SettingParameter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkamaiFingerprint {
    pub settings: Vec<SettingParameter>,
    pub window_update: Option<u32>,
    pub priority_frames: Vec<Http2Priority>,
    pub pseudo_header_order: Vec<PseudoHeader>,
    pub fingerprint: String,
    /// MD5 of `fingerprint`.
    pub hash: String,
}

impl AkamaiFingerprint {
    pub fn generate_fingerprint_string(
        settings: &[SettingParameter],
        window_update: Option<u32>,
        priority_frames: &[Http2Priority],
        pseudo_header_order: &[PseudoHeader],
    ) -> String {
        let settings_str = settings
            .iter()
            .map(|s| format!("{}:{}", s.id.as_u16(), s.value))
            .collect::<Vec<_>>()
            .join(";");

        let window_str = window_update.map(|w| w.to_string()).unwrap_or_default();

        let priority_str = priority_frames
            .iter()
            .map(|p| {
                format!(
                    "{}:{}:{}:{}",
                    p.stream_id,
                    u8::from(p.exclusive),
                    p.depends_on,
                    p.effective_weight()
                )
            })
            .collect::<Vec<_>>()
            .join(",");

        let pseudo_str = pseudo_header_order
            .iter()
            .map(std::string::ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        format!("{settings_str}|{window_str}|{priority_str}|{pseudo_str}")
    }

    pub fn new(
        settings: Vec<SettingParameter>,
        window_update: Option<u32>,
        priority_frames: Vec<Http2Priority>,
        pseudo_header_order: Vec<PseudoHeader>,
    ) -> Self {
        let fingerprint = Self::generate_fingerprint_string(
            &settings,
            window_update,
            &priority_frames,
            &pseudo_header_order,
        );
        let hash = md5_hex(&fingerprint);

        Self { settings, window_update, priority_frames, pseudo_header_order, fingerprint, hash }
    }
}

/// Fingerprint of the connection-setup frames in `record`.
pub fn akamai_fingerprint(record: &Http2FrameRecord) -> AkamaiFingerprint {
    AkamaiFingerprint::new(
        record.settings().to_vec(),
        record.window_update(),
        record.priorities(),
        record.pseudo_header_order().to_vec(),
    )
}
