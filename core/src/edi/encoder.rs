//! Converts a packed ETI [`Frame`] into an EDI AF packet: `*ptr` + `deti` +
//! `tist` + one `est<n>` per active sub-channel, ETSI TS 102 693 Annex 7.

use std::time::{SystemTime, UNIX_EPOCH};

use super::af::AfPacket;
use super::tag::{assemble_tag_packet, TagDeti, TagEst, TagItem, TagStarPtr, TagTist};
use crate::eti::Frame as EtiFrame;

const DLFC_MODULUS: u32 = 5000;
const TAG_PACKET_ALIGNMENT: usize = 8;

/// Stateful per-ensemble EDI encoder: tracks the AF sequence number and the
/// DAB logical frame counter (DLFC) across calls.
pub struct EdiEncoder {
    af_seq: u16,
    dlfc: u32,
}

impl Default for EdiEncoder {
    fn default() -> Self {
        EdiEncoder { af_seq: 0, dlfc: 0 }
    }
}

impl EdiEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the sequence counters. Exposed for test determinism.
    pub fn reset_counters(&mut self) {
        self.af_seq = 0;
        self.dlfc = 0;
    }

    pub fn encode_frame(&mut self, frame: &EtiFrame) -> AfPacket {
        let mut items: Vec<Box<dyn TagItem>> = Vec::new();
        items.push(Box::new(TagStarPtr));
        items.push(Box::new(TagDeti::from_frame(frame, self.dlfc)));
        items.push(Box::new(self.tist_tag()));

        for (idx, stc) in frame.stc_headers.iter().enumerate() {
            let start = stc.start_address() as usize * 8;
            let len = stc.stl() as usize * 8;
            let mst_data = frame.subchannel_data.get(start..start + len).unwrap_or(&[]).to_vec();
            items.push(Box::new(TagEst {
                index: (idx + 1) as u8,
                scid: stc.scid,
                start_address: stc.start_address(),
                tpl: stc.tpl,
                mst_data,
            }));
        }

        let tag_payload = assemble_tag_packet(&items, TAG_PACKET_ALIGNMENT);
        let packet = AfPacket::new(self.af_seq, tag_payload);

        self.af_seq = self.af_seq.wrapping_add(1);
        self.dlfc = (self.dlfc + 1) % DLFC_MODULUS;
        packet
    }

    fn tist_tag(&self) -> TagTist {
        let unix_seconds =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
        TagTist::from_unix_seconds(unix_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eti::{Fc, Frame as EtiFrame, Stc};

    fn sample_frame() -> EtiFrame {
        let mut frame = EtiFrame::create_empty(0, false);
        frame.fc = Fc::new(0, 1, true, 0, 0);
        frame.stc_headers.push(Stc::new(1, 0, 3, 12));
        frame.subchannel_data = vec![0xAA; 96];
        frame.finalize();
        frame
    }

    #[test]
    fn encodes_increasing_af_sequence() {
        let mut encoder = EdiEncoder::new();
        let frame = sample_frame();
        let first = encoder.encode_frame(&frame);
        let second = encoder.encode_frame(&frame);
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn payload_contains_every_tag_name() {
        let mut encoder = EdiEncoder::new();
        let frame = sample_frame();
        let packet = encoder.encode_frame(&frame);
        for name in [&b"*ptr"[..], b"deti", b"tist", b"est1"] {
            assert!(packet.payload.windows(4).any(|w| w == name));
        }
    }

    #[test]
    fn dlfc_wraps_at_5000() {
        let mut encoder = EdiEncoder::new();
        encoder.dlfc = 4999;
        let frame = sample_frame();
        encoder.encode_frame(&frame);
        assert_eq!(encoder.dlfc, 0);
    }
}
