//! PAD (Programme Associated Data) / X-PAD encoding: the F-PAD header, the
//! X-PAD contents-indicator framing, and the Dynamic Label Segment data
//! group that together make up an audio frame's PAD trailer, ETSI EN 300 401
//! Annex C / TS 102 980 §5.4.
//!
//! This is a distinct carousel from FIG 2/1: FIG 2/1 repeats the label in
//! the FIC, this module embeds it in the MSC itself, growing backward from
//! the frame's F-PAD the way real DAB+ encoders lay out X-PAD.

use crate::charset::utf8_to_ebu_latin;
use crate::crc::stored_crc16;
use crate::ensemble::Charset;

/// Length of the fixed F-PAD header that precedes every X-PAD trailer.
/// Named after the reference decoder's constant.
pub const FPAD_LEN: usize = 2;

/// Contents-indicator payload lengths addressable by a variable-size X-PAD
/// CI byte's top 3 bits, ETSI EN 300 401 Table C.1.
const XPADCI_LEN_LOOKUP: [usize; 8] = [4, 6, 8, 12, 16, 24, 32, 48];

/// Overhead (flags byte + charset/segment byte + CRC-16) around a DLS
/// segment's raw text.
const DL_SEGMENT_OVERHEAD: usize = 4;

/// CI kind for a DLS data group that opens a new label.
const CI_KIND_DL_START: u8 = 2;
/// CI kind for a DLS data group continuing the current label.
const CI_KIND_DL_CONTINUE: u8 = 3;
/// DLS command: clear display.
const DL_COMMAND_CLEAR: u8 = 0b0001;

/// X-PAD indicator carried in the F-PAD header's bits 5-4: whether the
/// trailer carries no X-PAD, a fixed 4-byte short-format CI, or a
/// variable-size CI list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPadIndicator {
    None,
    ShortFormat,
    VariableSize,
}

impl XPadIndicator {
    fn bits(self) -> u8 {
        match self {
            XPadIndicator::None => 0b00,
            XPadIndicator::ShortFormat => 0b01,
            XPadIndicator::VariableSize => 0b10,
        }
    }
}

/// Encodes the 2-byte F-PAD header. `ci_flag` marks whether the X-PAD
/// trailer opens with a contents-indicator.
pub fn encode_fpad(indicator: XPadIndicator, ci_flag: bool) -> [u8; 2] {
    let byte0 = indicator.bits() << 4;
    let byte1 = if ci_flag { 0x02 } else { 0x00 };
    [byte0, byte1]
}

fn charset_bits(charset: Charset) -> u8 {
    match charset {
        Charset::EbuLatin => 0x0,
        Charset::Ucs2 => 0x6,
        Charset::Utf8 => 0xF,
    }
}

/// Encodes one DLS segment data group: flags byte, charset/segment-number
/// byte, raw text, and a trailing CRC-16 over the preceding bytes. `text`
/// must be 1..=16 bytes.
fn encode_dl_segment(
    toggle: bool,
    is_first: bool,
    is_last: bool,
    charset: Charset,
    segment_number: u8,
    text: &[u8],
) -> Vec<u8> {
    debug_assert!(!text.is_empty() && text.len() <= 16);
    let mut out = Vec::with_capacity(DL_SEGMENT_OVERHEAD + text.len());
    let flags = ((toggle as u8) << 7)
        | ((is_first as u8) << 6)
        | ((is_last as u8) << 5)
        | (((text.len() - 1) as u8) & 0x0F);
    out.push(flags);
    let second = if is_first { charset_bits(charset) << 4 } else { (segment_number & 0x07) << 4 };
    out.push(second);
    out.extend_from_slice(text);
    let crc = stored_crc16(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Encodes the DLS "clear display" command, ETSI TS 102 980 §5.4.2.
fn encode_dl_clear(toggle: bool) -> Vec<u8> {
    let flags = ((toggle as u8) << 7) | 0x10 | DL_COMMAND_CLEAR;
    vec![flags, 0x00]
}

/// Largest CI-table entry no larger than `available`, restricted to the
/// entries that correspond to a whole number of DLS text characters under
/// the 4-bit character-count field (2, 4, 8 or 12 characters).
fn largest_fitting_reserved(available: usize) -> Option<usize> {
    [16usize, 12, 8, 6].into_iter().find(|&reserved| reserved <= available)
}

/// Drives a single service component's Dynamic Label Segment carousel into
/// fixed-length X-PAD trailers, one per audio frame tick.
#[derive(Debug, Clone)]
pub struct DlsEncoder {
    text: String,
    charset: Charset,
    toggle: bool,
    segment_index: usize,
}

impl DlsEncoder {
    pub fn new(text: impl Into<String>) -> Self {
        DlsEncoder { text: text.into(), charset: Charset::EbuLatin, toggle: false, segment_index: 0 }
    }

    /// Replaces the label text and flips the toggle bit if it actually
    /// changed, so a receiver knows to re-render rather than re-show the
    /// same string.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text = text;
            self.toggle = !self.toggle;
            self.segment_index = 0;
        }
    }

    pub fn toggle(&self) -> bool {
        self.toggle
    }

    /// Segments the text into chunks of at most 12 EBU-Latin bytes (the
    /// largest chunk size that still lands exactly on a CI-table entry once
    /// the 4-byte segment overhead is added), space-padding the final chunk
    /// up to the next valid size so every data group round-trips through a
    /// whole-length CI entry.
    fn segments(&self) -> Vec<Vec<u8>> {
        let encoded = utf8_to_ebu_latin(&self.text, 255, false);
        if encoded.is_empty() {
            return vec![vec![0x20]];
        }
        let mut segments: Vec<Vec<u8>> = encoded.chunks(12).map(|c| c.to_vec()).collect();
        if let Some(last) = segments.last_mut() {
            let padded_len = [2usize, 4, 8, 12].into_iter().find(|&n| n >= last.len()).unwrap_or(12);
            last.resize(padded_len, 0x20);
        }
        segments
    }

    /// Produces one X-PAD trailer of exactly `pad_length` bytes. Advances to
    /// the next segment on each call, wrapping back to the first once the
    /// whole label has been sent. Falls back to a bare F-PAD header (no
    /// X-PAD) when `pad_length` is too small to carry even the smallest DLS
    /// data group.
    pub fn encode_trailer(&mut self, pad_length: usize) -> Vec<u8> {
        let mut trailer = vec![0u8; pad_length];
        if pad_length <= FPAD_LEN {
            return trailer;
        }
        let available = pad_length - FPAD_LEN - 1; // minus the CI byte
        let Some(reserved) = largest_fitting_reserved(available) else {
            let fpad = encode_fpad(XPadIndicator::None, false);
            trailer[..FPAD_LEN].copy_from_slice(&fpad);
            return trailer;
        };

        let segments = self.segments();
        if self.segment_index >= segments.len() {
            self.segment_index = 0;
        }
        let segment = segments[self.segment_index].clone();
        let is_first = self.segment_index == 0;
        let is_last = self.segment_index + 1 >= segments.len();
        let kind = if is_first { CI_KIND_DL_START } else { CI_KIND_DL_CONTINUE };

        let dg = encode_dl_segment(
            self.toggle,
            is_first,
            is_last,
            self.charset,
            self.segment_index as u8,
            &segment,
        );
        debug_assert_eq!(dg.len(), reserved);

        let len_index = XPADCI_LEN_LOOKUP.iter().position(|&l| l == reserved).unwrap_or(0);
        let ci_byte = ((len_index as u8) << 5) | (kind & 0x1F);

        // X-PAD is assembled logically (CI, then data group) and written in
        // reverse byte order, adjacent to F-PAD, the way a receiver's
        // byte-reversal pass reconstructs it.
        let mut xpad = Vec::with_capacity(1 + reserved);
        xpad.push(ci_byte);
        xpad.extend_from_slice(&dg);
        xpad.reverse();

        let fpad = encode_fpad(XPadIndicator::VariableSize, true);
        trailer[..FPAD_LEN].copy_from_slice(&fpad);
        trailer[FPAD_LEN..FPAD_LEN + xpad.len()].copy_from_slice(&xpad);

        if is_last {
            self.segment_index = 0;
        } else {
            self.segment_index += 1;
        }
        trailer
    }

    /// Produces a trailer carrying the DLS "clear display" command instead
    /// of a text segment.
    pub fn encode_clear_trailer(&self, pad_length: usize) -> Vec<u8> {
        let mut trailer = vec![0u8; pad_length];
        if pad_length <= FPAD_LEN + 3 {
            let fpad = encode_fpad(XPadIndicator::None, false);
            trailer[..FPAD_LEN].copy_from_slice(&fpad);
            return trailer;
        }
        let cmd = encode_dl_clear(self.toggle);
        let ci_byte = (1u8 << 5) | CI_KIND_DL_START; // reserved=6, holds a 2-byte command
        let mut xpad = Vec::with_capacity(1 + 6);
        xpad.push(ci_byte);
        xpad.extend_from_slice(&cmd);
        xpad.resize(1 + 6, 0);
        xpad.reverse();

        let fpad = encode_fpad(XPadIndicator::VariableSize, true);
        trailer[..FPAD_LEN].copy_from_slice(&fpad);
        trailer[FPAD_LEN..FPAD_LEN + xpad.len()].copy_from_slice(&xpad);
        trailer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fpad_header_encodes_variable_size_with_ci_flag() {
        let fpad = encode_fpad(XPadIndicator::VariableSize, true);
        assert_eq!(fpad[0] & 0x30, 0b10 << 4);
        assert_eq!(fpad[1] & 0x02, 0x02);
    }

    #[test]
    fn fpad_header_encodes_none_without_ci_flag() {
        let fpad = encode_fpad(XPadIndicator::None, false);
        assert_eq!(fpad, [0x00, 0x00]);
    }

    #[test]
    fn dl_segment_flags_carry_toggle_and_length() {
        let dg = encode_dl_segment(true, true, true, Charset::EbuLatin, 0, b"Hi");
        assert_eq!(dg[0] & 0x80, 0x80);
        assert_eq!(dg[0] & 0x0F, 1); // 2 chars - 1
        assert_eq!(&dg[2..4], b"Hi");
        assert_eq!(dg.len(), 6);
    }

    #[test]
    fn trailer_has_exact_requested_length() {
        let mut enc = DlsEncoder::new("Hello");
        for pad_length in [11usize, 15, 19, 2, 1] {
            let trailer = enc.encode_trailer(pad_length);
            assert_eq!(trailer.len(), pad_length);
        }
    }

    #[test]
    fn toggle_bit_flips_when_text_changes() {
        let mut enc = DlsEncoder::new("Original");
        let before = enc.toggle();
        enc.set_text("Updated");
        assert_ne!(before, enc.toggle());
    }

    #[test]
    fn toggle_bit_stays_when_text_is_unchanged() {
        let mut enc = DlsEncoder::new("Same");
        let before = enc.toggle();
        enc.set_text("Same");
        assert_eq!(before, enc.toggle());
    }

    #[test]
    fn long_text_is_split_across_multiple_trailers() {
        let mut enc = DlsEncoder::new(&"A".repeat(30));
        let mut wrapped = false;
        for _ in 0..6 {
            enc.encode_trailer(19);
            if enc.segment_index == 0 {
                wrapped = true;
                break;
            }
        }
        assert!(wrapped);
    }
}
