//! FIG type 2 (dynamic label segments): the X-PAD carousel that refreshes a
//! service component's dynamic label text, ETSI TS 102 980 §5.4.
//!
//! Unlike FIG 1/1's static service label, FIG 2/1 iterates components (not
//! services) and carries a toggle bit that flips whenever the underlying
//! [`DynamicLabel`]'s text changes, so a decoder knows to redraw rather than
//! re-show the same string.

use std::cell::RefCell;
use std::rc::Rc;

use super::{FigEncoder, FigPriority, FigRate, FillStatus};
use crate::ensemble::{Charset, Ensemble};

fn fig2_header(length: u8, extension: u8, charset: Charset) -> [u8; 2] {
    let charset_bits = match charset {
        Charset::EbuLatin => 0u8,
        Charset::Ucs2 => 6u8,
        Charset::Utf8 => 15u8,
    };
    let byte0 = (2u8 << 5) | (length & 0x1F);
    let byte1 = (charset_bits << 4) | (extension & 0x0F);
    [byte0, byte1]
}

/// FIG 2/1: service-component dynamic label, one segment per call.
#[derive(Debug)]
pub struct Fig2_1 {
    ensemble: Rc<RefCell<Ensemble>>,
    component_index: usize,
    segment_index: usize,
}

impl Fig2_1 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig2_1 { ensemble, component_index: 0, segment_index: 0 }
    }
}

impl FigEncoder for Fig2_1 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        // 2 header + 2 SId + 1 segment byte + 1 char-flag byte + up to 16 text = 22 max.
        if budget < 6 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let components: Vec<_> = ens
            .components
            .iter()
            .filter(|c| c.dynamic_label.is_some())
            .collect();
        if components.is_empty() {
            return FillStatus::none();
        }
        if self.component_index >= components.len() {
            self.component_index = 0;
            self.segment_index = 0;
        }

        let comp = components[self.component_index];
        let label = comp.dynamic_label.as_ref().expect("filtered above");
        let segments = label.segments();
        if self.segment_index >= segments.len() {
            self.segment_index = 0;
        }
        let segment = &segments[self.segment_index];
        let last_segment = self.segment_index + 1 >= segments.len();
        let only_segment = segments.len() == 1;

        let total = 6 + segment.len();
        if budget < total {
            return FillStatus::none();
        }

        let [h0, h1] = fig2_header((3 + segment.len()) as u8, 1, label.charset);
        buffer.push(h0);
        buffer.push(h1);
        let service = ens.service(comp.service_id);
        let sid = service.map(|s| s.id as u16).unwrap_or(0);
        buffer.extend_from_slice(&sid.to_be_bytes());

        let toggle = label.toggle() as u8;
        let seg_num = if only_segment { 0u8 } else { self.segment_index as u8 & 0x07 };
        buffer.push((toggle << 7) | (seg_num << 4) | ((last_segment as u8) << 3));
        buffer.push(if segment.is_empty() { 0x00 } else { 0xFF });
        buffer.extend_from_slice(segment);

        let written = total;
        if last_segment {
            self.segment_index = 0;
            self.component_index += 1;
        } else {
            self.segment_index += 1;
        }
        let complete = self.component_index >= components.len() && self.segment_index == 0;
        FillStatus { bytes_written: written, complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::A
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        2
    }

    fn extension(&self) -> Option<u8> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::*;
    use crate::tables::Language;

    fn ensemble_with_dls(text: &str) -> Rc<RefCell<Ensemble>> {
        Rc::new(RefCell::new(Ensemble {
            id: 0xCE15,
            ecc: 0xE1,
            label: "Ensemble".into(),
            short_label: "Ens".into(),
            mode: TransmissionMode::I,
            international_table_id: 0,
            local_time_offset_half_hours: 0,
            local_time_offset_auto: false,
            alarm: false,
            datetime: DateTimeConfig::default(),
            enable_tist: false,
            tist_offset_seconds: 0.0,
            active_announcements: Vec::new(),
            subchannels: vec![],
            services: vec![Service {
                id: 0x5001,
                label: "Service One".into(),
                short_label: "Svc1".into(),
                programme_type: 0,
                language: Language::ENG,
                ecc: None,
                announcement_support: AnnouncementSupport::default(),
                ca_system_id: None,
                linkage: None,
                frequencies: vec![],
            }],
            components: vec![Component {
                service_id: 0x5001,
                subchannel_id: 1,
                scids: None,
                primary: true,
                kind: ComponentKind::StreamAudio,
                dynamic_label: Some(DynamicLabel::new(text)),
                mot_carousel: false,
            }],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }))
    }

    #[test]
    fn emits_single_segment_for_short_text() {
        let mut fig = Fig2_1::new(ensemble_with_dls("Original"));
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.complete);
        assert_eq!(&buf[2..4], &0x5001u16.to_be_bytes());
        // toggle bit starts at 0
        assert_eq!(buf[4] & 0x80, 0);
        assert_eq!(&buf[6..6 + 8], b"Original");
    }

    #[test]
    fn toggle_bit_flips_when_text_changes() {
        let ens = ensemble_with_dls("Original");
        let mut fig = Fig2_1::new(ens.clone());
        let mut first = Vec::new();
        fig.fill(&mut first, 30);
        let before = first[4] & 0x80;

        ens.borrow_mut().components[0]
            .dynamic_label
            .as_mut()
            .unwrap()
            .set_text("Updated");

        let mut second = Vec::new();
        fig.fill(&mut second, 30);
        let after = second[4] & 0x80;
        assert_ne!(before, after);
        assert_eq!(&second[6..6 + 7], b"Updated");
    }

    #[test]
    fn long_text_is_split_across_multiple_calls() {
        let long_text = "A".repeat(40);
        let ens = ensemble_with_dls(&long_text);
        let mut fig = Fig2_1::new(ens);
        let mut segments_seen = 0;
        let mut completed = false;
        for _ in 0..8 {
            let mut buf = Vec::new();
            let status = fig.fill(&mut buf, 30);
            if status.bytes_written > 0 {
                segments_seen += 1;
            }
            if status.complete {
                completed = true;
                break;
            }
        }
        assert!(segments_seen > 1);
        assert!(completed);
    }
}
