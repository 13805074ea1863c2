//! FIG type 6 (conditional access). Only emitted for services configured
//! with a CA system id; an ensemble with no scrambled services never
//! schedules these encoders at all (see [`super::carousel`]).

use std::cell::RefCell;
use std::rc::Rc;

use super::{FigEncoder, FigPriority, FigRate, FillStatus};
use crate::ensemble::Ensemble;

fn fig6_header(length: u8, extension: u8) -> [u8; 2] {
    let byte0 = (6u8 << 5) | (length & 0x1F);
    let byte1 = extension & 0x1F;
    [byte0, byte1]
}

/// FIG 6/0: CA organisation, lists the CA system ids in use ensemble-wide.
#[derive(Debug)]
pub struct Fig6_0 {
    ensemble: Rc<RefCell<Ensemble>>,
}

impl Fig6_0 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig6_0 { ensemble }
    }
}

impl FigEncoder for Fig6_0 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        let ens = self.ensemble.borrow();
        let mut ca_ids: Vec<u16> = ens.services.iter().filter_map(|s| s.ca_system_id).collect();
        ca_ids.sort_unstable();
        ca_ids.dedup();
        if ca_ids.is_empty() {
            return FillStatus::none();
        }
        let needed = 2 + 1 + ca_ids.len() * 2;
        if budget < needed {
            return FillStatus::none();
        }
        let [h0, h1] = fig6_header((needed - 2) as u8, 0);
        buffer.push(h0);
        buffer.push(h1);
        buffer.push(ca_ids.len() as u8 & 0x0F);
        for id in &ca_ids {
            buffer.extend_from_slice(&id.to_be_bytes());
        }
        FillStatus { bytes_written: needed, complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::C
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        6
    }

    fn extension(&self) -> Option<u8> {
        Some(0)
    }
}

/// FIG 6/1: per-service CA system id binding.
#[derive(Debug)]
pub struct Fig6_1 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig6_1 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig6_1 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig6_1 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let services: Vec<_> = ens.services.iter().filter(|s| s.ca_system_id.is_some()).collect();
        if services.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < services.len() {
            if remaining < 4 {
                break;
            }
            let service = services[self.index];
            data.extend_from_slice(&(service.id as u16).to_be_bytes());
            data.extend_from_slice(&service.ca_system_id.unwrap_or(0).to_be_bytes());
            remaining -= 4;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig6_header(data.len() as u8, 1);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= services.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::C
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        6
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

    fn ensemble_with_ca(ca_id: Option<u16>) -> Rc<RefCell<Ensemble>> {
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
                label: "Scrambled".into(),
                short_label: "Scr".into(),
                programme_type: 0,
                language: Language::ENG,
                ecc: None,
                announcement_support: AnnouncementSupport::default(),
                ca_system_id: ca_id,
                linkage: None,
                frequencies: vec![],
            }],
            components: vec![],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }))
    }

    #[test]
    fn fig6_0_skipped_with_no_ca_services() {
        let mut fig = Fig6_0::new(ensemble_with_ca(None));
        let mut buf = Vec::new();
        assert_eq!(fig.fill(&mut buf, 30).bytes_written, 0);
    }

    #[test]
    fn fig6_1_emits_binding_for_ca_service() {
        let mut fig = Fig6_1::new(ensemble_with_ca(Some(0xABCD)));
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
        assert!(status.complete);
    }
}
