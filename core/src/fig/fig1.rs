//! FIG type 1 (labels) encoders: ensemble, service, and component labels,
//! each carrying the 16-bit short-label mask alongside the 16-character
//! EBU-Latin label.

use std::cell::RefCell;
use std::rc::Rc;

use super::{FigEncoder, FigPriority, FigRate, FillStatus};
use crate::charset;
use crate::ensemble::Ensemble;

fn fig1_header(length: u8, extension: u8) -> [u8; 2] {
    let byte0 = (1u8 << 5) | (length & 0x1F);
    let byte1 = extension & 0x1F; // charset field (0 = EBU Latin) left at 0
    [byte0, byte1]
}

fn label_bytes(label: &str) -> [u8; 16] {
    let mut out = [0x20u8; 16];
    let encoded = charset::utf8_to_ebu_latin(label, 16, true);
    out[..encoded.len().min(16)].copy_from_slice(&encoded[..encoded.len().min(16)]);
    out
}

/// FIG 1/0: ensemble label.
#[derive(Debug)]
pub struct Fig1_0 {
    ensemble: Rc<RefCell<Ensemble>>,
}

impl Fig1_0 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig1_0 { ensemble }
    }
}

impl FigEncoder for Fig1_0 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        // 2 header + 2 EId + 16 label + 2 mask = 22 bytes.
        if budget < 22 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let mask = match charset::calculate_label_short_mask(&ens.label, &ens.short_label) {
            Ok(m) => m,
            Err(_) => return FillStatus::none(),
        };
        let [h0, h1] = fig1_header(19, 0);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&ens.id.to_be_bytes());
        buffer.extend_from_slice(&label_bytes(&ens.label));
        buffer.extend_from_slice(&mask.to_be_bytes());
        FillStatus { bytes_written: 22, complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::A
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        1
    }

    fn extension(&self) -> Option<u8> {
        Some(0)
    }
}

/// FIG 1/1: service label, 16-bit programme SId form.
#[derive(Debug)]
pub struct Fig1_1 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig1_1 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig1_1 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig1_1 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 22 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let services: Vec<_> = ens.services.iter().filter(|s| !s.is_data_service()).collect();
        if services.is_empty() {
            return FillStatus::none();
        }
        while self.index < services.len() {
            let service = services[self.index];
            let mask = match charset::calculate_label_short_mask(&service.label, &service.short_label) {
                Ok(m) => m,
                Err(_) => {
                    self.index += 1;
                    continue;
                }
            };
            let [h0, h1] = fig1_header(19, 1);
            buffer.push(h0);
            buffer.push(h1);
            buffer.extend_from_slice(&(service.id as u16).to_be_bytes());
            buffer.extend_from_slice(&label_bytes(&service.label));
            buffer.extend_from_slice(&mask.to_be_bytes());
            self.index += 1;
            let complete = self.index >= services.len();
            if complete {
                self.index = 0;
            }
            return FillStatus { bytes_written: 22, complete };
        }
        self.index = 0;
        FillStatus::none()
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::A
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        1
    }

    fn extension(&self) -> Option<u8> {
        Some(1)
    }
}

/// FIG 1/4: component label (used when a component's own label differs
/// from its parent service's).
#[derive(Debug)]
pub struct Fig1_4 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig1_4 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig1_4 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig1_4 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        // 2 header + 1 flags/scids + 2 SId + 16 label + 2 mask = 23 bytes.
        if budget < 23 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let components: Vec<_> = ens.components.iter().filter(|c| c.scids.is_some()).collect();
        if components.is_empty() {
            return FillStatus::none();
        }
        while self.index < components.len() {
            let comp = components[self.index];
            let service = match ens.service(comp.service_id) {
                Some(s) => s,
                None => {
                    self.index += 1;
                    continue;
                }
            };
            let mask = match charset::calculate_label_short_mask(&service.label, &service.short_label) {
                Ok(m) => m,
                Err(_) => {
                    self.index += 1;
                    continue;
                }
            };
            let [h0, h1] = fig1_header(20, 4);
            buffer.push(h0);
            buffer.push(h1);
            let pd = comp.service_id >= 0x10000;
            buffer.push(((pd as u8) << 7) | (comp.scids.unwrap_or(0) & 0x0F));
            if pd {
                buffer.extend_from_slice(&comp.service_id.to_be_bytes());
            } else {
                buffer.extend_from_slice(&(comp.service_id as u16).to_be_bytes());
                buffer.push(0); // pad to keep fixed field width in the 16-bit case
            }
            buffer.extend_from_slice(&label_bytes(&service.label));
            buffer.extend_from_slice(&mask.to_be_bytes());
            self.index += 1;
            let complete = self.index >= components.len();
            if complete {
                self.index = 0;
            }
            return FillStatus { bytes_written: 23, complete };
        }
        self.index = 0;
        FillStatus::none()
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        1
    }

    fn extension(&self) -> Option<u8> {
        Some(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::*;
    use crate::tables::Language;

    fn ensemble() -> Rc<RefCell<Ensemble>> {
        Rc::new(RefCell::new(Ensemble {
            id: 0xCE15,
            ecc: 0xE1,
            label: "Test Ensemble".into(),
            short_label: "Test".into(),
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
            components: vec![],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }))
    }

    #[test]
    fn fig1_0_emits_ensemble_label() {
        let mut fig = Fig1_0::new(ensemble());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 22);
        assert_eq!(&buf[4..17], b"Test Ensemble");
    }

    #[test]
    fn fig1_1_emits_one_service_per_call() {
        let mut fig = Fig1_1::new(ensemble());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 22);
        assert!(status.complete);
    }
}
