//! FIG type 0 (multiplex configuration information) encoders.

use std::cell::RefCell;
use std::rc::Rc;

use super::{FigEncoder, FigPriority, FigRate, FillStatus};
use crate::ensemble::{ComponentKind, Ensemble, LinkageTarget, ProtectionConfig, SubchannelKind};

fn fig_header(length: u8, extension: u8, pd: bool) -> [u8; 2] {
    let byte0 = (0u8 << 5) | (length & 0x1F);
    let byte1 = ((pd as u8) << 5) | (extension & 0x1F);
    [byte0, byte1]
}

/// FIG 0/0: ensemble information. Always 6 bytes; emitted every frame.
#[derive(Debug)]
pub struct Fig0_0 {
    ensemble: Rc<RefCell<Ensemble>>,
    frame_number: u64,
}

impl Fig0_0 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_0 { ensemble, frame_number: 0 }
    }
}

impl FigEncoder for Fig0_0 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 6 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        // Resolved Open Question: length=5 (5 data bytes follow byte0).
        let [h0, h1] = fig_header(5, 0, false);
        let cif_count = (self.frame_number % 5000) as u32;
        let cif_high = ((cif_count / 250) % 20) as u8;
        let cif_low = (cif_count % 250) as u8;
        let alarm = ens.alarm as u8;

        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&ens.id.to_be_bytes());
        buffer.push((cif_high << 3) | (alarm << 2)); // change flags = 0
        buffer.push(cif_low);
        FillStatus { bytes_written: 6, complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::EveryFrame
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Critical
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(0)
    }

    fn set_frame_number(&mut self, frame_number: u64) {
        self.frame_number = frame_number;
    }
}

/// FIG 0/1: sub-channel organisation, UEP (3 bytes) or EEP (4 bytes) form.
#[derive(Debug)]
pub struct Fig0_1 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_1 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_1 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_1 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        if ens.subchannels.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);

        while self.index < ens.subchannels.len() {
            let sc = &ens.subchannels[self.index];
            let is_uep = matches!(sc.protection, ProtectionConfig::Uep { .. });
            let entry_size = if is_uep { 3 } else { 4 };
            if remaining < entry_size {
                break;
            }
            let start_addr = sc.start_address;
            if is_uep {
                let table_index = sc.tpl().unwrap_or(0) & 0x3F;
                data.push(((sc.id & 0x3F) << 2) | (((start_addr >> 8) & 0x03) as u8));
                data.push((start_addr & 0xFF) as u8);
                data.push(table_index); // form=0, switch=0
            } else {
                let size_cu = sc.size_in_cu().unwrap_or(0) as u16;
                let level = match sc.protection {
                    ProtectionConfig::EepA { level } | ProtectionConfig::EepB { level } => level,
                    _ => 0,
                };
                let option = match sc.protection {
                    ProtectionConfig::EepB { .. } => 1u8,
                    _ => 0u8,
                };
                data.push(((sc.id & 0x3F) << 2) | (((start_addr >> 8) & 0x03) as u8));
                data.push((start_addr & 0xFF) as u8);
                data.push(
                    (1u8 << 7)
                        | ((option & 0x07) << 4)
                        | (((level.saturating_sub(1)) & 0x03) << 2)
                        | (((size_cu >> 8) & 0x03) as u8),
                );
                data.push((size_cu & 0xFF) as u8);
            }
            remaining -= entry_size;
            self.index += 1;
        }

        if data.is_empty() {
            return FillStatus::none();
        }

        let [h0, h1] = fig_header((data.len() + 1) as u8, 1, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);

        let complete = self.index >= ens.subchannels.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(1)
    }
}

/// FIG 0/2: service organisation, alternating programme/data SId lists.
#[derive(Debug)]
pub struct Fig0_2 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
    transmitting_programme: bool,
}

impl Fig0_2 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_2 { ensemble, index: 0, transmitting_programme: true }
    }
}

impl FigEncoder for Fig0_2 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let programme = self.transmitting_programme;
        let services: Vec<_> = ens
            .services
            .iter()
            .filter(|s| s.is_data_service() != programme)
            .collect();
        if services.is_empty() {
            return FillStatus::none();
        }

        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);

        while self.index < services.len() {
            let service = services[self.index];
            let components: Vec<_> = ens.components_of_service(service.id).collect();
            if components.is_empty() {
                self.index += 1;
                continue;
            }
            let header_size = if programme { 3 } else { 5 };
            let total = header_size + components.len() * 2;
            if remaining < total {
                break;
            }

            if programme {
                data.extend_from_slice(&(service.id as u16).to_be_bytes());
            } else {
                data.extend_from_slice(&service.id.to_be_bytes());
            }
            data.push(components.len() as u8 & 0x0F);

            for comp in &components {
                let ascty_or_dscty = match ens.subchannel(comp.subchannel_id).map(|sc| sc.kind) {
                    Some(SubchannelKind::DabPlusAac) => 63u8,
                    _ => 0u8,
                };
                data.push(ascty_or_dscty & 0x3F); // TMid=0
                let ps = comp.primary as u8;
                data.push(((comp.subchannel_id & 0x3F) << 2) | (ps << 1)); // CA=0
            }
            remaining -= total;
            self.index += 1;
        }

        if data.is_empty() {
            return FillStatus::none();
        }

        let [h0, h1] = fig_header((data.len() + 1) as u8, 2, !programme);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let written = 2 + data.len();

        let mut complete = false;
        if self.index >= services.len() {
            self.index = 0;
            self.transmitting_programme = !self.transmitting_programme;
            if self.transmitting_programme {
                complete = true;
            }
        }
        FillStatus { bytes_written: written, complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::Dynamic
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(2)
    }
}

/// FIG 0/3: packet-mode service component records.
#[derive(Debug)]
pub struct Fig0_3 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_3 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_3 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_3 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let packet_components: Vec<_> = ens
            .components
            .iter()
            .filter(|c| matches!(c.kind, ComponentKind::Packet { .. }))
            .collect();
        if packet_components.is_empty() {
            return FillStatus::none();
        }

        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);

        while self.index < packet_components.len() {
            if remaining < 3 {
                break;
            }
            let comp = packet_components[self.index];
            let ComponentKind::Packet { packet_address, dscty, .. } = comp.kind else { unreachable!() };
            data.push((0b01u8 << 6) | (dscty & 0x3F));
            data.push(((comp.subchannel_id & 0x3F) << 2) | (((packet_address >> 8) & 0x03) as u8));
            data.push((packet_address & 0xFF) as u8);
            remaining -= 3;
            self.index += 1;
        }

        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 3, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= packet_components.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(3)
    }
}

/// FIG 0/7: configuration-information count. Re-emits only when the
/// ensemble's structural hash differs from the last emitted value.
#[derive(Debug)]
pub struct Fig0_7 {
    ensemble: Rc<RefCell<Ensemble>>,
    last_emitted_hash: Option<u16>,
}

impl Fig0_7 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_7 { ensemble, last_emitted_hash: None }
    }
}

impl FigEncoder for Fig0_7 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 4 {
            return FillStatus::none();
        }
        let hash = self.ensemble.borrow().structural_hash();
        if self.last_emitted_hash == Some(hash) {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header(3, 7, false);
        buffer.push(h0);
        buffer.push(h1);
        // CIFCnt high (5 bits, unused here so 0) + hi bits of hash, then low byte.
        buffer.push(((hash >> 8) & 0x03) as u8);
        buffer.push((hash & 0xFF) as u8);
        self.last_emitted_hash = Some(hash);
        FillStatus { bytes_written: 4, complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::High
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(7)
    }
}

/// FIG 0/9: Extended Country Code + Local Time Offset, long form, per service.
#[derive(Debug)]
pub struct Fig0_9 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_9 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_9 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_9 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        if ens.ecc == 0 || ens.services.is_empty() {
            return FillStatus::none();
        }
        let lto = ens.local_time_offset_half_hours;
        let lto_sign = (lto < 0) as u8;
        let lto_value = (lto.unsigned_abs()) & 0x1F;

        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < ens.services.len() {
            if remaining < 5 {
                break;
            }
            let service = &ens.services[self.index];
            let ecc = service.ecc.unwrap_or(ens.ecc);
            data.push(0x80 | (lto_sign << 5) | lto_value);
            data.extend_from_slice(&(service.id as u16).to_be_bytes());
            data.push(ecc);
            data.push(ens.international_table_id);
            remaining -= 5;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 9, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= ens.services.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(9)
    }
}

/// FIG 0/10: date and time. Does not include LTO (see FIG 0/9 for that).
#[derive(Debug)]
pub struct Fig0_10 {
    ensemble: Rc<RefCell<Ensemble>>,
    /// Seconds since Unix epoch, supplied by the caller each tick (kept
    /// injectable so tests don't depend on the wall clock).
    pub now_unix_seconds: u64,
}

impl Fig0_10 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_10 { ensemble, now_unix_seconds: 0 }
    }
}

/// Modified Julian Date for a Gregorian calendar date, per ETSI EN 300 401
/// §8.1.3.3.
pub fn calculate_mjd(year: i64, month: i64, day: i64) -> u32 {
    let a = (14 - month) / 12;
    let y = year + 4800 - a;
    let m = month + 12 * a - 3;
    let jd = day + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100 + y / 400 - 32045;
    let mjd = jd - 2400001;
    (mjd as u32) & 0x1FFFF
}

/// Unix seconds to (year, month, day, hour, minute); shared with the MNSC
/// BCD time payload, which needs the same calendar breakdown FIG 0/10 does.
pub(crate) fn civil_from_unix(seconds: u64) -> (i64, i64, i64, u8, u8) {
    // Howard Hinnant's days_from_civil inverse, minimal re-derivation for
    // converting a Unix timestamp into (year, month, day, hour, minute).
    let days = (seconds / 86400) as i64;
    let rem = (seconds % 86400) as i64;
    let hour = (rem / 3600) as u8;
    let minute = ((rem % 3600) / 60) as u8;

    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d, hour, minute)
}

impl FigEncoder for Fig0_10 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        let ens = self.ensemble.borrow();
        if !ens.datetime.enabled || budget < 6 {
            return FillStatus::none();
        }
        let (year, month, day, hour, minute) = civil_from_unix(self.now_unix_seconds);
        let mjd = calculate_mjd(year, month, day);

        let [h0, h1] = fig_header(5, 10, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.push(((mjd >> 9) & 0xFF) as u8);
        buffer.push(((mjd >> 1) & 0xFF) as u8);
        let mjd_low = (mjd & 0x01) as u8;
        buffer.push((mjd_low << 7) | (1 << 6) | (hour & 0x1F)); // UTC flag always set
        buffer.push((minute & 0x3F) << 2);
        FillStatus { bytes_written: 6, complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(10)
    }

    fn set_wall_clock(&mut self, unix_seconds: u64) {
        self.now_unix_seconds = unix_seconds;
    }
}

/// FIG 0/13: user application information. Emits the MOT-slideshow
/// signalling (user application type 0x002) for every component with a
/// bound MOT carousel.
#[derive(Debug)]
pub struct Fig0_13 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_13 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_13 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_13 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let carousel_components: Vec<_> = ens.components.iter().filter(|c| c.mot_carousel).collect();
        if carousel_components.is_empty() {
            return FillStatus::none();
        }

        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < carousel_components.len() {
            // SId(2) + SCIdS/No(1) + user-app type(2, 11 bits used) + length(nibble packed with type byte0 hi)
            if remaining < 6 {
                break;
            }
            let comp = carousel_components[self.index];
            data.extend_from_slice(&(comp.service_id as u16).to_be_bytes());
            data.push((comp.scids.unwrap_or(0) & 0x0F) << 4 | 0x01); // No=1 application
            let ua_type: u16 = 0x002; // SLS
            let ua_type_len_byte0 = ((ua_type >> 3) & 0xFF) as u8;
            let ua_type_len_byte1 = ((ua_type & 0x07) << 5) as u8; // data length = 0
            data.push(ua_type_len_byte0);
            data.push(ua_type_len_byte1);
            remaining -= 5;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 13, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= carousel_components.len();
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
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(13)
    }
}

/// FIG 0/14: FEC scheme, only for sub-channels with a non-zero `fec_scheme`.
#[derive(Debug)]
pub struct Fig0_14 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_14 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_14 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_14 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let fec_subchannels: Vec<_> = ens.subchannels.iter().filter(|s| s.fec_scheme != 0).collect();
        if fec_subchannels.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < fec_subchannels.len() {
            if remaining < 1 {
                break;
            }
            let sc = fec_subchannels[self.index];
            data.push(((sc.id & 0x3F) << 2) | (sc.fec_scheme & 0x03));
            remaining -= 1;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 14, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= fec_subchannels.len();
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
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(14)
    }
}

/// FIG 0/17: programme type per service.
#[derive(Debug)]
pub struct Fig0_17 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_17 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_17 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_17 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let services: Vec<_> = ens.services.iter().filter(|s| s.programme_type != 0).collect();
        if services.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < services.len() {
            let service = services[self.index];
            let size = if service.is_data_service() { 6 } else { 4 };
            if remaining < size {
                break;
            }
            if service.is_data_service() {
                data.extend_from_slice(&service.id.to_be_bytes());
            } else {
                data.extend_from_slice(&(service.id as u16).to_be_bytes());
            }
            data.push(0x00);
            data.push(service.programme_type & 0x1F);
            remaining -= size;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 17, false);
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
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(17)
    }
}

/// FIG 0/18: announcement support per service.
#[derive(Debug)]
pub struct Fig0_18 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_18 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_18 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_18 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let services: Vec<_> = ens
            .services
            .iter()
            .filter(|s| !s.announcement_support.enabled_types.is_empty())
            .collect();
        if services.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < services.len() {
            let service = services[self.index];
            let entry_size = 5 + service.announcement_support.clusters.len();
            if remaining < entry_size {
                break;
            }
            data.extend_from_slice(&(service.id as u16).to_be_bytes());
            let asu: u16 = service
                .announcement_support
                .enabled_types
                .iter()
                .fold(0u16, |acc, t| acc | (1 << t.bit()));
            data.extend_from_slice(&asu.to_be_bytes());
            let cluster_count = service.announcement_support.clusters.len() as u8 & 0x1F;
            data.push(cluster_count << 3); // new=0, region=0
            for cluster in &service.announcement_support.clusters {
                data.push(cluster.0);
            }
            remaining -= entry_size;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 18, false);
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
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(18)
    }
}

/// FIG 0/19: announcement switching. Skipped entirely while no announcement
/// is active; rate/priority flip to fast/high the moment one is.
#[derive(Debug)]
pub struct Fig0_19 {
    ensemble: Rc<RefCell<Ensemble>>,
}

impl Fig0_19 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_19 { ensemble }
    }

    fn active(&self) -> bool {
        !self.ensemble.borrow().active_announcements.is_empty()
    }
}

impl FigEncoder for Fig0_19 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        let ens = self.ensemble.borrow();
        if ens.active_announcements.is_empty() || budget < 2 {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        for (service_id, ann_type) in &ens.active_announcements {
            if remaining < 4 {
                break;
            }
            let service = match ens.service(*service_id) {
                Some(s) => s,
                None => continue,
            };
            let cluster = service.announcement_support.clusters.first().map(|c| c.0).unwrap_or(0);
            let subchannel_id = ens
                .components_of_service(*service_id)
                .next()
                .map(|c| c.subchannel_id)
                .unwrap_or(0);

            data.push(cluster);
            let asu: u16 = 1 << ann_type.bit();
            data.extend_from_slice(&asu.to_be_bytes());
            data.push(((subchannel_id & 0x3F) << 2) | 0x01); // new_flag=1, region=0
            remaining -= 4;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 19, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        FillStatus { bytes_written: 2 + data.len(), complete: true }
    }

    fn repetition_rate(&self) -> FigRate {
        if self.active() {
            FigRate::A
        } else {
            FigRate::B
        }
    }

    fn priority(&self) -> FigPriority {
        if self.active() {
            FigPriority::High
        } else {
            FigPriority::Normal
        }
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(19)
    }
}

/// FIG 0/5: service component language.
#[derive(Debug)]
pub struct Fig0_5 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_5 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_5 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_5 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let records: Vec<(u8, u8)> = ens
            .components
            .iter()
            .filter_map(|c| {
                let service = ens.service(c.service_id)?;
                Some((c.subchannel_id, service.language as u8))
            })
            .collect();
        if records.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < records.len() {
            if remaining < 2 {
                break;
            }
            let (subchannel_id, language) = records[self.index];
            data.push(subchannel_id & 0x3F); // MSC stream audio/data, FIDC bit = 0
            data.push(language);
            remaining -= 2;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 5, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= records.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(5)
    }
}

/// FIG 0/6: service linking, one linkage-set record per service that
/// declares a [`crate::ensemble::Linkage`].
#[derive(Debug)]
pub struct Fig0_6 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_6 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_6 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_6 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        let services: Vec<_> = ens.services.iter().filter(|s| s.linkage.is_some()).collect();
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
            let link = service.linkage.as_ref().expect("filtered above");
            let target_bits = match link.target {
                LinkageTarget::Dab => 0u8,
                LinkageTarget::Fm => 1u8,
                LinkageTarget::Drm => 2u8,
                LinkageTarget::Amss => 3u8,
            };
            data.push(
                ((link.active as u8) << 7)
                    | ((link.hard as u8) << 6)
                    | ((link.international as u8) << 5)
                    | (((link.lsn >> 8) & 0x0F) as u8),
            );
            data.push((link.lsn & 0xFF) as u8);
            data.push(target_bits << 6);
            data.extend_from_slice(&(service.id as u16).to_be_bytes());
            remaining -= 5;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 6, false);
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
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(6)
    }
}

/// FIG 0/8: component global definition, linking each service component to
/// its SCIdS and sub-channel by an explicit record rather than relying on
/// FIG 0/2's implicit ordering.
#[derive(Debug)]
pub struct Fig0_8 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
    next_scids: u8,
}

impl Fig0_8 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_8 { ensemble, index: 0, next_scids: 0 }
    }
}

impl FigEncoder for Fig0_8 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        if ens.components.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < ens.components.len() {
            let comp = &ens.components[self.index];
            let service = match ens.service(comp.service_id) {
                Some(s) => s,
                None => {
                    self.index += 1;
                    continue;
                }
            };
            let sid_size = if service.is_data_service() { 4 } else { 2 };
            if remaining < sid_size + 2 {
                break;
            }
            if service.is_data_service() {
                data.extend_from_slice(&service.id.to_be_bytes());
            } else {
                data.extend_from_slice(&(service.id as u16).to_be_bytes());
            }
            let scids = comp.scids.unwrap_or(self.next_scids) & 0x0F;
            self.next_scids = (self.next_scids + 1) & 0x0F;
            data.push((0u8 << 5) | (scids << 1)); // ext=0 (used in this system), LS=0
            data.push((comp.subchannel_id & 0x3F) << 2);
            remaining -= sid_size + 2;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 8, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= ens.components.len();
        if complete {
            self.index = 0;
        }
        FillStatus { bytes_written: 2 + data.len(), complete }
    }

    fn repetition_rate(&self) -> FigRate {
        FigRate::B
    }

    fn priority(&self) -> FigPriority {
        FigPriority::Normal
    }

    fn fig_type(&self) -> u8 {
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(8)
    }
}

/// FIG 0/21: frequency information, one record per declared
/// [`crate::ensemble::FrequencyInformation`] entry.
#[derive(Debug)]
pub struct Fig0_21 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_21 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_21 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_21 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        if ens.frequency_information.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < ens.frequency_information.len() {
            let fi = &ens.frequency_information[self.index];
            let entry_size = 3 + fi.entries.len() * 4;
            if remaining < entry_size {
                break;
            }
            data.extend_from_slice(&fi.id.to_be_bytes());
            data.push(((fi.is_other_ensemble as u8) << 7) | (fi.entries.len() as u8 & 0x07));
            for entry in &fi.entries {
                data.push(entry.control_field & 0x07);
                data.extend_from_slice(&entry.frequency_khz.to_be_bytes()[1..]);
            }
            remaining -= entry_size;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 21, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= ens.frequency_information.len();
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
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(21)
    }
}

/// FIG 0/24: other ensembles' services, grouping declared
/// [`crate::ensemble::OtherEnsembleService`] references by ensemble id.
#[derive(Debug)]
pub struct Fig0_24 {
    ensemble: Rc<RefCell<Ensemble>>,
    index: usize,
}

impl Fig0_24 {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        Fig0_24 { ensemble, index: 0 }
    }
}

impl FigEncoder for Fig0_24 {
    fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
        if budget < 2 {
            return FillStatus::none();
        }
        let ens = self.ensemble.borrow();
        if ens.other_ensemble_services.is_empty() {
            return FillStatus::none();
        }
        let mut data = Vec::new();
        let mut remaining = budget.saturating_sub(2);
        while self.index < ens.other_ensemble_services.len() {
            if remaining < 6 {
                break;
            }
            let other = ens.other_ensemble_services[self.index];
            data.extend_from_slice(&(other.service_id as u16).to_be_bytes());
            data.push(1); // one EId follows
            data.extend_from_slice(&other.ensemble_id.to_be_bytes());
            remaining -= 5;
            self.index += 1;
        }
        if data.is_empty() {
            return FillStatus::none();
        }
        let [h0, h1] = fig_header((data.len() + 1) as u8, 24, false);
        buffer.push(h0);
        buffer.push(h1);
        buffer.extend_from_slice(&data);
        let complete = self.index >= ens.other_ensemble_services.len();
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
        0
    }

    fn extension(&self) -> Option<u8> {
        Some(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::*;
    use crate::tables::Language;

    fn ensemble_with_subchannel() -> Rc<RefCell<Ensemble>> {
        Rc::new(RefCell::new(Ensemble {
            id: 0xCE15,
            ecc: 0xE1,
            label: "Test".into(),
            short_label: "Test".into(),
            mode: TransmissionMode::I,
            international_table_id: 0,
            local_time_offset_half_hours: 2,
            local_time_offset_auto: false,
            alarm: false,
            datetime: DateTimeConfig::default(),
            enable_tist: false,
            tist_offset_seconds: 0.0,
            active_announcements: Vec::new(),
            subchannels: vec![Subchannel {
                id: 1,
                kind: SubchannelKind::DabMp2,
                start_address: 0,
                bitrate_kbps: 128,
                protection: ProtectionConfig::EepA { level: 3 },
                fec_scheme: 0,
                input_uri: "file:///tmp/a".into(),
                pad_length: None,
            }],
            services: vec![Service {
                id: 0x5001,
                label: "Svc".into(),
                short_label: "Svc".into(),
                programme_type: 10,
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
                dynamic_label: None,
                mot_carousel: false,
            }],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }))
    }

    #[test]
    fn fig0_0_writes_six_bytes_every_frame() {
        let mut fig = Fig0_0::new(ensemble_with_subchannel());
        fig.set_frame_number(5001);
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 6);
        assert!(status.complete);
        assert_eq!(&buf[2..4], &0xCE15u16.to_be_bytes());
    }

    #[test]
    fn fig0_1_emits_eep_long_form() {
        let mut fig = Fig0_1::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
        assert!(status.complete);
    }

    #[test]
    fn fig0_7_only_emits_on_hash_change() {
        let ens = ensemble_with_subchannel();
        let mut fig = Fig0_7::new(ens.clone());
        let mut buf = Vec::new();
        let first = fig.fill(&mut buf, 30);
        assert!(first.bytes_written > 0);

        buf.clear();
        let second = fig.fill(&mut buf, 30);
        assert_eq!(second.bytes_written, 0);

        ens.borrow_mut().subchannels[0].bitrate_kbps = 64;
        buf.clear();
        let third = fig.fill(&mut buf, 30);
        assert!(third.bytes_written > 0);
    }

    #[test]
    fn fig0_19_is_skipped_when_idle() {
        let mut fig = Fig0_19::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 0);
        assert_eq!(fig.repetition_rate(), FigRate::B);
        assert_eq!(fig.priority(), FigPriority::Normal);
    }

    #[test]
    fn fig0_19_emits_fast_when_announcement_active() {
        let ens = ensemble_with_subchannel();
        ens.borrow_mut().services[0].announcement_support.clusters.push(Cluster(1));
        ens.borrow_mut().active_announcements.push((0x5001, AnnouncementType::Alarm));
        let mut fig = Fig0_19::new(ens);
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
        assert_eq!(fig.repetition_rate(), FigRate::A);
        assert_eq!(fig.priority(), FigPriority::High);
    }

    #[test]
    fn calculate_mjd_matches_known_date() {
        // 2024-01-01 -> MJD 60310
        assert_eq!(calculate_mjd(2024, 1, 1), 60310);
    }

    #[test]
    fn fig0_5_emits_subchannel_and_language() {
        let mut fig = Fig0_5::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 4);
        assert_eq!(buf[2], 1); // subchannel id
        assert_eq!(buf[3], Language::ENG as u8);
    }

    #[test]
    fn fig0_6_skipped_without_linkage() {
        let mut fig = Fig0_6::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 0);
    }

    #[test]
    fn fig0_6_emits_linkage_set_record() {
        let ens = ensemble_with_subchannel();
        ens.borrow_mut().services[0].linkage = Some(Linkage {
            lsn: 0x123,
            active: true,
            hard: false,
            international: false,
            target: LinkageTarget::Fm,
        });
        let mut fig = Fig0_6::new(ens);
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
        assert_eq!(buf[2] & 0x80, 0x80); // active bit
    }

    #[test]
    fn fig0_8_assigns_rolling_scids_when_unset() {
        let mut fig = Fig0_8::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 6);
    }

    #[test]
    fn fig0_21_skipped_without_frequency_info() {
        let mut fig = Fig0_21::new(ensemble_with_subchannel());
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert_eq!(status.bytes_written, 0);
    }

    #[test]
    fn fig0_21_emits_frequency_list() {
        let ens = ensemble_with_subchannel();
        ens.borrow_mut().frequency_information.push(FrequencyInformation {
            id: 0xCE15,
            is_other_ensemble: false,
            entries: vec![FrequencyEntry { control_field: 0, frequency_khz: 225_648 }],
        });
        let mut fig = Fig0_21::new(ens);
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
    }

    #[test]
    fn fig0_24_emits_other_ensemble_reference() {
        let ens = ensemble_with_subchannel();
        ens.borrow_mut()
            .other_ensemble_services
            .push(OtherEnsembleService { ensemble_id: 0xD000, service_id: 0x6001 });
        let mut fig = Fig0_24::new(ens);
        let mut buf = Vec::new();
        let status = fig.fill(&mut buf, 30);
        assert!(status.bytes_written > 0);
        assert_eq!(&buf[2..4], &0x6001u16.to_be_bytes());
    }
}
