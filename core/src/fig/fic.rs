//! FIC (Fast Information Channel) encoder. Owns the [`FigCarousel`] and
//! assembles it into the 96-byte Mode I FIC (3 FIBs of 30 data + 2 CRC
//! bytes each) every frame.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use super::carousel::FigCarousel;
use super::fig0::{
    Fig0_0, Fig0_1, Fig0_10, Fig0_13, Fig0_14, Fig0_17, Fig0_18, Fig0_19, Fig0_2, Fig0_21, Fig0_24,
    Fig0_3, Fig0_5, Fig0_6, Fig0_7, Fig0_8, Fig0_9,
};
use super::fig1::{Fig1_0, Fig1_1, Fig1_4};
use super::fig2::Fig2_1;
use super::fig6::{Fig6_0, Fig6_1};
use crate::crc::stored_crc16;
use crate::ensemble::{ComponentKind, Ensemble, TransmissionMode};

const FIB_SIZE: usize = 30;
const FIB_WITH_CRC: usize = 32;

pub struct FicEncoder {
    ensemble: Rc<RefCell<Ensemble>>,
    carousel: FigCarousel,
    now_ms: u64,
}

impl FicEncoder {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        let mut encoder = FicEncoder { ensemble, carousel: FigCarousel::new(), now_ms: 0 };
        encoder.setup_figs();
        encoder
    }

    /// Re-registers every FIG, conditional on what the ensemble actually
    /// configures, mirroring the reference FIC encoder's setup rule:
    /// structural FIGs register when their subject exists at all, FIG 0/19
    /// always registers (it is cheap to poll and self-gates on emptiness).
    pub fn setup_figs(&mut self) {
        self.carousel.clear();
        let ens = self.ensemble.borrow();

        self.carousel.add_fig(Box::new(Fig0_0::new(self.ensemble.clone())));

        if !ens.subchannels.is_empty() {
            self.carousel.add_fig(Box::new(Fig0_1::new(self.ensemble.clone())));
            self.carousel.add_fig(Box::new(Fig0_14::new(self.ensemble.clone())));
        }
        if !ens.services.is_empty() {
            self.carousel.add_fig(Box::new(Fig0_2::new(self.ensemble.clone())));
            self.carousel.add_fig(Box::new(Fig0_7::new(self.ensemble.clone())));
            self.carousel.add_fig(Box::new(Fig0_17::new(self.ensemble.clone())));
        }
        if ens.components.iter().any(|c| matches!(c.kind, ComponentKind::Packet { .. })) {
            self.carousel.add_fig(Box::new(Fig0_3::new(self.ensemble.clone())));
        }
        if !ens.components.is_empty() {
            self.carousel.add_fig(Box::new(Fig0_5::new(self.ensemble.clone())));
            self.carousel.add_fig(Box::new(Fig0_8::new(self.ensemble.clone())));
        }
        if ens.services.iter().any(|s| s.linkage.is_some()) {
            self.carousel.add_fig(Box::new(Fig0_6::new(self.ensemble.clone())));
        }
        if !ens.label.is_empty() {
            self.carousel.add_fig(Box::new(Fig1_0::new(self.ensemble.clone())));
        }
        if ens.services.iter().any(|s| !s.label.is_empty()) {
            self.carousel.add_fig(Box::new(Fig1_1::new(self.ensemble.clone())));
        }
        if ens.components.iter().any(|c| c.scids.is_some()) {
            self.carousel.add_fig(Box::new(Fig1_4::new(self.ensemble.clone())));
        }
        if ens.components.iter().any(|c| c.dynamic_label.is_some()) {
            self.carousel.add_fig(Box::new(Fig2_1::new(self.ensemble.clone())));
        }
        if !ens.services.is_empty() && ens.ecc != 0 {
            self.carousel.add_fig(Box::new(Fig0_9::new(self.ensemble.clone())));
        }
        if ens.datetime.enabled {
            self.carousel.add_fig(Box::new(Fig0_10::new(self.ensemble.clone())));
        }
        if ens.components.iter().any(|c| c.mot_carousel) {
            self.carousel.add_fig(Box::new(Fig0_13::new(self.ensemble.clone())));
        }
        if ens.services.iter().any(|s| !s.announcement_support.enabled_types.is_empty()) {
            self.carousel.add_fig(Box::new(Fig0_18::new(self.ensemble.clone())));
        }
        // FIG 0/19 always registers; it self-gates on an empty active list.
        self.carousel.add_fig(Box::new(Fig0_19::new(self.ensemble.clone())));

        if !ens.frequency_information.is_empty() {
            self.carousel.add_fig(Box::new(Fig0_21::new(self.ensemble.clone())));
        }
        if !ens.other_ensemble_services.is_empty() {
            self.carousel.add_fig(Box::new(Fig0_24::new(self.ensemble.clone())));
        }

        if ens.services.iter().any(|s| s.ca_system_id.is_some()) {
            self.carousel.add_fig(Box::new(Fig6_0::new(self.ensemble.clone())));
            self.carousel.add_fig(Box::new(Fig6_1::new(self.ensemble.clone())));
        }

        info!(
            "FIC encoder configured with {} FIGs for ensemble 0x{:04X}",
            self.carousel.fig_count(),
            ens.id
        );
    }

    /// Advance the carousel's internal clock and the per-frame CIF counter.
    /// The core loop calls this once per frame with a monotonically
    /// increasing millisecond counter derived from the frame number (24ms
    /// per ETI frame) and the raw frame number itself, the latter feeding
    /// FIG 0/0's CIF-count field.
    pub fn advance_clock(&mut self, now_ms: u64, frame_number: u64) {
        self.now_ms = now_ms;
        self.carousel.set_frame_number(frame_number);
    }

    /// Propagates the wall clock (seconds since the Unix epoch) down to
    /// clock-derived FIGs such as FIG 0/10.
    pub fn set_wall_clock(&mut self, unix_seconds: u64) {
        self.carousel.set_wall_clock(unix_seconds);
    }

    /// Encode the FIC for the current frame. Mode I only: 3 FIBs of 32
    /// bytes, totalling 96 bytes.
    pub fn encode_fic(&mut self) -> Vec<u8> {
        let mode = self.ensemble.borrow().mode;
        if mode != TransmissionMode::I {
            // Only Mode I's 3-FIB/96-byte FIC layout is implemented.
            return vec![0u8; 96];
        }
        let mut fic = Vec::with_capacity(96);
        for _ in 0..3 {
            let fib = self.carousel.fill_fib(self.now_ms, FIB_SIZE);
            let crc = stored_crc16(&fib);
            fic.extend_from_slice(&fib);
            fic.extend_from_slice(&crc.to_be_bytes());
        }
        debug_assert_eq!(fic.len(), 3 * FIB_WITH_CRC);
        fic
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
                dynamic_label: None,
                mot_carousel: false,
            }],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }))
    }

    #[test]
    fn encodes_96_byte_mode_i_fic() {
        let mut encoder = FicEncoder::new(ensemble());
        let fic = encoder.encode_fic();
        assert_eq!(fic.len(), 96);
    }

    #[test]
    fn fib_crc_is_consistent_with_stored_crc16() {
        let mut encoder = FicEncoder::new(ensemble());
        let fic = encoder.encode_fic();
        let fib0 = &fic[0..30];
        let crc0 = u16::from_be_bytes([fic[30], fic[31]]);
        assert_eq!(crc0, stored_crc16(fib0));
    }

    #[test]
    fn frame_number_reaches_fig_0_0_cif_counter() {
        let mut encoder = FicEncoder::new(ensemble());
        // CIF-count = frame_number mod 5000; 5001 mod 5000 = 1.
        encoder.advance_clock(0, 5001);
        let fic = encoder.encode_fic();
        assert_eq!(&fic[2..4], &0xCE15u16.to_be_bytes());
        assert_eq!(fic[4] >> 3, 0); // cif_high = (1/250) % 20 = 0
        assert_eq!(fic[5], 1); // cif_low = 1 % 250 = 1
    }

    #[test]
    fn setup_skips_optional_figs_when_unconfigured() {
        let ens = Rc::new(RefCell::new(Ensemble {
            id: 0x1000,
            ecc: 0,
            label: String::new(),
            short_label: String::new(),
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
            services: vec![],
            components: vec![],
            other_ensemble_services: vec![],
            frequency_information: vec![],
            config_generation: 0,
        }));
        let encoder = FicEncoder::new(ens);
        // Only FIG 0/0 and FIG 0/19 register unconditionally.
        assert_eq!(encoder.carousel.fig_count(), 2);
    }
}
