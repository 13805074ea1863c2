//! Owned ensemble data model: `Ensemble`, `Service`, `Component`,
//! `Subchannel`, `DynamicLabel`, and their cross-reference invariants.
//! Cross-references are resolved by id through the parent `Ensemble` rather
//! than by pointer, per the redesign guidance in the governing design notes —
//! this keeps the model an ordinary owned aggregate with no ownership cycles.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::charset::{self, LabelError};
use crate::protection::Protection;
use crate::tables::Language;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate sub-channel id {0}")]
    DuplicateSubchannelId(u8),
    #[error("duplicate service id {0:#06x}")]
    DuplicateServiceId(u32),
    #[error("sub-channel CU range for id {0} overlaps sub-channel {1}")]
    OverlappingCuRange(u8, u8),
    #[error("component references unknown service {0:#06x}")]
    UnknownService(u32),
    #[error("component references unknown sub-channel {0}")]
    UnknownSubchannel(u8),
    #[error("service {0:#06x} has more than one primary component")]
    MultiplePrimaryComponents(u32),
    #[error("invalid label: {0}")]
    Label(#[from] LabelError),
    #[error("unsupported protection profile for sub-channel {0}")]
    UnsupportedProtection(u8),
    #[error("unrecognized input URI scheme in {0:?}")]
    BadUri(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionMode {
    I,
    II,
    III,
    IV,
}

impl TransmissionMode {
    pub fn mid(self) -> u8 {
        match self {
            TransmissionMode::I => 1,
            TransmissionMode::II => 2,
            TransmissionMode::III => 3,
            TransmissionMode::IV => 4,
        }
    }

    /// Number of FIBs per FIC: Mode I packs 3 FIBs into a 96-byte FIC; the
    /// other modes use a different CIF structure the core loop does not
    /// implement (FIC framing is identical across modes, only CIF count
    /// differs, which is outside the scope of this multiplexer).
    pub fn fibs_per_fic(self) -> usize {
        3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubchannelKind {
    DabMp2,
    DabPlusAac,
    Packet,
    DataDmb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subchannel {
    pub id: u8, // 6 bits
    pub kind: SubchannelKind,
    pub start_address: u16, // 10 bits, CU index
    pub bitrate_kbps: u32,
    pub protection: ProtectionConfig,
    pub fec_scheme: u8,
    pub input_uri: String,
    /// PAD trailer size in bytes appended after (MP2) or embedded in (AAC,
    /// via `set_pad_data`) each frame; `None`/absent disables PAD entirely.
    #[serde(default)]
    pub pad_length: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ProtectionConfig {
    Uep { level: u8 },
    EepA { level: u8 },
    EepB { level: u8 },
}

impl From<ProtectionConfig> for Protection {
    fn from(p: ProtectionConfig) -> Self {
        match p {
            ProtectionConfig::Uep { level } => Protection::Uep { level },
            ProtectionConfig::EepA { level } => Protection::EepA { level },
            ProtectionConfig::EepB { level } => Protection::EepB { level },
        }
    }
}

impl Subchannel {
    /// Size in Capacity Units, from the protection-table lookup.
    pub fn size_in_cu(&self) -> Result<usize, ConfigError> {
        let protection: Protection = self.protection.into();
        protection
            .size_in_cu_and_tpl(self.bitrate_kbps as usize)
            .map(|(size, _tpl)| size)
            .ok_or(ConfigError::UnsupportedProtection(self.id))
    }

    /// 6-bit TPL field value for this sub-channel's protection profile.
    pub fn tpl(&self) -> Result<u8, ConfigError> {
        let protection: Protection = self.protection.into();
        protection
            .size_in_cu_and_tpl(self.bitrate_kbps as usize)
            .map(|(_size, tpl)| tpl)
            .ok_or(ConfigError::UnsupportedProtection(self.id))
    }

    /// Per-24ms-frame byte size absent any input-reported override:
    /// `bitrate_kbps * 3`.
    pub fn default_frame_size_bytes(&self) -> usize {
        self.bitrate_kbps as usize * 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster(pub u8);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnouncementSupport {
    pub enabled_types: Vec<AnnouncementType>,
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementType {
    Alarm,
    Traffic,
    Travel,
    Warning,
    News,
    Weather,
    Event,
    Finance,
    Sport,
    Programme,
}

impl AnnouncementType {
    /// Bit position within the ASU flag field (FIG 0/18 / 0/19), per
    /// ETSI EN 300 401 Table 15.
    pub fn bit(self) -> u16 {
        match self {
            AnnouncementType::Alarm => 0,
            AnnouncementType::Traffic => 1,
            AnnouncementType::Travel => 2,
            AnnouncementType::Warning => 3,
            AnnouncementType::News => 4,
            AnnouncementType::Weather => 5,
            AnnouncementType::Event => 6,
            AnnouncementType::Finance => 7,
            AnnouncementType::Sport => 8,
            AnnouncementType::Programme => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkageTarget {
    Dab,
    Fm,
    Drm,
    Amss,
}

/// A service's membership in a linkage set (FIG 0/6), associating it with
/// other services carrying the same or related content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linkage {
    pub lsn: u16, // 12-bit linkage set number
    pub active: bool,
    pub hard: bool,
    pub international: bool, // ILS
    pub target: LinkageTarget,
}

/// One entry in a frequency list (FIG 0/21): an alternate frequency, in kHz,
/// on which the same or a linked service can be found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub control_field: u8, // R&M field, ETSI EN 300 401 Table 19
    pub frequency_khz: u32,
}

/// A frequency list keyed by an ensemble or linkage identifier, carried in
/// FIG 0/21.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyInformation {
    pub id: u16,
    pub is_other_ensemble: bool,
    pub entries: Vec<FrequencyEntry>,
}

/// A service carried in a different, foreign ensemble, signalled in FIG 0/24
/// so receivers can follow it there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OtherEnsembleService {
    pub ensemble_id: u16,
    pub service_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: u32, // 16-bit programme SId, or 32-bit data SId (>= 0x10000)
    pub label: String,
    pub short_label: String,
    pub programme_type: u8, // 0..=31
    pub language: Language,
    #[serde(default)]
    pub ecc: Option<u8>,
    #[serde(default)]
    pub announcement_support: AnnouncementSupport,
    #[serde(default)]
    pub ca_system_id: Option<u16>,
    #[serde(default)]
    pub linkage: Option<Linkage>,
    #[serde(default)]
    pub frequencies: Vec<FrequencyEntry>,
}

impl Service {
    pub fn is_data_service(&self) -> bool {
        self.id >= 0x10000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    StreamAudio,
    StreamData,
    Packet { packet_address: u16, datagroup: bool, dscty: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub service_id: u32,
    pub subchannel_id: u8,
    #[serde(default)]
    pub scids: Option<u8>,
    pub primary: bool,
    pub kind: ComponentKind,
    #[serde(default)]
    pub dynamic_label: Option<DynamicLabel>,
    #[serde(default)]
    pub mot_carousel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    EbuLatin,
    Ucs2,
    Utf8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicLabel {
    pub text: String,
    pub charset: Charset,
    #[serde(skip, default)]
    toggle: bool,
}

impl DynamicLabel {
    pub fn new(text: impl Into<String>) -> Self {
        DynamicLabel { text: text.into(), charset: Charset::EbuLatin, toggle: false }
    }

    pub fn toggle(&self) -> bool {
        self.toggle
    }

    /// Replace the text and flip the toggle bit, as required whenever the
    /// label content changes.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.toggle = !self.toggle;
    }

    /// Segment the (EBU-Latin encoded) text into chunks of at most 16 bytes,
    /// per ETSI TS 102 980's DLS segmentation.
    pub fn segments(&self) -> Vec<Vec<u8>> {
        let encoded = charset::utf8_to_ebu_latin(&self.text, 128, false);
        if encoded.is_empty() {
            return vec![Vec::new()];
        }
        encoded.chunks(16).map(|c| c.to_vec()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateTimeConfig {
    pub enabled: bool,
    #[serde(default)]
    pub lto_half_hours: i8,
    #[serde(default)]
    pub lto_auto: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ensemble {
    pub id: u16,
    pub ecc: u8,
    pub label: String,
    pub short_label: String,
    pub mode: TransmissionMode,
    pub international_table_id: u8,
    pub local_time_offset_half_hours: i8,
    pub local_time_offset_auto: bool,
    pub alarm: bool,
    #[serde(default)]
    pub datetime: DateTimeConfig,
    pub enable_tist: bool,
    #[serde(default)]
    pub tist_offset_seconds: f64,
    #[serde(default)]
    pub active_announcements: Vec<(u32, AnnouncementType)>,

    pub subchannels: Vec<Subchannel>,
    pub services: Vec<Service>,
    pub components: Vec<Component>,
    #[serde(default)]
    pub other_ensemble_services: Vec<OtherEnsembleService>,
    #[serde(default)]
    pub frequency_information: Vec<FrequencyInformation>,

    #[serde(default)]
    pub(crate) config_generation: u64,
}

impl Ensemble {
    /// Validate all cross-reference and uniqueness invariants. Called once
    /// at load time; any failure keeps the multiplexer loop from starting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_subch = std::collections::HashSet::new();
        for sc in &self.subchannels {
            if !seen_subch.insert(sc.id) {
                return Err(ConfigError::DuplicateSubchannelId(sc.id));
            }
        }
        let mut seen_service = std::collections::HashSet::new();
        for svc in &self.services {
            if !seen_service.insert(svc.id) {
                return Err(ConfigError::DuplicateServiceId(svc.id));
            }
            charset::validate_label(&svc.label, &svc.short_label)?;
        }
        charset::validate_label(&self.label, &self.short_label)?;

        // Non-overlapping CU ranges.
        let mut ranges: Vec<(u16, u16, u8)> = Vec::new();
        for sc in &self.subchannels {
            let size = sc.size_in_cu().map_err(|_| ConfigError::UnsupportedProtection(sc.id))? as u16;
            let end = sc.start_address + size;
            for &(other_start, other_end, other_id) in &ranges {
                if sc.start_address < other_end && other_start < end {
                    return Err(ConfigError::OverlappingCuRange(sc.id, other_id));
                }
            }
            ranges.push((sc.start_address, end, sc.id));
        }

        let mut primary_seen = std::collections::HashSet::new();
        for comp in &self.components {
            if self.service(comp.service_id).is_none() {
                return Err(ConfigError::UnknownService(comp.service_id));
            }
            if self.subchannel(comp.subchannel_id).is_none() {
                return Err(ConfigError::UnknownSubchannel(comp.subchannel_id));
            }
            if comp.primary && !primary_seen.insert(comp.service_id) {
                return Err(ConfigError::MultiplePrimaryComponents(comp.service_id));
            }
        }
        Ok(())
    }

    pub fn service(&self, id: u32) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn subchannel(&self, id: u8) -> Option<&Subchannel> {
        self.subchannels.iter().find(|s| s.id == id)
    }

    pub fn subchannel_mut(&mut self, id: u8) -> Option<&mut Subchannel> {
        self.subchannels.iter_mut().find(|s| s.id == id)
    }

    pub fn components_of_service(&self, service_id: u32) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.service_id == service_id)
    }

    /// Monotonic counter bumped whenever a structural mutation happens
    /// (rather than a label/announcement/text-only edit), observed by FIG
    /// 0/7 through [`Ensemble::structural_hash`] instead of this counter
    /// directly — kept as an auxiliary diagnostic for `get_statistics`.
    pub fn config_generation(&self) -> u64 {
        self.config_generation
    }

    pub fn bump_config_generation(&mut self) {
        self.config_generation += 1;
    }

    /// 10-bit structural hash over ensemble id, ECC, ordered sub-channels
    /// (id, bitrate, start address, protection profile/level, kind),
    /// ordered services (id, kind), and ordered components (service id,
    /// sub-channel id, packet address). Labels, dynamic text, and
    /// announcements never affect this hash.
    pub fn structural_hash(&self) -> u16 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.ecc.hash(&mut hasher);

        let mut subchannels: Vec<&Subchannel> = self.subchannels.iter().collect();
        subchannels.sort_by_key(|s| s.id);
        for sc in subchannels {
            sc.id.hash(&mut hasher);
            sc.bitrate_kbps.hash(&mut hasher);
            sc.start_address.hash(&mut hasher);
            hash_protection(&sc.protection, &mut hasher);
            hash_kind(&sc.kind, &mut hasher);
        }

        let mut services: Vec<&Service> = self.services.iter().collect();
        services.sort_by_key(|s| s.id);
        for svc in services {
            svc.id.hash(&mut hasher);
            svc.is_data_service().hash(&mut hasher);
        }

        let mut components: Vec<&Component> = self.components.iter().collect();
        components.sort_by_key(|c| (c.service_id, c.subchannel_id));
        for comp in components {
            comp.service_id.hash(&mut hasher);
            comp.subchannel_id.hash(&mut hasher);
            if let ComponentKind::Packet { packet_address, .. } = comp.kind {
                packet_address.hash(&mut hasher);
            }
        }

        (hasher.finish() & 0x3FF) as u16
    }
}

fn hash_protection(p: &ProtectionConfig, hasher: &mut impl Hasher) {
    match p {
        ProtectionConfig::Uep { level } => (0u8, *level).hash(hasher),
        ProtectionConfig::EepA { level } => (1u8, *level).hash(hasher),
        ProtectionConfig::EepB { level } => (2u8, *level).hash(hasher),
    }
}

fn hash_kind(kind: &SubchannelKind, hasher: &mut impl Hasher) {
    match kind {
        SubchannelKind::DabMp2 => 0u8.hash(hasher),
        SubchannelKind::DabPlusAac => 1u8.hash(hasher),
        SubchannelKind::Packet => 2u8.hash(hasher),
        SubchannelKind::DataDmb => 3u8.hash(hasher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_ensemble() -> Ensemble {
        Ensemble {
            id: 0xCE15,
            ecc: 0xE1,
            label: "Test Ensemble".into(),
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
                input_uri: "file:///tmp/test.mp2".into(),
                pad_length: None,
            }],
            services: vec![Service {
                id: 0x5001,
                label: "Service One".into(),
                short_label: "Svc1".into(),
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
        }
    }

    #[test]
    fn minimal_ensemble_validates() {
        minimal_ensemble().validate().unwrap();
    }

    #[test]
    fn duplicate_subchannel_id_rejected() {
        let mut ens = minimal_ensemble();
        let dup = ens.subchannels[0].clone();
        ens.subchannels.push(dup);
        assert!(matches!(ens.validate(), Err(ConfigError::DuplicateSubchannelId(1))));
    }

    #[test]
    fn dangling_component_rejected() {
        let mut ens = minimal_ensemble();
        ens.components[0].subchannel_id = 99;
        assert!(matches!(ens.validate(), Err(ConfigError::UnknownSubchannel(99))));
    }

    #[test]
    fn structural_hash_ignores_labels() {
        let mut ens = minimal_ensemble();
        let before = ens.structural_hash();
        ens.label = "Renamed Ensemble".into();
        ens.services[0].label = "Renamed Service".into();
        assert_eq!(ens.structural_hash(), before);
    }

    #[test]
    fn structural_hash_changes_on_bitrate_edit() {
        let mut ens = minimal_ensemble();
        let before = ens.structural_hash();
        ens.subchannels[0].bitrate_kbps = 64;
        assert_ne!(ens.structural_hash(), before);
    }

    #[test]
    fn dynamic_label_toggle_flips_on_text_change() {
        let mut label = DynamicLabel::new("Original");
        let before = label.toggle();
        label.set_text("Updated");
        assert_ne!(label.toggle(), before);
    }
}
