//! Remote-control command surface: the semantic effect of the operator
//! commands an embedding CLI/daemon would expose over ZMQ or telnet. The
//! wire codec and transport are Non-goals of the core (per the governing
//! design notes); this module owns only the command enum, the response
//! shape, and the handler that mutates the ensemble model between ticks.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use crate::ensemble::{AnnouncementType, ConfigError, DynamicLabel, Ensemble};
use crate::tables::Language;

/// Identifies one component by the (service, sub-channel) pair it binds,
/// since components carry no id of their own in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentUid {
    pub service_id: u32,
    pub subchannel_id: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("no component bound to service {0:#06x}/sub-channel {1}")]
    UnknownComponent(u32, u8),
    #[error("no service {0:#06x}")]
    UnknownService(u32),
    #[error("programme type {0} out of range 0..=31")]
    BadProgrammeType(u8),
    #[error("language {0} out of range 0..=127")]
    BadLanguage(u8),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Label(#[from] crate::charset::LabelError),
}

/// Semantic commands from §6's remote-control surface.
#[derive(Debug, Clone)]
pub enum RemoteCommand {
    GetStatistics,
    GetLabel { component: ComponentUid },
    SetLabel { component: ComponentUid, text: String },
    TriggerAnnouncement { service_id: u32, kind: AnnouncementType, subchannel_id: u8, region_id: Option<u8> },
    ClearAnnouncement { service_id: u32, kind: AnnouncementType },
    GetServiceInfo,
    GetInputStatus,
    ReloadCarousel { component: ComponentUid },
    GetCarouselStats,
    SetServicePty { service_id: u32, pty: u8 },
    SetServiceLanguage { service_id: u32, lang: u8 },
    SetServiceLabel { service_id: u32, text: String, short: Option<String> },
    SetLogLevel { level: String, module: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResponse {
    Ack,
    Statistics { frame_count: u64, config_generation: u64 },
    Label(String),
    ServiceInfo(Vec<(u32, String)>),
    InputStatus(Vec<(u8, u64, u64, u64)>),
    CarouselStats(Vec<(u16, u64)>),
}

/// Owns the ensemble handle and dispatches remote commands against it. A
/// plain method rather than a trait object: the command set is fixed, and
/// nothing downstream needs to substitute a different handler.
pub struct RemoteControl {
    ensemble: Rc<RefCell<Ensemble>>,
}

impl RemoteControl {
    pub fn new(ensemble: Rc<RefCell<Ensemble>>) -> Self {
        RemoteControl { ensemble }
    }

    pub fn handle(&self, command: RemoteCommand, frame_count: u64) -> Result<RemoteResponse, RemoteError> {
        match command {
            RemoteCommand::GetStatistics => Ok(RemoteResponse::Statistics {
                frame_count,
                config_generation: self.ensemble.borrow().config_generation(),
            }),
            RemoteCommand::GetLabel { component } => {
                let ens = self.ensemble.borrow();
                let comp = find_component(&ens, component)?;
                Ok(RemoteResponse::Label(
                    comp.dynamic_label.as_ref().map(|l| l.text.clone()).unwrap_or_default(),
                ))
            }
            RemoteCommand::SetLabel { component, text } => {
                let mut ens = self.ensemble.borrow_mut();
                let idx = find_component_index(&ens, component)?;
                match ens.components[idx].dynamic_label.as_mut() {
                    Some(label) => label.set_text(text),
                    None => ens.components[idx].dynamic_label = Some(DynamicLabel::new(text)),
                }
                info!("set_label: service {:#06x} sub-channel {}", component.service_id, component.subchannel_id);
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::TriggerAnnouncement { service_id, kind, subchannel_id, region_id } => {
                let mut ens = self.ensemble.borrow_mut();
                if ens.service(service_id).is_none() {
                    return Err(RemoteError::UnknownService(service_id));
                }
                let _ = region_id; // region clustering is read from the service's own config
                let _ = subchannel_id; // carried by the triggering component, not stored separately
                if !ens.active_announcements.iter().any(|&(sid, ty)| sid == service_id && ty == kind) {
                    ens.active_announcements.push((service_id, kind));
                }
                info!("announcement triggered: service {service_id:#06x} type {kind:?}");
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::ClearAnnouncement { service_id, kind } => {
                let mut ens = self.ensemble.borrow_mut();
                ens.active_announcements.retain(|&(sid, ty)| !(sid == service_id && ty == kind));
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::GetServiceInfo => {
                let ens = self.ensemble.borrow();
                Ok(RemoteResponse::ServiceInfo(
                    ens.services.iter().map(|s| (s.id, s.label.clone())).collect(),
                ))
            }
            RemoteCommand::GetInputStatus => Ok(RemoteResponse::InputStatus(Vec::new())),
            RemoteCommand::ReloadCarousel { component } => {
                let ens = self.ensemble.borrow();
                find_component(&ens, component)?;
                // Actual carousel reload happens in the mux loop, which owns
                // the `CarouselManager` instances; this only validates the
                // target exists before the caller signals the reload flag.
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::GetCarouselStats => Ok(RemoteResponse::CarouselStats(Vec::new())),
            RemoteCommand::SetServicePty { service_id, pty } => {
                if pty > 31 {
                    return Err(RemoteError::BadProgrammeType(pty));
                }
                let mut ens = self.ensemble.borrow_mut();
                let service = ens
                    .services
                    .iter_mut()
                    .find(|s| s.id == service_id)
                    .ok_or(RemoteError::UnknownService(service_id))?;
                service.programme_type = pty;
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::SetServiceLanguage { service_id, lang } => {
                if lang > 127 {
                    return Err(RemoteError::BadLanguage(lang));
                }
                let mut ens = self.ensemble.borrow_mut();
                let service = ens
                    .services
                    .iter_mut()
                    .find(|s| s.id == service_id)
                    .ok_or(RemoteError::UnknownService(service_id))?;
                service.language = Language::from(lang);
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::SetServiceLabel { service_id, text, short } => {
                let mut ens = self.ensemble.borrow_mut();
                let short = short.unwrap_or_default();
                crate::charset::validate_label(&text, &short)?;
                let service = ens
                    .services
                    .iter_mut()
                    .find(|s| s.id == service_id)
                    .ok_or(RemoteError::UnknownService(service_id))?;
                service.label = text;
                service.short_label = short;
                Ok(RemoteResponse::Ack)
            }
            RemoteCommand::SetLogLevel { level, module } => {
                info!("set_log_level: {level} (module={module:?}) -- log filtering is owned by the embedding CLI");
                Ok(RemoteResponse::Ack)
            }
        }
    }
}

fn find_component_index(ensemble: &Ensemble, uid: ComponentUid) -> Result<usize, RemoteError> {
    ensemble
        .components
        .iter()
        .position(|c| c.service_id == uid.service_id && c.subchannel_id == uid.subchannel_id)
        .ok_or(RemoteError::UnknownComponent(uid.service_id, uid.subchannel_id))
}

fn find_component(
    ensemble: &Ensemble,
    uid: ComponentUid,
) -> Result<&crate::ensemble::Component, RemoteError> {
    ensemble
        .components
        .iter()
        .find(|c| c.service_id == uid.service_id && c.subchannel_id == uid.subchannel_id)
        .ok_or(RemoteError::UnknownComponent(uid.service_id, uid.subchannel_id))
}
