//! Multiplexer core loop, the per-frame tick described by the governing
//! design notes §4.10: FIC generation, per-sub-channel input/PAD/MOT
//! assembly, ETI frame finalization, and fan-out to every configured ETI
//! and EDI output.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::config::{EdiOutputConfig, EtiFileFormat, MuxConfig};
use crate::edi::{EdiEncoder, EdiTcpSink, EdiUdpSink};
use crate::ensemble::{ComponentKind, Ensemble};
use crate::error::MuxError;
use crate::eti::{fsync_for_frame, Frame, MnscTime0, MnscTime1, MnscTime2, MnscTime3, Stc};
use crate::fig::fic::FicEncoder;
use crate::fig::fig0::civil_from_unix;
use crate::input::InputSource;
use crate::mot::CarouselManager;
use crate::pad::DlsEncoder;
use crate::remote::RemoteControl;
use crate::sink::EtiSink;

/// ETI frame period, ETSI EN 300 799.
const FRAME_PERIOD_MS: u64 = 24;
/// TIST clock rate: 1/16 384 000 s per tick.
const TIST_TICKS_PER_SECOND: f64 = 16_384_000.0;
const HEARTBEAT_INTERVAL_FRAMES: u64 = 100;

/// Couples a sub-channel's PAD trailer size with the DLS encoder mirroring
/// the bound component's dynamic label into it.
struct PadRuntime {
    encoder: DlsEncoder,
    pad_length: usize,
}

/// Runtime state for one active sub-channel: its input driver plus whatever
/// PAD trailer or packet-mode carousel rides alongside it.
struct SubchannelRuntime {
    subchannel_id: u8,
    input: InputSource,
    pad: Option<PadRuntime>,
    carousel: Option<CarouselManager>,
}

/// Drives the ensemble's ETI/EDI output from its configured inputs, one
/// 24ms frame at a time.
pub struct Multiplexer {
    ensemble: Rc<RefCell<Ensemble>>,
    fic: FicEncoder,
    remote: RemoteControl,
    runtimes: Vec<SubchannelRuntime>,
    eti_sinks: Vec<EtiSink>,
    edi_encoder: Option<EdiEncoder>,
    edi_udp: Vec<EdiUdpSink>,
    edi_tcp: Vec<EdiTcpSink>,
    frame_count: u64,
    started_at: Instant,
    running: Arc<AtomicBool>,
}

impl Multiplexer {
    pub async fn new(config: MuxConfig) -> Result<Self, MuxError> {
        config.ensemble.validate()?;
        let ensemble = Rc::new(RefCell::new(config.ensemble));
        let fic = FicEncoder::new(ensemble.clone());
        let remote = RemoteControl::new(ensemble.clone());

        let runtimes = {
            let ens = ensemble.borrow();
            let mut runtimes = Vec::with_capacity(ens.subchannels.len());
            for sc in &ens.subchannels {
                let input = InputSource::open(&sc.input_uri, sc.kind, sc.bitrate_kbps)?;
                let bound = ens.components.iter().find(|c| c.subchannel_id == sc.id);

                let pad = match (sc.pad_length, bound) {
                    (Some(pad_length), Some(comp)) if comp.dynamic_label.is_some() => {
                        let initial = comp.dynamic_label.as_ref().unwrap().text.clone();
                        Some(PadRuntime { encoder: DlsEncoder::new(initial), pad_length: pad_length as usize })
                    }
                    _ => None,
                };

                let carousel = match bound.map(|c| c.kind) {
                    Some(ComponentKind::Packet { packet_address, .. }) => {
                        Some(CarouselManager::new(packet_address, sc.default_frame_size_bytes()))
                    }
                    _ => None,
                };

                runtimes.push(SubchannelRuntime { subchannel_id: sc.id, input, pad, carousel });
            }
            runtimes
        };

        let mut eti_sinks = Vec::with_capacity(config.outputs.eti.len());
        for out in &config.outputs.eti {
            let sink = match out.format {
                EtiFileFormat::Framed => EtiSink::open_framed(&out.path)?,
                EtiFileFormat::Streamed => EtiSink::open_streamed(&out.path)?,
                EtiFileFormat::Raw => EtiSink::open_raw(&out.path)?,
            };
            eti_sinks.push(sink);
        }

        let mut edi_udp = Vec::new();
        let mut edi_tcp = Vec::new();
        for out in &config.outputs.edi {
            match out {
                EdiOutputConfig::Udp { addr, pft } => {
                    edi_udp.push(EdiUdpSink::connect(*addr, *pft).await?);
                }
                EdiOutputConfig::Tcp { addr, listen: true } => {
                    edi_tcp.push(EdiTcpSink::bind_server(*addr).await?);
                }
                EdiOutputConfig::Tcp { addr, listen: false } => {
                    edi_tcp.push(EdiTcpSink::connect_client(*addr).await?);
                }
            }
        }
        let edi_encoder = if edi_udp.is_empty() && edi_tcp.is_empty() { None } else { Some(EdiEncoder::new()) };

        Ok(Multiplexer {
            ensemble,
            fic,
            remote,
            runtimes,
            eti_sinks,
            edi_encoder,
            edi_udp,
            edi_tcp,
            frame_count: 0,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn remote(&self) -> &RemoteControl {
        &self.remote
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// A clone of the cooperative shutdown flag; setting it to `false` halts
    /// `run` after its current tick.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Runs ticks on a fixed 24ms interval until the shutdown flag clears.
    pub async fn run(&mut self) -> Result<(), MuxError> {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(FRAME_PERIOD_MS));
        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;
            self.tick().await?;
        }
        for sink in &mut self.eti_sinks {
            sink.flush()?;
        }
        Ok(())
    }

    /// Produces and dispatches exactly one ETI frame.
    pub async fn tick(&mut self) -> Result<(), MuxError> {
        let (mode_mid, with_tist, tist_offset, datetime_enabled) = {
            let ens = self.ensemble.borrow();
            (ens.mode.mid(), ens.enable_tist, ens.tist_offset_seconds, ens.datetime.enabled)
        };

        let mut frame = Frame::create_empty(mode_mid, with_tist);
        frame.sync.fsync = fsync_for_frame(self.frame_count);
        frame.fc.fct = (self.frame_count % 256) as u8;
        frame.fc.nst = self.runtimes.len() as u8;

        if with_tist {
            let wall = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
            let ticks = ((wall + tist_offset) * TIST_TICKS_PER_SECOND) as u64;
            frame.tist = Some(crate::eti::Tist((ticks % (1u64 << 32)) as u32));
        }

        self.fic.advance_clock(self.frame_count * FRAME_PERIOD_MS, self.frame_count);
        if datetime_enabled {
            let unix_seconds = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
            self.fic.set_wall_clock(unix_seconds);
        }
        frame.fic_data = self.fic.encode_fic();

        frame.eoh.mnsc = if datetime_enabled { self.mnsc_payload() } else { 0 };

        for runtime in &mut self.runtimes {
            let sc = {
                let ens = self.ensemble.borrow();
                ens.subchannel(runtime.subchannel_id).cloned()
            };
            let Some(sc) = sc else { continue };

            let pad_trailer = if let Some(pad) = runtime.pad.as_mut() {
                let text = {
                    let ens = self.ensemble.borrow();
                    ens.components
                        .iter()
                        .find(|c| c.subchannel_id == runtime.subchannel_id)
                        .and_then(|c| c.dynamic_label.as_ref())
                        .map(|l| l.text.clone())
                };
                if let Some(text) = text {
                    pad.encoder.set_text(text);
                }
                Some(pad.encoder.encode_trailer(pad.pad_length))
            } else {
                None
            };

            let payload = if let Some(carousel) = runtime.carousel.as_mut() {
                let budget = sc.default_frame_size_bytes();
                match carousel.get_next_packet() {
                    Some(packet) => {
                        let mut data = packet.data;
                        data.resize(budget, 0);
                        data
                    }
                    None => vec![0u8; budget],
                }
            } else {
                let size = runtime.input.frame_size_override().unwrap_or_else(|| sc.default_frame_size_bytes());
                let mut data = runtime.input.read_frame(size);
                if let Some(trailer) = pad_trailer {
                    data.extend_from_slice(&trailer);
                }
                data
            };

            let padded_len = (payload.len() + 7) / 8 * 8;
            let mut padded = payload;
            padded.resize(padded_len, 0);

            let start_address = sc.start_address;
            let tpl = sc.tpl().unwrap_or(0);
            let stl = (padded_len / 8) as u16;
            frame.stc_headers.push(Stc::new(sc.id, start_address, tpl, stl));
            frame.subchannel_data.extend_from_slice(&padded);
        }

        frame.finalize();

        if let Some(edi_encoder) = self.edi_encoder.as_mut() {
            let af_packet = edi_encoder.encode_frame(&frame);
            for sink in &mut self.edi_udp {
                if let Err(err) = sink.send(&af_packet).await {
                    warn!("EDI UDP send failed: {err}");
                }
            }
            for sink in &mut self.edi_tcp {
                sink.accept_pending().await;
                if let Err(err) = sink.send(&af_packet).await {
                    warn!("EDI TCP send failed: {err}");
                }
            }
        }

        let packed = frame.pack();
        for sink in &mut self.eti_sinks {
            sink.write_frame(&packed)?;
        }

        self.frame_count += 1;
        if self.frame_count % HEARTBEAT_INTERVAL_FRAMES == 0 {
            info!(
                "mux heartbeat: frame_count={} elapsed={:.1}s",
                self.frame_count,
                self.started_at.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    /// Rotating BCD time-of-day payload cycling across four consecutive
    /// frames, supplemented from the original implementation's
    /// `EtiMNSCTime0..3`.
    fn mnsc_payload(&self) -> u16 {
        let unix_seconds = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let (year, month, day, hour, minute) = civil_from_unix(unix_seconds);
        let second = (unix_seconds % 60) as u8;
        match self.frame_count % 4 {
            0 => MnscTime0 { kind: 0, identifier: 0, rfa: 0 }.pack(),
            1 => MnscTime1::from_seconds_minutes(second, minute).pack(),
            2 => MnscTime2::from_hour_day(hour, day as u8).pack(),
            _ => MnscTime3::from_month_year(month as u8, year as u16).pack(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EtiOutputConfig, OutputsConfig};
    use crate::ensemble::*;
    use crate::tables::Language;

    fn config_with_one_mp2_subchannel(path: &str, out_path: &str) -> MuxConfig {
        MuxConfig {
            ensemble: Ensemble {
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
                    bitrate_kbps: 32,
                    protection: ProtectionConfig::EepA { level: 3 },
                    fec_scheme: 0,
                    input_uri: format!("file://{path}"),
                    pad_length: None,
                }],
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
                    dynamic_label: None,
                    mot_carousel: false,
                }],
                other_ensemble_services: vec![],
                frequency_information: vec![],
                config_generation: 0,
            },
            outputs: OutputsConfig {
                eti: vec![EtiOutputConfig { path: out_path.into(), format: EtiFileFormat::Framed }],
                edi: vec![],
            },
        }
    }

    fn tmp(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dabmux-mux-test-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn tick_advances_frame_count_and_alternates_fsync() {
        let input_path = tmp("input.bin");
        std::fs::write(&input_path, vec![0u8; 4096]).unwrap();
        let out_path = tmp("out.eti");

        let config = config_with_one_mp2_subchannel(input_path.to_str().unwrap(), out_path.to_str().unwrap());
        let mut mux = Multiplexer::new(config).await.unwrap();

        assert_eq!(mux.frame_count(), 0);
        mux.tick().await.unwrap();
        assert_eq!(mux.frame_count(), 1);
        mux.tick().await.unwrap();
        assert_eq!(mux.frame_count(), 2);

        let _ = std::fs::remove_file(&input_path);
        let _ = std::fs::remove_file(&out_path);
    }

    #[tokio::test]
    async fn tick_writes_one_framed_record_per_call() {
        let input_path = tmp("input2.bin");
        std::fs::write(&input_path, vec![0u8; 4096]).unwrap();
        let out_path = tmp("out2.eti");

        let config = config_with_one_mp2_subchannel(input_path.to_str().unwrap(), out_path.to_str().unwrap());
        let mut mux = Multiplexer::new(config).await.unwrap();
        mux.tick().await.unwrap();
        mux.tick().await.unwrap();
        mux.tick().await.unwrap();

        let bytes = std::fs::read(&out_path).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 3);

        let _ = std::fs::remove_file(&input_path);
        let _ = std::fs::remove_file(&out_path);
    }

    #[tokio::test]
    async fn heartbeat_does_not_panic_across_a_hundred_frames() {
        let input_path = tmp("input3.bin");
        std::fs::write(&input_path, vec![0u8; 4096]).unwrap();
        let out_path = tmp("out3.eti");

        let config = config_with_one_mp2_subchannel(input_path.to_str().unwrap(), out_path.to_str().unwrap());
        let mut mux = Multiplexer::new(config).await.unwrap();
        for _ in 0..HEARTBEAT_INTERVAL_FRAMES {
            mux.tick().await.unwrap();
        }
        assert_eq!(mux.frame_count(), HEARTBEAT_INTERVAL_FRAMES);

        let _ = std::fs::remove_file(&input_path);
        let _ = std::fs::remove_file(&out_path);
    }
}
