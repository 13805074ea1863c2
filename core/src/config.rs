//! Top-level YAML configuration: the ensemble model plus the output sinks
//! the core loop fans each finalized frame out to. Loaded once at startup;
//! any failure here keeps the multiplexer loop from ever starting, per the
//! error-handling policy's "fail at load" rule for configuration errors.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::edi::PftConfig;
use crate::ensemble::{ConfigError, Ensemble};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read configuration file {path:?}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("could not parse configuration YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EtiFileFormat {
    Framed,
    Streamed,
    Raw,
}

/// One ETI byte-sink destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtiOutputConfig {
    pub path: PathBuf,
    pub format: EtiFileFormat,
}

/// One EDI destination: UDP (PFT-fragmented, optionally FEC-protected) or
/// TCP (client or server, chosen by `listen`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum EdiOutputConfig {
    Udp {
        addr: SocketAddr,
        #[serde(default)]
        pft: PftConfig,
    },
    Tcp {
        addr: SocketAddr,
        #[serde(default)]
        listen: bool,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputsConfig {
    #[serde(default)]
    pub eti: Vec<EtiOutputConfig>,
    #[serde(default)]
    pub edi: Vec<EdiOutputConfig>,
}

/// Whole-file configuration: the ensemble plus where its frames go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    pub ensemble: Ensemble,
    #[serde(default)]
    pub outputs: OutputsConfig,
}

impl MuxConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;
        let config: MuxConfig = serde_yaml::from_str(&text)?;
        config.ensemble.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_loads_and_validates() {
        let yaml = r#"
ensemble:
  id: 0xCE15
  ecc: 0xE1
  label: "Test Ensemble"
  short_label: "Test"
  mode: I
  international_table_id: 0
  local_time_offset_half_hours: 2
  local_time_offset_auto: false
  alarm: false
  enable_tist: false
  subchannels:
    - id: 1
      kind: DabMp2
      start_address: 0
      bitrate_kbps: 128
      protection:
        EepA:
          level: 3
      fec_scheme: 0
      input_uri: "file:///tmp/test.mp2"
  services:
    - id: 0x5001
      label: "Service One"
      short_label: "Svc1"
      programme_type: 10
      language: 9
      announcement_support: {}
  components:
    - service_id: 0x5001
      subchannel_id: 1
      primary: true
      kind: StreamAudio
outputs:
  eti:
    - path: "/tmp/out.eti"
      format: Framed
"#;
        let config: MuxConfig = serde_yaml::from_str(yaml).unwrap();
        config.ensemble.validate().unwrap();
        assert_eq!(config.outputs.eti.len(), 1);
        assert_eq!(config.ensemble.subchannels.len(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = MuxConfig::load("/nonexistent/path/dabmux.yaml");
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }

    #[test]
    fn invalid_ensemble_fails_validation_at_load() {
        let yaml = r#"
ensemble:
  id: 0xCE15
  ecc: 0xE1
  label: "Test"
  short_label: "Test"
  mode: I
  international_table_id: 0
  local_time_offset_half_hours: 0
  local_time_offset_auto: false
  alarm: false
  enable_tist: false
  subchannels: []
  services: []
  components:
    - service_id: 0x5001
      subchannel_id: 9
      primary: true
      kind: StreamAudio
"#;
        let config: MuxConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.ensemble.validate().is_err());
    }
}
