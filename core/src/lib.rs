//! `dabmux-core`: a software DAB/DAB+ multiplexer. Builds ETI frames from
//! configured sub-channel inputs and fans them out to ETI file sinks and EDI
//! network transports, ETSI EN 300 799 / EN 300 401 / TS 102 693.

pub mod charset;
pub mod config;
pub mod crc;
pub mod edi;
pub mod ensemble;
pub mod error;
pub mod eti;
pub mod fig;
pub mod input;
pub mod mot;
pub mod mux;
pub mod pad;
pub mod protection;
pub mod remote;
pub mod sink;
pub mod tables;

pub use config::{LoadError, MuxConfig};
pub use error::{MuxError, Result};
pub use mux::Multiplexer;
