//! Top-level error aggregation. Per-module errors (see `ensemble`, `eti`,
//! `fig`, `input`, `edi`, `mot`) carry their own `thiserror` enums; this type
//! is the crate boundary error the multiplexer loop and the CLI deal with.
//!
//! `Configuration` is fatal at load, `Invariant` is a programming error
//! fatal wherever it surfaces, and everything else is tick-local and only
//! ever logged/counted by the caller, never propagated as a process-ending
//! error.

use crate::charset::LabelError;
use crate::config::LoadError;
use crate::ensemble::ConfigError;
use crate::eti::EtiError;
use crate::input::InputError;
use crate::sink::SinkError;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid label: {0}")]
    Label(#[from] LabelError),

    #[error("ETI codec error: {0}")]
    Eti(#[from] EtiError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("output sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("structural invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MuxError>;
