//! Error types.
//!
//! Device-level trouble (a node that cannot be opened, a read that fails mid-stream) is never
//! an `Err`: the device is skipped or treated as detached and the event is logged. Errors here
//! are for the few calls a host makes deliberately: `init()`, loading a config, parsing a combo.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("backend initialization failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Combo(#[from] ComboError),
}

/// Why a combo string was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComboError {
    #[error("combo string names no keys or modifiers")]
    Empty,

    #[error("unknown key or modifier `{token}`")]
    UnknownToken { token: String },

    #[error("unexpected character {ch:?} at offset {offset}")]
    InvalidCharacter { ch: char, offset: usize },
}
