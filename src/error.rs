//! Error kinds and the diagnostics sink.
//!
//! Nothing in the generator is fatal for a whole library: per-entity
//! problems are reported to a [`Diagnostics`] sink and the entity is
//! skipped or defaulted.

use log::Level;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Error)]
pub enum LibError {
    #[error("missing characterization key `{key}` for pin `{pin}`")]
    MissingCharacterizationKey { pin: String, key: String },

    #[error("unknown power unit: {0}")]
    UnknownPowerUnit(String),

    #[error("no name for {kind} group")]
    UnnamedGroup { kind: String },

    #[error("library cell already defined: {0}")]
    DuplicateCellName(String),

    #[error("no type `{bus_type}` found for bus `{bus}`")]
    UnknownBusType { bus: String, bus_type: String },

    #[error("unknown direction `{direction}` for port `{port}`")]
    UnknownDirection { port: String, direction: String },

    #[error("unknown cell type `{0}`")]
    UnknownArchetype(String),

    #[error("no operation catalog entry for `{0}`")]
    UnknownCatalogEntry(String),

    #[error("missing parameter `{param}` for cell type `{cell_type}`")]
    MissingParameter { cell_type: String, param: String },

    #[error("parameter `{param}` = {value} out of range for cell type `{cell_type}`")]
    InvalidParameter { cell_type: String, param: String, value: i64 },

    #[error("malformed operation catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl LibError {
    /// Level at which the error is logged when it is reported
    /// instead of propagated.
    pub fn level(&self) -> Level {
        match self {
            LibError::MissingCharacterizationKey { .. }
            | LibError::UnknownArchetype(_)
            | LibError::UnknownCatalogEntry(_)
            | LibError::MissingParameter { .. }
            | LibError::InvalidParameter { .. } => Level::Error,
            _ => Level::Warn,
        }
    }
}

/// Receives non-fatal problems.
pub trait Diagnostics {
    fn report(&mut self, error: LibError);
}

/// Collects everything, mostly for tests.
impl Diagnostics for Vec<LibError> {
    fn report(&mut self, error: LibError) {
        self.push(error);
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, error: LibError) {
        log::log!(error.level(), "{}", error);
    }
}
