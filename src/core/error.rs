use crate::chamber::SourceIdentity;
use thiserror::Error;

/// Errors surfaced to the caller from roster and configuration operations.
#[derive(Error, Debug)]
pub enum ChamberError {
    #[error("No chamber at index {index} (roster holds {len})")]
    NoSuchChamber { index: usize, len: usize },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a scheduling call did nothing. Never fatal; logged and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("chamber is paused")]
    Paused,

    #[error("chamber has no wall-clock marker")]
    NoMarker,

    #[error("less than one interval elapsed")]
    NothingElapsed,

    #[error("wall clock moved backwards by {behind_millis}ms")]
    ClockRegression { behind_millis: i64 },

    #[error("source {0} cannot be resolved to a reward table")]
    Unresolvable(SourceIdentity),

    #[error("offline persistence is not unlocked")]
    OfflineLocked,
}

pub type Result<T> = std::result::Result<T, ChamberError>;
