use thiserror::Error;

/// Typed error kinds for the motion stack.
///
/// Recoverable conditions (`NotFound`, `LimitReached`, `Busy`, ...) and
/// true faults (`Hardware`) share one enum so callers pattern-match on the
/// kind instead of string-sniffing; nothing in the motion path panics.
#[derive(Debug, Error, Clone)]
pub enum MotionError {
    /// The position or recipe store could not be read or is malformed.
    /// The in-memory store stays empty; empty means "no positions known",
    /// never "everything at zero".
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unknown identifier: {0}")]
    NotFound(String),

    /// A sequence definition failed validation; nothing was executed.
    #[error("invalid sequence '{sequence}': {reason}")]
    InvalidSequence { sequence: String, reason: String },

    /// The tracked position is not trustworthy until homing succeeds.
    #[error("motor is not calibrated")]
    Uncalibrated,

    #[error("motor is disabled")]
    Disabled,

    /// An end stop interrupted a move; `position` is where the carriage
    /// actually stopped. Not retried automatically.
    #[error("end stop reached at {position} while moving to {target}")]
    LimitReached { position: i32, target: i32 },

    /// Another motion operation holds the motor; retry later.
    #[error("another motion operation is in progress")]
    Busy,

    /// Cooperative cancellation between steps; the tracked position is
    /// accurate for wherever motion stopped.
    #[error("motion cancelled at {position}")]
    Cancelled { position: i32 },

    /// A dispensing run stopped early. `step` is the 1-based ordinal of
    /// the failed step; later steps were never attempted.
    #[error("sequence '{sequence}' aborted at step {step}, carriage at {position}")]
    SequenceAborted {
        sequence: String,
        step: usize,
        position: i32,
        #[source]
        source: Box<MotionError>,
    },

    #[error("hardware fault: {0}")]
    Hardware(String),
}

pub type Result<T> = std::result::Result<T, MotionError>;

/// Convert a boxed error from the stepper seam into a typed fault.
pub(crate) fn hw_fault(e: Box<dyn std::error::Error + Send + Sync>) -> MotionError {
    MotionError::Hardware(e.to_string())
}
