pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Direction of carriage travel along the track.
///
/// `Right` is positive (away from the calibrated zero end stop),
/// `Left` is negative (toward it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Signed step increment for one step in this direction.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Physical seam for a step/dir stepper stage with end-stop sensors.
///
/// Implementations pulse real pins (rppal) or move a simulated carriage.
/// All methods are fallible; GPIO faults surface as boxed errors and are
/// mapped to typed kinds at the core boundary.
pub trait Stepper {
    /// Latch the direction pin. Takes effect for subsequent pulses.
    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Emit exactly one step pulse: step pin high for `pulse_width`,
    /// then low. Does not sleep the inter-step delay; pacing is the
    /// caller's job.
    fn step_pulse(
        &mut self,
        pulse_width: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Whether the end stop on the given side is currently triggered.
    fn end_stop(
        &mut self,
        side: Direction,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Drive the enable line (no-op when the stage has none).
    fn set_enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
