//! Low-level stepper control: pulse pacing, direction, end-stop sensing,
//! and the homing procedure that establishes the zero reference.

use crate::error::{MotionError, Result, hw_fault};
use barbot_traits::{Clock, Direction, Stepper};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Step timing and travel limits, converted from the TOML config.
#[derive(Debug, Clone)]
pub struct DriverCfg {
    /// Delay between step pulses. Larger = slower, smoother motion.
    pub step_delay: Duration,
    /// Floor for `step_delay`; faster pulse trains risk silently skipped
    /// steps, so requests below this are clamped.
    pub min_step_delay: Duration,
    /// Step pin high time per pulse.
    pub pulse_width: Duration,
    /// Upper bound on steps per homing sweep before the missing end stop
    /// is declared a hardware fault.
    pub max_travel_steps: u32,
}

impl Default for DriverCfg {
    fn default() -> Self {
        (&barbot_config::MotorCfg::default()).into()
    }
}

impl From<&barbot_config::MotorCfg> for DriverCfg {
    fn from(m: &barbot_config::MotorCfg) -> Self {
        Self {
            step_delay: Duration::from_micros(m.step_delay_us),
            min_step_delay: Duration::from_micros(m.min_step_delay_us),
            pulse_width: Duration::from_micros(m.pulse_width_us),
            max_travel_steps: m.max_travel_steps,
        }
    }
}

/// Result of a single step request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One pulse was issued; the tracked position moved by one step.
    Stepped,
    /// The end stop in the direction of travel was already triggered; no
    /// pulse was issued and the position is unchanged.
    AtLimit,
}

/// Exclusive owner of one physical stepper stage.
///
/// The tracked position only ever changes one step at a time, so on any
/// failure it cannot diverge from the carriage by more than a single step.
pub struct MotorDriver<S: Stepper> {
    stage: S,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: DriverCfg,
    step_delay: Duration,
    position: i32,
    travel: Option<i32>,
    calibrated: bool,
    enabled: bool,
    last_dir: Option<Direction>,
}

impl<S: Stepper> MotorDriver<S> {
    pub fn new(stage: S, cfg: DriverCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let step_delay = cfg.step_delay.max(cfg.min_step_delay);
        Self {
            stage,
            clock,
            cfg,
            step_delay,
            position: 0,
            travel: None,
            calibrated: false,
            enabled: true,
            last_dir: None,
        }
    }

    /// Emit exactly one step toward `dir`.
    ///
    /// The end stop in the direction of travel is checked *before* the
    /// pulse; stepping into a triggered end stop is a no-op reported as
    /// `AtLimit`, never an overshoot.
    pub fn step_once(&mut self, dir: Direction) -> Result<StepOutcome> {
        if !self.enabled {
            return Err(MotionError::Disabled);
        }
        if self.stage.end_stop(dir).map_err(hw_fault)? {
            tracing::debug!(%dir, position = self.position, "end stop active, step suppressed");
            return Ok(StepOutcome::AtLimit);
        }
        if self.last_dir != Some(dir) {
            self.stage.set_direction(dir).map_err(hw_fault)?;
            self.last_dir = Some(dir);
        }
        self.stage.step_pulse(self.cfg.pulse_width).map_err(hw_fault)?;
        self.clock.sleep(self.step_delay);
        self.position += dir.sign();
        Ok(StepOutcome::Stepped)
    }

    /// Home the carriage: drive to the left end stop, sweep to the right
    /// one while counting steps (discovering the travel length), then
    /// return to the left end stop.
    ///
    /// On success the position is 0 and the driver is calibrated. Safe to
    /// call again from anywhere; it re-homes from the current pose.
    pub fn calibrate(&mut self, cancel: &AtomicBool) -> Result<i32> {
        if !self.enabled {
            return Err(MotionError::Disabled);
        }
        // The old reference is void until the new one is established.
        self.calibrated = false;
        tracing::info!(position = self.position, "homing started");

        self.sweep(Direction::Left, cancel)?;
        self.position = 0;
        let travel = self.sweep(Direction::Right, cancel)? as i32;
        self.sweep(Direction::Left, cancel)?;
        self.position = 0;
        self.travel = Some(travel);
        self.calibrated = true;
        tracing::info!(travel, "homing complete");
        Ok(travel)
    }

    /// Step toward `dir` until its end stop triggers, returning the number
    /// of steps taken. Bounded by `max_travel_steps`.
    fn sweep(&mut self, dir: Direction, cancel: &AtomicBool) -> Result<u32> {
        let mut taken: u32 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(MotionError::Cancelled {
                    position: self.position,
                });
            }
            match self.step_once(dir)? {
                StepOutcome::AtLimit => return Ok(taken),
                StepOutcome::Stepped => {
                    taken += 1;
                    if taken > self.cfg.max_travel_steps {
                        return Err(MotionError::Hardware(format!(
                            "{dir} end stop not reached within {} steps",
                            self.cfg.max_travel_steps
                        )));
                    }
                }
            }
        }
    }

    /// Update the inter-step delay for subsequent steps, clamped to the
    /// configured minimum. Returns the delay actually applied.
    pub fn set_speed(&mut self, delay: Duration) -> Duration {
        let applied = if delay < self.cfg.min_step_delay {
            tracing::warn!(
                requested_us = delay.as_micros() as u64,
                min_us = self.cfg.min_step_delay.as_micros() as u64,
                "step delay below hardware minimum, clamping"
            );
            self.cfg.min_step_delay
        } else {
            delay
        };
        self.step_delay = applied;
        applied
    }

    /// Gate step and homing operations. Also drives the stage's enable
    /// line when it has one.
    pub fn set_enabled(&mut self, on: bool) -> Result<()> {
        self.stage.set_enable(on).map_err(hw_fault)?;
        self.enabled = on;
        tracing::info!(enabled = on, "motor driver");
        Ok(())
    }

    /// Override the tracked position without moving. An explicit trust
    /// operation for manual recovery: the caller vouches for the carriage
    /// position, so the reference counts as established. The travel
    /// length stays whatever the last homing discovered.
    pub fn set_position(&mut self, position: i32) {
        tracing::warn!(
            old = self.position,
            new = position,
            "tracked position overridden"
        );
        self.position = position;
        self.calibrated = true;
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    /// Travel length in steps discovered by the last successful homing.
    pub fn travel(&self) -> Option<i32> {
        self.travel
    }

    pub fn calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    /// Read-only view of the underlying stage.
    pub fn stage(&self) -> &S {
        &self.stage
    }
}
