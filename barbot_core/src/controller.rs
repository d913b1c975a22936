//! Orchestration: named-position moves and full dispensing runs.

use crate::driver::{MotorDriver, StepOutcome};
use crate::error::{MotionError, Result};
use crate::sequence::{Sequence, SequenceStep};
use crate::store::PositionStore;
use barbot_traits::{Clock, Direction, Stepper};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

/// Dwell sleeps are sliced so a cancellation request takes effect within
/// one slice instead of waiting out a multi-second pour.
const DWELL_SLICE: Duration = Duration::from_millis(50);

/// Point-in-time view of the motor, safe to read from any thread.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MotorStatus {
    pub position: i32,
    pub calibrated: bool,
    pub enabled: bool,
    pub busy: bool,
    /// Travel length discovered by the last homing, if any.
    pub travel: Option<i32>,
}

/// Lock-free mirror of the motor state, updated after every step so status
/// reads stay responsive while a move or dispensing run is in flight.
#[derive(Debug)]
pub struct SharedStatus {
    position: AtomicI32,
    travel: AtomicI32, // -1 until discovered
    calibrated: AtomicBool,
    enabled: AtomicBool,
    busy: AtomicBool,
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            position: AtomicI32::new(0),
            travel: AtomicI32::new(-1),
            calibrated: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> MotorStatus {
        let travel = self.travel.load(Ordering::Relaxed);
        MotorStatus {
            position: self.position.load(Ordering::Relaxed),
            calibrated: self.calibrated.load(Ordering::Relaxed),
            enabled: self.enabled.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            travel: (travel >= 0).then_some(travel),
        }
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// Claim the motor for one operation; fails when one is in flight.
    pub(crate) fn try_acquire_busy(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Result of a completed dispensing run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SequenceReport {
    pub steps_completed: usize,
    pub final_position: i32,
}

/// Owns the one motor and a read-only view of the position store.
///
/// All mutation of the motor state flows through the driver's single-step
/// operations; the controller only decides how many steps to take and in
/// which direction.
pub struct MotionController<S: Stepper> {
    driver: MotorDriver<S>,
    store: PositionStore,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel: Arc<AtomicBool>,
    shared: Arc<SharedStatus>,
}

impl<S: Stepper> MotionController<S> {
    pub fn new(driver: MotorDriver<S>, store: PositionStore) -> Self {
        let clock = driver.clock();
        let controller = Self {
            driver,
            store,
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(SharedStatus::new()),
        };
        controller.publish();
        controller
    }

    /// Flag observed between steps; setting it stops motion after the
    /// step in flight completes.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn shared_status(&self) -> Arc<SharedStatus> {
        Arc::clone(&self.shared)
    }

    pub fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Swap in a freshly loaded position store.
    pub fn reload_positions(&mut self, store: PositionStore) {
        self.store = store;
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    fn publish(&self) {
        self.shared
            .position
            .store(self.driver.position(), Ordering::Relaxed);
        self.shared
            .travel
            .store(self.driver.travel().unwrap_or(-1), Ordering::Relaxed);
        self.shared
            .calibrated
            .store(self.driver.calibrated(), Ordering::Relaxed);
        self.shared
            .enabled
            .store(self.driver.enabled(), Ordering::Relaxed);
    }

    /// Home the carriage; returns the discovered travel length.
    pub fn calibrate(&mut self) -> Result<i32> {
        let res = self.driver.calibrate(&self.cancel);
        self.publish();
        res
    }

    /// Move to a named (or numbered) position from the store. Returns the
    /// reached absolute position.
    pub fn move_to(&mut self, identifier: &str) -> Result<i32> {
        let target = self.store.resolve(identifier)?.clone();
        if !self.driver.calibrated() {
            return Err(MotionError::Uncalibrated);
        }
        tracing::info!(position = %target.name, offset = target.offset, "move started");
        let reached = self.move_to_offset(target.offset)?;
        tracing::info!(position = %target.name, reached, "move complete");
        Ok(reached)
    }

    /// Issue `|target - current|` single steps toward `target`. Stops
    /// early with `LimitReached` if an end stop interrupts the move; the
    /// caller decides what to do, nothing is retried here.
    pub(crate) fn move_to_offset(&mut self, target: i32) -> Result<i32> {
        while self.driver.position() != target {
            if self.cancel.load(Ordering::Relaxed) {
                let position = self.driver.position();
                self.publish();
                return Err(MotionError::Cancelled { position });
            }
            let dir = if target > self.driver.position() {
                Direction::Right
            } else {
                Direction::Left
            };
            match self.driver.step_once(dir) {
                Ok(StepOutcome::Stepped) => {
                    self.shared
                        .position
                        .store(self.driver.position(), Ordering::Relaxed);
                }
                Ok(StepOutcome::AtLimit) => {
                    let position = self.driver.position();
                    self.publish();
                    tracing::warn!(position, target, "end stop hit mid-move");
                    return Err(MotionError::LimitReached { position, target });
                }
                Err(e) => {
                    self.publish();
                    return Err(e);
                }
            }
        }
        self.publish();
        Ok(self.driver.position())
    }

    /// Step a few steps in one direction without a target position.
    /// Stops quietly at an end stop; returns the resulting position.
    pub fn jog(&mut self, dir: Direction, steps: u32) -> Result<i32> {
        for _ in 0..steps {
            if self.cancel.load(Ordering::Relaxed) {
                let position = self.driver.position();
                self.publish();
                return Err(MotionError::Cancelled { position });
            }
            match self.driver.step_once(dir) {
                Ok(StepOutcome::Stepped) => {
                    self.shared
                        .position
                        .store(self.driver.position(), Ordering::Relaxed);
                }
                Ok(StepOutcome::AtLimit) => {
                    tracing::debug!(%dir, "jog stopped at end stop");
                    break;
                }
                Err(e) => {
                    self.publish();
                    return Err(e);
                }
            }
        }
        self.publish();
        Ok(self.driver.position())
    }

    /// Run a dispensing plan: visit each station in order and dwell for
    /// its pour time. The first failure aborts the run; remaining steps
    /// are never attempted and the error names the failed step and the
    /// true last position.
    pub fn run_sequence(&mut self, sequence: &Sequence) -> Result<SequenceReport> {
        if !self.driver.calibrated() {
            return Err(MotionError::Uncalibrated);
        }
        tracing::info!(
            sequence = sequence.name(),
            steps = sequence.len(),
            "dispensing run started"
        );
        for (i, step) in sequence.steps().iter().enumerate() {
            self.run_step(step).map_err(|e| match e {
                cancelled @ MotionError::Cancelled { .. } => cancelled,
                other => MotionError::SequenceAborted {
                    sequence: sequence.name().to_string(),
                    step: i + 1,
                    position: self.driver.position(),
                    source: Box::new(other),
                },
            })?;
        }
        let report = SequenceReport {
            steps_completed: sequence.len(),
            final_position: self.driver.position(),
        };
        tracing::info!(
            sequence = sequence.name(),
            final_position = report.final_position,
            "dispensing run complete"
        );
        Ok(report)
    }

    fn run_step(&mut self, step: &SequenceStep) -> Result<()> {
        self.move_to_offset(step.position.offset)?;
        if !step.dwell.is_zero() {
            tracing::debug!(
                position = %step.position.name,
                dwell_ms = step.dwell.as_millis() as u64,
                "dwelling"
            );
        }
        self.dwell(step.dwell)
    }

    fn dwell(&mut self, mut remaining: Duration) -> Result<()> {
        while !remaining.is_zero() {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(MotionError::Cancelled {
                    position: self.driver.position(),
                });
            }
            let slice = remaining.min(DWELL_SLICE);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        Ok(())
    }

    pub fn status(&self) -> MotorStatus {
        MotorStatus {
            position: self.driver.position(),
            calibrated: self.driver.calibrated(),
            enabled: self.driver.enabled(),
            busy: self.shared.busy.load(Ordering::Relaxed),
            travel: self.driver.travel(),
        }
    }

    pub fn set_enabled(&mut self, on: bool) -> Result<()> {
        let res = self.driver.set_enabled(on);
        self.publish();
        res
    }

    /// See `MotorDriver::set_speed`; returns the delay actually applied.
    pub fn set_speed(&mut self, delay: Duration) -> Duration {
        self.driver.set_speed(delay)
    }

    /// See `MotorDriver::set_position`.
    pub fn set_position(&mut self, position: i32) {
        self.driver.set_position(position);
        self.publish();
    }

    pub fn current_position(&self) -> i32 {
        self.driver.position()
    }

    /// Read-only view of the underlying driver.
    pub fn driver(&self) -> &MotorDriver<S> {
        &self.driver
    }
}
