//! Test doubles for the stepper seam.

use barbot_traits::{Direction, Stepper};
use std::time::Duration;

/// In-memory stage that records every pulse it receives.
///
/// Models a finite track with end stops at both ends; `endless()` builds a
/// track whose end stops never trigger, for exercising the sweep bound.
/// A fault can be injected after a given number of pulses to test the
/// hardware-error path.
pub struct RecordingStepper {
    track_steps: Option<i32>,
    pos: i32,
    dir: Direction,
    enabled: bool,
    pulses: Vec<Direction>,
    direction_changes: usize,
    fail_after: Option<usize>,
}

impl RecordingStepper {
    pub fn new(track_steps: i32, start_pos: i32) -> Self {
        Self {
            track_steps: Some(track_steps.max(1)),
            pos: start_pos.clamp(0, track_steps.max(1)),
            dir: Direction::Right,
            enabled: true,
            pulses: Vec::new(),
            direction_changes: 0,
            fail_after: None,
        }
    }

    /// A stage whose end stops never trigger.
    pub fn endless() -> Self {
        Self {
            track_steps: None,
            pos: 0,
            dir: Direction::Right,
            enabled: true,
            pulses: Vec::new(),
            direction_changes: 0,
            fail_after: None,
        }
    }

    /// Fail `step_pulse` once `n` pulses have been emitted.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Physical carriage position on the simulated track.
    pub fn physical_position(&self) -> i32 {
        self.pos
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.len()
    }

    /// Directions of all emitted pulses, in order.
    pub fn pulses(&self) -> &[Direction] {
        &self.pulses
    }

    pub fn direction_changes(&self) -> usize {
        self.direction_changes
    }
}

impl Stepper for RecordingStepper {
    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.dir = dir;
        self.direction_changes += 1;
        Ok(())
    }

    fn step_pulse(
        &mut self,
        _pulse_width: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(n) = self.fail_after
            && self.pulses.len() >= n
        {
            return Err(Box::new(std::io::Error::other("injected gpio fault")));
        }
        self.pulses.push(self.dir);
        if !self.enabled {
            return Ok(());
        }
        let next = self.pos + self.dir.sign();
        self.pos = match self.track_steps {
            Some(track) => next.clamp(0, track),
            None => next,
        };
        Ok(())
    }

    fn end_stop(
        &mut self,
        side: Direction,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let Some(track) = self.track_steps else {
            return Ok(false);
        };
        Ok(match side {
            Direction::Left => self.pos <= 0,
            Direction::Right => self.pos >= track,
        })
    }

    fn set_enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.enabled = on;
        Ok(())
    }
}
