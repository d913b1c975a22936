//! Stepper stage backends: an in-memory simulation (always available) and
//! the real rppal-driven stage behind the `hardware` feature.

pub mod devices;
pub mod error;

use barbot_traits::{Direction, Stepper};
use std::time::Duration;

/// Simulated carriage on a finite track.
///
/// The carriage moves one step per pulse and stops dead against the end
/// stops, like the physical stage does: pulsing into a triggered end stop
/// does not move it further.
pub struct SimulatedStepper {
    track_steps: i32,
    pos: i32,
    dir: Direction,
    enabled: bool,
}

impl SimulatedStepper {
    pub fn new(track_steps: i32, start_pos: i32) -> Self {
        Self {
            track_steps: track_steps.max(1),
            pos: start_pos.clamp(0, track_steps.max(1)),
            dir: Direction::Right,
            enabled: true,
        }
    }

    /// Physical carriage position, independent of any tracked state.
    pub fn physical_position(&self) -> i32 {
        self.pos
    }

    pub fn track_steps(&self) -> i32 {
        self.track_steps
    }
}

impl Stepper for SimulatedStepper {
    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.dir = dir;
        Ok(())
    }

    fn step_pulse(
        &mut self,
        _pulse_width: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.enabled {
            // De-energized coils: pulses do nothing.
            return Ok(());
        }
        let next = self.pos + self.dir.sign();
        self.pos = next.clamp(0, self.track_steps);
        Ok(())
    }

    fn end_stop(
        &mut self,
        side: Direction,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match side {
            Direction::Left => self.pos <= 0,
            Direction::Right => self.pos >= self.track_steps,
        })
    }

    fn set_enable(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.enabled = on;
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub use hw::HardwareStepper;

#[cfg(feature = "hardware")]
mod hw {
    use super::*;
    use crate::error::HwError;
    use barbot_config::Pins;
    use rppal::gpio::{Gpio, InputPin, OutputPin};

    /// Real step/dir stage on Raspberry Pi GPIO.
    ///
    /// End-stop switches are wired to ground with the internal pull-up, so
    /// a triggered switch reads low. The enable line (when present) is
    /// active-low, the usual convention for step-stick drivers.
    pub struct HardwareStepper {
        step: OutputPin,
        dir: OutputPin,
        enable: Option<OutputPin>,
        left: InputPin,
        right: InputPin,
    }

    impl HardwareStepper {
        pub fn new(pins: &Pins) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let get = |n: u8| gpio.get(n).map_err(|e| HwError::Gpio(format!("pin {n}: {e}")));

            let mut step = get(pins.step)?.into_output();
            step.set_low();
            let dir = get(pins.dir)?.into_output();
            let enable = match pins.enable {
                Some(n) => {
                    let mut en = get(n)?.into_output();
                    en.set_low(); // enabled at startup
                    Some(en)
                }
                None => None,
            };
            let left = get(pins.end_stop_left)?.into_input_pullup();
            let right = get(pins.end_stop_right)?.into_input_pullup();
            tracing::debug!(
                step = pins.step,
                dir = pins.dir,
                "stepper stage pins claimed"
            );
            Ok(Self {
                step,
                dir,
                enable,
                left,
                right,
            })
        }
    }

    impl Stepper for HardwareStepper {
        fn set_direction(
            &mut self,
            dir: Direction,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            match dir {
                Direction::Right => self.dir.set_high(),
                Direction::Left => self.dir.set_low(),
            }
            Ok(())
        }

        fn step_pulse(
            &mut self,
            pulse_width: Duration,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.step.set_high();
            std::thread::sleep(pulse_width);
            self.step.set_low();
            Ok(())
        }

        fn end_stop(
            &mut self,
            side: Direction,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            // Pull-up wiring: low means the switch is pressed.
            Ok(match side {
                Direction::Left => self.left.is_low(),
                Direction::Right => self.right.is_low(),
            })
        }

        fn set_enable(
            &mut self,
            on: bool,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if let Some(en) = self.enable.as_mut() {
                if on {
                    en.set_low();
                } else {
                    en.set_high();
                }
            }
            Ok(())
        }
    }
}
