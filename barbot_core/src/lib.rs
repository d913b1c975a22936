#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion core for the bar robot (hardware-agnostic).
//!
//! The carriage that shuttles a cup between dispensing stations is driven
//! entirely through the `barbot_traits::Stepper` seam, so everything here
//! runs against the simulated stage as well as real GPIO.
//!
//! ## Architecture
//!
//! - **Positions**: named station → calibrated step offset (`store`)
//! - **Recipes**: validated, ordered dispensing plans (`sequence`)
//! - **Driver**: single-step pulses, homing, speed clamping (`driver`)
//! - **Controller**: moves, dispensing runs, status (`controller`)
//! - **Worker**: one motion operation in flight, the rest rejected
//!   with `Busy` (`worker`)
//!
//! All step counts are integers; positive deltas move toward the right
//! end stop. The tracked position changes one step at a time, so it can
//! never silently diverge from the carriage.

pub mod controller;
pub mod driver;
pub mod error;
pub mod mocks;
pub mod sequence;
pub mod store;
pub mod worker;

pub use controller::{MotionController, MotorStatus, SequenceReport, SharedStatus};
pub use driver::{DriverCfg, MotorDriver, StepOutcome};
pub use error::{MotionError, Result};
pub use sequence::{RawStep, RecipeBook, RecipeDef, Sequence, SequenceStep};
pub use store::{Position, PositionStore};
pub use worker::{Command, MotionWorker, Outcome, Ticket};
