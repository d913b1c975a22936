//! Dedicated motion thread.
//!
//! The motor is a single exclusively-owned resource: exactly one motion
//! operation may be in flight. The worker owns the controller on its own
//! thread; admission goes through an atomic busy gate, so a second
//! submission while one executes is rejected with `Busy` instead of
//! interleaving pulses. Status reads never touch the thread.
//!
//! The thread is joined when the worker is dropped; an in-flight operation
//! is cancelled cooperatively first.

use crate::controller::{MotionController, MotorStatus, SequenceReport, SharedStatus};
use crate::error::{MotionError, Result};
use crate::sequence::Sequence;
use barbot_traits::{Direction, Stepper};
use crossbeam_channel as xch;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A motion request for the worker thread.
#[derive(Debug, Clone)]
pub enum Command {
    Calibrate,
    MoveTo(String),
    RunSequence(Sequence),
    Jog { dir: Direction, steps: u32 },
    SetEnabled(bool),
    SetSpeed(Duration),
    SetPosition(i32),
}

/// Successful result of a command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    Calibrated { travel: i32 },
    ReachedPosition { position: i32 },
    SequenceDone(SequenceReport),
    Enabled { enabled: bool },
    SpeedSet { delay_us: u64 },
}

struct Job {
    cmd: Command,
    reply: xch::Sender<Result<Outcome>>,
}

/// Handle to an accepted command; the result arrives when motion finishes.
#[derive(Debug)]
pub struct Ticket {
    rx: xch::Receiver<Result<Outcome>>,
}

impl Ticket {
    /// Block until the operation completes.
    pub fn wait(self) -> Result<Outcome> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(MotionError::Hardware("motion worker went away".into())))
    }

    /// Non-blocking poll; `None` while the operation is still running.
    pub fn try_result(&self) -> Option<Result<Outcome>> {
        self.rx.try_recv().ok()
    }
}

pub struct MotionWorker {
    tx: Option<xch::Sender<Job>>,
    cancel: Arc<AtomicBool>,
    /// Set on drop; a job that was still queued is refused instead of run.
    shutdown: Arc<AtomicBool>,
    shared: Arc<SharedStatus>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl MotionWorker {
    /// Move the controller onto a dedicated thread and start serving
    /// commands.
    pub fn spawn<S: Stepper + Send + 'static>(controller: MotionController<S>) -> Self {
        let cancel = controller.cancel_flag();
        let shared = controller.shared_status();
        let shared_thread = Arc::clone(&shared);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);
        let (tx, rx) = xch::bounded::<Job>(1);

        let join_handle = std::thread::spawn(move || {
            let mut controller = controller;
            for job in rx.iter() {
                let res = if shutdown_thread.load(Ordering::Relaxed) {
                    Err(MotionError::Cancelled {
                        position: controller.current_position(),
                    })
                } else {
                    controller.clear_cancel();
                    execute(&mut controller, job.cmd)
                };
                // Release the gate before replying, so the caller that
                // receives this result can immediately submit again.
                shared_thread.set_busy(false);
                // A gone caller is fine; the motor state is already settled.
                let _ = job.reply.send(res);
            }
            tracing::trace!("motion worker exiting");
        });

        Self {
            tx: Some(tx),
            cancel,
            shutdown,
            shared,
            join_handle: Some(join_handle),
        }
    }

    /// Hand a command to the motion thread. Rejected with `Busy` when an
    /// operation is already in flight.
    pub fn submit(&self, cmd: Command) -> Result<Ticket> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| MotionError::Hardware("motion worker shut down".into()))?;
        if !self.shared.try_acquire_busy() {
            return Err(MotionError::Busy);
        }
        let (reply, rx) = xch::bounded(1);
        match tx.try_send(Job { cmd, reply }) {
            Ok(()) => Ok(Ticket { rx }),
            Err(_) => {
                self.shared.set_busy(false);
                Err(MotionError::Hardware("motion worker went away".into()))
            }
        }
    }

    /// Convenience: submit and block until completion.
    pub fn run(&self, cmd: Command) -> Result<Outcome> {
        self.submit(cmd)?.wait()
    }

    /// Ask the in-flight operation to stop after the current step. Takes
    /// effect at the next step boundary, never mid-pulse.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Lock-free status snapshot; responsive even during motion.
    pub fn status(&self) -> MotorStatus {
        self.shared.snapshot()
    }
}

impl Drop for MotionWorker {
    fn drop(&mut self) {
        // Stop an in-flight operation at its next step boundary, refuse
        // anything still queued, then disconnect the channel so the
        // thread's recv loop ends.
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.store(true, Ordering::Relaxed);
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("motion worker joined"),
                Err(e) => tracing::warn!(?e, "motion worker panicked during shutdown"),
            }
        }
    }
}

fn execute<S: Stepper>(controller: &mut MotionController<S>, cmd: Command) -> Result<Outcome> {
    match cmd {
        Command::Calibrate => controller
            .calibrate()
            .map(|travel| Outcome::Calibrated { travel }),
        Command::MoveTo(identifier) => controller
            .move_to(&identifier)
            .map(|position| Outcome::ReachedPosition { position }),
        Command::RunSequence(sequence) => controller
            .run_sequence(&sequence)
            .map(Outcome::SequenceDone),
        Command::Jog { dir, steps } => controller
            .jog(dir, steps)
            .map(|position| Outcome::ReachedPosition { position }),
        Command::SetEnabled(on) => controller
            .set_enabled(on)
            .map(|()| Outcome::Enabled { enabled: on }),
        Command::SetSpeed(delay) => {
            let applied = controller.set_speed(delay);
            Ok(Outcome::SpeedSet {
                delay_us: applied.as_micros() as u64,
            })
        }
        Command::SetPosition(position) => {
            controller.set_position(position);
            Ok(Outcome::ReachedPosition { position })
        }
    }
}
