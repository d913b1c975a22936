//! Serialization, cancellation, and shutdown of the motion thread.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use barbot_core::mocks::RecordingStepper;
use barbot_core::{
    Command, DriverCfg, MotionController, MotionError, MotionWorker, MotorDriver, Outcome,
    Position, PositionStore,
};
use barbot_traits::{Direction, ManualClock, MonotonicClock, Stepper};

fn store_with(name: &str, offset: i32) -> PositionStore {
    PositionStore::from_positions(vec![Position {
        id: None,
        name: name.to_string(),
        offset,
        label: None,
    }])
    .expect("store")
}

/// Worker over a real clock, with a slow-enough step delay that a long
/// move stays observable from the test thread.
fn slow_worker(track: i32, store: PositionStore) -> MotionWorker {
    let cfg = DriverCfg {
        step_delay: Duration::from_millis(1),
        min_step_delay: Duration::from_micros(100),
        pulse_width: Duration::ZERO,
        max_travel_steps: 100_000,
    };
    let driver = MotorDriver::new(
        RecordingStepper::new(track, 0),
        cfg,
        Arc::new(MonotonicClock::new()),
    );
    MotionWorker::spawn(MotionController::new(driver, store))
}

#[test]
fn commands_round_trip_through_the_worker() {
    let cfg = DriverCfg {
        step_delay: Duration::from_micros(500),
        min_step_delay: Duration::from_micros(100),
        pulse_width: Duration::ZERO,
        max_travel_steps: 10_000,
    };
    let driver = MotorDriver::new(
        RecordingStepper::new(120, 30),
        cfg,
        Arc::new(ManualClock::new()),
    );
    let worker = MotionWorker::spawn(MotionController::new(driver, store_with("slot", 75)));

    match worker.run(Command::Calibrate).expect("calibrate") {
        Outcome::Calibrated { travel } => assert_eq!(travel, 120),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match worker.run(Command::MoveTo("slot".into())).expect("move") {
        Outcome::ReachedPosition { position } => assert_eq!(position, 75),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match worker
        .run(Command::Jog {
            dir: Direction::Left,
            steps: 5,
        })
        .expect("jog")
    {
        Outcome::ReachedPosition { position } => assert_eq!(position, 70),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let st = worker.status();
    assert_eq!(st.position, 70);
    assert!(st.calibrated);
    assert_eq!(st.travel, Some(120));
    assert!(!st.busy);
}

#[test]
fn second_submission_during_motion_is_rejected_busy() {
    let worker = slow_worker(6_000, store_with("far", 5_000));
    worker.run(Command::SetPosition(0)).expect("trust zero");

    let ticket = worker
        .submit(Command::MoveTo("far".into()))
        .expect("accepted");
    // Give the worker a moment to pick the job up and start stepping.
    std::thread::sleep(Duration::from_millis(30));

    let st = worker.status();
    assert!(st.busy, "expected motion in flight");
    assert!(st.position > 0);

    match worker.submit(Command::Calibrate) {
        Err(MotionError::Busy) => {}
        other => panic!("expected Busy, got {other:?}"),
    }

    worker.cancel();
    match ticket.wait() {
        Err(MotionError::Cancelled { position }) => {
            assert!(position > 0 && position < 5_000);
            assert_eq!(worker.status().position, position);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(!worker.status().busy);

    // The worker is idle again and accepts new work.
    match worker.run(Command::SetEnabled(false)).expect("enable cmd") {
        Outcome::Enabled { enabled } => assert!(!enabled),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn ticket_can_be_polled_without_blocking() {
    let worker = slow_worker(2_000, store_with("far", 1_000));
    worker.run(Command::SetPosition(0)).expect("trust zero");

    let ticket = worker
        .submit(Command::MoveTo("far".into()))
        .expect("accepted");
    assert!(ticket.try_result().is_none(), "move should still be running");

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(res) = ticket.try_result() {
            match res.expect("move ok") {
                Outcome::ReachedPosition { position } => assert_eq!(position, 1_000),
                other => panic!("unexpected outcome: {other:?}"),
            }
            break;
        }
        assert!(Instant::now() < deadline, "move never finished");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn drop_cancels_in_flight_motion_and_joins() {
    let worker = slow_worker(50_000, store_with("far", 40_000));
    worker.run(Command::SetPosition(0)).expect("trust zero");
    let _ticket = worker
        .submit(Command::MoveTo("far".into()))
        .expect("accepted");
    std::thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    drop(worker);
    // A 40k-step move at 1ms per step would take ~40s; drop must come
    // back as soon as the current step completes.
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Stage whose end-stop reads block until a gate opens, pinning the
/// worker inside a homing sweep for as long as the test wants.
struct GatedStepper {
    gate: mpsc::Receiver<()>,
    open: bool,
}

impl Stepper for GatedStepper {
    fn set_direction(
        &mut self,
        _dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
    fn step_pulse(
        &mut self,
        _pulse_width: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
    fn end_stop(
        &mut self,
        _side: Direction,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if !self.open {
            let _ = self.gate.recv();
            self.open = true;
        }
        Ok(true)
    }
    fn set_enable(&mut self, _on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

#[test]
fn busy_clears_once_the_blocked_operation_finishes() {
    let (tx, rx) = mpsc::channel();
    let driver = MotorDriver::new(
        GatedStepper {
            gate: rx,
            open: false,
        },
        DriverCfg::default(),
        Arc::new(ManualClock::new()),
    );
    let worker = MotionWorker::spawn(MotionController::new(driver, PositionStore::empty()));

    let ticket = worker.submit(Command::Calibrate).expect("accepted");
    std::thread::sleep(Duration::from_millis(20));
    assert!(matches!(
        worker.submit(Command::Calibrate),
        Err(MotionError::Busy)
    ));

    tx.send(()).expect("open gate");
    match ticket.wait().expect("calibrate") {
        // Every end stop reads triggered once the gate opens, so the
        // discovered travel is zero.
        Outcome::Calibrated { travel } => assert_eq!(travel, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(worker.submit(Command::Calibrate).is_ok());
}
