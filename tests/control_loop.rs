// End-to-end runs of the control loop on a deterministic clock.

use std::sync::Arc;

use ctlsys_simulation::component_a::{
    clock::{Clock, ManualClock},
    sensor::PlantConfig,
    signal_model::CalibrationRange,
};
use ctlsys_simulation::component_b::{
    actuator::DutyCycle,
    bang_bang::BangBangController,
    driver::{ControlContext, ControlLaw, ControlLoopDriver},
    pid::{PidController, PidGains, PidState},
    step_response::StepResponseTester,
};
use ctlsys_simulation::utils::{
    config::ControlConfig,
    error::{ActuatorError, ControlError},
    export::{PLOT_END, PLOT_START, write_plot},
    metrics::{Event, EventRecorder},
    mock::MockRig,
};

fn quiet_plant() -> PlantConfig {
    PlantConfig {
        noise_hz: 0.0,
        ..PlantConfig::default()
    }
}

fn simulated_driver() -> (ManualClock, ControlLoopDriver) {
    let clock = ManualClock::new();
    let ctx = ControlContext::simulated(ControlConfig::default(), quiet_plant(), Arc::new(clock.clone()));
    (clock, ControlLoopDriver::new(ctx, Arc::new(EventRecorder::new())).unwrap())
}

#[test]
fn startup_calibration_spans_the_plant() {
    let (clock, mut driver) = simulated_driver();
    driver.initialize().unwrap();

    let report = driver.calibrate().unwrap();
    let range = driver.calibration().unwrap();

    assert!(range.is_monotonic());
    assert!((22..=25).contains(&range.min_freq), "min {}", range.min_freq);
    assert!((400..=420).contains(&range.max_freq), "max {}", range.max_freq);
    assert_eq!(report.sample_interval_ms, 49);
    assert_eq!(clock.now_ms(), 1_500 + 99 * 50);

    for pair in report.samples[1..].windows(2) {
        assert!(pair[0] <= pair[1], "sweep not monotonic: {:?}", pair);
    }
}

#[test]
fn bang_bang_oscillates_between_extremes() {
    let (_clock, mut driver) = simulated_driver();
    driver.set_calibration(CalibrationRange::new(20, 420));

    let mut law = BangBangController::new(250, CalibrationRange::new(20, 420));
    let report = driver.run(&mut law).unwrap();

    assert_eq!(report.samples.len(), 250);
    assert!(report.duties.iter().all(|&d| d == 1 || d == 99));
    assert!(report.duties.contains(&1));
    assert!(report.duties.contains(&99));

    let tail = &report.samples[150..];
    let lo = *tail.iter().min().unwrap();
    let hi = *tail.iter().max().unwrap();
    assert!(lo <= 250 && hi > 250, "tail {}..{}", lo, hi);
}

#[test]
fn pid_with_zero_gains_holds_minimum_duty() {
    let (rig, act, counter) = MockRig::new(|duty| 20 + 4 * duty as u32);
    let ctx = ControlContext::new(
        Box::new(act),
        Box::new(counter),
        Arc::new(ManualClock::new()),
        ControlConfig::default(),
    );
    let mut driver = ControlLoopDriver::new(ctx, Arc::new(EventRecorder::new())).unwrap();

    let range = CalibrationRange::new(24, 416);
    let mut law = PidController::new(300, range, PidState::new(PidGains::default()));
    let report = driver.run(&mut law).unwrap();

    assert!(report.duties.iter().all(|&d| d == 1));
    assert!(rig.history().iter().all(|&d| d == 1));
    assert_eq!(rig.history().len(), 251);
}

#[test]
fn proportional_pid_settles_at_the_expected_equilibrium() {
    let (_clock, mut driver) = simulated_driver();
    let range = CalibrationRange::new(20, 420);
    driver.set_calibration(range);

    // f = 20 + 4 * duty and duty = 220 - f balance at f = 180
    let mut law = PidController::new(220, range, PidState::new(PidGains::new(1, 0, 0)));
    assert_eq!(law.prime_duty(), DutyCycle::MAX);
    let report = driver.run(&mut law).unwrap();

    for &f in &report.samples[200..] {
        assert!((175..=185).contains(&f), "f = {f}");
    }
    assert_eq!(law.state().last_error(), Some(220 - *report.samples.last().unwrap() as i64));
}

#[test]
fn step_lo_to_hi_rises_and_hi_to_lo_falls() {
    let (_clock, mut driver) = simulated_driver();

    let up = driver.run(&mut StepResponseTester::lo_to_hi()).unwrap();
    assert_eq!(up.label, "Step Lo->Hi");
    assert!(up.duties.iter().all(|&d| d == 99));
    for pair in up.samples.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert!(up.samples[249] > up.samples[0] + 300);

    let down = driver.run(&mut StepResponseTester::hi_to_lo()).unwrap();
    for pair in down.samples.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    assert!(down.samples[249] + 300 < down.samples[0]);
    assert_eq!(down.run, up.run + 1);
}

#[test]
fn actuator_failure_mid_run_returns_no_report() {
    let (rig, act, counter) = MockRig::new(|duty| duty as u32);
    rig.fail_after(100);
    let ctx = ControlContext::new(
        Box::new(act),
        Box::new(counter),
        Arc::new(ManualClock::new()),
        ControlConfig::default(),
    );
    let recorder = Arc::new(EventRecorder::new());
    let mut driver = ControlLoopDriver::new(ctx, recorder.clone()).unwrap();

    let mut law = BangBangController::new(50, CalibrationRange::new(1, 99));
    let err = driver.run(&mut law).unwrap_err();
    assert!(matches!(
        err,
        ControlError::ActuatorSet { source: ActuatorError::NotReady, .. }
    ));
    assert!(!recorder.drain().iter().any(|e| matches!(e, Event::RunEnd { .. })));
}

#[test]
fn pid_state_keeps_ticks_before_an_aborted_run() {
    let (rig, act, counter) = MockRig::new(|_| 250);
    // prime plus 10 ticks succeed, the 11th tick's write fails
    rig.fail_after(11);
    let ctx = ControlContext::new(
        Box::new(act),
        Box::new(counter),
        Arc::new(ManualClock::new()),
        ControlConfig::default(),
    );
    let mut driver = ControlLoopDriver::new(ctx, Arc::new(EventRecorder::new())).unwrap();

    // error ~10 sits inside the 260/8 windup band, so every tick integrates
    let mut law = PidController::new(260, CalibrationRange::new(24, 416), PidState::new(PidGains::default()));
    assert!(driver.run(&mut law).is_err());
    assert_eq!(rig.history().len(), 11);

    let state = law.into_state();
    assert!(state.last_error().is_some());
    assert!((90..=130).contains(&state.i_accumulator()), "acc {}", state.i_accumulator());
}

#[test]
fn plot_block_matches_run() {
    let (_clock, mut driver) = simulated_driver();
    driver.calibrate().unwrap();
    let range = driver.calibration().unwrap();
    let report = driver.run(&mut StepResponseTester::lo_to_hi()).unwrap();

    let mut out = Vec::new();
    write_plot(&mut out, &report, range, 3.3).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "");
    assert_eq!(lines[1], "Step Lo->Hi Test Data\t\tAppx. Sample Interval: 1 msec");
    assert_eq!(lines[2], PLOT_START);
    assert_eq!(*lines.last().unwrap(), PLOT_END);

    let rows = &lines[3..lines.len() - 1];
    assert_eq!(rows.len(), 249);
    let first: Vec<&str> = rows[0].split('\t').collect();
    assert_eq!(first[0], "1");
    assert_eq!(first[1], report.samples[1].to_string());
    assert_eq!(first[2].len(), 5);
}

#[test]
fn tracking_follows_the_lamp() {
    let (_clock, mut driver) = simulated_driver();
    driver.set_calibration(CalibrationRange::new(20, 420));

    let mut last = 0;
    for duty in [10u8, 30, 50, 70, 90] {
        let mut reading = driver.track(duty).unwrap();
        for _ in 0..50 {
            reading = driver.track(duty).unwrap();
        }
        assert_eq!(reading.duty, duty);
        assert_eq!(reading.interval_ms, 10);
        let expected = 20 + 4 * duty as u32;
        assert!(reading.freq.abs_diff(expected) <= 1, "duty {duty}: {}", reading.freq);
        assert!(reading.freq > last);
        last = reading.freq;
    }
}
