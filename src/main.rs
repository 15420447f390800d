//! # Lamp Control System Simulation Entry Point
//!
//! Runs the photosensor/lamp rig against a 1 ms ticking clock and lets the
//! operator pick tests from a console menu.
//!
//! ## Startup
//! - Configuration from `CTLSYS_*` environment variables (see `ControlConfig`).
//! - Counter self-test and PWM readiness check; failure is fatal.
//! - Characterization sweep, which sets the calibration range for every later test.
//!
//! ## Tests
//! - **Bang-Bang / PID:** closed loop around an operator setpoint (clamped into the range).
//! - **Step Lo->Hi / Hi->Lo:** open-loop step from one extreme to the other.
//! - **Characterization:** re-run the 1..99 % sweep and recalibrate.
//! - **Tracking:** set a duty cycle and read the sensor back once.
//!
//! ## Outputs
//! - Plot block on stdout (`===STARTPLOT===` / `===ENDPLOT===`).
//! - `data/run_<n>.csv` and `data/run_<n>.svg` per run.
//! - `data/run_summary.csv`: one row per run, appended.
//! - `data/events.csv`: per-tick event trace from the background exporter.

use std::{
    fs::create_dir_all,
    io::{StdinLock, Stdout, stdin, stdout},
    process,
    sync::Arc,
    time::Duration,
};

use log::{error, info, warn};

use ctlsys_simulation::{
    component_a::{clock::TickingClock, sensor::PlantConfig, signal_model::volts_to_string},
    component_b::{
        bang_bang::BangBangController,
        driver::{ControlContext, ControlLaw, ControlLoopDriver, RunReport},
        pid::{PidController, PidGains, PidState},
        step_response::StepResponseTester,
    },
    utils::{
        config::ControlConfig,
        error::{ControlError, Result},
        export::{append_run_summary, export_run_csv, write_plot},
        menu::{ConsoleIo, GainEditor, TestKind, UserIo, prompt_gains, prompt_number},
        metrics::EventRecorder,
        plot::render_run_svg,
    },
};

type Console = ConsoleIo<StdinLock<'static>, Stdout>;

/// Operator session state that outlives individual runs.
struct Session {
    driver: ControlLoopDriver,
    pid: PidState,
    editor: GainEditor,
    config: ControlConfig,
}

fn main() {
    env_logger::init();
    info!("=== CTLSYS SIMULATION START ===");

    let config = match ControlConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("[Main] {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = run(config) {
        error!("[Main] fatal: {}", e);
        process::exit(1);
    }
    info!("=== CTLSYS SIMULATION FINISHED ===");
}

fn run(config: ControlConfig) -> Result<()> {
    create_dir_all(&config.output_dir)?;

    let clock = Arc::new(TickingClock::start(Duration::from_millis(1))?);
    let recorder = Arc::new(EventRecorder::new());
    let exporter = recorder.start_exporter(config.output_dir.join("events.csv"));

    let ctx = ControlContext::simulated(config.clone(), PlantConfig::default(), clock.clone());
    let mut driver = ControlLoopDriver::new(ctx, recorder.clone())?;
    driver.initialize()?;

    let mut console = ConsoleIo::new(stdin().lock(), stdout());
    console.show("Characterizing sensor, please wait...\n");
    let report = driver.calibrate()?;
    publish(&mut console, &driver, &config, &report);

    let gains = PidGains::default();
    let mut session = Session {
        driver,
        pid: PidState::new(gains).with_integral_limits(config.i_min, config.i_max),
        editor: GainEditor::new(gains),
        config,
    };

    menu_loop(&mut console, &mut session);

    recorder.stop_exporter();
    if exporter.join().is_err() {
        warn!("[Main] event exporter panicked");
    }
    if recorder.dropped() > 0 {
        warn!("[Main] {} events dropped (queue full)", recorder.dropped());
    }
    info!("[Main] clock reported {} late ticks", clock.late_ticks());
    clock.stop();
    Ok(())
}

fn menu_loop(console: &mut Console, session: &mut Session) {
    loop {
        let choice = prompt_menu(console, session);
        let kind = match choice.as_str() {
            "1" => TestKind::BangBang,
            "2" => TestKind::Pid,
            "3" => TestKind::StepLoHi,
            "4" => TestKind::StepHiLo,
            "5" => TestKind::Characterize,
            "6" => TestKind::Track,
            "7" => {
                match prompt_gains(console, &mut session.editor) {
                    Some(gains) => {
                        session.pid.set_gains(gains);
                        console.show(&format!("Gains set: P={} I={} D={}\n", gains.p, gains.i, gains.d));
                    }
                    None => console.show("Gains unchanged.\n"),
                }
                continue;
            }
            "8" => {
                session.pid.reset();
                console.show("PID integrator and history cleared.\n");
                continue;
            }
            "9" => {
                let sw = prompt_number(console, "Switch bits sw[1:0] (0-3)", 0);
                TestKind::from_switches(sw.clamp(0, 3) as u8)
            }
            "0" | "q" => {
                console.show("Exiting. Goodbye!\n");
                return;
            }
            "" => continue,
            other => {
                console.show(&format!("Unrecognized option '{}', please try again.\n", other));
                continue;
            }
        };

        if let Err(e) = run_test(console, session, kind) {
            error!("[Main] {} aborted: {}", kind.label(), e);
            console.show(&format!("\n{} test aborted: {}\n", kind.label(), e));
        }
    }
}

fn prompt_menu(console: &mut Console, session: &Session) -> String {
    let gains = session.pid.gains();
    let range = match session.driver.calibration() {
        Ok(r) => format!("{}..{} Hz", r.min_freq, r.max_freq),
        Err(_) => "not calibrated".to_string(),
    };
    console.show("\n┌─────────────────────────────────────────────┐\n");
    console.show("│     SELECT TEST                             │\n");
    console.show("├─────────────────────────────────────────────┤\n");
    console.show("│  1) Bang-Bang                               │\n");
    console.show("│  2) PID                                     │\n");
    console.show("│  3) Step Lo->Hi                             │\n");
    console.show("│  4) Step Hi->Lo                             │\n");
    console.show("│  5) Characterize                            │\n");
    console.show("│  6) Track duty cycle                        │\n");
    console.show("│  7) Edit PID gains                          │\n");
    console.show("│  8) Reset PID state                         │\n");
    console.show("│  9) Select by switches                      │\n");
    console.show("│  0) Exit                                    │\n");
    console.show("└─────────────────────────────────────────────┘\n");
    console.show(&format!("Range {} | P={} I={} D={}\n", range, gains.p, gains.i, gains.d));
    console.show("Select: ");
    console.read_line().unwrap_or_else(|| "0".to_string())
}

fn run_test(console: &mut Console, session: &mut Session, kind: TestKind) -> Result<()> {
    match kind {
        TestKind::Characterize => {
            let report = session.driver.calibrate()?;
            publish(console, &session.driver, &session.config, &report);
        }
        TestKind::Track => track(console, session)?,
        TestKind::BangBang => {
            let range = session.driver.calibration()?;
            let setpoint = prompt_setpoint(console, session)?;
            let mut law = BangBangController::new(setpoint, range);
            run_and_publish(console, session, &mut law)?;
        }
        TestKind::Pid => {
            let range = session.driver.calibration()?;
            let setpoint = prompt_setpoint(console, session)?;
            let mut law = PidController::new(setpoint, range, session.pid.clone());
            // ticks completed before an abort still count
            let outcome = run_and_publish(console, session, &mut law);
            session.pid = law.into_state();
            outcome?;
        }
        TestKind::StepLoHi => run_and_publish(console, session, &mut StepResponseTester::lo_to_hi())?,
        TestKind::StepHiLo => run_and_publish(console, session, &mut StepResponseTester::hi_to_lo())?,
    }
    Ok(())
}

fn prompt_setpoint(console: &mut Console, session: &Session) -> Result<i32> {
    let range = session.driver.calibration()?;
    let raw = prompt_number(
        console,
        &format!("Setpoint in Hz ({}..{})", range.min_freq, range.max_freq),
        range.midpoint(),
    );
    let setpoint = range.clamp_setpoint(raw);
    if setpoint != raw {
        console.show(&format!("Setpoint clamped to {} Hz\n", setpoint));
    }
    Ok(setpoint)
}

fn run_and_publish(console: &mut Console, session: &mut Session, law: &mut dyn ControlLaw) -> Result<()> {
    console.show(&format!("Running {} test...\n", law.label()));
    let report = session.driver.run(law)?;
    publish(console, &session.driver, &session.config, &report);
    Ok(())
}

fn track(console: &mut Console, session: &mut Session) -> Result<()> {
    loop {
        console.show("Duty cycle % (1-99, blank to stop): ");
        let Some(duty) = console.read_line().and_then(|s| s.parse::<u8>().ok()) else {
            return Ok(());
        };
        let r = session.driver.track(duty)?;
        console.show(&format!(
            "DC {:>2}% ({}V)  Freq {} Hz ({}V)  ~{} ms\n",
            r.duty,
            volts_to_string(r.duty_volts),
            r.freq,
            volts_to_string(r.sensor_volts),
            r.interval_ms
        ));
    }
}

/// Plot block to the console, then file exports. Export failures are logged only.
fn publish(console: &mut Console, driver: &ControlLoopDriver, config: &ControlConfig, report: &RunReport) {
    let range = match driver.calibration() {
        Ok(range) => range,
        Err(e) => {
            error!("[Main] cannot report run {}: {}", report.run, e);
            return;
        }
    };
    let vref = config.reference_voltage;

    if let Err(e) = write_plot(console.output_mut(), report, range, vref) {
        error!("[Main] plot output failed: {}", e);
        if matches!(e, ControlError::DegenerateCalibration { .. }) {
            console.show("Calibration is flat; re-run the characterization.\n");
            return;
        }
    }

    let dir = &config.output_dir;
    let base = format!("run_{}", report.run);
    if let Err(e) = export_run_csv(&dir.join(format!("{base}.csv")), report, range, vref) {
        error!("[Main] CSV export failed: {}", e);
    }
    if let Err(e) = render_run_svg(&dir.join(format!("{base}.svg")), report, range, vref) {
        error!("[Main] SVG export failed: {}", e);
    }
    if let Err(e) = append_run_summary(&dir.join("run_summary.csv"), report) {
        error!("[Main] summary export failed: {}", e);
    }
}
