//! Vitals Monitor Simulator for Desktop.
//!
//! Drives the `vitals-common` core with synthetic PPG signals and a fake
//! millisecond clock through scripted scenarios, printing every monitor
//! event and one snapshot per vitals update.
//!
//! ```text
//! simulator                 # run every scenario
//! simulator finger-off      # run one scenario
//! simulator --list          # list scenarios
//! simulator --realtime resting
//! ```

// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod profiling;
mod rig;
mod scenario;
mod timing;

use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use vitals_common::settings::MemorySettings;
use vitals_common::{MonitorEvent, MonitorTask, VitalSigns, VitalsMonitor};

use crate::profiling::ServiceProfile;
use crate::rig::SimRig;
use crate::scenario::{Change, SCENARIOS, Scenario};
use crate::timing::{REALTIME_STEP, STEP_MS};

fn seconds(ms: u32) -> f32 { ms as f32 / 1_000.0 }

fn print_snapshot(v: &VitalSigns) {
    let alert = v.alert.map_or("-", |a| a.label());
    println!(
        "[{:>7.3}s] HR {:>3} bpm ({:<7} q{:>2})  SpO2 {:>3}% ({:<7} q{:>2})  Temp {:>4.1}C ({})  {}",
        seconds(v.timestamp_ms),
        v.heart_rate,
        v.hr_source.label(),
        v.hr_quality,
        v.spo2,
        v.spo2_source.label(),
        v.spo2_quality,
        v.temperature_c,
        v.temp_source.label(),
        alert
    );
}

fn describe(event: MonitorEvent) -> String {
    match event {
        MonitorEvent::OpticalUnavailable => "photodetector not found, optical channel disabled".into(),
        MonitorEvent::AnalogCalibrated { baseline: Some(b) } => format!("analog baseline calibrated at {b}"),
        MonitorEvent::AnalogCalibrated { baseline: None } => "analog calibration failed, using default".into(),
        MonitorEvent::FingerPlaced => "finger placed".into(),
        MonitorEvent::FingerRemoved => "finger removed".into(),
        MonitorEvent::OpticalLinkLost => "photodetector stopped answering".into(),
        MonitorEvent::AnalogContactLost => "analog contact lost".into(),
        MonitorEvent::AnalogContactRestored => "analog contact restored".into(),
        MonitorEvent::TemperatureEstimated => "temperature probe unavailable, estimating".into(),
        MonitorEvent::TemperatureProbe => "temperature from probe".into(),
        MonitorEvent::AlertChanged { alert: Some(a) } => format!("alert {} [{:?}]", a.label(), a.severity()),
        MonitorEvent::AlertChanged { alert: None } => "alerts cleared".into(),
        MonitorEvent::ChannelsReset => "channels reset by operator".into(),
    }
}

fn apply(
    change: Change,
    rig: &mut SimRig,
    monitor: &mut VitalsMonitor,
) {
    match change {
        Change::FingerOn => rig.set_finger(true),
        Change::FingerOff => rig.set_finger(false),
        Change::HeartPeriod(period_ms) => rig.set_period(period_ms),
        Change::AnalogAmplitude(amplitude) => rig.adc.wave.set_amplitude(amplitude),
        Change::Probe(celsius) => rig.probe.celsius = celsius,
        Change::OpticalStall(stalled) => rig.photodetector.stalled = stalled,
        Change::OperatorReset => monitor.reset_channels(),
    }
}

fn run(
    scenario: &Scenario,
    realtime: bool,
) {
    println!("=== {}: {} ===", scenario.name, scenario.description);

    let mut rig = SimRig::new(scenario.period_ms, scenario.photodetector_present, scenario.probe_celsius);
    let settings: MemorySettings<4> = MemorySettings::new();
    let mut monitor = VitalsMonitor::new();
    let mut profile = ServiceProfile::new();

    rig.advance_to(0);
    monitor.begin(&mut rig.photodetector, &mut rig.adc, &settings);

    let mut steps = scenario.steps.iter().peekable();
    let mut now_ms = 0u32;
    while now_ms < scenario.duration_ms {
        while let Some(step) = steps.next_if(|s| s.at_ms <= now_ms) {
            println!("[{:>7.3}s] >> {:?}", seconds(now_ms), step.change);
            apply(step.change, &mut rig, &mut monitor);
        }

        rig.advance_to(now_ms);
        let started = Instant::now();
        let ran = monitor.service(&mut rig.sensors(), now_ms);
        profile.record(&ran, started.elapsed());

        for event in monitor.drain_events() {
            println!("[{:>7.3}s] ** {}", seconds(now_ms), describe(event));
        }
        if ran.contains(&MonitorTask::UpdateVitals) {
            print_snapshot(monitor.vitals());
        }

        if realtime {
            thread::sleep(REALTIME_STEP);
        }
        now_ms += STEP_MS;
    }

    println!(
        "  probe conversions: {}  resting HR: {:.0} bpm",
        rig.probe.conversions,
        monitor.temperature().resting_hr()
    );
    profile.print();
    println!();
}

fn main() -> ExitCode {
    let mut realtime = false;
    let mut selected: Vec<String> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--realtime" => realtime = true,
            "--list" => {
                for s in SCENARIOS {
                    println!("{:<18} {}", s.name, s.description);
                }
                return ExitCode::SUCCESS;
            }
            _ => selected.push(arg),
        }
    }

    if selected.is_empty() {
        for scenario in SCENARIOS {
            run(scenario, realtime);
        }
        return ExitCode::SUCCESS;
    }

    for name in &selected {
        let Some(scenario) = scenario::find(name) else {
            eprintln!("unknown scenario '{name}' (try --list)");
            return ExitCode::FAILURE;
        };
        run(scenario, realtime);
    }
    ExitCode::SUCCESS
}
