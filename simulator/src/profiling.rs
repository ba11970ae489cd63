//! Host-side cost of the processing core.
//!
//! Tracks wall-clock time spent inside `VitalsMonitor::service` per task
//! mix so a change to the DSP can be checked against the firmware's 2 ms
//! loop budget before it is flashed.

use std::time::Duration;

use vitals_common::MonitorTask;

#[derive(Clone, Copy, Debug, Default)]
struct Stat {
    calls: u64,
    total_ns: u128,
    max_ns: u128,
}

impl Stat {
    fn record(
        &mut self,
        elapsed: Duration,
    ) {
        let ns = elapsed.as_nanos();
        self.calls += 1;
        self.total_ns += ns;
        self.max_ns = self.max_ns.max(ns);
    }

    fn mean_us(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total_ns as f64 / self.calls as f64 / 1_000.0
    }

    fn max_us(&self) -> f64 { self.max_ns as f64 / 1_000.0 }
}

/// Service-call timing split by the heaviest task that ran.
#[derive(Default)]
pub struct ServiceProfile {
    analog_only: Stat,
    optical: Stat,
    vitals: Stat,
}

impl ServiceProfile {
    pub fn new() -> Self { Self::default() }

    pub fn record(
        &mut self,
        ran: &[MonitorTask],
        elapsed: Duration,
    ) {
        let stat = if ran.contains(&MonitorTask::UpdateVitals) {
            &mut self.vitals
        } else if ran.contains(&MonitorTask::PollOptical) {
            &mut self.optical
        } else if ran.is_empty() {
            return;
        } else {
            &mut self.analog_only
        };
        stat.record(elapsed);
    }

    pub fn calls(&self) -> u64 { self.analog_only.calls + self.optical.calls + self.vitals.calls }

    pub fn print(&self) {
        println!("  service cost (host):");
        for (label, stat) in [
            ("analog only", &self.analog_only),
            ("+ optical poll", &self.optical),
            ("+ vitals update", &self.vitals),
        ] {
            println!(
                "    {label:<16} {:>8} calls  mean {:>7.2} us  max {:>8.2} us",
                stat.calls,
                stat.mean_us(),
                stat.max_us()
            );
        }
    }
}
