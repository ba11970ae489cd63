//! Scripted runs: a starting condition and timed changes to the patient
//! and the hardware.

/// One scripted change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Change {
    FingerOn,
    FingerOff,
    /// New beat-to-beat interval for both channels.
    HeartPeriod(u32),
    /// Analog pulse amplitude (0 = no skin contact).
    AnalogAmplitude(f32),
    /// Probe reading; `None` disconnects it.
    Probe(Option<f32>),
    /// Photodetector FIFO reads start or stop timing out.
    OpticalStall(bool),
    /// Operator presses the reset button.
    OperatorReset,
}

#[derive(Clone, Copy, Debug)]
pub struct Step {
    pub at_ms: u32,
    pub change: Change,
}

const fn at(
    at_ms: u32,
    change: Change,
) -> Step {
    Step { at_ms, change }
}

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub duration_ms: u32,
    pub period_ms: u32,
    pub photodetector_present: bool,
    pub probe_celsius: Option<f32>,
    /// Sorted by `at_ms`.
    pub steps: &'static [Step],
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "resting",
        description: "Both channels agree at 72 bpm with a working probe",
        duration_ms: 30_000,
        period_ms: 833,
        photodetector_present: true,
        probe_celsius: Some(36.8),
        steps: &[],
    },
    Scenario {
        name: "finger-off",
        description: "Finger lifted for 15 s; analog channel carries heart rate",
        duration_ms: 50_000,
        period_ms: 800,
        photodetector_present: true,
        probe_celsius: Some(36.7),
        steps: &[at(20_000, Change::FingerOff), at(35_000, Change::FingerOn)],
    },
    Scenario {
        name: "probe-loss",
        description: "Contact probe disconnects, temperature falls back to the estimate",
        duration_ms: 60_000,
        period_ms: 750,
        photodetector_present: true,
        probe_celsius: Some(37.1),
        steps: &[at(15_000, Change::Probe(None)), at(45_000, Change::Probe(Some(37.0)))],
    },
    Scenario {
        name: "exercise",
        description: "Heart rate climbs from 70 to 130 bpm",
        duration_ms: 70_000,
        period_ms: 857,
        photodetector_present: true,
        probe_celsius: Some(37.2),
        steps: &[
            at(15_000, Change::HeartPeriod(750)),
            at(25_000, Change::HeartPeriod(667)),
            at(35_000, Change::HeartPeriod(600)),
            at(45_000, Change::HeartPeriod(500)),
            at(55_000, Change::HeartPeriod(462)),
        ],
    },
    Scenario {
        name: "contact-loss",
        description: "Both channels lose contact; readings hold, then drop to none",
        duration_ms: 50_000,
        period_ms: 800,
        photodetector_present: true,
        probe_celsius: Some(36.9),
        steps: &[
            at(15_000, Change::FingerOff),
            at(15_000, Change::AnalogAmplitude(0.0)),
            at(40_000, Change::FingerOn),
            at(40_000, Change::AnalogAmplitude(800.0)),
        ],
    },
    Scenario {
        name: "no-photodetector",
        description: "Photodetector missing at boot; analog channel only",
        duration_ms: 30_000,
        period_ms: 800,
        photodetector_present: false,
        probe_celsius: None,
        steps: &[],
    },
    Scenario {
        name: "bus-stall",
        description: "Photodetector reads time out for 5 s, then operator resets",
        duration_ms: 40_000,
        period_ms: 800,
        photodetector_present: true,
        probe_celsius: Some(36.6),
        steps: &[
            at(15_000, Change::OpticalStall(true)),
            at(20_000, Change::OpticalStall(false)),
            at(25_000, Change::OperatorReset),
        ],
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> { SCENARIOS.iter().find(|s| s.name == name) }
