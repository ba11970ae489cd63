//! Embassy entry point and control loop.

use defmt::info;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::{DynReceiver, Watch};
use embassy_time::{Duration, Instant, Ticker};
use static_cell::StaticCell;
use vitals_common::config::SNAPSHOT_PUBLISH_PERIOD_MS;
use vitals_common::settings::MemorySettings;
use vitals_common::{MonitorEvent, MonitorTask, Sensors, VitalSigns, VitalsMonitor};
use vitals_pico2::button::ButtonState;
use vitals_pico2::config::{
    CPU_FREQ_HZ,
    HEARTBEAT_PERIOD_MS,
    I2C_FREQUENCY_HZ,
    LOOP_BUDGET_US,
    LOOP_TICK_US,
    PROFILE_LOG_INTERVAL_MS,
    SETTINGS_CAPACITY,
    SNAPSHOT_RECEIVERS,
};
use vitals_pico2::loop_budget::{self, LoopBudget};
use {defmt_rtt as _, panic_probe as _};

use crate::adapters::{AnalogFrontEnd, ContactProbe, Photodetector};
use crate::logging;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => i2c::InterruptHandler<peripherals::I2C0>;
    I2C1_IRQ => i2c::InterruptHandler<peripherals::I2C1>;
});

/// Latest snapshot, written once per vitals update.
static SNAPSHOT: Watch<CriticalSectionRawMutex, VitalSigns, SNAPSHOT_RECEIVERS> = Watch::new();

fn i2c_config() -> i2c::Config {
    let mut config = i2c::Config::default();
    config.frequency = I2C_FREQUENCY_HZ;
    config
}

/// Periodic snapshot reporter. Stands in for the display and uplink,
/// which read the same watch channel.
#[embassy_executor::task]
async fn publish_task(mut receiver: DynReceiver<'static, VitalSigns>) {
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(SNAPSHOT_PUBLISH_PERIOD_MS)));
    loop {
        ticker.next().await;
        let Some(v) = receiver.try_get() else {
            continue;
        };
        info!(
            "VITALS t={} hr={} ({} q{}) spo2={} ({} q{}) temp={}C ({})",
            v.timestamp_ms,
            v.heart_rate,
            v.hr_source.label(),
            v.hr_quality,
            v.spo2,
            v.spo2_source.label(),
            v.spo2_quality,
            v.temperature_c,
            v.temp_source.label()
        );
        if let Some(alert) = v.alert {
            info!("ALERT {} [{}]", alert.label(), alert.kind());
        }
    }
}

fn log_event(event: MonitorEvent) {
    match event {
        MonitorEvent::OpticalUnavailable => log_error!("MAX30102 not found, optical off"),
        MonitorEvent::AnalogCalibrated { baseline: Some(b) } => log_info!("Analog baseline {}", b),
        MonitorEvent::AnalogCalibrated { baseline: None } => log_warn!("Analog calibration failed"),
        MonitorEvent::FingerPlaced => log_info!("Finger placed"),
        MonitorEvent::FingerRemoved => log_info!("Finger removed"),
        MonitorEvent::OpticalLinkLost => log_warn!("MAX30102 stopped answering"),
        MonitorEvent::AnalogContactLost => log_warn!("Analog contact lost"),
        MonitorEvent::AnalogContactRestored => log_info!("Analog contact restored"),
        MonitorEvent::TemperatureEstimated => log_warn!("Temp probe unavailable, estimating"),
        MonitorEvent::TemperatureProbe => log_info!("Temp probe reading"),
        MonitorEvent::AlertChanged { alert: Some(alert) } => log_warn!("Alert: {}", alert.label()),
        MonitorEvent::AlertChanged { alert: None } => log_info!("Alerts cleared"),
        MonitorEvent::ChannelsReset => log_info!("Channels reset"),
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    loop_budget::init();
    info!("DWT cycle counter initialized at {} MHz", CPU_FREQ_HZ / 1_000_000);

    let mut photodetector = Photodetector::new(I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c_config()));
    let mut thermometer = ContactProbe::new(I2c::new_async(p.I2C1, p.PIN_7, p.PIN_6, Irqs, i2c_config()));
    let mut analog = AnalogFrontEnd::new(
        Adc::new_blocking(p.ADC, adc::Config::default()),
        adc::Channel::new_pin(p.PIN_26, Pull::None),
    );

    // Calibration lives in RAM; the resting rate falls back to its default
    // on every boot
    let settings: MemorySettings<SETTINGS_CAPACITY> = MemorySettings::new();

    // The monitor carries every sample window; keep it off the task stack
    static MONITOR: StaticCell<VitalsMonitor> = StaticCell::new();
    let monitor: &'static mut VitalsMonitor = MONITOR.init(VitalsMonitor::new());

    if monitor.begin(&mut photodetector, &mut analog, &settings) {
        log_info!("MAX30102 configured");
    }
    for event in monitor.drain_events() {
        log_event(event);
    }

    spawner.spawn(publish_task(SNAPSHOT.dyn_receiver().unwrap())).unwrap();
    let snapshot_sender = SNAPSHOT.dyn_sender();

    // Buttons are active-low with internal pull-up
    let btn_reset = Input::new(p.PIN_13, Pull::Up);
    let btn_dump = Input::new(p.PIN_14, Pull::Up);
    let mut btn_reset_state = ButtonState::new();
    let mut btn_dump_state = ButtonState::new();

    let mut led = Output::new(p.PIN_25, Level::Low);

    let mut budget = LoopBudget::new(LOOP_BUDGET_US, CPU_FREQ_HZ);
    let mut last_profile_ms = 0u32;
    let mut ticker = Ticker::every(Duration::from_micros(LOOP_TICK_US));

    log_info!("Monitoring started");

    loop {
        let cycles_start = loop_budget::read();
        let now_ms = Instant::now().as_millis() as u32;

        let mut sensors = Sensors {
            photodetector: &mut photodetector,
            adc: &mut analog,
            thermometer: &mut thermometer,
        };
        let ran = monitor.service(&mut sensors, now_ms);
        if ran.contains(&MonitorTask::UpdateVitals) {
            snapshot_sender.send(*monitor.vitals());
        }

        for event in monitor.drain_events() {
            log_event(event);
        }

        if btn_reset_state.just_pressed(btn_reset.is_low(), now_ms) {
            monitor.reset_channels();
        }
        if btn_dump_state.just_pressed(btn_dump.is_low(), now_ms) {
            logging::dump();
        }

        // Blink while the loop is alive
        if (now_ms / HEARTBEAT_PERIOD_MS).is_multiple_of(2) {
            led.set_high();
        } else {
            led.set_low();
        }

        budget.record_cycles(loop_budget::elapsed(cycles_start, loop_budget::read()));
        if now_ms.wrapping_sub(last_profile_ms) >= PROFILE_LOG_INTERVAL_MS {
            let report = budget.take_report();
            info!(
                "PROFILE: iterations={} worst={}us load={}% overruns={}",
                report.iterations,
                report.worst_us,
                report.mean_load_percent,
                report.overruns
            );
            if report.overruns > 0 {
                log_warn!("Loop overran {} times", report.overruns);
            }
            last_profile_ms = now_ms;
        }

        ticker.next().await;
    }
}
