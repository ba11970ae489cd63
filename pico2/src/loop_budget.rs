//! Control-loop timing against the analog sampling budget.
//!
//! The analog channel needs a sample every 2 ms, so one pass of the main
//! loop (scheduler, bus transactions, event draining) must fit in that
//! window. Work is measured with the Cortex-M33 DWT cycle counter and
//! folded into a [`LoopBudget`] that tracks the worst case and how often
//! the budget was exceeded.
//!
//! CYCCNT is 32 bits and wraps every ~28.6 s at 150 MHz. A single loop
//! iteration is far shorter, so `wrapping_sub` is enough.

/// Anything above ~1 s of cycles at 150 MHz is a bad measurement.
const MAX_SANE_CYCLES: u32 = 150_000_000;

/// Enable the DWT cycle counter. Idempotent.
pub fn init() {
    // DEMCR.TRCENA must be set before DWT.CTRL.CYCCNTENA
    #[cfg(target_arch = "arm")]
    unsafe {
        use core::ptr::{read_volatile, write_volatile};

        const DEMCR: *mut u32 = 0xE000_EDFC as *mut u32;
        write_volatile(DEMCR, read_volatile(DEMCR) | (1 << 24));

        const DWT_CTRL: *mut u32 = 0xE000_1000 as *mut u32;
        write_volatile(DWT_CTRL, read_volatile(DWT_CTRL) | 1);
    }
}

/// Current cycle count (wraps).
#[inline]
pub fn read() -> u32 {
    #[cfg(target_arch = "arm")]
    unsafe {
        const DWT_CYCCNT: *const u32 = 0xE000_1004 as *const u32;
        core::ptr::read_volatile(DWT_CYCCNT)
    }
    #[cfg(not(target_arch = "arm"))]
    {
        0
    }
}

/// Cycles between two counter reads, or 0 for an implausible value.
#[inline]
pub fn elapsed(
    start: u32,
    end: u32,
) -> u32 {
    let cycles = end.wrapping_sub(start);
    if cycles > MAX_SANE_CYCLES { 0 } else { cycles }
}

/// Summary of one reporting window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BudgetReport {
    pub iterations: u32,
    pub overruns: u32,
    pub worst_us: u32,
    /// Mean busy time as a share of the budget, 0-100.
    pub mean_load_percent: u32,
}

pub struct LoopBudget {
    budget_us: u32,
    cpu_freq_hz: u32,
    iterations: u32,
    overruns: u32,
    worst_us: u32,
    total_us: u64,
}

impl LoopBudget {
    pub const fn new(
        budget_us: u32,
        cpu_freq_hz: u32,
    ) -> Self {
        Self {
            budget_us,
            cpu_freq_hz,
            iterations: 0,
            overruns: 0,
            worst_us: 0,
            total_us: 0,
        }
    }

    /// Convert a cycle count to microseconds at the configured clock.
    pub const fn cycles_to_us(
        &self,
        cycles: u32,
    ) -> u32 {
        if self.cpu_freq_hz == 0 {
            return 0;
        }
        // u64 so 150M cycles * 1M does not overflow
        (cycles as u64 * 1_000_000 / self.cpu_freq_hz as u64) as u32
    }

    /// Record one iteration measured in cycles. Returns true on overrun.
    pub fn record_cycles(
        &mut self,
        cycles: u32,
    ) -> bool {
        self.record_us(self.cycles_to_us(cycles))
    }

    /// Record one iteration measured in microseconds. Returns true on overrun.
    pub fn record_us(
        &mut self,
        busy_us: u32,
    ) -> bool {
        self.iterations = self.iterations.saturating_add(1);
        self.total_us += u64::from(busy_us);
        self.worst_us = self.worst_us.max(busy_us);

        let overran = busy_us > self.budget_us;
        if overran {
            self.overruns = self.overruns.saturating_add(1);
        }
        overran
    }

    pub const fn overruns(&self) -> u32 { self.overruns }

    pub const fn worst_us(&self) -> u32 { self.worst_us }

    /// Report the current window and start a new one.
    pub fn take_report(&mut self) -> BudgetReport {
        let mean_load_percent = if self.iterations == 0 || self.budget_us == 0 {
            0
        } else {
            let mean_us = self.total_us / u64::from(self.iterations);
            (mean_us * 100 / u64::from(self.budget_us)).min(100) as u32
        };
        let report = BudgetReport {
            iterations: self.iterations,
            overruns: self.overruns,
            worst_us: self.worst_us,
            mean_load_percent,
        };
        self.iterations = 0;
        self.overruns = 0;
        self.worst_us = 0;
        self.total_us = 0;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_wraps() {
        assert_eq!(elapsed(100, 250), 150);
        assert_eq!(elapsed(u32::MAX - 100, 100), 201);
    }

    #[test]
    fn test_elapsed_rejects_garbage() {
        assert_eq!(elapsed(0, MAX_SANE_CYCLES + 1), 0);
    }

    #[test]
    fn test_cycles_to_us() {
        let budget = LoopBudget::new(2_000, 150_000_000);
        assert_eq!(budget.cycles_to_us(150), 1);
        assert_eq!(budget.cycles_to_us(300_000), 2_000);
        assert_eq!(LoopBudget::new(2_000, 0).cycles_to_us(300_000), 0);
    }

    #[test]
    fn test_overrun_counting() {
        let mut budget = LoopBudget::new(2_000, 150_000_000);
        assert!(!budget.record_us(1_500));
        assert!(!budget.record_us(2_000), "exactly on budget is fine");
        assert!(budget.record_cycles(450_000), "3 ms overruns");
        assert_eq!(budget.overruns(), 1);
        assert_eq!(budget.worst_us(), 3_000);
    }

    #[test]
    fn test_report_resets_window() {
        let mut budget = LoopBudget::new(2_000, 150_000_000);
        budget.record_us(500);
        budget.record_us(1_500);
        budget.record_us(2_500);

        let report = budget.take_report();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.overruns, 1);
        assert_eq!(report.worst_us, 2_500);
        assert_eq!(report.mean_load_percent, 75);

        assert_eq!(budget.take_report(), BudgetReport::default());
    }
}
