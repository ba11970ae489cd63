//! Cooperative fixed-interval task scheduler.
//!
//! The control loop registers a handful of periodic tasks and asks, on every
//! iteration, which of them are due. A task that has never run is due at
//! once. Elapsed time uses wrapping arithmetic so the millisecond counter
//! may roll over. Each due task is stamped with the poll time rather than
//! its ideal slot, so a stalled loop never produces a burst of catch-up runs.

use heapless::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry<T> {
    task: T,
    interval_ms: u32,
    last_run_ms: Option<u32>,
}

pub struct Scheduler<T, const N: usize> {
    entries: Vec<Entry<T>, N>,
}

impl<T: Copy + PartialEq, const N: usize> Scheduler<T, N> {
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    /// Register a task. Returns the task back when the table is full.
    pub fn add(
        &mut self,
        task: T,
        interval_ms: u32,
    ) -> Result<(), T> {
        self.entries
            .push(Entry {
                task,
                interval_ms,
                last_run_ms: None,
            })
            .map_err(|entry| entry.task)
    }

    /// Tasks due at `now_ms`, in registration order. Each is marked as run.
    pub fn poll(
        &mut self,
        now_ms: u32,
    ) -> Vec<T, N> {
        let mut due = Vec::new();
        for entry in self.entries.iter_mut() {
            let ready = entry
                .last_run_ms
                .is_none_or(|at| now_ms.wrapping_sub(at) >= entry.interval_ms);
            if ready {
                entry.last_run_ms = Some(now_ms);
                // At most N entries, so this always fits
                let _ = due.push(entry.task);
            }
        }
        due
    }

    /// When `task` last ran.
    pub fn last_run(
        &self,
        task: T,
    ) -> Option<u32> {
        self.entries.iter().find(|e| e.task == task).and_then(|e| e.last_run_ms)
    }

    /// Make every task due on the next poll.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.last_run_ms = None;
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<T: Copy + PartialEq, const N: usize> Default for Scheduler<T, N> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Job {
        Fast,
        Slow,
    }

    fn scheduler() -> Scheduler<Job, 2> {
        let mut s = Scheduler::new();
        s.add(Job::Fast, 2).unwrap();
        s.add(Job::Slow, 1_000).unwrap();
        s
    }

    #[test]
    fn test_never_run_tasks_are_due() {
        let mut s = scheduler();
        assert_eq!(s.poll(0).as_slice(), &[Job::Fast, Job::Slow]);
    }

    #[test]
    fn test_interval_respected() {
        let mut s = scheduler();
        s.poll(0);
        assert!(s.poll(1).is_empty());
        assert_eq!(s.poll(2).as_slice(), &[Job::Fast]);
        assert_eq!(s.poll(998).as_slice(), &[Job::Fast]);
        assert!(s.poll(999).is_empty(), "stamped at 998, next due at 1000");
        assert_eq!(s.poll(1_000).as_slice(), &[Job::Fast, Job::Slow]);
        assert_eq!(s.last_run(Job::Slow), Some(1_000));
    }

    #[test]
    fn test_late_poll_runs_once() {
        let mut s = scheduler();
        s.poll(0);
        assert_eq!(s.poll(5_000).as_slice(), &[Job::Fast, Job::Slow]);
        assert!(s.poll(5_001).is_empty(), "no catch-up burst after a stall");
    }

    #[test]
    fn test_wrapping_clock() {
        let mut s = scheduler();
        s.poll(u32::MAX - 500);
        assert_eq!(s.poll(499).as_slice(), &[Job::Fast, Job::Slow]);
    }

    #[test]
    fn test_full_table_rejects_task() {
        let mut s = scheduler();
        assert_eq!(s.add(Job::Fast, 5), Err(Job::Fast));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_reset_makes_everything_due() {
        let mut s = scheduler();
        s.poll(0);
        s.reset();
        assert_eq!(s.poll(1).as_slice(), &[Job::Fast, Job::Slow]);
    }
}
