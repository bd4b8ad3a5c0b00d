//! Scheduled sound events
//!
//! Timers are plain deadlines polled by the presentation loop, so every
//! transition they trigger runs on that loop. Arming an armed timer replaces
//! its deadline; cancelling an idle timer does nothing.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Go back to the idle hum once printing has drained
    HumResume,
    /// Replay the next queued keypress
    KeyDecay,
    /// Advance the print queue by one character
    CharTick,
    /// Restart the loops in phase after a carriage return or lid change
    Sync,
    /// Next step of a volume crossfade
    Fade,
}

impl TimerKind {
    pub const ALL: [TimerKind; 5] = [
        TimerKind::HumResume,
        TimerKind::KeyDecay,
        TimerKind::CharTick,
        TimerKind::Sync,
        TimerKind::Fade,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    period: Option<Duration>,
}

/// One slot per timer kind
#[derive(Debug, Default)]
pub struct Timers {
    slots: [Option<Armed>; 5],
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once, `delay` from now
    pub fn arm(&mut self, kind: TimerKind, now: Instant, delay: Duration) {
        self.slots[kind.index()] = Some(Armed {
            deadline: now + delay,
            period: None,
        });
    }

    /// Fire every `period` until cancelled
    pub fn arm_repeating(&mut self, kind: TimerKind, now: Instant, period: Duration) {
        self.slots[kind.index()] = Some(Armed {
            deadline: now + period,
            period: Some(period),
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.slots[kind.index()] = None;
    }

    pub fn cancel_all(&mut self) {
        self.slots = [None; 5];
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.slots[kind.index()].map(|armed| armed.deadline)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().map(|armed| armed.deadline).min()
    }

    /// Take the earliest timer due at `now`. One-shot timers disarm;
    /// repeating timers move to their next period, skipping periods already
    /// missed so a stalled loop does not fire a burst.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let (index, armed) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|armed| (index, armed)))
            .filter(|(_, armed)| armed.deadline <= now)
            .min_by_key(|(_, armed)| armed.deadline)?;

        self.slots[index] = armed.period.map(|period| {
            let next = armed.deadline + period;
            Armed {
                deadline: if next > now { next } else { now + period },
                period: Some(period),
            }
        });
        Some(TimerKind::ALL[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_one_shot_fires_once() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm(TimerKind::Sync, t0, 10 * MS);
        assert_eq!(timers.pop_due(t0 + 5 * MS), None);
        assert_eq!(timers.pop_due(t0 + 10 * MS), Some(TimerKind::Sync));
        assert_eq!(timers.pop_due(t0 + 100 * MS), None);
        assert!(!timers.is_armed(TimerKind::Sync));
    }

    #[test]
    fn test_repeating_rearms() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm_repeating(TimerKind::CharTick, t0, 100 * MS);
        assert_eq!(timers.pop_due(t0 + 100 * MS), Some(TimerKind::CharTick));
        assert_eq!(timers.deadline(TimerKind::CharTick), Some(t0 + 200 * MS));
        assert_eq!(timers.pop_due(t0 + 150 * MS), None);

        // A long stall yields a single fire
        assert_eq!(timers.pop_due(t0 + 750 * MS), Some(TimerKind::CharTick));
        assert_eq!(timers.pop_due(t0 + 750 * MS), None);
        assert_eq!(timers.deadline(TimerKind::CharTick), Some(t0 + 850 * MS));
    }

    #[test]
    fn test_earliest_first_and_rearm_replaces() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm(TimerKind::HumResume, t0, 50 * MS);
        timers.arm(TimerKind::Sync, t0, 10 * MS);
        timers.arm(TimerKind::HumResume, t0, 30 * MS);
        assert_eq!(timers.next_deadline(), Some(t0 + 10 * MS));
        assert_eq!(timers.pop_due(t0 + 60 * MS), Some(TimerKind::Sync));
        assert_eq!(timers.pop_due(t0 + 60 * MS), Some(TimerKind::HumResume));
        assert_eq!(timers.pop_due(t0 + 60 * MS), None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.cancel(TimerKind::KeyDecay);
        timers.arm_repeating(TimerKind::KeyDecay, t0, 100 * MS);
        timers.cancel(TimerKind::KeyDecay);
        timers.cancel(TimerKind::KeyDecay);
        assert_eq!(timers.next_deadline(), None);
    }
}
