//! Tick source for the simulator: one cancellable deadline, re-armed from the simulator phase.

use crate::board::Grid;
use crate::sim::{Advance, Phase, Simulator};
use std::time::{Duration, Instant};
use tracing::debug;

/// Fall step and inter-piece delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub fall: Duration,
    pub settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            fall: Duration::from_millis(100),
            settle: Duration::from_millis(500),
        }
    }
}

/// Pending tick deadline. At most one is ever outstanding.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    due: Option<Instant>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Arm according to what the simulator is waiting on; disarm when there is nothing to wait for.
    pub fn rearm(&mut self, phase: Phase, timing: Timing, now: Instant) {
        self.due = match phase {
            Phase::Falling(_) => Some(now + timing.fall),
            Phase::Settling { .. } => Some(now + timing.settle),
            Phase::Idle | Phase::Halted(_) => None,
        };
    }

    pub fn cancel(&mut self) {
        if self.due.take().is_some() {
            debug!("pending tick cancelled");
        }
    }

    /// Fire at most one tick if the deadline has passed.
    pub fn poll(&mut self, now: Instant, sim: &mut Simulator, timing: Timing) -> Option<Advance> {
        let due = self.due?;
        if now < due {
            return None;
        }
        let adv = sim.tick();
        // Re-arm from the deadline, not from `now`, so a slow frame doesn't stretch the fall.
        let base = if now.saturating_duration_since(due) > timing.fall { now } else { due };
        self.rearm(sim.phase(), timing, base);
        Some(adv)
    }
}

/// Simulator plus the schedule that drives it. Dropping or tearing it down leaves no pending tick.
#[derive(Debug)]
pub struct Driver {
    sim: Simulator,
    schedule: Schedule,
    timing: Timing,
    paused: bool,
}

impl Driver {
    pub fn new(sim: Simulator, timing: Timing) -> Self {
        Self {
            sim,
            schedule: Schedule::new(),
            timing,
            paused: false,
        }
    }

    #[inline]
    pub fn sim(&self) -> &Simulator {
        &self.sim
    }

    #[inline]
    pub fn timing(&self) -> Timing {
        self.timing
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_armed(&self) -> bool {
        self.schedule.is_armed()
    }

    /// Visibility signal: starts the simulation the first time.
    pub fn start(&mut self, now: Instant) {
        if self.sim.phase() == Phase::Idle {
            self.sim.start();
        }
        self.paused = false;
        self.schedule.rearm(self.sim.phase(), self.timing, now);
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.schedule.cancel();
    }

    pub fn resume(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.schedule.rearm(self.sim.phase(), self.timing, now);
    }

    /// Manual single tick (while paused); the schedule stays disarmed.
    pub fn step(&mut self) -> Advance {
        if self.sim.phase() == Phase::Idle {
            return self.sim.start();
        }
        self.sim.tick()
    }

    /// Empty grid, idle; starts again immediately unless paused.
    pub fn restart(&mut self, now: Instant) {
        self.schedule.cancel();
        self.sim.reset();
        if !self.paused {
            self.start(now);
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<Advance> {
        if self.paused {
            return None;
        }
        self.schedule.poll(now, &mut self.sim, self.timing)
    }

    /// Stop for good: cancels the pending tick and hands back the committed grid.
    pub fn teardown(mut self) -> Grid {
        self.schedule.cancel();
        debug!(revision = self.sim.revision(), "driver torn down");
        self.sim.grid().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::SHAPES;
    use crate::sim::{HaltReason, Placement};

    fn driver(seq: &[(usize, usize)]) -> Driver {
        let sequence = seq
            .iter()
            .map(|&(shape, column)| Placement { shape, column })
            .collect();
        let sim = Simulator::new(4, 8, SHAPES.to_vec(), sequence).unwrap();
        Driver::new(sim, Timing::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_nothing_fires_before_start() {
        let mut d = driver(&[(0, 0)]);
        let t0 = Instant::now();
        assert!(!d.is_armed());
        assert_eq!(d.poll(t0 + ms(10_000)), None);
        assert_eq!(d.sim().phase(), Phase::Idle);
    }

    #[test]
    fn test_fall_and_settle_intervals() {
        let mut d = driver(&[(0, 0), (0, 4)]);
        let t0 = Instant::now();
        d.start(t0);
        assert_eq!(d.poll(t0 + ms(99)), None);
        assert_eq!(d.poll(t0 + ms(100)), Some(Advance::Fell { row: 1 }));
        assert_eq!(d.poll(t0 + ms(200)), Some(Advance::Fell { row: 2 }));
        assert_eq!(d.poll(t0 + ms(300)), Some(Advance::Fell { row: 3 }));
        assert_eq!(
            d.poll(t0 + ms(400)),
            Some(Advance::Committed { step: 0, row: 3 })
        );
        // Next piece waits for the settle delay.
        assert_eq!(d.poll(t0 + ms(500)), None);
        assert_eq!(d.poll(t0 + ms(899)), None);
        assert!(matches!(d.poll(t0 + ms(900)), Some(Advance::Activated(_))));
    }

    #[test]
    fn test_halt_disarms() {
        let mut d = driver(&[(1, 0)]);
        let t0 = Instant::now();
        d.start(t0);
        let mut t = t0;
        let mut last = None;
        for _ in 0..10 {
            t += ms(500);
            if let Some(adv) = d.poll(t) {
                last = Some(adv);
            }
        }
        assert_eq!(last, Some(Advance::Halted(HaltReason::Exhausted)));
        assert!(!d.is_armed());
    }

    #[test]
    fn test_pause_cancels_pending_tick() {
        let mut d = driver(&[(0, 0)]);
        let t0 = Instant::now();
        d.start(t0);
        d.pause();
        assert!(!d.is_armed());
        assert_eq!(d.poll(t0 + ms(5_000)), None);
        let rev = d.sim().revision();
        d.resume(t0 + ms(5_000));
        assert_eq!(d.poll(t0 + ms(5_050)), None);
        assert_eq!(d.poll(t0 + ms(5_100)), Some(Advance::Fell { row: 1 }));
        assert!(d.sim().revision() > rev);
    }

    #[test]
    fn test_step_while_paused() {
        let mut d = driver(&[(0, 0)]);
        d.pause();
        assert!(matches!(d.step(), Advance::Activated(_)));
        assert_eq!(d.step(), Advance::Fell { row: 1 });
        assert!(!d.is_armed());
    }

    #[test]
    fn test_restart_and_teardown() {
        let mut d = driver(&[(0, 0)]);
        let t0 = Instant::now();
        d.start(t0);
        for i in 1..=4 {
            d.poll(t0 + ms(100 * i));
        }
        assert_eq!(d.sim().grid().filled_count(), 4);
        d.restart(t0 + ms(1_000));
        assert_eq!(d.sim().grid().filled_count(), 0);
        assert!(d.sim().active().is_some());
        assert!(d.is_armed());
        let grid = d.teardown();
        assert_eq!(grid.filled_count(), 0);
    }

    #[test]
    fn test_late_poll_does_not_burst() {
        let mut d = driver(&[(0, 0)]);
        let t0 = Instant::now();
        d.start(t0);
        let late = t0 + ms(2_000);
        assert_eq!(d.poll(late), Some(Advance::Fell { row: 1 }));
        assert_eq!(d.poll(late), None);
        assert_eq!(d.poll(late + ms(100)), Some(Advance::Fell { row: 2 }));
    }
}
