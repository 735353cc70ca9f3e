//! Frame pacing for the main loop.
//!
//! The loop renders a frame, pumps the platform events and then idles until the
//! frame period is used up. Idling is a yield loop and never blocks, so the thread
//! stays responsive to the next iteration as soon as the deadline passes.

use std::time::{Duration, Instant};

/// A source of time for the `FramePacer`.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Gives up the rest of the current time slice.
    fn yield_now(&self);
}

/// The wall clock of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Keeps the main loop at a fixed cadence.
#[derive(Debug)]
pub struct FramePacer<C: Clock = SystemClock> {
    clock: C,
    period: Duration,
    frame_start: Option<Instant>,
}

impl FramePacer<SystemClock> {
    pub fn new(period: Duration) -> Self {
        FramePacer::with_clock(SystemClock, period)
    }
}

impl<C: Clock> FramePacer<C> {
    pub fn with_clock(clock: C, period: Duration) -> Self {
        FramePacer {
            clock,
            period,
            frame_start: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Records the start of a new frame and returns the time since the previous
    /// frame started.
    ///
    /// The first frame reports the target period.
    pub fn begin_frame(&mut self) -> Duration {
        let now = self.clock.now();
        let delta = match self.frame_start {
            Some(previous) => now.saturating_duration_since(previous),
            None => self.period,
        };
        self.frame_start = Some(now);
        delta
    }

    /// Yields until the frame period, measured from the last `begin_frame()`, has
    /// elapsed. Returns how long it waited.
    pub fn idle_wait(&mut self) -> Duration {
        let start = match self.frame_start {
            Some(start) => start,
            None => return Duration::ZERO,
        };

        let finished_at = self.clock.now();
        let deadline = start + self.period;
        if finished_at >= deadline {
            log::trace!(
                "Frame overran its budget by {:?}.",
                finished_at - deadline
            );
            return Duration::ZERO;
        }

        while self.clock.now() < deadline {
            self.clock.yield_now();
        }
        self.clock.now().saturating_duration_since(finished_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// A clock that only moves when told to, or by `step` on every yield.
    struct FakeClock {
        base: Instant,
        elapsed: Cell<Duration>,
        step: Duration,
        yields: Cell<u32>,
    }

    impl FakeClock {
        fn new(step: Duration) -> Self {
            FakeClock {
                base: Instant::now(),
                elapsed: Cell::new(Duration::ZERO),
                step,
                yields: Cell::new(0),
            }
        }

        fn advance(&self, by: Duration) {
            self.elapsed.set(self.elapsed.get() + by);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.base + self.elapsed.get()
        }

        fn yield_now(&self) {
            self.yields.set(self.yields.get() + 1);
            self.advance(self.step);
        }
    }

    fn sixty_hertz() -> Duration {
        crate::utils::frame_period(60)
    }

    #[test]
    fn waits_out_the_rest_of_the_budget() {
        let mut pacer =
            FramePacer::with_clock(FakeClock::new(Duration::from_micros(100)), sixty_hertz());

        pacer.begin_frame();
        let start = pacer.clock().now();
        pacer.clock().advance(Duration::from_millis(5));
        let waited = pacer.idle_wait();

        assert!(waited >= Duration::from_micros(11_666));
        // the next frame may not start before the budget is used up
        let next_start = pacer.clock().now();
        assert!(next_start - start >= sixty_hertz());
        assert!(pacer.clock().yields.get() > 0);
    }

    #[test]
    fn does_not_wait_after_an_overrun() {
        let mut pacer = FramePacer::with_clock(FakeClock::new(Duration::from_millis(1)), sixty_hertz());

        pacer.begin_frame();
        pacer.clock().advance(Duration::from_millis(20));

        assert_eq!(pacer.idle_wait(), Duration::ZERO);
        assert_eq!(pacer.clock().yields.get(), 0);
    }

    #[test]
    fn delta_is_measured_between_frame_starts() {
        let mut pacer = FramePacer::with_clock(FakeClock::new(Duration::from_millis(1)), sixty_hertz());

        assert_eq!(pacer.begin_frame(), sixty_hertz());
        pacer.clock().advance(Duration::from_millis(3));
        pacer.idle_wait();
        let delta = pacer.begin_frame();

        assert!(delta >= sixty_hertz());
        assert!(delta < sixty_hertz() + Duration::from_millis(1));
    }

    #[test]
    fn idle_wait_without_frame_is_a_no_op() {
        let mut pacer = FramePacer::with_clock(FakeClock::new(Duration::from_millis(1)), sixty_hertz());
        assert_eq!(pacer.idle_wait(), Duration::ZERO);
    }
}
