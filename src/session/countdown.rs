use std::time::{Duration, Instant};

/// What a countdown poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Not active, or the next tick is not due yet.
    Idle,
    /// One tick elapsed; the payload is the new display value.
    Tick(u32),
    /// The countdown reached zero. Reported exactly once.
    Finished,
}

/// Linear countdown toward the auto-capture trigger.
///
/// Runs on its own one-tick-per-interval schedule, driven by `poll` from
/// the capture loop and therefore independent of the per-frame cadence.
/// Reaching zero is terminal: the countdown deactivates and never fires
/// again for this session.
pub struct Countdown {
    ticks_remaining: u32,
    active: bool,
    tick_interval: Duration,
    next_deadline: Option<Instant>,
}

impl Countdown {
    pub fn new(start_ticks: u32, tick_interval: Duration) -> Self {
        Self {
            ticks_remaining: start_ticks,
            active: false,
            tick_interval,
            next_deadline: None,
        }
    }

    /// Arm the countdown. The first tick is due one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.active = true;
        self.next_deadline = Some(now + self.tick_interval);
    }

    /// Advance the countdown against the current time. At most one tick is
    /// consumed per poll.
    pub fn poll(&mut self, now: Instant) -> CountdownEvent {
        if !self.active {
            return CountdownEvent::Idle;
        }

        if self.ticks_remaining == 0 {
            self.active = false;
            return CountdownEvent::Finished;
        }

        let deadline = match self.next_deadline {
            Some(d) => d,
            None => return CountdownEvent::Idle,
        };

        if now < deadline {
            return CountdownEvent::Idle;
        }

        self.ticks_remaining -= 1;
        self.next_deadline = Some(deadline + self.tick_interval);

        if self.ticks_remaining == 0 {
            self.active = false;
            CountdownEvent::Finished
        } else {
            CountdownEvent::Tick(self.ticks_remaining)
        }
    }

    /// Stop ticking without firing. Used when the session stops for any
    /// reason other than countdown completion.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn ticks_remaining(&self) -> u32 {
        self.ticks_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn inactive_countdown_stays_idle() {
        let mut countdown = Countdown::new(3, TICK);
        let now = Instant::now();
        assert_eq!(countdown.poll(now + TICK * 10), CountdownEvent::Idle);
    }

    #[test]
    fn ticks_decrease_monotonically_to_finished() {
        let mut countdown = Countdown::new(3, TICK);
        let start = Instant::now();
        countdown.start(start);

        assert_eq!(countdown.poll(start), CountdownEvent::Idle);
        assert_eq!(countdown.poll(start + TICK), CountdownEvent::Tick(2));
        assert_eq!(countdown.poll(start + TICK), CountdownEvent::Idle);
        assert_eq!(countdown.poll(start + TICK * 2), CountdownEvent::Tick(1));
        assert_eq!(countdown.poll(start + TICK * 3), CountdownEvent::Finished);
    }

    #[test]
    fn finished_is_reported_exactly_once() {
        let mut countdown = Countdown::new(1, TICK);
        let start = Instant::now();
        countdown.start(start);

        assert_eq!(countdown.poll(start + TICK), CountdownEvent::Finished);
        assert!(!countdown.is_active());
        assert_eq!(countdown.poll(start + TICK * 5), CountdownEvent::Idle);
    }

    #[test]
    fn zero_start_finishes_on_first_poll() {
        let mut countdown = Countdown::new(0, TICK);
        let start = Instant::now();
        countdown.start(start);

        assert_eq!(countdown.poll(start), CountdownEvent::Finished);
        assert_eq!(countdown.poll(start + TICK), CountdownEvent::Idle);
    }

    #[test]
    fn cancel_stops_ticking_immediately() {
        let mut countdown = Countdown::new(3, TICK);
        let start = Instant::now();
        countdown.start(start);
        countdown.cancel();

        assert_eq!(countdown.poll(start + TICK * 10), CountdownEvent::Idle);
        assert_eq!(countdown.ticks_remaining(), 3);
    }

    #[test]
    fn at_most_one_tick_per_poll() {
        let mut countdown = Countdown::new(5, TICK);
        let start = Instant::now();
        countdown.start(start);

        // The loop stalled for three intervals; ticks still arrive one at
        // a time.
        assert_eq!(countdown.poll(start + TICK * 3), CountdownEvent::Tick(4));
        assert_eq!(countdown.ticks_remaining(), 4);
    }
}
