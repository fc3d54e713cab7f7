use chrono::{DateTime, Duration, Utc};

/// Source of "now" for deadlines, switchable to a manual clock in tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(DateTime<Utc>),
}

impl Clock {
    /// A clock frozen at `at` until advanced.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Manual(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(at) => *at,
        }
    }

    /// Moves a manual clock forward. The system clock ignores this.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Manual(at) = self {
            *at += delta;
        }
    }
}

/// A point in time after which a deferred transition should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(DateTime<Utc>);

impl Deadline {
    #[must_use]
    pub fn after(clock: &Clock, delay: Duration) -> Self {
        Self(clock.now() + delay)
    }

    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    #[must_use]
    pub fn has_passed(&self, clock: &Clock) -> bool {
        clock.now() >= self.0
    }

    /// Time left before the deadline, clamped at zero.
    #[must_use]
    pub fn remaining(&self, clock: &Clock) -> Duration {
        (self.0 - clock.now()).max(Duration::zero())
    }
}

/// Deterministic timestamp used by tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns the deterministic test timestamp as a `DateTime<Utc>`.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_fires_once_manual_clock_passes_it() {
        let mut clock = Clock::fixed(fixed_now());
        let deadline = Deadline::after(&clock, Duration::milliseconds(1000));
        assert!(!deadline.has_passed(&clock));
        assert_eq!(deadline.remaining(&clock), Duration::milliseconds(1000));

        clock.advance(Duration::milliseconds(999));
        assert!(!deadline.has_passed(&clock));

        clock.advance(Duration::milliseconds(1));
        assert!(deadline.has_passed(&clock));
        assert_eq!(deadline.remaining(&clock), Duration::zero());
    }
}
