use chrono::Duration;

/// Tunables for a lesson visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long the solved exercise stays on screen before returning to the list.
    pub celebration_delay: Duration,
}

impl SessionSettings {
    pub const DEFAULT_CELEBRATION_MS: i64 = 1000;

    #[must_use]
    pub fn with_celebration_ms(millis: i64) -> Self {
        Self {
            celebration_delay: Duration::milliseconds(millis.max(0)),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::with_celebration_ms(Self::DEFAULT_CELEBRATION_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_is_one_second() {
        assert_eq!(
            SessionSettings::default().celebration_delay,
            Duration::seconds(1)
        );
    }

    #[test]
    fn negative_delay_clamps_to_zero() {
        assert_eq!(
            SessionSettings::with_celebration_ms(-5).celebration_delay,
            Duration::zero()
        );
    }
}
