//! Inactivity timer configuration.

use std::time::Duration;
use thiserror::Error;

use super::activity::ActivityKind;

/// Warning prompt appears after 29 minutes without activity.
pub const DEFAULT_WARNING_OFFSET: Duration = Duration::from_secs(29 * 60);
/// Session terminates after 30 minutes without activity.
pub const DEFAULT_LOGOUT_OFFSET: Duration = Duration::from_secs(30 * 60);
/// Length of the visible countdown.
pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(60);
/// Countdown refresh rate.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ACTIVITY_KINDS: [ActivityKind; 4] = [
    ActivityKind::PointerPress,
    ActivityKind::KeyPress,
    ActivityKind::Scroll,
    ActivityKind::Click,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("warning offset must be greater than zero")]
    ZeroWarningOffset,
    #[error("countdown must be greater than zero")]
    ZeroCountdown,
    #[error("tick interval must be greater than zero and not exceed the countdown")]
    InvalidTickInterval,
    #[error(
        "logout offset ({logout:?}) must equal warning offset plus countdown ({expected:?})"
    )]
    InconsistentLogoutOffset { logout: Duration, expected: Duration },
    #[error("at least one activity kind must be observed")]
    NoActivityKinds,
}

/// Timer offsets are relative to the last activity.
///
/// The countdown reaching zero is the only logout trigger, so the logout
/// offset has to coincide with `warning_offset + countdown`; `validate`
/// rejects configurations where they diverge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InactivityConfig {
    warning_offset: Duration,
    logout_offset: Duration,
    countdown: Duration,
    tick_interval: Duration,
    activity_kinds: Vec<ActivityKind>,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            warning_offset: DEFAULT_WARNING_OFFSET,
            logout_offset: DEFAULT_LOGOUT_OFFSET,
            countdown: DEFAULT_COUNTDOWN,
            tick_interval: DEFAULT_TICK_INTERVAL,
            activity_kinds: DEFAULT_ACTIVITY_KINDS.to_vec(),
        }
    }
}

impl InactivityConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_warning_offset(mut self, offset: Duration) -> Self {
        self.warning_offset = offset;
        self
    }

    #[must_use]
    pub fn with_logout_offset(mut self, offset: Duration) -> Self {
        self.logout_offset = offset;
        self
    }

    #[must_use]
    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    #[must_use]
    pub fn with_activity_kinds(mut self, kinds: Vec<ActivityKind>) -> Self {
        self.activity_kinds = kinds;
        self
    }

    #[must_use]
    pub fn warning_offset(&self) -> Duration {
        self.warning_offset
    }

    #[must_use]
    pub fn logout_offset(&self) -> Duration {
        self.logout_offset
    }

    #[must_use]
    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn activity_kinds(&self) -> &[ActivityKind] {
        &self.activity_kinds
    }

    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warning_offset.is_zero() {
            return Err(ConfigError::ZeroWarningOffset);
        }
        if self.countdown.is_zero() {
            return Err(ConfigError::ZeroCountdown);
        }
        if self.tick_interval.is_zero() || self.tick_interval > self.countdown {
            return Err(ConfigError::InvalidTickInterval);
        }
        let expected = self.warning_offset.saturating_add(self.countdown);
        if self.logout_offset != expected {
            return Err(ConfigError::InconsistentLogoutOffset {
                logout: self.logout_offset,
                expected,
            });
        }
        if self.activity_kinds.is_empty() {
            return Err(ConfigError::NoActivityKinds);
        }
        Ok(())
    }
}
