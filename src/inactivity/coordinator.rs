//! Inactivity state machine.
//!
//! Phases: `Idle` (no session), `Monitoring` (warning timer armed), `Warning`
//! (countdown running) and `Expired` (termination callback fired, waiting for
//! the session to end).
//!
//! Invariants:
//! - At most one warning timer and one countdown timer are pending, and never
//!   both: every transition cancels before it schedules.
//! - The countdown reaching zero is the only path into `Expired`; there is no
//!   second, independent logout timer to race against it.
//! - A timer id that is no longer armed is ignored on delivery, so a
//!   cancelled timer can never take effect even if it was already in flight.
//! - `countdown_remaining` is defined only in `Warning`.
//! - Every session start opens a new [`SessionGeneration`]. A termination
//!   acknowledgement only ends the generation that expired, never a session
//!   started after it.
//!
//! All entry points take `&mut self`; the owner serialises activity, timer
//! expirations and lifecycle calls, which rules out concurrent or reentrant
//! transitions.

use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    config::{ConfigError, InactivityConfig},
    scheduler::{Clock, ManualScheduler, Scheduler, TimerId, TimerKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Monitoring,
    Warning,
    Expired,
}

/// Read-only snapshot of the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerState {
    pub phase: Phase,
    pub warning_deadline: Option<Instant>,
    pub logout_deadline: Option<Instant>,
    /// Whole seconds left, rounded up. `Some` only during `Warning`.
    pub countdown_remaining: Option<u64>,
}

impl TimerState {
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            warning_deadline: None,
            logout_deadline: None,
            countdown_remaining: None,
        }
    }
}

/// Identifies one session start; handed to the termination handler so its
/// acknowledgement can be matched to the episode that expired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionGeneration(u64);

impl SessionGeneration {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Invoked once per idle episode when the countdown runs out.
pub trait TerminationHandler {
    fn on_terminate(&mut self, generation: SessionGeneration);
}

impl<F: FnMut(SessionGeneration)> TerminationHandler for F {
    fn on_terminate(&mut self, generation: SessionGeneration) {
        self(generation);
    }
}

pub struct TimerCoordinator<S, H> {
    config: InactivityConfig,
    scheduler: S,
    on_terminate: H,
    session_active: bool,
    generation: SessionGeneration,
    phase: Phase,
    warning_deadline: Option<Instant>,
    logout_deadline: Option<Instant>,
    next_tick: Option<Instant>,
    countdown_remaining: Option<u64>,
    warning_timer: Option<TimerId>,
    countdown_timer: Option<TimerId>,
}

impl<S: Scheduler, H: TerminationHandler> TimerCoordinator<S, H> {
    /// Starts in `Idle`; nothing is scheduled until a session starts.
    ///
    /// # Errors
    /// Returns an error if the configuration is inconsistent.
    pub fn new(config: InactivityConfig, scheduler: S, on_terminate: H) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler,
            on_terminate,
            session_active: false,
            generation: SessionGeneration::default(),
            phase: Phase::Idle,
            warning_deadline: None,
            logout_deadline: None,
            next_tick: None,
            countdown_remaining: None,
            warning_timer: None,
            countdown_timer: None,
        })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        TimerState {
            phase: self.phase,
            warning_deadline: self.warning_deadline,
            logout_deadline: self.logout_deadline,
            countdown_remaining: self.countdown_remaining,
        }
    }

    /// Generation of the most recent session start.
    #[must_use]
    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    #[must_use]
    pub fn config(&self) -> &InactivityConfig {
        &self.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// A session became available: start monitoring from now.
    pub fn on_session_start(&mut self) -> SessionGeneration {
        self.session_active = true;
        self.generation = self.generation.next();
        debug!(generation = self.generation.get(), "Inactivity monitoring started");
        let now = self.scheduler.now();
        self.arm(now);
        self.generation
    }

    /// The termination handler for `generation` finished its sign-out.
    ///
    /// Moves `Expired` to `Idle` only when `generation` is the one that
    /// expired; an acknowledgement that arrives after a new session started is
    /// ignored.
    pub fn acknowledge_termination(&mut self, generation: SessionGeneration) -> bool {
        if self.phase != Phase::Expired || self.generation != generation {
            debug!(
                generation = generation.get(),
                current = self.generation.get(),
                "Ignoring stale termination acknowledgement"
            );
            return false;
        }
        self.on_session_end();
        true
    }

    /// The session is gone (explicit sign-out, or it was never valid).
    pub fn on_session_end(&mut self) {
        self.session_active = false;
        self.cancel_timers();
        self.phase = Phase::Idle;
        self.warning_deadline = None;
        self.logout_deadline = None;
        self.next_tick = None;
        self.countdown_remaining = None;
        debug!("Inactivity monitoring stopped");
    }

    /// Cancel pending timers and re-arm from now. Idempotent.
    ///
    /// Returns `false` without effect when there is no session or the
    /// termination has already fired; a session being torn down is not revived.
    pub fn reset(&mut self) -> bool {
        if !self.session_active || self.phase == Phase::Expired {
            return false;
        }
        let now = self.scheduler.now();
        self.arm(now);
        true
    }

    /// Explicit "still here" from the warning prompt. No-op outside `Warning`.
    pub fn dismiss(&mut self) -> bool {
        if self.phase != Phase::Warning {
            return false;
        }
        debug!("Inactivity warning dismissed");
        self.reset()
    }

    /// Deliver an expired timer. Ids that are no longer armed are ignored.
    ///
    /// Returns `true` if the timer was current and acted upon.
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        let now = self.scheduler.now();
        if self.warning_timer == Some(id) {
            self.warning_timer = None;
            self.scheduler.cancel(id);
            self.enter_warning(now);
            true
        } else if self.countdown_timer == Some(id) {
            self.countdown_timer = None;
            self.scheduler.cancel(id);
            self.countdown_tick(now);
            true
        } else {
            debug!(?id, "Ignoring stale timer");
            false
        }
    }

    fn arm(&mut self, now: Instant) {
        self.cancel_timers();
        let warning_deadline = now + self.config.warning_offset();
        let logout_deadline = warning_deadline + self.config.countdown();
        self.phase = Phase::Monitoring;
        self.warning_deadline = Some(warning_deadline);
        self.logout_deadline = Some(logout_deadline);
        self.next_tick = None;
        self.countdown_remaining = None;
        self.warning_timer = Some(
            self.scheduler
                .schedule_at(warning_deadline, TimerKind::Warning),
        );
    }

    fn enter_warning(&mut self, now: Instant) {
        let (Some(warning_deadline), Some(logout_deadline)) =
            (self.warning_deadline, self.logout_deadline)
        else {
            return;
        };
        if self.phase != Phase::Monitoring {
            return;
        }
        self.phase = Phase::Warning;
        info!("Inactivity warning shown");
        // A late delivery may already be past the logout deadline.
        self.next_tick = Some(warning_deadline + self.config.tick_interval());
        self.update_countdown(now, logout_deadline);
    }

    fn countdown_tick(&mut self, now: Instant) {
        if self.phase != Phase::Warning {
            return;
        }
        if let Some(logout_deadline) = self.logout_deadline {
            self.update_countdown(now, logout_deadline);
        }
    }

    fn update_countdown(&mut self, now: Instant, logout_deadline: Instant) {
        let remaining = remaining_seconds(now, logout_deadline);
        if remaining == 0 {
            self.expire();
            return;
        }
        self.countdown_remaining = Some(remaining);

        let tick = self.config.tick_interval();
        let mut next_tick = self.next_tick.unwrap_or(now + tick);
        while next_tick <= now {
            next_tick += tick;
        }
        self.next_tick = Some(next_tick);
        let deadline = next_tick.min(logout_deadline);
        self.countdown_timer = Some(self.scheduler.schedule_at(deadline, TimerKind::Countdown));
    }

    fn expire(&mut self) {
        if self.phase == Phase::Expired {
            return;
        }
        self.cancel_timers();
        self.phase = Phase::Expired;
        self.next_tick = None;
        self.countdown_remaining = None;
        info!("Inactivity timeout reached, terminating session");
        self.on_terminate.on_terminate(self.generation);
    }

    fn cancel_timers(&mut self) {
        if let Some(id) = self.warning_timer.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.countdown_timer.take() {
            self.scheduler.cancel(id);
        }
    }
}

impl<H: TerminationHandler> TimerCoordinator<ManualScheduler, H> {
    /// Move virtual time forward by `by`, delivering every timer that falls due
    /// on the way, in deadline order.
    pub fn advance(&mut self, by: Duration) {
        let target = self.scheduler.now() + by;
        self.advance_until(target);
    }

    /// Move virtual time to `offset` after the scheduler's origin.
    pub fn advance_to(&mut self, offset: Duration) {
        let target = self.scheduler.at(offset);
        self.advance_until(target);
    }

    fn advance_until(&mut self, target: Instant) {
        while let Some((id, _)) = self.scheduler.pop_due(target) {
            self.on_timer(id);
        }
        self.scheduler.set_now(target);
    }
}

fn remaining_seconds(now: Instant, logout_deadline: Instant) -> u64 {
    let left = logout_deadline.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

impl<S, H> std::fmt::Debug for TimerCoordinator<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerCoordinator")
            .field("phase", &self.phase)
            .field("session_active", &self.session_active)
            .field("generation", &self.generation)
            .field("warning_deadline", &self.warning_deadline)
            .field("logout_deadline", &self.logout_deadline)
            .field("countdown_remaining", &self.countdown_remaining)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::Cell;
    use std::rc::Rc;

    const fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    const fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    type Coordinator = TimerCoordinator<ManualScheduler, Box<dyn FnMut(SessionGeneration)>>;

    fn coordinator() -> Result<(Coordinator, Rc<Cell<u32>>)> {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let handler: Box<dyn FnMut(SessionGeneration)> =
            Box::new(move |_: SessionGeneration| counter.set(counter.get() + 1));
        let coordinator =
            TimerCoordinator::new(InactivityConfig::default(), ManualScheduler::new(), handler)?;
        Ok((coordinator, fired))
    }

    fn pending(coordinator: &Coordinator) -> (usize, usize) {
        (
            coordinator.scheduler().pending_count(TimerKind::Warning),
            coordinator.scheduler().pending_count(TimerKind::Countdown),
        )
    }

    #[test]
    fn starts_idle_with_nothing_scheduled() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        assert_eq!(coordinator.state(), TimerState::idle());
        assert!(!coordinator.reset(), "no session, reset is a no-op");
        coordinator.advance(mins(60));
        assert!(coordinator.scheduler().is_empty());
        assert_eq!(fired.get(), 0);
        Ok(())
    }

    #[test]
    fn repeated_resets_keep_single_pending_timer() -> Result<()> {
        let (mut coordinator, _) = coordinator()?;
        coordinator.on_session_start();
        for step in 0..50 {
            coordinator.advance(secs(7));
            assert!(coordinator.reset());
            assert_eq!(pending(&coordinator), (1, 0), "step {step}");
        }
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        Ok(())
    }

    #[test]
    fn warning_at_29_minutes_then_single_termination_at_30() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        let start = coordinator.scheduler().at(Duration::ZERO);

        coordinator.advance_to(mins(29) - secs(1));
        assert_eq!(coordinator.phase(), Phase::Monitoring);

        coordinator.advance_to(mins(29));
        let state = coordinator.state();
        assert_eq!(state.phase, Phase::Warning);
        assert_eq!(state.countdown_remaining, Some(60));
        assert_eq!(state.warning_deadline, Some(start + mins(29)));
        assert_eq!(state.logout_deadline, Some(start + mins(30)));
        assert_eq!(pending(&coordinator), (0, 1));

        coordinator.advance_to(mins(29) + secs(1));
        assert_eq!(coordinator.state().countdown_remaining, Some(59));
        coordinator.advance_to(mins(29) + secs(59));
        assert_eq!(coordinator.state().countdown_remaining, Some(1));
        assert_eq!(fired.get(), 0);

        coordinator.advance_to(mins(30));
        assert_eq!(coordinator.phase(), Phase::Expired);
        assert_eq!(coordinator.state().countdown_remaining, None);
        assert_eq!(fired.get(), 1);
        assert!(coordinator.scheduler().is_empty());

        coordinator.advance(mins(120));
        assert_eq!(fired.get(), 1, "termination fires exactly once");
        Ok(())
    }

    #[test]
    fn activity_reset_during_warning_rearms_from_now() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        coordinator.advance_to(mins(29));
        assert_eq!(coordinator.phase(), Phase::Warning);

        coordinator.advance_to(mins(29) + secs(15));
        assert!(coordinator.reset());
        let state = coordinator.state();
        assert_eq!(state.phase, Phase::Monitoring);
        assert_eq!(state.countdown_remaining, None);
        let expected_warning = coordinator.scheduler().at(mins(58) + secs(15));
        assert_eq!(state.warning_deadline, Some(expected_warning));
        assert_eq!(pending(&coordinator), (1, 0));

        coordinator.advance_to(mins(58) + secs(14));
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        coordinator.advance_to(mins(58) + secs(15));
        assert_eq!(coordinator.phase(), Phase::Warning);
        assert_eq!(fired.get(), 0);
        Ok(())
    }

    #[test]
    fn dismiss_only_acts_during_warning() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        assert!(!coordinator.dismiss());
        coordinator.on_session_start();
        let before = coordinator.state();
        coordinator.advance(secs(30));
        assert!(!coordinator.dismiss());
        assert_eq!(coordinator.state(), before, "dismiss outside warning is a no-op");

        coordinator.advance_to(mins(29) + secs(40));
        assert!(coordinator.dismiss());
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        coordinator.advance_to(mins(31));
        assert_eq!(fired.get(), 0);
        Ok(())
    }

    #[test]
    fn stale_delivery_after_cancel_has_no_effect() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        coordinator.advance_to(mins(29) + secs(59));

        // The final countdown step is already in flight when the user dismisses.
        let target = coordinator.scheduler().at(mins(30));
        let in_flight = coordinator.scheduler_mut().pop_due(target);
        assert!(matches!(in_flight, Some((_, TimerKind::Countdown))));
        assert!(coordinator.dismiss());

        if let Some((id, _)) = in_flight {
            assert!(!coordinator.on_timer(id));
        }
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        assert_eq!(fired.get(), 0);
        Ok(())
    }

    #[test]
    fn late_warning_delivery_expires_immediately() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();

        // Suspended past both deadlines: the warning arrives at 45:00.
        let suspended_until = coordinator.scheduler().at(mins(45));
        coordinator.scheduler_mut().set_now(suspended_until);
        let due = coordinator.scheduler_mut().pop_due(suspended_until);
        coordinator.scheduler_mut().set_now(suspended_until);
        if let Some((id, kind)) = due {
            assert_eq!(kind, TimerKind::Warning);
            assert!(coordinator.on_timer(id));
        }
        assert_eq!(coordinator.phase(), Phase::Expired);
        assert_eq!(fired.get(), 1);
        Ok(())
    }

    #[test]
    fn jittered_tick_does_not_drift_the_deadline() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        coordinator.advance_to(mins(29));

        // The first tick is delivered 20.5 seconds late.
        let late = coordinator.scheduler().at(mins(29) + Duration::from_millis(20_500));
        let due = coordinator.scheduler_mut().pop_due(late);
        coordinator.scheduler_mut().set_now(late);
        if let Some((id, _)) = due {
            assert!(coordinator.on_timer(id));
        }
        assert_eq!(coordinator.state().countdown_remaining, Some(40));
        let next = coordinator.scheduler().pending_deadline(TimerKind::Countdown);
        assert_eq!(next, Some(coordinator.scheduler().at(mins(29) + secs(21))));

        coordinator.advance_to(mins(30) - Duration::from_millis(1));
        assert_eq!(fired.get(), 0);
        coordinator.advance_to(mins(30));
        assert_eq!(fired.get(), 1);
        Ok(())
    }

    #[test]
    fn reset_after_expiry_does_not_revive() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        coordinator.advance_to(mins(30));
        assert_eq!(coordinator.phase(), Phase::Expired);
        assert!(!coordinator.reset());
        assert!(!coordinator.dismiss());
        assert!(coordinator.scheduler().is_empty());

        coordinator.on_session_end();
        assert_eq!(coordinator.state(), TimerState::idle());

        coordinator.on_session_start();
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        coordinator.advance(mins(30));
        assert_eq!(fired.get(), 2, "each idle episode terminates once");
        Ok(())
    }

    #[test]
    fn acknowledgement_only_ends_the_expired_generation() -> Result<()> {
        let terminated = Rc::new(Cell::new(None));
        let seen = terminated.clone();
        let mut coordinator = TimerCoordinator::new(
            InactivityConfig::default(),
            ManualScheduler::new(),
            move |generation: SessionGeneration| seen.set(Some(generation)),
        )?;

        let first = coordinator.on_session_start();
        coordinator.advance_to(mins(30));
        assert_eq!(coordinator.phase(), Phase::Expired);
        assert_eq!(terminated.get(), Some(first));

        // Signed in again before the first sign-out reported back.
        let second = coordinator.on_session_start();
        assert_ne!(first, second);
        assert_eq!(coordinator.phase(), Phase::Monitoring);

        assert!(!coordinator.acknowledge_termination(first));
        assert_eq!(coordinator.phase(), Phase::Monitoring);
        assert_eq!(coordinator.scheduler().pending_count(TimerKind::Warning), 1);

        assert!(!coordinator.acknowledge_termination(second), "not expired yet");
        coordinator.advance(mins(30));
        assert_eq!(terminated.get(), Some(second));
        assert!(coordinator.acknowledge_termination(second));
        assert_eq!(coordinator.state(), TimerState::idle());
        Ok(())
    }

    #[test]
    fn session_end_cancels_everything() -> Result<()> {
        let (mut coordinator, fired) = coordinator()?;
        coordinator.on_session_start();
        coordinator.advance_to(mins(29) + secs(30));
        coordinator.on_session_end();
        assert_eq!(coordinator.state(), TimerState::idle());
        assert!(coordinator.scheduler().is_empty());
        coordinator.advance(mins(60));
        assert_eq!(fired.get(), 0);
        Ok(())
    }

    #[test]
    fn custom_countdown_is_the_only_trigger() -> Result<()> {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let config = InactivityConfig::new()
            .with_warning_offset(secs(10))
            .with_countdown(secs(5))
            .with_logout_offset(secs(15));
        let mut coordinator = TimerCoordinator::new(config, ManualScheduler::new(), move |_: SessionGeneration| {
            counter.set(counter.get() + 1);
        })?;
        coordinator.on_session_start();
        coordinator.advance_to(secs(10));
        assert_eq!(coordinator.state().countdown_remaining, Some(5));
        coordinator.advance_to(secs(15));
        assert_eq!(coordinator.phase(), Phase::Expired);
        assert_eq!(fired.get(), 1);
        assert!(coordinator.scheduler().now() >= coordinator.scheduler().at(secs(15)));
        Ok(())
    }

    #[test]
    fn rejects_invalid_config() {
        let config = InactivityConfig::new().with_countdown(secs(10));
        let result = TimerCoordinator::new(config, ManualScheduler::new(), |_: SessionGeneration| {});
        assert!(matches!(
            result,
            Err(ConfigError::InconsistentLogoutOffset { .. })
        ));
    }
}
