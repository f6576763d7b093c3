//! Clock and deadline scheduler abstractions.
//!
//! Timers are scheduled against absolute deadlines, never relative delays, so
//! late delivery (a suspended tab, a busy runtime) does not push later
//! deadlines out.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cancellation handle for a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires when the warning deadline is reached.
    Warning,
    /// Countdown step; the last one lands on the logout deadline.
    Countdown,
}

pub trait Clock {
    fn now(&self) -> Instant;
}

pub trait Scheduler: Clock {
    /// Deliver `TimerId` back to the owner once `deadline` has passed.
    fn schedule_at(&mut self, deadline: Instant, kind: TimerKind) -> TimerId;

    /// Cancelling an unknown or already delivered id is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Virtual clock for deterministic tests and simulations.
///
/// Time only moves when the owner asks it to; due timers are handed out in
/// deadline order by `pop_due`.
#[derive(Debug)]
pub struct ManualScheduler {
    origin: Instant,
    now: Instant,
    next_id: u64,
    pending: BTreeMap<(Instant, TimerId), TimerKind>,
    deadlines: HashMap<TimerId, Instant>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            now: origin,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Virtual time elapsed since construction.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.origin)
    }

    /// Absolute instant for an offset from construction.
    #[must_use]
    pub fn at(&self, offset: Duration) -> Instant {
        self.origin + offset
    }

    /// Move the clock forward. Moving backwards is ignored.
    pub fn set_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Remove and return the earliest timer due at or before `until`, moving
    /// the clock to its deadline.
    pub fn pop_due(&mut self, until: Instant) -> Option<(TimerId, TimerKind)> {
        let (&(deadline, id), _) = self.pending.first_key_value()?;
        if deadline > until {
            return None;
        }
        let kind = self.pending.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        self.set_now(deadline);
        Some((id, kind))
    }

    #[must_use]
    pub fn pending_count(&self, kind: TimerKind) -> usize {
        self.pending.values().filter(|pending| **pending == kind).count()
    }

    #[must_use]
    pub fn pending_deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.pending
            .iter()
            .find(|(_, pending)| **pending == kind)
            .map(|((deadline, _), _)| *deadline)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualScheduler {
    fn now(&self) -> Instant {
        self.now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_at(&mut self, deadline: Instant, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert((deadline, id), kind);
        self.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(deadline) = self.deadlines.remove(&id) {
            self.pending.remove(&(deadline, id));
        }
    }
}

/// Runtime scheduler: one `sleep_until` task per timer, expirations are sent
/// back over a channel to the single task that owns the coordinator.
#[derive(Debug)]
pub struct TokioScheduler {
    expirations: mpsc::UnboundedSender<TimerId>,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(expirations: mpsc::UnboundedSender<TimerId>) -> Self {
        Self {
            expirations,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl Clock for TokioScheduler {
    fn now(&self) -> Instant {
        // tokio's clock honours paused time in tests.
        tokio::time::Instant::now().into_std()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_at(&mut self, deadline: Instant, _kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let expirations = self.expirations.clone();
        let deadline = tokio::time::Instant::from_std(deadline);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The receiver is gone only when the driver has shut down.
            let _ = expirations.send(id);
        });
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
