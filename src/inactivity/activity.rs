//! Phase-aware relay from user interaction to the coordinator.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::trace;

use super::{
    config::InactivityConfig,
    coordinator::{Phase, TerminationHandler, TimerCoordinator},
    scheduler::Scheduler,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    PointerPress,
    KeyPress,
    Scroll,
    Click,
}

impl ActivityKind {
    /// Maps DOM-style event names onto activity kinds.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "mousedown" | "pointerdown" | "pointer-press" => Some(Self::PointerPress),
            "keydown" | "key-press" => Some(Self::KeyPress),
            "scroll" => Some(Self::Scroll),
            "click" => Some(Self::Click),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointerPress => "pointer-press",
            Self::KeyPress => "key-press",
            Self::Scroll => "scroll",
            Self::Click => "click",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub at: Instant,
}

impl ActivityEvent {
    #[must_use]
    pub fn new(kind: ActivityKind, at: Instant) -> Self {
        Self { kind, at }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relay {
    /// The coordinator was reset.
    Forwarded,
    /// The warning prompt is up; only an explicit dismissal ends it.
    DroppedDuringWarning,
    /// Unobserved kind, or nothing to reset.
    Ignored,
}

/// Stateless apart from the set of observed kinds, which is fixed at
/// construction.
#[derive(Clone, Debug)]
pub struct ActivityMonitor {
    kinds: Vec<ActivityKind>,
}

impl ActivityMonitor {
    #[must_use]
    pub fn new(config: &InactivityConfig) -> Self {
        Self {
            kinds: config.activity_kinds().to_vec(),
        }
    }

    #[must_use]
    pub fn observes(&self, kind: ActivityKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn relay<S, H>(&self, coordinator: &mut TimerCoordinator<S, H>, event: ActivityEvent) -> Relay
    where
        S: Scheduler,
        H: TerminationHandler,
    {
        if !self.observes(event.kind) {
            return Relay::Ignored;
        }
        if coordinator.phase() == Phase::Warning {
            trace!(kind = %event.kind, "Activity dropped during warning");
            return Relay::DroppedDuringWarning;
        }
        if coordinator.reset() {
            Relay::Forwarded
        } else {
            Relay::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inactivity::{
        coordinator::SessionGeneration,
        scheduler::{Clock, ManualScheduler},
    };
    use anyhow::Result;
    use std::time::Duration;

    #[test]
    fn maps_event_names() {
        assert_eq!(ActivityKind::from_event_name("mousedown"), Some(ActivityKind::PointerPress));
        assert_eq!(ActivityKind::from_event_name("keydown"), Some(ActivityKind::KeyPress));
        assert_eq!(ActivityKind::from_event_name("scroll"), Some(ActivityKind::Scroll));
        assert_eq!(ActivityKind::from_event_name("click"), Some(ActivityKind::Click));
        assert_eq!(ActivityKind::from_event_name("mousemove"), None);
        assert_eq!(ActivityKind::KeyPress.to_string(), "key-press");
    }

    #[test]
    fn activity_resets_while_monitoring() -> Result<()> {
        let config = InactivityConfig::default();
        let monitor = ActivityMonitor::new(&config);
        let mut coordinator =
            TimerCoordinator::new(config, ManualScheduler::new(), |_: SessionGeneration| {})?;
        let event = ActivityEvent::new(ActivityKind::Click, coordinator.scheduler().now());
        assert_eq!(monitor.relay(&mut coordinator, event), Relay::Ignored);

        coordinator.on_session_start();
        coordinator.advance(Duration::from_secs(20 * 60));
        let event = ActivityEvent::new(ActivityKind::Scroll, coordinator.scheduler().now());
        assert_eq!(monitor.relay(&mut coordinator, event), Relay::Forwarded);
        assert_eq!(
            coordinator.state().warning_deadline,
            Some(coordinator.scheduler().at(Duration::from_secs(49 * 60)))
        );
        Ok(())
    }

    #[test]
    fn activity_during_warning_leaves_deadlines_alone() -> Result<()> {
        let config = InactivityConfig::default();
        let monitor = ActivityMonitor::new(&config);
        let mut coordinator =
            TimerCoordinator::new(config, ManualScheduler::new(), |_: SessionGeneration| {})?;
        coordinator.on_session_start();
        coordinator.advance_to(Duration::from_secs(29 * 60 + 10));
        let before = coordinator.state();
        assert_eq!(before.phase, Phase::Warning);

        for kind in [
            ActivityKind::PointerPress,
            ActivityKind::KeyPress,
            ActivityKind::Scroll,
            ActivityKind::Click,
        ] {
            let event = ActivityEvent::new(kind, coordinator.scheduler().now());
            assert_eq!(monitor.relay(&mut coordinator, event), Relay::DroppedDuringWarning);
        }
        assert_eq!(coordinator.state(), before);
        Ok(())
    }

    #[test]
    fn unobserved_kinds_are_ignored() -> Result<()> {
        let config = InactivityConfig::default().with_activity_kinds(vec![ActivityKind::KeyPress]);
        let monitor = ActivityMonitor::new(&config);
        let mut coordinator =
            TimerCoordinator::new(config, ManualScheduler::new(), |_: SessionGeneration| {})?;
        coordinator.on_session_start();
        coordinator.advance(Duration::from_secs(60));
        let before = coordinator.state();
        let event = ActivityEvent::new(ActivityKind::Click, coordinator.scheduler().now());
        assert_eq!(monitor.relay(&mut coordinator, event), Relay::Ignored);
        assert_eq!(coordinator.state(), before);
        Ok(())
    }
}
