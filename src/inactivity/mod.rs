//! Client-side inactivity logout.
//!
//! [`ActivityMonitor`] relays user interaction into a [`TimerCoordinator`],
//! which warns at 29 minutes of inactivity, counts down for 60 seconds and
//! then invokes its termination handler exactly once. The coordinator is
//! runtime agnostic: [`ManualScheduler`] drives it deterministically in tests,
//! [`driver::spawn`] runs it on a tokio task.

pub mod activity;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod scheduler;

pub use activity::{ActivityEvent, ActivityKind, ActivityMonitor, Relay};
pub use config::{ConfigError, InactivityConfig};
pub use coordinator::{
    Phase, SessionGeneration, TerminationHandler, TimerCoordinator, TimerState,
};
pub use driver::{DriverInput, InactivityHandle};
pub use scheduler::{Clock, ManualScheduler, Scheduler, TimerId, TimerKind, TokioScheduler};
