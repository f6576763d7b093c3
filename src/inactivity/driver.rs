//! Runs a coordinator on a tokio task.
//!
//! The task is the single scheduling context: inputs and timer expirations are
//! drained from channels one at a time, so no two transitions ever overlap.
//! After every step the current [`TimerState`] is published on a watch
//! channel for whatever renders the warning prompt.

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, instrument};

use super::{
    activity::{ActivityEvent, ActivityKind, ActivityMonitor},
    config::{ConfigError, InactivityConfig},
    coordinator::{SessionGeneration, TerminationHandler, TimerCoordinator, TimerState},
    scheduler::{Clock, TimerId, TokioScheduler},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverInput {
    Activity(ActivityKind),
    Dismiss,
    SessionStarted,
    /// Explicit sign-out; ends whatever session is current.
    SessionEnded,
    /// The termination handler for this generation finished signing out.
    TerminationAcknowledged(SessionGeneration),
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct InactivityHandle {
    inputs: mpsc::UnboundedSender<DriverInput>,
    state: watch::Receiver<TimerState>,
}

impl InactivityHandle {
    /// Returns `false` once the driver has stopped.
    pub fn send(&self, input: DriverInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn activity(&self, kind: ActivityKind) -> bool {
        self.send(DriverInput::Activity(kind))
    }

    pub fn dismiss(&self) -> bool {
        self.send(DriverInput::Dismiss)
    }

    pub fn session_started(&self) -> bool {
        self.send(DriverInput::SessionStarted)
    }

    pub fn session_ended(&self) -> bool {
        self.send(DriverInput::SessionEnded)
    }

    pub fn acknowledge_termination(&self, generation: SessionGeneration) -> bool {
        self.send(DriverInput::TerminationAcknowledged(generation))
    }

    pub fn shutdown(&self) -> bool {
        self.send(DriverInput::Shutdown)
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.clone()
    }
}

/// Spawn the driver task.
///
/// `make_handler` receives a handle so the termination handler can
/// acknowledge its generation once its sign-out has completed.
///
/// # Errors
/// Returns an error if the configuration is inconsistent.
pub fn spawn<F, H>(
    config: InactivityConfig,
    make_handler: F,
) -> Result<(InactivityHandle, JoinHandle<()>), ConfigError>
where
    F: FnOnce(InactivityHandle) -> H,
    H: TerminationHandler + Send + 'static,
{
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (expiration_tx, expiration_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(TimerState::idle());

    let handle = InactivityHandle {
        inputs: input_tx,
        state: state_rx,
    };
    let monitor = ActivityMonitor::new(&config);
    let coordinator = TimerCoordinator::new(
        config,
        TokioScheduler::new(expiration_tx),
        make_handler(handle.clone()),
    )?;

    let task = tokio::spawn(run(coordinator, monitor, input_rx, expiration_rx, state_tx));
    Ok((handle, task))
}

#[instrument(skip_all)]
async fn run<H: TerminationHandler>(
    mut coordinator: TimerCoordinator<TokioScheduler, H>,
    monitor: ActivityMonitor,
    mut inputs: mpsc::UnboundedReceiver<DriverInput>,
    mut expirations: mpsc::UnboundedReceiver<TimerId>,
    state: watch::Sender<TimerState>,
) {
    loop {
        tokio::select! {
            input = inputs.recv() => match input {
                None | Some(DriverInput::Shutdown) => break,
                Some(DriverInput::Activity(kind)) => {
                    let event = ActivityEvent::new(kind, coordinator.scheduler().now());
                    let relay = monitor.relay(&mut coordinator, event);
                    debug!(%kind, ?relay, "Activity");
                }
                Some(DriverInput::Dismiss) => {
                    coordinator.dismiss();
                }
                Some(DriverInput::SessionStarted) => {
                    let generation = coordinator.on_session_start();
                    debug!(generation = generation.get(), "Session started");
                }
                Some(DriverInput::SessionEnded) => coordinator.on_session_end(),
                Some(DriverInput::TerminationAcknowledged(generation)) => {
                    coordinator.acknowledge_termination(generation);
                }
            },
            Some(id) = expirations.recv() => {
                coordinator.on_timer(id);
            }
        }
        state.send_replace(coordinator.state());
    }
    coordinator.on_session_end();
    state.send_replace(coordinator.state());
    debug!("Inactivity driver stopped");
}
