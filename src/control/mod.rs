//! Run control protocol and the asynchronous engine.
//!
//! The engine owns its queue and run state behind an explicit object (no
//! globals); any number of engines can coexist. A host communicates with an
//! engine exclusively through messages: [`Command::Interprete`] starts a
//! run, [`Command::UpdateRequestedProgress`] moves the target without
//! restarting, and the engine emits one [`Event::Results`] per drain pass.
//! The engine task yields to the executor between passes, which is what
//! keeps evaluation cooperative and non-blocking.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::program::DescriptionSet;
use crate::runtime::domain::{Domain, OperationTable};
use crate::runtime::error::{EngineError, EngineResult};
use crate::runtime::scheduler::{Run, Snapshot};
use crate::runtime::EngineConfig;

/// Host → engine control messages.
#[derive(Debug)]
pub enum Command<G> {
    /// Submit descriptions and start a new run.
    Interprete {
        /// The program to interpret.
        descriptions: DescriptionSet,
        /// Progress target the run should reach before suspending.
        requested_progress: G,
    },
    /// Adjust the progress target; wakes a suspended run.
    UpdateRequestedProgress {
        /// The new target.
        requested_progress: G,
    },
}

/// Engine → host messages.
#[derive(Debug)]
pub enum Event<P> {
    /// Snapshot of all pending values, emitted once per drain pass.
    Results(Snapshot<P>),
    /// A fatal error terminated the run.
    Failed(EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Active,
}

/// Handle to a spawned engine task.
///
/// Dropping the handle closes the command channel; the engine task finishes
/// its current pass and terminates.
pub struct Engine<D: Domain> {
    commands: mpsc::UnboundedSender<Command<D::Progress>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl<D> Engine<D>
where
    D: Domain + Send + Sync + 'static,
    D::Payload: Send + 'static,
    D::Progress: Send + 'static,
{
    /// Spawn an engine task on the current tokio runtime.
    ///
    /// Returns the control handle and the stream of outbound events.
    pub fn spawn(
        domain: D,
        operations: OperationTable<D::Payload>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Event<D::Payload>>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let lifecycle = Arc::new(Mutex::new(Lifecycle::Idle));

        tokio::spawn(engine_task(
            Arc::new(domain),
            Arc::new(operations),
            config,
            Arc::clone(&lifecycle),
            command_rx,
            event_tx,
        ));

        (
            Self {
                commands: command_tx,
                lifecycle,
            },
            event_rx,
        )
    }

    /// Start a new run. Errors if a run is already active on this engine.
    pub fn interprete(
        &self,
        descriptions: DescriptionSet,
        requested_progress: D::Progress,
    ) -> EngineResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Active {
                return Err(EngineError::AlreadyRunning);
            }
            *lifecycle = Lifecycle::Active;
        }
        self.commands
            .send(Command::Interprete {
                descriptions,
                requested_progress,
            })
            .map_err(|_| {
                // The task is gone; nothing is running.
                *self.lifecycle.lock() = Lifecycle::Idle;
                EngineError::Terminated
            })
    }

    /// Change the requested progress of the active run, resuming it if it
    /// was suspended. Errors if no run is active.
    pub fn update_requested_progress(&self, requested_progress: D::Progress) -> EngineResult<()> {
        if *self.lifecycle.lock() == Lifecycle::Idle {
            return Err(EngineError::NotStarted);
        }
        self.commands
            .send(Command::UpdateRequestedProgress { requested_progress })
            .map_err(|_| {
                *self.lifecycle.lock() = Lifecycle::Idle;
                EngineError::Terminated
            })
    }

    /// Whether a run is currently active (running or suspended).
    pub fn is_active(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Active
    }
}

async fn engine_task<D>(
    domain: Arc<D>,
    operations: Arc<OperationTable<D::Payload>>,
    config: EngineConfig,
    lifecycle: Arc<Mutex<Lifecycle>>,
    mut commands: mpsc::UnboundedReceiver<Command<D::Progress>>,
    events: mpsc::UnboundedSender<Event<D::Payload>>,
) where
    D: Domain + Send + Sync + 'static,
    D::Payload: Send + 'static,
    D::Progress: Send + 'static,
{
    let mut active: Option<(Run<D>, D::Progress)> = None;

    'task: loop {
        let Some((run, requested)) = active.as_mut() else {
            // Idle: block on the next command.
            let Some(command) = commands.recv().await else {
                break 'task;
            };
            match command {
                Command::Interprete {
                    descriptions,
                    requested_progress,
                } => {
                    tracing::debug!("starting run");
                    match Run::new(
                        Arc::clone(&domain),
                        Arc::clone(&operations),
                        Arc::new(descriptions),
                        config.clone(),
                    ) {
                        Ok(run) => active = Some((run, requested_progress)),
                        Err(error) => {
                            let _ = events.send(Event::Failed(error.into()));
                            *lifecycle.lock() = Lifecycle::Idle;
                        }
                    }
                }
                Command::UpdateRequestedProgress { .. } => {
                    // The handle guards against this; a message that raced a
                    // run's completion is surfaced, not silently dropped.
                    let _ = events.send(Event::Failed(EngineError::NotStarted));
                }
            }
            continue;
        };

        match run.drain_pass() {
            Err(error) => {
                tracing::warn!(%error, "run failed");
                let _ = events.send(Event::Failed(error.into()));
                active = None;
                *lifecycle.lock() = Lifecycle::Idle;
            }
            Ok(snapshot) => {
                let is_final = snapshot.is_final;
                if events.send(Event::Results(snapshot)).is_err() {
                    // Host is gone.
                    break 'task;
                }
                if is_final {
                    tracing::debug!("run complete");
                    active = None;
                    *lifecycle.lock() = Lifecycle::Idle;
                    continue;
                }

                let suspend = match run.current_progress() {
                    Some(current) => domain.should_wait(&current, requested),
                    None => false,
                };
                if suspend {
                    // Suspended: stay parked until the host moves the target.
                    let Some(command) = commands.recv().await else {
                        break 'task;
                    };
                    apply_command(command, requested, &events);
                } else {
                    // Absorb pending updates, then hand control back to the
                    // executor before the next pass.
                    loop {
                        match commands.try_recv() {
                            Ok(command) => apply_command(command, requested, &events),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => break 'task,
                        }
                    }
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    // Whatever path ended the task, nothing is running anymore. Close the
    // command channel first so no send can slip in after the flag clears.
    drop(commands);
    *lifecycle.lock() = Lifecycle::Idle;
}

fn apply_command<P, G>(
    command: Command<G>,
    requested: &mut G,
    events: &mpsc::UnboundedSender<Event<P>>,
) {
    match command {
        Command::UpdateRequestedProgress { requested_progress } => {
            *requested = requested_progress;
        }
        Command::Interprete { .. } => {
            // The handle guards against this while a run is active.
            let _ = events.send(Event::Failed(EngineError::AlreadyRunning));
        }
    }
}
