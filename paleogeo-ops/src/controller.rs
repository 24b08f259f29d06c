//! Lifecycle controller: runs one operation plan on a background thread.
//!
//! The controller owns the cancellation token and the feedback channel,
//! snapshots parameters through its bound plan source at start time, and
//! forwards exactly one terminal event per accepted start.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use paleogeo_core::{CancelToken, FeedbackChannel, RunResult, RunState};

use crate::error::Result;
use crate::plan::{OperationKind, OperationPlan, StepCtx};

/// First fixed line written when a run is aborted.
pub const ABORT_LINE_1: &str = "The operation did not finish successfully.";
/// Second fixed line written when a run is aborted.
pub const ABORT_LINE_2: &str =
    "It was canceled by the user, or an error occurred. Check the log for details.";

/// Typed engine configuration, passed to the controller at construction.
///
/// Replaces the host's shared settings object: every flag an operation may
/// consult is an explicit field here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether an existing file at the output path is overwritten.
    pub overwrite_outputs: bool,
    /// Directory used when the user leaves the output path empty; the
    /// system temp directory when unset.
    pub default_output_dir: Option<std::path::PathBuf>,
    /// Emit a debug feedback line per step.
    pub verbose_steps: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overwrite_outputs: true,
            default_output_dir: None,
            verbose_steps: false,
        }
    }
}

/// Builds a fresh plan for each accepted start.
///
/// Implementations capture the current parameter form and validate inputs;
/// returning an error rejects the start before any worker is spawned.
pub trait PlanSource: Send {
    /// Captures parameters and builds the step sequence.
    fn build_plan(&mut self) -> Result<OperationPlan>;
}

impl<F> PlanSource for F
where
    F: FnMut() -> Result<OperationPlan> + Send,
{
    fn build_plan(&mut self) -> Result<OperationPlan> {
        self()
    }
}

/// Consumer of successful artifacts (host layer-loading glue).
pub trait ResultConsumer: Send + Sync {
    /// Loads the artifact for display. Returning false means "did not
    /// load"; the controller only logs that, nothing more.
    fn load_artifact(&self, path: &Path) -> bool;
}

/// Default consumer that accepts every artifact without loading anything.
pub struct DiscardArtifacts;

impl ResultConsumer for DiscardArtifacts {
    fn load_artifact(&self, _path: &Path) -> bool {
        true
    }
}

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker was spawned.
    Started,
    /// A run is already active; the request was a no-op.
    AlreadyRunning,
    /// Plan building failed; the run is already terminal (`Failure`).
    Rejected,
}

enum WorkerEvent {
    Finished(RunResult),
    Canceled,
}

enum StepsOutcome {
    Completed,
    Canceled,
    Failed,
}

/// Executes operations one at a time on a background worker thread.
pub struct Controller {
    config: EngineConfig,
    source: Box<dyn PlanSource>,
    consumer: Arc<dyn ResultConsumer>,
    cancel: CancelToken,
    feedback: FeedbackChannel,
    state: RunState,
    current: Option<OperationKind>,
    cancel_requested: bool,
    events: Option<Receiver<WorkerEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl Controller {
    /// Creates a controller bound to a plan source.
    pub fn new(config: EngineConfig, source: impl PlanSource + 'static) -> Self {
        let cancel = CancelToken::new();
        let feedback = FeedbackChannel::new(cancel.clone());
        Self {
            config,
            source: Box::new(source),
            consumer: Arc::new(DiscardArtifacts),
            cancel,
            feedback,
            state: RunState::Idle,
            current: None,
            cancel_requested: false,
            events: None,
            handle: None,
        }
    }

    /// Replaces the result consumer.
    pub fn set_consumer(&mut self, consumer: Arc<dyn ResultConsumer>) {
        self.consumer = consumer;
    }

    /// The controller's feedback channel.
    pub fn feedback(&self) -> &FeedbackChannel {
        &self.feedback
    }

    /// The shared cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True while a worker is executing (as last observed by poll/join).
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Starts a run. No-op while one is active; starting again after a
    /// terminal state re-captures parameters through the plan source.
    pub fn start(&mut self) -> StartOutcome {
        if self.is_running() {
            log::debug!("start ignored: a run is active");
            return StartOutcome::AlreadyRunning;
        }
        // Join the previous worker so the token reset below can never race
        // a live reader.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        self.cancel.reset();
        self.cancel_requested = false;
        self.feedback.reset_progress();

        let mut plan = match self.source.build_plan() {
            Ok(plan) => plan,
            Err(err) => {
                self.feedback.error(err.to_string());
                self.state = RunState::Finished(RunResult::Failure);
                return StartOutcome::Rejected;
            }
        };

        self.current = Some(plan.kind);
        self.feedback
            .info(format!("{} started.", plan.kind.display_name()));
        log::info!("starting {} ({} steps)", plan.kind, plan.len());

        let (tx, rx) = channel();
        let feedback = self.feedback.clone();
        let cancel = self.cancel.clone();
        let verbose = self.config.verbose_steps;
        self.events = Some(rx);
        self.handle = Some(std::thread::spawn(move || {
            worker_main(&mut plan, &feedback, &cancel, &tx, verbose);
        }));
        self.state = RunState::Running;
        StartOutcome::Started
    }

    /// Requests cancellation of the active run. Idempotent no-op when no
    /// run is active: no messages are emitted then.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.cancel_requested = true;
        self.cancel.request_cancel();
        self.emit_abort_lines();
        log::info!("cancellation requested");
    }

    /// Drains pending worker events without blocking.
    pub fn poll(&mut self) -> &RunState {
        if self.is_running() {
            let event = match &self.events {
                Some(rx) => match rx.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
                },
                None => None,
            };
            if let Some(event) = event {
                self.on_finished(event);
            }
        }
        &self.state
    }

    /// Blocks until the active run reaches a terminal state, then returns
    /// it. Returns the current state immediately when no run is active.
    pub fn join(&mut self) -> RunState {
        if self.is_running() {
            let event = self.events.as_ref().and_then(|rx| rx.recv().ok());
            if let Some(event) = event {
                self.on_finished(event);
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
        self.state.clone()
    }

    /// Handles the single terminal event of a run.
    fn on_finished(&mut self, event: WorkerEvent) {
        let name = self
            .current
            .map_or("Operation", OperationKind::display_name);
        match event {
            WorkerEvent::Canceled => {
                // stop() already wrote the abort lines for an explicit
                // cancel; only a token set behind the controller's back
                // still needs them.
                if !self.cancel_requested {
                    self.emit_abort_lines();
                }
                // Cancellation is cooperative: the in-flight step finishes
                // and posts its progress after stop()'s reset. Re-assert
                // the reset now that the worker has stopped writing.
                self.feedback.reset_progress();
                self.state = RunState::Canceled;
            }
            WorkerEvent::Finished(RunResult::Failure) => {
                if !self.cancel_requested {
                    self.emit_abort_lines();
                }
                self.feedback.reset_progress();
                self.state = RunState::Finished(RunResult::Failure);
            }
            WorkerEvent::Finished(RunResult::SuccessNoArtifact) => {
                self.feedback.info(format!("{name} finished successfully."));
                self.state = RunState::Finished(RunResult::SuccessNoArtifact);
            }
            WorkerEvent::Finished(RunResult::Success(path)) => {
                if !self.consumer.load_artifact(&path) {
                    self.feedback
                        .warning(format!("Output {} did not load.", path.display()));
                }
                self.feedback.info(format!("{name} finished successfully."));
                self.state = RunState::Finished(RunResult::Success(path));
            }
        }
    }

    fn emit_abort_lines(&self) {
        self.feedback.error(ABORT_LINE_1);
        self.feedback.error(ABORT_LINE_2);
        self.feedback.reset_progress();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// Worker entry point. Exactly one event is sent per invocation; panics in
/// step bodies are translated into `Failure` instead of crossing the
/// thread boundary unreported.
fn worker_main(
    plan: &mut OperationPlan,
    feedback: &FeedbackChannel,
    cancel: &CancelToken,
    tx: &Sender<WorkerEvent>,
    verbose: bool,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_steps(plan, feedback, cancel, verbose)
    }));
    let event = match outcome {
        Ok(StepsOutcome::Completed) => {
            feedback.set_progress(100.0);
            match plan.artifact.take() {
                Some(path) => WorkerEvent::Finished(RunResult::Success(path)),
                None => WorkerEvent::Finished(RunResult::SuccessNoArtifact),
            }
        }
        Ok(StepsOutcome::Canceled) => WorkerEvent::Canceled,
        Ok(StepsOutcome::Failed) => WorkerEvent::Finished(RunResult::Failure),
        Err(payload) => {
            feedback.error(format!("Unexpected error: {}", panic_text(&payload)));
            WorkerEvent::Finished(RunResult::Failure)
        }
    };
    let _ = tx.send(event);
}

/// Runs the step sequence with cooperative cancellation and progress
/// accounting. The token is checked before every step; essential failures
/// abort, best-effort failures degrade to warnings.
fn run_steps(
    plan: &mut OperationPlan,
    feedback: &FeedbackChannel,
    cancel: &CancelToken,
    verbose: bool,
) -> StepsOutcome {
    let total = plan.total_weight().max(1);
    debug_assert_eq!(plan.total_weight(), 100, "step weights must budget 100");

    let mut done = 0u32;
    for step in plan.steps_mut() {
        if cancel.is_canceled() {
            return StepsOutcome::Canceled;
        }
        if verbose {
            feedback.debug(format!("step: {}", step.label));
        }
        let ctx = StepCtx { feedback, cancel };
        match (step.body)(&ctx) {
            Ok(()) => {}
            Err(err) if step.essential => {
                feedback.error(format!("{}: {err}", step.label));
                return StepsOutcome::Failed;
            }
            Err(err) => {
                feedback.warning(format!("{}: {err}; continuing", step.label));
            }
        }
        done += u32::from(step.weight);
        feedback.set_progress(f64::from(done) / f64::from(total) * 100.0);
    }
    StepsOutcome::Completed
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "worker panicked"
    }
}
