//! Terminal outcomes and the per-run state machine.

use std::path::PathBuf;

/// Outcome of one completed run. Exactly one is produced per accepted start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    /// The run produced an artifact at the given path.
    Success(PathBuf),
    /// The run finished without producing a file.
    SuccessNoArtifact,
    /// The run aborted on an error.
    Failure,
}

/// State of a controller across one run.
///
/// `Canceled` is reached only through an explicit stop request; a run that
/// errors out internally lands in `Finished(Failure)` so the UI can tell
/// "you canceled" from "something went wrong".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    /// No run has been started, or a new one may begin.
    #[default]
    Idle,
    /// A worker is executing the step sequence.
    Running,
    /// The worker stopped on its own with the given result.
    Finished(RunResult),
    /// The run was stopped by an explicit cancel request.
    Canceled,
}

impl RunState {
    /// True for `Finished(_)` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finished(_) | RunState::Canceled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Finished(RunResult::Success(path)) => {
                write!(f, "finished ({})", path.display())
            }
            RunState::Finished(RunResult::SuccessNoArtifact) => write!(f, "finished"),
            RunState::Finished(RunResult::Failure) => write!(f, "failed"),
            RunState::Canceled => write!(f, "canceled"),
        }
    }
}
