use thiserror::Error;

use cl_types::{EvaluationError, ProblemError, TrialError};

/// Errors surfaced by the algorithm schedule.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule is not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Algorithm run terminated: {0}")]
    RunTerminated(RunTermination),

    #[error("Problem error: {0}")]
    Problem(#[from] ProblemError),

    #[error("Trial error: {0}")]
    Trial(#[from] TrialError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl ScheduleError {
    /// The termination signal carried by this error, if any.
    pub fn termination(&self) -> Option<RunTermination> {
        match self {
            Self::RunTerminated(termination) => Some(*termination),
            _ => None,
        }
    }
}

/// Signals that an algorithm must end its current turn.
///
/// Returned from `AlgorithmRun::evaluate_trial_point`; algorithms propagate
/// it with `?` out of `perform_run`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTermination {
    /// The stopper fired; the whole run is over.
    #[error("stop requested")]
    StopRequested,

    /// The turn's evaluation budget is spent; the run continues.
    #[error("evaluation budget exhausted")]
    BudgetExhausted,
}

impl From<RunTermination> for ScheduleError {
    fn from(termination: RunTermination) -> Self {
        Self::RunTerminated(termination)
    }
}
