//! The search algorithm contract.
//!
//! An algorithm proposes trial points during its turn by calling
//! [`AlgorithmRun::evaluate_trial_point`]. It learns about every other trial
//! through the event hooks, which the pool relays synchronously.

use std::sync::Arc;

use cl_types::{Problem, Trial};

use crate::errors::ScheduleError;
use crate::pool::AvailabilityHandle;
use crate::schedule::AlgorithmRun;

/// Default global/local rating of an algorithm (ratings range over 0..=10).
pub const DEFAULT_RATING: u8 = 5;

/// A pluggable search heuristic.
pub trait SearchAlgorithm: Send {
    /// Human-readable label, used in logs and the scoreboard's evaluation log.
    fn label(&self) -> &str;

    /// Called whenever the schedule's problem changes. `reset` follows.
    fn set_problem(&mut self, problem: Arc<Problem>);

    /// Forget all search state gathered so far.
    fn reset(&mut self) {}

    /// Run one turn. Every candidate goes through `run.evaluate_trial_point`;
    /// a `RunTerminated` error from it should be propagated with `?`.
    fn perform_run(&mut self, run: &mut AlgorithmRun<'_>) -> Result<(), ScheduleError>;

    fn min_evaluations_per_run(&self) -> usize {
        1
    }

    fn max_evaluations_per_run(&self) -> usize {
        usize::MAX
    }

    /// How well the algorithm explores the whole domain.
    fn global_rating(&self) -> u8 {
        DEFAULT_RATING
    }

    /// How well the algorithm refines around a known good point.
    fn local_rating(&self) -> u8 {
        DEFAULT_RATING
    }

    /// Receives the handle used to report availability to the pool.
    fn attach(&mut self, _availability: AvailabilityHandle) {}

    fn trial_scored(&mut self, _trial: &Trial) {}

    fn trial_vetoed(&mut self, _trial: &Trial) {}

    fn found_new_optimal_solution(&mut self, _solutions: &[Trial], _solution: &Trial) {}
}

/// A global event relayed to algorithms by the pool.
#[derive(Debug, Clone)]
pub enum AlgorithmEvent {
    TrialScored(Trial),
    TrialVetoed(Trial),
    NewOptimalSolution { solutions: Vec<Trial>, solution: Trial },
}

impl AlgorithmEvent {
    pub(crate) fn deliver(&self, algorithm: &mut dyn SearchAlgorithm) {
        match self {
            Self::TrialScored(trial) => algorithm.trial_scored(trial),
            Self::TrialVetoed(trial) => algorithm.trial_vetoed(trial),
            Self::NewOptimalSolution {
                solutions,
                solution,
            } => algorithm.found_new_optimal_solution(solutions, solution),
        }
    }
}
