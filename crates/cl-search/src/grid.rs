//! Exhaustive sweep over an evenly spaced grid.

use std::sync::Arc;
use tracing::debug;

use cl_solver::{AlgorithmRun, AvailabilityHandle, ScheduleError, SearchAlgorithm};
use cl_types::{Problem, TrialPoint};

/// Visits every point of a grid with `steps` evenly spaced values per
/// variable (bounds included), in row-major order with the first variable
/// varying slowest. Withdraws from the pool once the grid is exhausted.
#[derive(Debug)]
pub struct GridSearch {
    steps: usize,
    batch: usize,
    cursor: usize,
    problem: Option<Arc<Problem>>,
    availability: Option<AvailabilityHandle>,
}

impl GridSearch {
    pub fn new(steps: usize) -> Self {
        Self {
            steps: steps.max(2),
            batch: 10,
            cursor: 0,
            problem: None,
            availability: None,
        }
    }

    /// Evaluations requested per turn.
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Number of grid points for the current problem, saturating.
    pub fn grid_size(&self) -> usize {
        let Some(problem) = &self.problem else {
            return 0;
        };
        problem
            .variables()
            .iter()
            .try_fold(1usize, |total, _| total.checked_mul(self.steps))
            .unwrap_or(usize::MAX)
    }

    pub fn remaining(&self) -> usize {
        self.grid_size().saturating_sub(self.cursor)
    }

    fn point_at(&self, problem: &Problem, mut index: usize) -> TrialPoint {
        let last = (self.steps - 1) as f64;
        let mut values = Vec::with_capacity(problem.variables().len());
        for variable in problem.variables().iter().rev() {
            let digit = index % self.steps;
            index /= self.steps;
            let value = variable.lower() + variable.span() * digit as f64 / last;
            values.push((variable.name().to_string(), variable.clamp(value)));
        }
        values.into_iter().collect()
    }

    fn set_available(&self, available: bool) {
        if let Some(handle) = &self.availability {
            handle.set_available(available);
        }
    }
}

impl SearchAlgorithm for GridSearch {
    fn label(&self) -> &str {
        "Grid Search"
    }

    fn set_problem(&mut self, problem: Arc<Problem>) {
        self.problem = Some(problem);
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.set_available(self.grid_size() > 0);
    }

    fn perform_run(&mut self, run: &mut AlgorithmRun<'_>) -> Result<(), ScheduleError> {
        let problem = Arc::clone(run.problem());
        let total = self.grid_size();
        while self.cursor < total {
            let point = self.point_at(&problem, self.cursor);
            run.evaluate_trial_point(point)?;
            self.cursor += 1;
        }
        debug!(points = total, "grid exhausted");
        self.set_available(false);
        Ok(())
    }

    fn min_evaluations_per_run(&self) -> usize {
        self.batch
    }

    fn global_rating(&self) -> u8 {
        6
    }

    fn local_rating(&self) -> u8 {
        2
    }

    fn attach(&mut self, availability: AvailabilityHandle) {
        self.availability = Some(availability);
    }
}
