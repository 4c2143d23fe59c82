//! Convenience facade over [`AlgorithmSchedule`].

use std::sync::Arc;

use cl_types::{AlgorithmId, CaliperResult, Problem, Trial};

use crate::algorithm::SearchAlgorithm;
use crate::config::SolverConfig;
use crate::errors::ScheduleError;
use crate::events::{ListenerId, ScheduleListener};
use crate::schedule::{AlgorithmSchedule, RunSummary};
use crate::scoreboard::ScoreBoard;
use crate::stopper::Stopper;

/// Bundles a schedule with the default market and judge.
pub struct Solver {
    schedule: AlgorithmSchedule,
}

impl Solver {
    pub fn new(stopper: Box<dyn Stopper>) -> Self {
        let mut schedule = AlgorithmSchedule::default();
        schedule.set_stopper(stopper);
        Self { schedule }
    }

    pub fn from_config(config: &SolverConfig) -> CaliperResult<Self> {
        let mut schedule = AlgorithmSchedule::new(config.schedule.clone());
        schedule.set_stopper(config.stopper.build()?);
        Ok(Self { schedule })
    }

    pub fn add_algorithm(&mut self, algorithm: Box<dyn SearchAlgorithm>) -> AlgorithmId {
        self.schedule.pool().add(algorithm)
    }

    pub fn set_stopper(&mut self, stopper: Box<dyn Stopper>) {
        self.schedule.set_stopper(stopper);
    }

    pub fn add_listener(&mut self, listener: Box<dyn ScheduleListener>) -> ListenerId {
        self.schedule.add_listener(listener)
    }

    /// Install `problem` (resetting every algorithm) and run to completion.
    pub fn solve(&mut self, problem: impl Into<Arc<Problem>>) -> Result<RunSummary, ScheduleError> {
        self.schedule.set_problem(problem);
        self.schedule.execute()
    }

    pub fn best_solution(&self) -> Option<Trial> {
        self.schedule.scoreboard().best_solution()
    }

    pub fn scoreboard(&self) -> &ScoreBoard {
        self.schedule.scoreboard()
    }

    pub fn schedule(&self) -> &AlgorithmSchedule {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut AlgorithmSchedule {
        &mut self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopperConfig;
    use crate::schedule::{AlgorithmRun, StopReason};
    use crate::testing::echo_problem;

    /// Walks toward 3 in unit steps from wherever the best solution is.
    struct Walker {
        problem: Option<Arc<Problem>>,
        best_x: f64,
    }

    impl SearchAlgorithm for Walker {
        fn label(&self) -> &str {
            "walker"
        }

        fn set_problem(&mut self, problem: Arc<Problem>) {
            self.problem = Some(problem);
        }

        fn reset(&mut self) {
            self.best_x = self
                .problem
                .as_ref()
                .and_then(|p| p.variable("x"))
                .map_or(0.0, |v| v.initial());
        }

        fn perform_run(&mut self, run: &mut AlgorithmRun<'_>) -> Result<(), ScheduleError> {
            let next = if self.best_x > 3.0 {
                self.best_x - 1.0
            } else {
                self.best_x + 1.0
            };
            run.evaluate_trial_point([("x", next)].into_iter().collect())?;
            Ok(())
        }

        fn found_new_optimal_solution(&mut self, _solutions: &[Trial], solution: &Trial) {
            if let Some(x) = solution.point().value("x") {
                self.best_x = x;
            }
        }
    }

    #[test]
    fn solve_reaches_target() {
        let config = SolverConfig {
            stopper: StopperConfig {
                min_satisfaction: Some(1.0),
                max_evaluations: Some(50),
                ..StopperConfig::default()
            },
            ..SolverConfig::default()
        };
        let mut solver = Solver::from_config(&config).unwrap();
        solver.add_algorithm(Box::new(Walker {
            problem: None,
            best_x: 0.0,
        }));

        let summary = solver.solve(echo_problem()).unwrap();
        assert_eq!(summary.reason, StopReason::Stopper);
        // 5 -> 4 -> 3.
        assert_eq!(summary.evaluations, 3);
        let best = solver.best_solution().unwrap();
        assert_eq!(best.point().value("x"), Some(3.0));
        assert_eq!(solver.scoreboard().satisfaction(), 1.0);
    }

    #[test]
    fn solving_again_starts_fresh() {
        let mut solver = Solver::new(Box::new(crate::stopper::MaxEvaluations(4)));
        solver.add_algorithm(Box::new(Walker {
            problem: None,
            best_x: 0.0,
        }));

        let first = solver.solve(echo_problem()).unwrap();
        let second = solver.solve(echo_problem()).unwrap();
        assert_eq!(first.evaluations, 4);
        assert_eq!(second.evaluations, 4);
        assert_eq!(second.optimal_solutions_found, first.optimal_solutions_found);
    }
}
