//! Independent uniform sampling across the variable bounds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use cl_solver::{AlgorithmRun, ScheduleError, SearchAlgorithm};
use cl_types::{Problem, TrialPoint};

/// Samples every variable uniformly within its bounds. Reproducible for a
/// given seed.
#[derive(Debug)]
pub struct RandomSearch {
    seed: u64,
    rng: StdRng,
    batch: usize,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            batch: 10,
        }
    }

    /// Evaluations requested per turn.
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    pub(crate) fn sample(rng: &mut StdRng, problem: &Problem) -> TrialPoint {
        problem
            .variables()
            .iter()
            .map(|v| (v.name().to_string(), rng.random_range(v.lower()..=v.upper())))
            .collect()
    }
}

impl SearchAlgorithm for RandomSearch {
    fn label(&self) -> &str {
        "Random Search"
    }

    fn set_problem(&mut self, _problem: Arc<Problem>) {}

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn perform_run(&mut self, run: &mut AlgorithmRun<'_>) -> Result<(), ScheduleError> {
        let problem = Arc::clone(run.problem());
        while run.evaluations_left() > 0 {
            let point = Self::sample(&mut self.rng, &problem);
            run.evaluate_trial_point(point)?;
        }
        Ok(())
    }

    fn min_evaluations_per_run(&self) -> usize {
        self.batch
    }

    fn global_rating(&self) -> u8 {
        9
    }

    fn local_rating(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_solver::{AlgorithmSchedule, MaxEvaluations};
    use cl_types::{Objective, Score, Variable};

    fn plane() -> Problem {
        let mut problem = Problem::new();
        problem
            .add_variable(Variable::new("x", 0.0, -1.0, 1.0).unwrap())
            .unwrap();
        problem
            .add_variable(Variable::new("y", 50.0, 10.0, 100.0).unwrap())
            .unwrap();
        problem
            .add_objective(Objective::target("sum", 0.0, 10.0))
            .unwrap();
        problem.set_evaluator_fn(|trial, objectives| {
            let sum: f64 = trial.point().values().values().sum();
            trial.set_score(Score::new(&objectives[0], sum))?;
            Ok(())
        });
        problem
    }

    #[test]
    fn samples_respect_bounds() {
        let problem = plane();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let point = RandomSearch::sample(&mut rng, &problem);
            assert!(problem.new_trial(point, None).is_ok());
        }
    }

    #[test]
    fn same_seed_same_points() {
        let problem = plane();
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            assert_eq!(
                RandomSearch::sample(&mut a, &problem),
                RandomSearch::sample(&mut b, &problem)
            );
        }
    }

    #[test]
    fn fills_its_turns() {
        let mut schedule = AlgorithmSchedule::default();
        schedule.set_problem(plane());
        schedule.set_stopper(Box::new(MaxEvaluations(31)));
        schedule
            .pool()
            .add(Box::new(RandomSearch::new(5).with_batch(10)));

        let summary = schedule.execute().unwrap();
        assert_eq!(summary.evaluations, 31);
        assert_eq!(summary.algorithm_runs, 3);
        assert_eq!(summary.vetoes, 0);
    }
}
