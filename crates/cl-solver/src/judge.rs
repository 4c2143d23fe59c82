//! Solution judges decide which trials are optimal.

use cl_types::Trial;

pub trait SolutionJudge: Send {
    /// Consider `trial`; returns it when it is a new optimum.
    fn judge(&mut self, trial: &Trial) -> Option<Trial>;

    /// Current optimal solutions, best first.
    fn optimal_solutions(&self) -> &[Trial];

    fn reset(&mut self);
}

/// Keeps the single best trial under a ranking function. Only strictly
/// better trials replace it; vetoed trials never qualify.
#[derive(Debug, Clone, Default)]
struct BestTrial {
    best: Vec<Trial>,
}

impl BestTrial {
    fn consider(&mut self, trial: &Trial, rank: fn(&Trial) -> f64) -> Option<Trial> {
        if !trial.is_scored() {
            return None;
        }
        let improves = self
            .best
            .first()
            .map_or(true, |current| rank(trial) > rank(current));
        if !improves {
            return None;
        }
        self.best = vec![trial.clone()];
        Some(trial.clone())
    }
}

/// Ranks trials by their overall (mean) satisfaction.
#[derive(Debug, Clone, Default)]
pub struct SatisfactionJudge {
    state: BestTrial,
}

impl SatisfactionJudge {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SolutionJudge for SatisfactionJudge {
    fn judge(&mut self, trial: &Trial) -> Option<Trial> {
        self.state.consider(trial, Trial::satisfaction)
    }

    fn optimal_solutions(&self) -> &[Trial] {
        &self.state.best
    }

    fn reset(&mut self) {
        self.state.best.clear();
    }
}

/// Ranks trials by their least satisfied objective.
#[derive(Debug, Clone, Default)]
pub struct WorstObjectiveJudge {
    state: BestTrial,
}

impl WorstObjectiveJudge {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SolutionJudge for WorstObjectiveJudge {
    fn judge(&mut self, trial: &Trial) -> Option<Trial> {
        self.state.consider(trial, Trial::worst_satisfaction)
    }

    fn optimal_solutions(&self) -> &[Trial] {
        &self.state.best
    }

    fn reset(&mut self) {
        self.state.best.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{echo_problem, evaluated};
    use cl_types::Objective;

    #[test]
    fn strictly_better_replaces() {
        let problem = echo_problem();
        let mut judge = SatisfactionJudge::new();

        let first = evaluated(&problem, 5.0, None);
        assert_eq!(judge.judge(&first).unwrap().id(), first.id());

        let worse = evaluated(&problem, 6.0, None);
        assert!(judge.judge(&worse).is_none());

        let tie = evaluated(&problem, 1.0, None);
        assert!(judge.judge(&tie).is_none());

        let better = evaluated(&problem, 3.5, None);
        assert!(judge.judge(&better).is_some());
        assert_eq!(judge.optimal_solutions().len(), 1);
        assert_eq!(judge.optimal_solutions()[0].id(), better.id());

        judge.reset();
        assert!(judge.optimal_solutions().is_empty());
    }

    #[test]
    fn vetoed_trials_are_never_optimal() {
        let mut problem = echo_problem();
        problem.add_constraint_fn("x <= 7", |trial| {
            let x = trial.point().value("x")?;
            (x > 7.0).then(|| "too large".to_string())
        });
        let mut judge = SatisfactionJudge::new();
        let vetoed = evaluated(&problem, 8.0, None);
        assert!(vetoed.is_vetoed());
        assert!(judge.judge(&vetoed).is_none());
        assert!(judge.optimal_solutions().is_empty());
    }

    #[test]
    fn worst_objective_ranking() {
        let mut problem = echo_problem();
        problem
            .add_objective(Objective::target("far", 10.0, 1.0))
            .unwrap();
        let mut mean = SatisfactionJudge::new();
        let mut worst = WorstObjectiveJudge::new();

        // x = 3: distance 1.0, far 1/8 -> mean 0.5625, worst 0.125.
        // x = 6: distance 0.25, far 0.2 -> mean 0.225, worst 0.2.
        let near_target = evaluated(&problem, 3.0, None);
        let balanced = evaluated(&problem, 6.0, None);

        assert!(mean.judge(&near_target).is_some());
        assert!(mean.judge(&balanced).is_none());

        assert!(worst.judge(&near_target).is_some());
        assert!(worst.judge(&balanced).is_some());
        assert_eq!(worst.optimal_solutions()[0].id(), balanced.id());
    }
}
