//! Termination predicates.
//!
//! A stopper is consulted before every turn and before every evaluation, so
//! it should be cheap. Any `Fn(&ScoreBoard) -> bool` closure is a stopper.

use std::fmt;
use std::time::Duration;

use crate::scoreboard::ScoreBoard;

pub trait Stopper: Send + Sync {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool;
}

impl<F> Stopper for F
where
    F: Fn(&ScoreBoard) -> bool + Send + Sync,
{
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        self(scoreboard)
    }
}

/// Stop once `limit` trials have been evaluated (vetoed ones included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxEvaluations(pub usize);

impl Stopper for MaxEvaluations {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        scoreboard.evaluations() >= self.0
    }
}

/// Stop after `limit` completed algorithm turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAlgorithmRuns(pub usize);

impl Stopper for MaxAlgorithmRuns {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        scoreboard.algorithm_runs() >= self.0
    }
}

/// Stop once the run has lasted `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxElapsed(pub Duration);

impl MaxElapsed {
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs.max(0.0)))
    }
}

impl Stopper for MaxElapsed {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        scoreboard.elapsed() >= self.0
    }
}

/// Stop once the best solution reaches the target satisfaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinSatisfaction(pub f64);

impl Stopper for MinSatisfaction {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        scoreboard.best_solution().is_some() && scoreboard.satisfaction() >= self.0
    }
}

/// Stop at `max_evaluations` or as soon as `satisfaction` is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxEvaluationsSatisfaction {
    pub max_evaluations: usize,
    pub satisfaction: f64,
}

impl Stopper for MaxEvaluationsSatisfaction {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        MaxEvaluations(self.max_evaluations).should_stop(scoreboard)
            || MinSatisfaction(self.satisfaction).should_stop(scoreboard)
    }
}

/// Run for at least `min_time`; after that stop once `satisfaction` is
/// reached, and stop unconditionally at `max_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxTimeSatisfaction {
    pub min_time: Duration,
    pub max_time: Duration,
    pub satisfaction: f64,
}

impl MinMaxTimeSatisfaction {
    pub fn from_secs_f64(min_secs: f64, max_secs: f64, satisfaction: f64) -> Self {
        Self {
            min_time: Duration::from_secs_f64(min_secs.max(0.0)),
            max_time: Duration::from_secs_f64(max_secs.max(0.0)),
            satisfaction,
        }
    }
}

impl Stopper for MinMaxTimeSatisfaction {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        let elapsed = scoreboard.elapsed();
        if elapsed >= self.max_time {
            return true;
        }
        elapsed >= self.min_time && MinSatisfaction(self.satisfaction).should_stop(scoreboard)
    }
}

/// Fires when any member fires.
#[derive(Default)]
pub struct AnyOf {
    stoppers: Vec<Box<dyn Stopper>>,
}

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stopper: impl Stopper + 'static) -> Self {
        self.stoppers.push(Box::new(stopper));
        self
    }

    pub fn push(&mut self, stopper: Box<dyn Stopper>) {
        self.stoppers.push(stopper);
    }

    pub fn len(&self) -> usize {
        self.stoppers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stoppers.is_empty()
    }
}

impl Stopper for AnyOf {
    fn should_stop(&self, scoreboard: &ScoreBoard) -> bool {
        self.stoppers.iter().any(|s| s.should_stop(scoreboard))
    }
}

impl fmt::Debug for AnyOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyOf")
            .field("stoppers", &self.stoppers.len())
            .finish()
    }
}

/// Never fires; the run ends only through an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Stopper for Never {
    fn should_stop(&self, _scoreboard: &ScoreBoard) -> bool {
        false
    }
}

/// Always fires: only the initial trial is evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediately;

impl Stopper for Immediately {
    fn should_stop(&self, _scoreboard: &ScoreBoard) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{echo_problem, evaluated};
    use cl_types::Trial;

    /// Satisfaction is `1 / (1 + |x - 3|)`.
    fn trial_at(x: f64) -> Trial {
        evaluated(&echo_problem(), x, None)
    }

    #[test]
    fn max_evaluations_fires_at_limit() {
        let board = ScoreBoard::new();
        let stopper = MaxEvaluations(2);
        let trial = trial_at(4.0);
        board.record_evaluation(&trial);
        assert!(!stopper.should_stop(&board));
        board.record_evaluation(&trial);
        assert!(stopper.should_stop(&board));
    }

    #[test]
    fn satisfaction_stoppers_need_a_solution() {
        let board = ScoreBoard::new();
        assert!(!MinSatisfaction(0.0).should_stop(&board));

        // x = 4 gives satisfaction 0.5.
        board.record_optimal_solution(&trial_at(4.0), 1);
        assert!(MinSatisfaction(0.5).should_stop(&board));
        assert!(!MinSatisfaction(0.9).should_stop(&board));

        let combined = MaxEvaluationsSatisfaction {
            max_evaluations: 100,
            satisfaction: 0.9,
        };
        assert!(!combined.should_stop(&board));
        board.record_optimal_solution(&trial_at(3.0), 1);
        assert!(combined.should_stop(&board));
    }

    #[test]
    fn min_max_time_respects_minimum() {
        let board = ScoreBoard::new();
        board.record_optimal_solution(&trial_at(3.0), 1);

        let patient = MinMaxTimeSatisfaction::from_secs_f64(3600.0, 7200.0, 0.5);
        assert!(!patient.should_stop(&board));

        let eager = MinMaxTimeSatisfaction::from_secs_f64(0.0, 7200.0, 0.5);
        assert!(eager.should_stop(&board));

        let expired = MinMaxTimeSatisfaction::from_secs_f64(0.0, 0.0, 2.0);
        assert!(expired.should_stop(&board));
    }

    #[test]
    fn composite_and_closures() {
        let board = ScoreBoard::new();
        let any = AnyOf::new().with(Never).with(MaxAlgorithmRuns(1));
        assert_eq!(any.len(), 2);
        assert!(!any.should_stop(&board));
        board.record_algorithm_run();
        assert!(any.should_stop(&board));

        let closure = |board: &ScoreBoard| board.vetoes() > 0;
        assert!(!closure.should_stop(&board));
        board.record_veto();
        assert!(closure.should_stop(&board));

        assert!(Immediately.should_stop(&board));
        assert!(!AnyOf::new().should_stop(&board));
        assert!(MaxElapsed(Duration::ZERO).should_stop(&board));
    }
}
