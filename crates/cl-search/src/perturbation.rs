//! Local search that perturbs the best known point inside shrinking windows.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use cl_solver::{AlgorithmRun, AvailabilityHandle, ScheduleError, SearchAlgorithm};
use cl_types::{AlgorithmId, Hint, HintKind, Problem, Trial, TrialPoint};

use crate::random::RandomSearch;

/// Window half-width multiplier applied to the size of an improving step.
const WINDOW_GROWTH: f64 = 3.0;

/// Fraction of the remaining satisfaction gap a foreign solution must close
/// before it is adopted.
const ADOPTION_MARGIN: f64 = 0.25;

/// Smallest window half-width, as a fraction of the variable's span.
const MIN_WINDOW_FRACTION: f64 = 1e-6;

#[derive(Debug, Clone)]
struct Incumbent {
    point: TrialPoint,
    satisfaction: f64,
}

/// Perturbs the incumbent point one or more variables at a time.
///
/// Each variable is redrawn with probability `1/n` (at least one always
/// changes) from a window around its incumbent value. Every improvement
/// recentres the window on the new value with a half-width of three times
/// the step that produced it. A fraction of draws sample the whole domain
/// instead.
#[derive(Debug)]
pub struct PerturbationSearch {
    seed: u64,
    rng: StdRng,
    batch: usize,
    exploration: f64,
    problem: Option<Arc<Problem>>,
    id: Option<AlgorithmId>,
    incumbent: Option<Incumbent>,
    windows: BTreeMap<String, (f64, f64)>,
}

impl PerturbationSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            batch: 5,
            exploration: 0.1,
            problem: None,
            id: None,
            incumbent: None,
            windows: BTreeMap::new(),
        }
    }

    /// Evaluations requested per turn.
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Probability of sampling the whole domain instead of perturbing.
    pub fn with_exploration(mut self, probability: f64) -> Self {
        self.exploration = probability.clamp(0.0, 1.0);
        self
    }

    /// Current search window for `variable`.
    pub fn window(&self, variable: &str) -> Option<(f64, f64)> {
        self.windows.get(variable).copied()
    }

    pub fn incumbent(&self) -> Option<&TrialPoint> {
        self.incumbent.as_ref().map(|i| &i.point)
    }

    fn initial_windows(problem: &Problem) -> BTreeMap<String, (f64, f64)> {
        let fallback = Hint::initial_delta();
        let hint = problem
            .hint(HintKind::InitialDelta)
            .or_else(|| problem.hint(HintKind::InitialDomain))
            .unwrap_or(&fallback);
        problem
            .variables()
            .iter()
            .map(|v| (v.name().to_string(), hint.range(v)))
            .collect()
    }

    fn perturb(&mut self, problem: &Problem, base: &TrialPoint) -> TrialPoint {
        let variables = problem.variables();
        let n = variables.len();
        if n == 0 {
            return base.clone();
        }
        let forced = self.rng.random_range(0..n);
        let mut point = base.clone();
        for (i, variable) in variables.iter().enumerate() {
            if i != forced && self.rng.random::<f64>() >= 1.0 / n as f64 {
                continue;
            }
            let (low, high) = self
                .windows
                .get(variable.name())
                .copied()
                .unwrap_or((variable.lower(), variable.upper()));
            let value = variable.clamp(self.rng.random_range(low..=high));
            point = point.with_value(variable.name(), value);
        }
        point
    }

    fn next_point(&mut self, problem: &Problem) -> TrialPoint {
        let explore = self.rng.random::<f64>() < self.exploration;
        match self.incumbent.clone() {
            Some(incumbent) if !explore => self.perturb(problem, &incumbent.point),
            _ => RandomSearch::sample(&mut self.rng, problem),
        }
    }

    /// Take `trial` as the new incumbent if it beats the current one,
    /// resizing windows around the variables that moved.
    fn improve(&mut self, trial: &Trial) {
        let Some(problem) = self.problem.clone() else {
            return;
        };
        let satisfaction = trial.satisfaction();
        let previous = match &self.incumbent {
            Some(incumbent) if satisfaction <= incumbent.satisfaction => return,
            Some(incumbent) => Some(incumbent.point.clone()),
            None => None,
        };

        if let Some(previous) = previous {
            for variable in problem.variables() {
                let (Some(new), Some(old)) = (
                    trial.point().value(variable.name()),
                    previous.value(variable.name()),
                ) else {
                    continue;
                };
                let change = (new - old).abs();
                if change == 0.0 {
                    continue;
                }
                let half = (WINDOW_GROWTH * change).max(MIN_WINDOW_FRACTION * variable.span());
                self.windows.insert(
                    variable.name().to_string(),
                    (variable.clamp(new - half), variable.clamp(new + half)),
                );
            }
        }

        debug!(satisfaction, point = %trial.point(), "perturbation incumbent improved");
        self.incumbent = Some(Incumbent {
            point: trial.point().clone(),
            satisfaction,
        });
    }

    /// Jump to a foreign solution that is much better than the incumbent,
    /// carrying the current window sizes over to it.
    fn adopt(&mut self, trial: &Trial) {
        let Some(problem) = self.problem.clone() else {
            return;
        };
        let satisfaction = trial.satisfaction();
        if let Some(incumbent) = &self.incumbent {
            let threshold =
                incumbent.satisfaction + ADOPTION_MARGIN * (1.0 - incumbent.satisfaction);
            if satisfaction <= threshold {
                return;
            }
        }

        for variable in problem.variables() {
            let Some(center) = trial.point().value(variable.name()) else {
                continue;
            };
            let (low, high) = self
                .windows
                .get(variable.name())
                .copied()
                .unwrap_or((variable.lower(), variable.upper()));
            let half = (high - low) / 2.0;
            self.windows.insert(
                variable.name().to_string(),
                (variable.clamp(center - half), variable.clamp(center + half)),
            );
        }

        debug!(satisfaction, point = %trial.point(), "perturbation adopted foreign solution");
        self.incumbent = Some(Incumbent {
            point: trial.point().clone(),
            satisfaction,
        });
    }
}

impl SearchAlgorithm for PerturbationSearch {
    fn label(&self) -> &str {
        "Perturbation Search"
    }

    fn set_problem(&mut self, problem: Arc<Problem>) {
        self.problem = Some(problem);
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.incumbent = None;
        self.windows = self
            .problem
            .as_deref()
            .map(Self::initial_windows)
            .unwrap_or_default();
    }

    fn perform_run(&mut self, run: &mut AlgorithmRun<'_>) -> Result<(), ScheduleError> {
        let problem = Arc::clone(run.problem());
        while run.evaluations_left() > 0 {
            let point = self.next_point(&problem);
            let trial = run.evaluate_trial_point(point)?;
            if trial.is_scored() {
                self.improve(&trial);
            }
        }
        Ok(())
    }

    fn min_evaluations_per_run(&self) -> usize {
        self.batch
    }

    fn global_rating(&self) -> u8 {
        8
    }

    fn local_rating(&self) -> u8 {
        5
    }

    fn attach(&mut self, availability: AvailabilityHandle) {
        self.id = Some(availability.id());
    }

    fn trial_scored(&mut self, trial: &Trial) {
        if !trial.is_scored() {
            return;
        }
        match trial.algorithm() {
            Some(tag) if tag.is_initial() => self.improve(trial),
            Some(tag) if Some(tag.id) == self.id => {}
            _ => self.adopt(trial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_solver::{AlgorithmSchedule, MaxEvaluations};
    use cl_types::{AlgorithmTag, Variable};
    use uuid::Uuid;

    use crate::testing::echo_problem;

    fn attached(problem: Problem) -> (PerturbationSearch, Arc<Problem>) {
        let problem = Arc::new(problem);
        let mut search = PerturbationSearch::new(7);
        search.set_problem(Arc::clone(&problem));
        search.reset();
        (search, problem)
    }

    fn scored(problem: &Problem, x: f64, tag: AlgorithmTag) -> Trial {
        let mut trial = problem
            .new_trial([("x", x)].into_iter().collect(), Some(tag))
            .unwrap();
        problem.evaluate(&mut trial).unwrap();
        trial
    }

    #[test]
    fn windows_start_from_hints() {
        let (search, _) = attached(echo_problem());
        // Default delta is a tenth of the span around the initial value.
        assert_eq!(search.window("x"), Some((4.0, 6.0)));

        let mut problem = echo_problem();
        problem.add_hint(Hint::initial_domain().with_range("x", 1.0, 2.0));
        let (search, _) = attached(problem);
        assert_eq!(search.window("x"), Some((1.0, 2.0)));

        let mut problem = echo_problem();
        problem.add_hint(Hint::initial_domain().with_range("x", 1.0, 2.0));
        problem.add_hint(Hint::initial_delta().with_delta("x", 0.5));
        let (search, _) = attached(problem);
        assert_eq!(search.window("x"), Some((4.5, 5.5)));
    }

    #[test]
    fn perturbation_always_moves_something() {
        let mut problem = echo_problem();
        problem
            .add_variable(Variable::new("y", 0.0, -1.0, 1.0).unwrap())
            .unwrap();
        problem
            .add_variable(Variable::new("z", 2.0, 0.0, 4.0).unwrap())
            .unwrap();
        let (mut search, problem) = attached(problem);
        let base = problem.generate_initial_trial_point();

        for _ in 0..100 {
            let point = search.perturb(&problem, &base);
            assert_ne!(point, base);
            assert!(problem.new_trial(point, None).is_ok());
        }
    }

    #[test]
    fn improvement_resizes_window() {
        let (mut search, problem) = attached(echo_problem());
        search.trial_scored(&scored(&problem, 5.0, AlgorithmTag::initial()));
        assert_eq!(search.window("x"), Some((4.0, 6.0)));

        let own = AlgorithmTag::new(Uuid::new_v4(), "self");
        search.improve(&scored(&problem, 4.5, own.clone()));
        assert_eq!(search.window("x"), Some((3.0, 6.0)));
        assert_eq!(search.incumbent().and_then(|p| p.value("x")), Some(4.5));

        // A worse trial leaves everything alone.
        search.improve(&scored(&problem, 8.0, own));
        assert_eq!(search.window("x"), Some((3.0, 6.0)));
        assert_eq!(search.incumbent().and_then(|p| p.value("x")), Some(4.5));
    }

    #[test]
    fn adopts_only_much_better_foreign_solutions() {
        let (mut search, problem) = attached(echo_problem());
        search.trial_scored(&scored(&problem, 5.0, AlgorithmTag::initial()));
        let other = AlgorithmTag::new(Uuid::new_v4(), "other");

        // 1/3 -> 1/2.6 does not clear 1/3 + 0.25 * 2/3 = 0.5.
        search.trial_scored(&scored(&problem, 4.6, other.clone()));
        assert_eq!(search.incumbent().and_then(|p| p.value("x")), Some(5.0));

        search.trial_scored(&scored(&problem, 3.5, other));
        assert_eq!(search.incumbent().and_then(|p| p.value("x")), Some(3.5));
        assert_eq!(search.window("x"), Some((2.5, 4.5)));
    }

    #[test]
    fn ignores_its_own_trials_when_notified() {
        let (mut search, problem) = attached(echo_problem());
        let id = Uuid::new_v4();
        search.id = Some(id);
        search.trial_scored(&scored(&problem, 3.0, AlgorithmTag::new(id, "self")));
        assert!(search.incumbent().is_none());
    }

    #[test]
    fn converges_toward_target() {
        let run = || {
            let mut schedule = AlgorithmSchedule::default();
            schedule.set_problem(echo_problem());
            schedule.set_stopper(Box::new(MaxEvaluations(60)));
            schedule.pool().add(Box::new(PerturbationSearch::new(42)));
            schedule.execute().unwrap()
        };

        let first = run();
        let best = first.best_solution.clone().unwrap();
        let x = best.point().value("x").unwrap();
        assert!((x - 3.0).abs() < 1.0, "best x = {x}");
        assert!(best.satisfaction() > 0.5);

        let second = run();
        assert_eq!(
            second.best_solution.unwrap().point(),
            first.best_solution.unwrap().point()
        );
    }
}
