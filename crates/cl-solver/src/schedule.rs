//! The algorithm schedule: the orchestration loop of a run.
//!
//! A run seeds the problem's initial point, then repeatedly asks the market
//! for an available algorithm and grants it a turn with a bounded evaluation
//! budget. Every candidate is evaluated through [`AlgorithmRun`], which
//! consults the stopper before each evaluation. The loop is synchronous and
//! runs on the caller's thread.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use cl_types::{AlgorithmId, AlgorithmTag, Problem, Trial, TrialPoint};

use crate::algorithm::AlgorithmEvent;
use crate::config::{EvaluatorFailurePolicy, ScheduleConfig};
use crate::errors::{RunTermination, ScheduleError};
use crate::events::{ListenerId, ListenerRegistry, ScheduleListener};
use crate::judge::{SatisfactionJudge, SolutionJudge};
use crate::market::{AlgorithmMarket, RoundRobinMarket};
use crate::pool::{AlgorithmPool, AlgorithmProfile, SharedAlgorithm};
use crate::scoreboard::ScoreBoard;
use crate::stopper::Stopper;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The stopper fired.
    Stopper,
    /// No algorithm was available and the schedule is configured to stop
    /// rather than idle.
    Idle,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub evaluations: usize,
    pub vetoes: usize,
    pub algorithm_runs: usize,
    pub optimal_solutions_found: usize,
    pub elapsed_ms: u64,
    pub best_solution: Option<Trial>,
}

enum TurnOutcome {
    Completed,
    Stopped,
}

/// Orchestrates search algorithms against one problem.
pub struct AlgorithmSchedule {
    config: ScheduleConfig,
    problem: Option<Arc<Problem>>,
    stopper: Option<Box<dyn Stopper>>,
    pool: AlgorithmPool,
    market: Box<dyn AlgorithmMarket>,
    judge: Box<dyn SolutionJudge>,
    scoreboard: ScoreBoard,
    listeners: ListenerRegistry,
}

impl AlgorithmSchedule {
    pub fn new(config: ScheduleConfig) -> Self {
        let scoreboard = ScoreBoard::new();
        if let Some(step) = config.efficiency_step {
            scoreboard.record_efficiency(step);
        }
        Self {
            config,
            problem: None,
            stopper: None,
            pool: AlgorithmPool::new(),
            market: Box::new(RoundRobinMarket::new()),
            judge: Box::new(SatisfactionJudge::new()),
            scoreboard,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Install `problem`, hand it to every pooled algorithm and reset the
    /// market, judge and scoreboard.
    pub fn set_problem(&mut self, problem: impl Into<Arc<Problem>>) {
        let problem = problem.into();
        info!(
            problem = %problem.id(),
            variables = problem.variables().len(),
            objectives = problem.objectives().len(),
            "problem set"
        );
        self.pool.set_problem(Arc::clone(&problem));
        self.problem = Some(problem);
        self.reset_run_state();
    }

    pub fn problem(&self) -> Option<&Arc<Problem>> {
        self.problem.as_ref()
    }

    pub fn set_stopper(&mut self, stopper: Box<dyn Stopper>) {
        self.stopper = Some(stopper);
    }

    pub fn set_market(&mut self, market: Box<dyn AlgorithmMarket>) {
        self.market = market;
    }

    pub fn set_solution_judge(&mut self, judge: Box<dyn SolutionJudge>) {
        self.judge = judge;
    }

    /// Pool handle; clones share membership with the schedule.
    pub fn pool(&self) -> &AlgorithmPool {
        &self.pool
    }

    /// Scoreboard handle; clones can be polled from other threads.
    pub fn scoreboard(&self) -> &ScoreBoard {
        &self.scoreboard
    }

    pub fn optimal_solutions(&self) -> &[Trial] {
        self.judge.optimal_solutions()
    }

    pub fn add_listener(&mut self, listener: Box<dyn ScheduleListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn ScheduleListener>> {
        self.listeners.remove(id)
    }

    /// Reset the pooled algorithms and all run statistics.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.reset_run_state();
    }

    fn reset_run_state(&mut self) {
        self.market.reset();
        self.judge.reset();
        self.scoreboard.reset();
    }

    /// Run until the stopper fires.
    ///
    /// The initial point is always evaluated exactly once, before the
    /// stopper is first consulted.
    pub fn execute(&mut self) -> Result<RunSummary, ScheduleError> {
        let problem = self
            .problem
            .clone()
            .ok_or(ScheduleError::NotConfigured("problem"))?;
        if self.stopper.is_none() {
            return Err(ScheduleError::NotConfigured("stopper"));
        }
        if !problem.has_evaluator() {
            return Err(ScheduleError::NotConfigured("evaluator"));
        }

        self.reset_run_state();
        info!(
            problem = %problem.id(),
            algorithms = self.pool.len(),
            "optimization run starting"
        );

        let seed = problem.new_trial(
            problem.generate_initial_trial_point(),
            Some(AlgorithmTag::initial()),
        )?;
        self.score(seed, None, &mut Vec::new())?;

        let reason = loop {
            if self.stop_requested() {
                break StopReason::Stopper;
            }

            let available = self.pool.available_algorithms();
            let chosen = self
                .market
                .next_algorithm(&available)
                .and_then(|id| self.pool.algorithm(id));
            let Some((profile, algorithm)) = chosen else {
                if self.config.stop_when_idle {
                    break StopReason::Idle;
                }
                self.idle();
                continue;
            };

            match self.run_turn(&problem, profile, algorithm)? {
                TurnOutcome::Completed => {}
                TurnOutcome::Stopped => break StopReason::Stopper,
            }
        };

        let summary = RunSummary {
            reason,
            evaluations: self.scoreboard.evaluations(),
            vetoes: self.scoreboard.vetoes(),
            algorithm_runs: self.scoreboard.algorithm_runs(),
            optimal_solutions_found: self.scoreboard.optimal_solutions_found(),
            elapsed_ms: self.scoreboard.elapsed().as_millis() as u64,
            best_solution: self.scoreboard.best_solution(),
        };
        info!(
            reason = ?summary.reason,
            evaluations = summary.evaluations,
            vetoes = summary.vetoes,
            algorithm_runs = summary.algorithm_runs,
            satisfaction = self.scoreboard.satisfaction(),
            "optimization run finished"
        );
        self.listeners.run_completed(&summary);
        Ok(summary)
    }

    fn stop_requested(&self) -> bool {
        self.stopper
            .as_ref()
            .is_some_and(|stopper| stopper.should_stop(&self.scoreboard))
    }

    fn idle(&self) {
        let wait = self.config.idle_wait();
        if wait.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(wait);
        }
    }

    /// Evaluation budget for a turn of `profile`.
    fn turn_budget(&self, profile: &AlgorithmProfile) -> usize {
        self.pool
            .max_min_evaluations_per_run()
            .min(profile.max_evaluations_per_run)
            .max(profile.min_evaluations_per_run)
            .max(self.config.min_turn_evaluations)
    }

    fn run_turn(
        &mut self,
        problem: &Arc<Problem>,
        profile: AlgorithmProfile,
        algorithm: SharedAlgorithm,
    ) -> Result<TurnOutcome, ScheduleError> {
        let tag = profile.tag();
        let budget = self.turn_budget(&profile);
        debug!(algorithm = %tag.label, budget, "algorithm run starting");
        self.listeners
            .algorithm_run_will_execute(&tag, &self.scoreboard);

        let mut algorithm = algorithm.lock();
        let mut run = AlgorithmRun {
            schedule: self,
            problem: Arc::clone(problem),
            tag: tag.clone(),
            budget,
            evaluations: 0,
            deferred: Vec::new(),
        };
        let result = algorithm.perform_run(&mut run);
        let evaluations = run.evaluations;
        let deferred = std::mem::take(&mut run.deferred);

        // Events raised during the turn reach the algorithm once it is done,
        // unless it was removed meanwhile.
        if self.pool.contains(tag.id) {
            for event in &deferred {
                event.deliver(&mut **algorithm);
            }
        }
        drop(algorithm);

        match result.map_err(|e| (e.termination(), e)) {
            Ok(()) | Err((Some(RunTermination::BudgetExhausted), _)) => {
                self.scoreboard.record_algorithm_run();
                debug!(algorithm = %tag.label, evaluations, "algorithm run executed");
                self.listeners
                    .algorithm_run_executed(&tag, evaluations, &self.scoreboard);
                Ok(TurnOutcome::Completed)
            }
            Err((Some(RunTermination::StopRequested), _)) => {
                debug!(algorithm = %tag.label, evaluations, "algorithm run interrupted by stopper");
                Ok(TurnOutcome::Stopped)
            }
            Err((None, err)) => {
                warn!(algorithm = %tag.label, error = %err, "algorithm run failed");
                Err(err)
            }
        }
    }

    /// Evaluate `trial` and fan the outcome out to the judge, market,
    /// scoreboard, listeners and algorithms. Events for `active` are queued
    /// in `deferred`.
    fn score(
        &mut self,
        mut trial: Trial,
        active: Option<AlgorithmId>,
        deferred: &mut Vec<AlgorithmEvent>,
    ) -> Result<Trial, ScheduleError> {
        let Some(problem) = self.problem.clone() else {
            return Err(ScheduleError::NotConfigured("problem"));
        };

        let mut failure = None;
        if let Err(err) = problem.evaluate(&mut trial) {
            warn!(trial = %trial.id(), error = %err, "evaluation failed");
            if trial.is_pending() {
                trial.reject_with_reason(err.to_string())?;
            }
            if self.config.evaluator_failure == EvaluatorFailurePolicy::Propagate {
                failure = Some(err);
            }
        }

        if trial.is_vetoed() {
            self.scoreboard.record_veto();
            self.listeners.trial_vetoed(&trial, &self.scoreboard);
            self.broadcast(AlgorithmEvent::TrialVetoed(trial.clone()), active, deferred);
        }

        if let Some(solution) = self.judge.judge(&trial) {
            let solutions = self.judge.optimal_solutions().to_vec();
            self.scoreboard
                .record_optimal_solution(&solution, solutions.len());
            info!(
                trial = %solution.id(),
                point = %solution.point(),
                satisfaction = solution.satisfaction(),
                "new optimal solution"
            );
            self.listeners
                .found_new_optimal_solution(&solutions, &solution);
            self.broadcast(
                AlgorithmEvent::NewOptimalSolution {
                    solutions,
                    solution,
                },
                active,
                deferred,
            );
        }

        self.market.trial_scored(&trial);
        self.scoreboard.record_evaluation(&trial);
        self.listeners.trial_scored(&trial, &self.scoreboard);
        self.broadcast(AlgorithmEvent::TrialScored(trial.clone()), active, deferred);

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(trial),
        }
    }

    fn broadcast(
        &self,
        event: AlgorithmEvent,
        active: Option<AlgorithmId>,
        deferred: &mut Vec<AlgorithmEvent>,
    ) {
        if self.pool.broadcast(&event, active) {
            deferred.push(event);
        }
    }
}

impl Default for AlgorithmSchedule {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

/// An algorithm's turn in progress.
///
/// Handed to `SearchAlgorithm::perform_run`; it is the only way to evaluate
/// a point mid-run.
pub struct AlgorithmRun<'s> {
    schedule: &'s mut AlgorithmSchedule,
    problem: Arc<Problem>,
    tag: AlgorithmTag,
    budget: usize,
    evaluations: usize,
    deferred: Vec<AlgorithmEvent>,
}

impl AlgorithmRun<'_> {
    pub fn problem(&self) -> &Arc<Problem> {
        &self.problem
    }

    pub fn algorithm(&self) -> &AlgorithmTag {
        &self.tag
    }

    /// Evaluations granted for this turn.
    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn evaluations_left(&self) -> usize {
        self.budget.saturating_sub(self.evaluations)
    }

    pub fn scoreboard(&self) -> &ScoreBoard {
        &self.schedule.scoreboard
    }

    pub fn should_stop(&self) -> bool {
        self.schedule.stop_requested()
    }

    /// Evaluate `point` on behalf of the running algorithm.
    ///
    /// Fails with `RunTerminated(StopRequested)` once the stopper fires and
    /// with `RunTerminated(BudgetExhausted)` once the turn's budget is spent.
    /// A vetoed trial is still returned as `Ok`.
    pub fn evaluate_trial_point(&mut self, point: TrialPoint) -> Result<Trial, ScheduleError> {
        if self.schedule.stop_requested() {
            return Err(RunTermination::StopRequested.into());
        }
        if self.evaluations >= self.budget {
            return Err(RunTermination::BudgetExhausted.into());
        }

        let trial = self.problem.new_trial(point, Some(self.tag.clone()))?;
        self.evaluations += 1;
        self.schedule
            .score(trial, Some(self.tag.id), &mut self.deferred)
    }
}
