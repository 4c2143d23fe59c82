//! Schedule listeners and event fan-out.
//!
//! Listeners are invoked synchronously on the scheduling thread, in
//! registration order. [`ChannelListener`] forwards events to consumers on
//! other threads.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

use cl_types::{AlgorithmTag, Trial};

use crate::schedule::RunSummary;
use crate::scoreboard::ScoreBoard;

/// Receives schedule events. Every method defaults to a no-op.
pub trait ScheduleListener: Send {
    fn algorithm_run_will_execute(&mut self, _algorithm: &AlgorithmTag, _scoreboard: &ScoreBoard) {}

    fn algorithm_run_executed(
        &mut self,
        _algorithm: &AlgorithmTag,
        _evaluations: usize,
        _scoreboard: &ScoreBoard,
    ) {
    }

    fn trial_scored(&mut self, _trial: &Trial, _scoreboard: &ScoreBoard) {}

    fn trial_vetoed(&mut self, _trial: &Trial, _scoreboard: &ScoreBoard) {}

    fn found_new_optimal_solution(&mut self, _solutions: &[Trial], _solution: &Trial) {}

    fn run_completed(&mut self, _summary: &RunSummary) {}
}

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registration-ordered listener list.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn ScheduleListener>)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn ScheduleListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> Option<Box<dyn ScheduleListener>> {
        let index = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn ScheduleListener)) {
        for (_, listener) in &mut self.listeners {
            f(&mut **listener);
        }
    }

    pub(crate) fn algorithm_run_will_execute(&mut self, algorithm: &AlgorithmTag, scoreboard: &ScoreBoard) {
        self.each(|l| l.algorithm_run_will_execute(algorithm, scoreboard));
    }

    pub(crate) fn algorithm_run_executed(
        &mut self,
        algorithm: &AlgorithmTag,
        evaluations: usize,
        scoreboard: &ScoreBoard,
    ) {
        self.each(|l| l.algorithm_run_executed(algorithm, evaluations, scoreboard));
    }

    pub(crate) fn trial_scored(&mut self, trial: &Trial, scoreboard: &ScoreBoard) {
        self.each(|l| l.trial_scored(trial, scoreboard));
    }

    pub(crate) fn trial_vetoed(&mut self, trial: &Trial, scoreboard: &ScoreBoard) {
        self.each(|l| l.trial_vetoed(trial, scoreboard));
    }

    pub(crate) fn found_new_optimal_solution(&mut self, solutions: &[Trial], solution: &Trial) {
        self.each(|l| l.found_new_optimal_solution(solutions, solution));
    }

    pub(crate) fn run_completed(&mut self, summary: &RunSummary) {
        self.each(|l| l.run_completed(summary));
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Serializable form of every schedule event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleEvent {
    AlgorithmRunWillExecute {
        algorithm: AlgorithmTag,
    },
    AlgorithmRunExecuted {
        algorithm: AlgorithmTag,
        evaluations: usize,
    },
    TrialScored {
        trial: Trial,
    },
    TrialVetoed {
        trial: Trial,
    },
    NewOptimalSolution {
        solution: Trial,
        optimal_solutions: usize,
    },
    RunCompleted {
        summary: RunSummary,
    },
}

/// Forwards every event onto a crossbeam channel.
pub struct ChannelListener {
    tx: Sender<ScheduleEvent>,
}

impl ChannelListener {
    pub fn new(tx: Sender<ScheduleEvent>) -> Self {
        Self { tx }
    }

    /// Listener plus the receiving end of a fresh unbounded channel.
    pub fn channel() -> (Self, Receiver<ScheduleEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    fn emit(&self, event: ScheduleEvent) {
        // Best-effort send; a dropped receiver just means nobody is listening.
        let _ = self.tx.try_send(event);
    }
}

impl ScheduleListener for ChannelListener {
    fn algorithm_run_will_execute(&mut self, algorithm: &AlgorithmTag, _scoreboard: &ScoreBoard) {
        self.emit(ScheduleEvent::AlgorithmRunWillExecute {
            algorithm: algorithm.clone(),
        });
    }

    fn algorithm_run_executed(
        &mut self,
        algorithm: &AlgorithmTag,
        evaluations: usize,
        _scoreboard: &ScoreBoard,
    ) {
        self.emit(ScheduleEvent::AlgorithmRunExecuted {
            algorithm: algorithm.clone(),
            evaluations,
        });
    }

    fn trial_scored(&mut self, trial: &Trial, _scoreboard: &ScoreBoard) {
        self.emit(ScheduleEvent::TrialScored {
            trial: trial.clone(),
        });
    }

    fn trial_vetoed(&mut self, trial: &Trial, _scoreboard: &ScoreBoard) {
        self.emit(ScheduleEvent::TrialVetoed {
            trial: trial.clone(),
        });
    }

    fn found_new_optimal_solution(&mut self, solutions: &[Trial], solution: &Trial) {
        self.emit(ScheduleEvent::NewOptimalSolution {
            solution: solution.clone(),
            optimal_solutions: solutions.len(),
        });
    }

    fn run_completed(&mut self, summary: &RunSummary) {
        self.emit(ScheduleEvent::RunCompleted {
            summary: summary.clone(),
        });
    }
}
