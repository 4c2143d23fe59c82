//! Run statistics and the best solution found so far.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use cl_types::{AlgorithmTag, Trial};

/// Satisfaction progress of one algorithm over the current efficiency window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EfficiencyWindow {
    evaluations: usize,
    initial_satisfaction: f64,
    best_satisfaction: f64,
}

/// How much of its remaining satisfaction gap an algorithm closed per
/// evaluation over one efficiency window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmEfficiency {
    pub label: String,
    pub evaluations: usize,
    /// `(best - initial) / ((1 - initial) * evaluations)`; zero when the
    /// window starts fully satisfied.
    pub efficiency: f64,
}

impl AlgorithmEfficiency {
    fn from_window(label: &str, window: &EfficiencyWindow) -> Self {
        let gap = 1.0 - window.initial_satisfaction;
        let efficiency = if window.evaluations == 0 || gap <= 0.0 {
            0.0
        } else {
            (window.best_satisfaction - window.initial_satisfaction)
                / (gap * window.evaluations as f64)
        };
        Self {
            label: label.to_string(),
            evaluations: window.evaluations,
            efficiency,
        }
    }
}

#[derive(Debug, Clone)]
struct Tally {
    started_at: DateTime<Utc>,
    evaluations: usize,
    vetoes: usize,
    algorithm_runs: usize,
    optimal_solutions_found: usize,
    existing_optimal_solutions: usize,
    best_solution: Option<Trial>,
    evaluations_log: BTreeMap<String, usize>,
    efficiency_step: Option<usize>,
    pending_efficiency: usize,
    efficiency_windows: BTreeMap<String, EfficiencyWindow>,
    efficiency: Vec<AlgorithmEfficiency>,
}

impl Tally {
    fn new(efficiency_step: Option<usize>) -> Self {
        Self {
            started_at: Utc::now(),
            evaluations: 0,
            vetoes: 0,
            algorithm_runs: 0,
            optimal_solutions_found: 0,
            existing_optimal_solutions: 0,
            best_solution: None,
            evaluations_log: BTreeMap::new(),
            efficiency_step,
            pending_efficiency: 0,
            efficiency_windows: BTreeMap::new(),
            efficiency: Vec::new(),
        }
    }

    /// Fold `trial` into its algorithm's window and close the windows once
    /// `step` evaluations have accumulated. Returns the closed report.
    fn track_efficiency(
        &mut self,
        label: &str,
        trial: &Trial,
    ) -> Option<Vec<AlgorithmEfficiency>> {
        let step = self.efficiency_step?;
        let satisfaction = trial.satisfaction();
        self.efficiency_windows
            .entry(label.to_string())
            .and_modify(|window| {
                window.evaluations += 1;
                window.best_satisfaction = window.best_satisfaction.max(satisfaction);
            })
            .or_insert(EfficiencyWindow {
                evaluations: 1,
                initial_satisfaction: satisfaction,
                best_satisfaction: satisfaction,
            });

        self.pending_efficiency += 1;
        if self.pending_efficiency < step {
            return None;
        }
        self.pending_efficiency = 0;
        let report: Vec<_> = std::mem::take(&mut self.efficiency_windows)
            .iter()
            .map(|(label, window)| AlgorithmEfficiency::from_window(label, window))
            .collect();
        self.efficiency = report.clone();
        Some(report)
    }
}

/// Shared view of a run's progress.
///
/// Cheap to clone; clones observe the same counters, so a stopper or a
/// monitoring thread can poll it while the schedule runs. Evaluations count
/// every resolved trial, vetoed or not.
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    inner: Arc<RwLock<Tally>>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tally::new(None))),
        }
    }

    /// Zero every counter and restart the clock. Efficiency recording stays
    /// enabled if it was.
    pub fn reset(&self) {
        let mut tally = self.inner.write();
        *tally = Tally::new(tally.efficiency_step);
    }

    /// Report per-algorithm efficiency every `step` evaluations.
    ///
    /// Each report covers the evaluations since the previous one and is
    /// logged at `info` level; the latest is kept in [`Self::efficiency`].
    pub fn record_efficiency(&self, step: usize) {
        let mut tally = self.inner.write();
        tally.efficiency_step = Some(step.max(1));
        tally.pending_efficiency = 0;
        tally.efficiency_windows.clear();
    }

    /// Latest closed efficiency report, in label order.
    pub fn efficiency(&self) -> Vec<AlgorithmEfficiency> {
        self.inner.read().efficiency.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.read().started_at
    }

    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.started_at()).to_std().unwrap_or_default()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    pub fn evaluations(&self) -> usize {
        self.inner.read().evaluations
    }

    pub fn vetoes(&self) -> usize {
        self.inner.read().vetoes
    }

    pub fn algorithm_runs(&self) -> usize {
        self.inner.read().algorithm_runs
    }

    pub fn optimal_solutions_found(&self) -> usize {
        self.inner.read().optimal_solutions_found
    }

    pub fn best_solution(&self) -> Option<Trial> {
        self.inner.read().best_solution.clone()
    }

    /// Satisfaction of the best solution; 0 before any optimum is found.
    pub fn satisfaction(&self) -> f64 {
        self.inner
            .read()
            .best_solution
            .as_ref()
            .map_or(0.0, Trial::satisfaction)
    }

    /// Evaluations per proposing algorithm label.
    pub fn evaluations_log(&self) -> BTreeMap<String, usize> {
        self.inner.read().evaluations_log.clone()
    }

    pub fn snapshot(&self) -> ScoreBoardSnapshot {
        let tally = self.inner.read();
        ScoreBoardSnapshot {
            started_at: tally.started_at,
            elapsed_ms: (Utc::now() - tally.started_at).num_milliseconds().max(0) as u64,
            evaluations: tally.evaluations,
            vetoes: tally.vetoes,
            algorithm_runs: tally.algorithm_runs,
            optimal_solutions_found: tally.optimal_solutions_found,
            existing_optimal_solutions: tally.existing_optimal_solutions,
            satisfaction: tally.best_solution.as_ref().map_or(0.0, Trial::satisfaction),
            best_solution: tally.best_solution.clone(),
            evaluations_log: tally.evaluations_log.clone(),
            efficiency: tally.efficiency.clone(),
        }
    }

    // ---- recording, driven by the schedule ----

    pub(crate) fn record_evaluation(&self, trial: &Trial) {
        let label = trial
            .algorithm()
            .map_or(AlgorithmTag::INITIAL_LABEL, |tag| tag.label.as_str());
        let (evaluations, report) = {
            let mut tally = self.inner.write();
            tally.evaluations += 1;
            *tally.evaluations_log.entry(label.to_string()).or_insert(0) += 1;
            (tally.evaluations, tally.track_efficiency(label, trial))
        };

        for entry in report.iter().flatten() {
            info!(
                evaluations_total = evaluations,
                algorithm = %entry.label,
                evaluations = entry.evaluations,
                efficiency = entry.efficiency,
                "algorithm efficiency"
            );
        }
    }

    pub(crate) fn record_veto(&self) {
        self.inner.write().vetoes += 1;
    }

    pub(crate) fn record_algorithm_run(&self) {
        self.inner.write().algorithm_runs += 1;
    }

    pub(crate) fn record_optimal_solution(&self, solution: &Trial, existing: usize) {
        let mut tally = self.inner.write();
        tally.optimal_solutions_found += 1;
        tally.existing_optimal_solutions = existing;
        tally.best_solution = Some(solution.clone());
    }
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the scoreboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoardSnapshot {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub evaluations: usize,
    pub vetoes: usize,
    pub algorithm_runs: usize,
    pub optimal_solutions_found: usize,
    pub existing_optimal_solutions: usize,
    pub satisfaction: f64,
    pub best_solution: Option<Trial>,
    pub evaluations_log: BTreeMap<String, usize>,
    #[serde(default)]
    pub efficiency: Vec<AlgorithmEfficiency>,
}

impl fmt::Display for ScoreBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}

impl fmt::Display for ScoreBoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ScoreBoard")?;
        writeln!(f, "-----------------------------------")?;
        writeln!(f, "Elapsed time:            {:.3} s", self.elapsed_ms as f64 / 1000.0)?;
        writeln!(f, "Evaluations:             {}", self.evaluations)?;
        writeln!(f, "Vetoes:                  {}", self.vetoes)?;
        writeln!(f, "Algorithm runs:          {}", self.algorithm_runs)?;
        writeln!(f, "Optimal solutions found: {}", self.optimal_solutions_found)?;
        writeln!(f, "Existing optimal solutions: {}", self.existing_optimal_solutions)?;
        writeln!(f, "Overall satisfaction:    {:.6}", self.satisfaction)?;
        if let Some(best) = &self.best_solution {
            writeln!(f, "Best point:              {}", best.point())?;
            for score in best.scores() {
                writeln!(
                    f,
                    "  {} = {} (satisfaction {:.6})",
                    score.objective(),
                    score.value(),
                    score.satisfaction()
                )?;
            }
        }
        for (label, evaluations) in &self.evaluations_log {
            writeln!(f, "  {label}: {evaluations} evaluations")?;
        }
        for entry in &self.efficiency {
            writeln!(
                f,
                "  {}: efficiency {:.5} over {} evaluations",
                entry.label, entry.efficiency, entry.evaluations
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{echo_problem, evaluated};
    use uuid::Uuid;

    fn scored(x: f64, label: &str) -> Trial {
        let tag = AlgorithmTag::new(Uuid::new_v4(), label);
        evaluated(&echo_problem(), x, Some(tag))
    }

    #[test]
    fn counts_and_log() {
        let board = ScoreBoard::new();
        board.record_evaluation(&scored(1.0, "grid"));
        board.record_evaluation(&scored(2.0, "grid"));
        board.record_evaluation(&scored(3.0, "random"));
        board.record_veto();
        board.record_algorithm_run();

        assert_eq!(board.evaluations(), 3);
        assert_eq!(board.vetoes(), 1);
        assert_eq!(board.algorithm_runs(), 1);
        let log = board.evaluations_log();
        assert_eq!(log["grid"], 2);
        assert_eq!(log["random"], 1);
    }

    #[test]
    fn clones_share_state_and_reset_clears() {
        let board = ScoreBoard::new();
        let observer = board.clone();
        let best = scored(3.0, "grid");
        board.record_optimal_solution(&best, 1);

        assert_eq!(observer.optimal_solutions_found(), 1);
        assert_eq!(observer.satisfaction(), 1.0);
        assert_eq!(observer.best_solution().unwrap().id(), best.id());

        board.reset();
        assert_eq!(observer.optimal_solutions_found(), 0);
        assert!(observer.best_solution().is_none());
        assert_eq!(observer.satisfaction(), 0.0);
    }

    #[test]
    fn snapshot_serializes_and_renders() {
        let board = ScoreBoard::new();
        let best = scored(3.0, "grid");
        board.record_evaluation(&best);
        board.record_optimal_solution(&best, 1);

        let snapshot = board.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ScoreBoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.evaluations, 1);
        assert_eq!(back.best_solution.unwrap().id(), best.id());

        let report = board.to_string();
        assert!(report.contains("Evaluations:             1"));
        assert!(report.contains("x=3"));
        assert!(report.contains("grid: 1 evaluations"));
        assert!(report.contains("Existing optimal solutions: 1"));
    }

    #[test]
    fn efficiency_is_off_until_requested() {
        let board = ScoreBoard::new();
        for x in [5.0, 4.0, 3.0] {
            board.record_evaluation(&scored(x, "grid"));
        }
        assert!(board.efficiency().is_empty());
        assert!(board.snapshot().efficiency.is_empty());
    }

    #[test]
    fn efficiency_windows_close_every_step() {
        let board = ScoreBoard::new();
        board.record_efficiency(4);

        // grid: 1/3 -> 1/2 -> 1 over three evaluations; random stays at 1/8.
        board.record_evaluation(&scored(5.0, "grid"));
        board.record_evaluation(&scored(10.0, "random"));
        board.record_evaluation(&scored(4.0, "grid"));
        assert!(board.efficiency().is_empty());
        board.record_evaluation(&scored(3.0, "grid"));

        let report = board.efficiency();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].label, "grid");
        assert_eq!(report[0].evaluations, 3);
        let expected = (1.0 - 1.0 / 3.0) / ((1.0 - 1.0 / 3.0) * 3.0);
        assert!((report[0].efficiency - expected).abs() < 1e-12);
        assert_eq!(report[1].label, "random");
        assert_eq!(report[1].evaluations, 1);
        assert_eq!(report[1].efficiency, 0.0);

        // The next window starts empty.
        board.record_evaluation(&scored(3.0, "grid"));
        board.record_evaluation(&scored(3.0, "grid"));
        board.record_evaluation(&scored(3.0, "grid"));
        board.record_evaluation(&scored(3.0, "grid"));
        let report = board.efficiency();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].evaluations, 4);
        // Fully satisfied from the start: nothing left to close.
        assert_eq!(report[0].efficiency, 0.0);
        assert!(board.to_string().contains("grid: efficiency 0.00000 over 4 evaluations"));
    }

    #[test]
    fn efficiency_recording_survives_reset() {
        let board = ScoreBoard::new();
        board.record_efficiency(1);
        board.reset();
        board.record_evaluation(&scored(4.0, "grid"));
        assert_eq!(board.efficiency().len(), 1);
    }
}
