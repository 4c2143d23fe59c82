//! Solver configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use cl_types::{config_error, CaliperError, CaliperResult};

use crate::stopper::{AnyOf, MaxAlgorithmRuns, MaxElapsed, MaxEvaluations, MinSatisfaction, Stopper};

/// What the schedule does when the evaluator returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorFailurePolicy {
    /// Veto the trial with the error as its reason and carry on.
    #[default]
    Veto,
    /// Veto the trial, then end the run with the error.
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between market polls while no algorithm is available.
    /// Zero yields the thread instead of sleeping.
    pub idle_wait_ms: u64,
    /// Floor on every turn's evaluation budget.
    pub min_turn_evaluations: usize,
    pub evaluator_failure: EvaluatorFailurePolicy,
    /// End the run instead of idling when the market has nothing to offer.
    pub stop_when_idle: bool,
    /// Log per-algorithm efficiency every this many evaluations.
    pub efficiency_step: Option<usize>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            idle_wait_ms: 0,
            min_turn_evaluations: 1,
            evaluator_failure: EvaluatorFailurePolicy::Veto,
            stop_when_idle: false,
            efficiency_step: None,
        }
    }
}

impl ScheduleConfig {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Termination limits; the built stopper fires when any configured limit
/// is reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopperConfig {
    pub max_evaluations: Option<usize>,
    pub max_elapsed_secs: Option<f64>,
    pub min_satisfaction: Option<f64>,
    pub max_algorithm_runs: Option<usize>,
}

impl StopperConfig {
    pub fn build(&self) -> CaliperResult<Box<dyn Stopper>> {
        let mut any = AnyOf::new();
        if let Some(max) = self.max_evaluations {
            any.push(Box::new(MaxEvaluations(max)));
        }
        if let Some(secs) = self.max_elapsed_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(config_error!("max_elapsed_secs must be a non-negative number, got {}", secs));
            }
            any.push(Box::new(MaxElapsed::from_secs_f64(secs)));
        }
        if let Some(satisfaction) = self.min_satisfaction {
            if !(0.0..=1.0).contains(&satisfaction) {
                return Err(config_error!("min_satisfaction must lie in [0, 1], got {}", satisfaction));
            }
            any.push(Box::new(MinSatisfaction(satisfaction)));
        }
        if let Some(runs) = self.max_algorithm_runs {
            any.push(Box::new(MaxAlgorithmRuns(runs)));
        }
        if any.is_empty() {
            return Err(config_error!("stopper needs at least one limit"));
        }
        Ok(Box::new(any))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub schedule: ScheduleConfig,
    pub stopper: StopperConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            stopper: StopperConfig {
                max_evaluations: Some(1000),
                ..StopperConfig::default()
            },
        }
    }
}

impl SolverConfig {
    pub fn from_file(path: impl AsRef<Path>) -> CaliperResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        raw.parse()
    }

    pub fn to_json(&self) -> CaliperResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromStr for SolverConfig {
    type Err = CaliperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}
