//! Trial points, scores, vetoes and the trial envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::errors::TrialError;
use crate::objective::Objective;

/// Unique identifier of a registered search algorithm.
pub type AlgorithmId = Uuid;

/// An immutable coordinate: one value per problem variable, keyed by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialPoint {
    values: BTreeMap<String, f64>,
}

impl TrialPoint {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn value(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// Variable names covered by this point, in sorted order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A new point equal to this one except for `variable`.
    pub fn with_value(&self, variable: impl Into<String>, value: f64) -> Self {
        let mut values = self.values.clone();
        values.insert(variable.into(), value);
        Self { values }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for TrialPoint {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl fmt::Display for TrialPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

/// Outcome of evaluating a trial against one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    objective: String,
    value: f64,
    satisfaction: f64,
}

impl Score {
    /// Score `value` against `objective`; satisfaction is fixed here.
    pub fn new(objective: &Objective, value: f64) -> Self {
        Self {
            objective: objective.name().to_string(),
            value,
            satisfaction: objective.satisfaction(value),
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn satisfaction(&self) -> f64 {
        self.satisfaction
    }
}

/// Rejection of a trial by a constraint or by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialVeto {
    trial_id: Uuid,
    /// Name of the vetoing constraint; `None` when the evaluator vetoed.
    constraint: Option<String>,
    reason: String,
    /// Free-form diagnostics attached by the vetoing party.
    payload: Option<serde_json::Value>,
}

impl TrialVeto {
    pub fn new(trial: &Trial, constraint: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            trial_id: trial.id(),
            constraint: constraint.map(str::to_string),
            reason: reason.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn trial_id(&self) -> Uuid {
        self.trial_id
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }
}

/// Identity of the algorithm that proposed a trial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmTag {
    pub id: AlgorithmId,
    pub label: String,
}

impl AlgorithmTag {
    pub const INITIAL_LABEL: &'static str = "Initial Algorithm";

    pub fn new(id: AlgorithmId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    /// Tag of the synthetic algorithm that proposes a run's seed point.
    pub fn initial() -> Self {
        Self::new(Uuid::nil(), Self::INITIAL_LABEL)
    }

    pub fn is_initial(&self) -> bool {
        self.id.is_nil()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Vetoed,
    Scored,
}

/// A proposed point bound to its problem and proposer, plus its outcome.
///
/// A trial moves from `Pending` to exactly one of `Vetoed` or `Scored` and is
/// frozen afterwards. Vetoing discards any partial scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    id: Uuid,
    problem_id: Uuid,
    algorithm: Option<AlgorithmTag>,
    point: TrialPoint,
    status: TrialStatus,
    scores: BTreeMap<String, Score>,
    veto: Option<TrialVeto>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl Trial {
    /// Trials are created through `Problem::new_trial`, which checks the point.
    pub(crate) fn new(problem_id: Uuid, point: TrialPoint, algorithm: Option<AlgorithmTag>) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id,
            algorithm,
            point,
            status: TrialStatus::Pending,
            scores: BTreeMap::new(),
            veto: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn problem_id(&self) -> Uuid {
        self.problem_id
    }

    pub fn algorithm(&self) -> Option<&AlgorithmTag> {
        self.algorithm.as_ref()
    }

    /// Whether `id` proposed this trial.
    pub fn proposed_by(&self, id: AlgorithmId) -> bool {
        self.algorithm.as_ref().is_some_and(|tag| tag.id == id)
    }

    pub fn point(&self) -> &TrialPoint {
        &self.point
    }

    pub fn status(&self) -> TrialStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == TrialStatus::Pending
    }

    pub fn is_vetoed(&self) -> bool {
        self.status == TrialStatus::Vetoed
    }

    pub fn is_scored(&self) -> bool {
        self.status == TrialStatus::Scored
    }

    pub fn has_scores(&self) -> bool {
        !self.scores.is_empty()
    }

    pub fn veto(&self) -> Option<&TrialVeto> {
        self.veto.as_ref()
    }

    pub fn score(&self, objective: &str) -> Option<&Score> {
        self.scores.get(objective)
    }

    pub fn scores(&self) -> impl Iterator<Item = &Score> {
        self.scores.values()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Mean satisfaction over all objectives; 0 unless scored.
    pub fn satisfaction(&self) -> f64 {
        if !self.is_scored() || self.scores.is_empty() {
            return 0.0;
        }
        let total: f64 = self.scores.values().map(Score::satisfaction).sum();
        total / self.scores.len() as f64
    }

    /// Satisfaction of the least satisfied objective; 0 unless scored.
    pub fn worst_satisfaction(&self) -> f64 {
        if !self.is_scored() {
            return 0.0;
        }
        self.scores
            .values()
            .map(Score::satisfaction)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))))
            .unwrap_or(0.0)
    }

    /// Attach a score while the trial is pending. A later score for the same
    /// objective replaces the earlier one.
    pub fn set_score(&mut self, score: Score) -> Result<(), TrialError> {
        self.ensure_pending()?;
        self.scores.insert(score.objective().to_string(), score);
        Ok(())
    }

    /// Veto the pending trial, discarding any partial scores.
    pub fn reject(&mut self, veto: TrialVeto) -> Result<(), TrialError> {
        self.ensure_pending()?;
        self.scores.clear();
        self.veto = Some(veto);
        self.status = TrialStatus::Vetoed;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// Convenience for evaluators: veto without a constraint.
    pub fn reject_with_reason(&mut self, reason: impl Into<String>) -> Result<(), TrialError> {
        let veto = TrialVeto::new(self, None, reason);
        self.reject(veto)
    }

    pub(crate) fn mark_scored(&mut self) -> Result<(), TrialError> {
        self.ensure_pending()?;
        self.status = TrialStatus::Scored;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), TrialError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TrialError::AlreadyResolved {
                trial_id: self.id,
                status: self.status,
            })
        }
    }
}
