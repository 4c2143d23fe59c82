//! Problem definition: variables, objectives, constraints, hints and the
//! evaluator, plus the validate/evaluate choke point every candidate passes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EvaluationError, ProblemError, TrialError};
use crate::hint::{Hint, HintKind};
use crate::objective::Objective;
use crate::trial::{AlgorithmTag, Trial, TrialPoint, TrialVeto};
use crate::variable::Variable;

/// Unique problem identifier.
pub type ProblemId = Uuid;

/// A hard pass/fail rule checked before a trial is evaluated.
///
/// Constraints never fail; rejection is expressed as a [`TrialVeto`].
pub trait Constraint: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, trial: &Trial) -> Option<TrialVeto>;
}

/// Constraint backed by a closure returning the rejection reason, if any.
pub struct FnConstraint<F> {
    name: String,
    check: F,
}

impl<F> FnConstraint<F>
where
    F: Fn(&Trial) -> Option<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> Constraint for FnConstraint<F>
where
    F: Fn(&Trial) -> Option<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, trial: &Trial) -> Option<TrialVeto> {
        (self.check)(trial).map(|reason| TrialVeto::new(trial, Some(&self.name), reason))
    }
}

/// Measures a trial and attaches one score per objective.
///
/// This is where real-world measurement happens. An evaluator may also veto
/// the trial (`Trial::reject_with_reason`) when the measurement is unusable.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, trial: &mut Trial, objectives: &[Objective]) -> Result<(), EvaluationError>;
}

/// Evaluator backed by a closure.
pub struct FnEvaluator<F>(F);

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&mut Trial, &[Objective]) -> Result<(), EvaluationError> + Send + Sync,
{
    fn evaluate(&self, trial: &mut Trial, objectives: &[Objective]) -> Result<(), EvaluationError> {
        (self.0)(trial, objectives)
    }
}

/// An optimization problem.
///
/// Built with the `&mut self` setup methods, then shared (typically behind an
/// `Arc`) and immutable from then on. Constraints and the evaluator read
/// candidate values from the trial itself.
pub struct Problem {
    id: ProblemId,
    variables: Vec<Variable>,
    objectives: Vec<Objective>,
    constraints: Vec<Box<dyn Constraint>>,
    evaluator: Option<Box<dyn Evaluator>>,
    hints: HashMap<HintKind, Hint>,
}

impl Problem {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            variables: Vec::new(),
            objectives: Vec::new(),
            constraints: Vec::new(),
            evaluator: None,
            hints: HashMap::new(),
        }
    }

    // ---- setup ----

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), ProblemError> {
        if self.variable(variable.name()).is_some() {
            return Err(ProblemError::DuplicateVariable {
                name: variable.name().to_string(),
            });
        }
        self.variables.push(variable);
        Ok(())
    }

    pub fn add_objective(&mut self, objective: Objective) -> Result<(), ProblemError> {
        if self.objective(objective.name()).is_some() {
            return Err(ProblemError::DuplicateObjective {
                name: objective.name().to_string(),
            });
        }
        self.objectives.push(objective);
        Ok(())
    }

    /// Constraints run in the order they were added.
    pub fn add_constraint(&mut self, constraint: impl Constraint + 'static) {
        self.constraints.push(Box::new(constraint));
    }

    pub fn add_constraint_fn<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&Trial) -> Option<String> + Send + Sync + 'static,
    {
        self.add_constraint(FnConstraint::new(name, check));
    }

    /// Adds a hint, replacing any earlier hint of the same kind.
    pub fn add_hint(&mut self, hint: Hint) {
        self.hints.insert(hint.kind(), hint);
    }

    pub fn set_evaluator(&mut self, evaluator: impl Evaluator + 'static) {
        self.evaluator = Some(Box::new(evaluator));
    }

    pub fn set_evaluator_fn<F>(&mut self, evaluate: F)
    where
        F: Fn(&mut Trial, &[Objective]) -> Result<(), EvaluationError> + Send + Sync + 'static,
    {
        self.set_evaluator(FnEvaluator(evaluate));
    }

    // ---- accessors ----

    pub fn id(&self) -> ProblemId {
        self.id
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn objective(&self, name: &str) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.name() == name)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn hint(&self, kind: HintKind) -> Option<&Hint> {
        self.hints.get(&kind)
    }

    // ---- trials ----

    /// Point made of every variable's initial value.
    pub fn generate_initial_trial_point(&self) -> TrialPoint {
        self.variables
            .iter()
            .map(|v| (v.name().to_string(), v.initial()))
            .collect()
    }

    /// Build a pending trial, checking that `point` covers exactly this
    /// problem's variables and stays within their bounds.
    pub fn new_trial(
        &self,
        point: TrialPoint,
        algorithm: Option<AlgorithmTag>,
    ) -> Result<Trial, ProblemError> {
        let expected: BTreeSet<&str> = self.variables.iter().map(Variable::name).collect();
        let actual: BTreeSet<&str> = point.variables().collect();
        if expected != actual {
            return Err(ProblemError::PointMismatch {
                missing: expected.difference(&actual).map(|s| s.to_string()).collect(),
                unexpected: actual.difference(&expected).map(|s| s.to_string()).collect(),
            });
        }

        for variable in &self.variables {
            let value = point.value(variable.name()).unwrap_or(f64::NAN);
            if !variable.contains(value) {
                return Err(ProblemError::OutOfBounds {
                    name: variable.name().to_string(),
                    value,
                    lower: variable.lower(),
                    upper: variable.upper(),
                });
            }
        }

        Ok(Trial::new(self.id, point, algorithm))
    }

    /// Run the constraints in order and return the first veto.
    pub fn validate(&self, trial: &Trial) -> Option<TrialVeto> {
        self.constraints
            .iter()
            .find_map(|constraint| constraint.validate(trial))
    }

    /// Validate, then measure. Returns `Ok(true)` when the trial was scored
    /// on every objective and `Ok(false)` when it was vetoed.
    pub fn evaluate(&self, trial: &mut Trial) -> Result<bool, EvaluationError> {
        if let Some(veto) = self.validate(trial) {
            debug!(
                trial = %trial.id(),
                constraint = ?veto.constraint(),
                reason = %veto.reason(),
                "trial vetoed by constraint"
            );
            trial.reject(veto)?;
            return Ok(false);
        }

        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or(EvaluationError::MissingEvaluator)?;
        evaluator.evaluate(trial, &self.objectives)?;

        if trial.is_vetoed() {
            debug!(trial = %trial.id(), "trial vetoed by evaluator");
            return Ok(false);
        }

        if let Some(stray) = trial.scores().find(|s| self.objective(s.objective()).is_none()) {
            return Err(TrialError::UnknownObjective {
                trial_id: trial.id(),
                objective: stray.objective().to_string(),
            }
            .into());
        }

        if let Some(missing) = self
            .objectives
            .iter()
            .find(|o| trial.score(o.name()).is_none())
        {
            return Err(EvaluationError::MissingScore {
                objective: missing.name().to_string(),
            });
        }

        trial.mark_scored()?;
        Ok(true)
    }

    /// Evaluate the initial point without an owning algorithm.
    pub fn evaluate_initial_point(&self) -> Result<Trial, EvaluationError> {
        let mut trial = Trial::new(self.id, self.generate_initial_trial_point(), None);
        self.evaluate(&mut trial)?;
        Ok(trial)
    }
}

impl Default for Problem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("id", &self.id)
            .field("variables", &self.variables)
            .field("objectives", &self.objectives)
            .field("constraints", &self.constraints.len())
            .field("has_evaluator", &self.evaluator.is_some())
            .field("hints", &self.hints)
            .finish()
    }
}
