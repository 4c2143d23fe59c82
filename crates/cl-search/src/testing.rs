//! Shared fixtures for unit tests.

use cl_types::{Objective, Problem, Score, Variable};

/// `x` in [0, 10] starting at 5; objective "distance" peaks at 3 with
/// satisfaction `1 / (1 + |x - 3|)`; the evaluator echoes `x`.
pub(crate) fn echo_problem() -> Problem {
    let mut problem = Problem::new();
    problem
        .add_variable(Variable::new("x", 5.0, 0.0, 10.0).unwrap())
        .unwrap();
    problem
        .add_objective(Objective::target("distance", 3.0, 1.0))
        .unwrap();
    problem.set_evaluator_fn(|trial, objectives| {
        let x = trial.point().value("x").unwrap_or(f64::NAN);
        trial.set_score(Score::new(&objectives[0], x))?;
        Ok(())
    });
    problem
}
