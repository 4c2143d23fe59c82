//! Shared fixtures for unit tests.

use cl_types::{AlgorithmTag, Objective, Problem, Score, Trial, Variable};

/// `x` in [0, 10] starting at 5; objective "distance" peaks at 3 with
/// satisfaction `1 / (1 + |x - 3|)`; the evaluator scores every objective
/// with `x` itself.
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
        for objective in objectives {
            trial.set_score(Score::new(objective, x))?;
        }
        Ok(())
    });
    problem
}

pub(crate) fn evaluated(problem: &Problem, x: f64, algorithm: Option<AlgorithmTag>) -> Trial {
    let mut trial = problem
        .new_trial([("x", x)].into_iter().collect(), algorithm)
        .unwrap();
    problem.evaluate(&mut trial).unwrap();
    trial
}
