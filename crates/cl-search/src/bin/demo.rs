use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cl_search::{GridSearch, PerturbationSearch, RandomSearch};
use cl_solver::{Solver, SolverConfig};
use cl_types::{Hint, Objective, Problem, SatisfactionCurve, Score, Variable};

/// Two-variable bowl centred on (1, -0.5) with a keep-out disc on the path
/// from the initial point.
fn demo_problem() -> anyhow::Result<Problem> {
    let mut problem = Problem::new();
    problem.add_variable(Variable::new("x", -4.0, -5.0, 5.0)?)?;
    problem.add_variable(Variable::new("y", 4.0, -5.0, 5.0)?)?;
    problem.add_objective(Objective::new("error", |value| {
        SatisfactionCurve::inverse(value, 0.5)
    }))?;
    problem.add_objective(Objective::target("x_near_one", 1.0, 1.0))?;
    problem.add_constraint_fn("keep_out", |trial| {
        let x = trial.point().value("x")?;
        let y = trial.point().value("y")?;
        let r2 = (x + 1.0).powi(2) + (y - 1.0).powi(2);
        (r2 < 1.0).then(|| format!("({x:.2}, {y:.2}) inside keep-out disc"))
    });
    problem.add_hint(Hint::initial_delta().with_delta("x", 1.5).with_delta("y", 1.5));
    problem.set_evaluator_fn(|trial, objectives| {
        let x = trial.point().value("x").unwrap_or(f64::NAN);
        let y = trial.point().value("y").unwrap_or(f64::NAN);
        let error = (x - 1.0).powi(2) + 2.0 * (y + 0.5).powi(2);
        for objective in objectives {
            let value = match objective.name() {
                "x_near_one" => x,
                _ => error,
            };
            trial.set_score(Score::new(objective, value))?;
        }
        Ok(())
    });
    Ok(problem)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::var("CALIPER_CONFIG") {
        Ok(path) => SolverConfig::from_file(&path)
            .with_context(|| format!("loading solver config from {path}"))?,
        Err(_) => SolverConfig::default(),
    };

    let mut solver = Solver::from_config(&config)?;
    solver.add_algorithm(Box::new(RandomSearch::new(1)));
    solver.add_algorithm(Box::new(GridSearch::new(11)));
    solver.add_algorithm(Box::new(PerturbationSearch::new(2)));

    let summary = solver.solve(demo_problem()?)?;

    println!("{}", solver.scoreboard());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
