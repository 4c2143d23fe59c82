use thiserror::Error;
use uuid::Uuid;

use crate::trial::TrialStatus;

/// Main error type for the Caliper system
#[derive(Error, Debug)]
pub enum CaliperError {
    #[error("Problem error: {0}")]
    Problem(#[from] ProblemError),

    #[error("Trial error: {0}")]
    Trial(#[from] TrialError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Problem setup and point validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Duplicate variable: {name}")]
    DuplicateVariable { name: String },

    #[error("Duplicate objective: {name}")]
    DuplicateObjective { name: String },

    #[error("Invalid bounds for {name}: lower {lower} must not exceed upper {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("Initial value {initial} of {name} lies outside [{lower}, {upper}]")]
    InitialOutOfBounds {
        name: String,
        initial: f64,
        lower: f64,
        upper: f64,
    },

    #[error("Trial point does not match the problem variables: missing {missing:?}, unexpected {unexpected:?}")]
    PointMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Value {value} of {name} lies outside [{lower}, {upper}]")]
    OutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
    },
}

/// Trial lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("Trial {trial_id} is already resolved ({status:?})")]
    AlreadyResolved { trial_id: Uuid, status: TrialStatus },

    #[error("Unknown objective {objective} for trial {trial_id}")]
    UnknownObjective { trial_id: Uuid, objective: String },
}

/// Errors raised while evaluating a trial
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("No evaluator configured for the problem")]
    MissingEvaluator,

    #[error("Evaluator left objective {objective} unscored")]
    MissingScore { objective: String },

    #[error("Measurement failed: {message}")]
    Measurement { message: String },

    #[error("Trial error: {0}")]
    Trial(#[from] TrialError),
}

impl EvaluationError {
    /// Shorthand for a failed measurement.
    pub fn measurement(message: impl Into<String>) -> Self {
        Self::Measurement {
            message: message.into(),
        }
    }
}

/// Result type alias for Caliper operations
pub type CaliperResult<T> = Result<T, CaliperError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CaliperError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProblemError::InvalidBounds {
            name: "x".to_string(),
            lower: 10.0,
            upper: 0.0,
        };

        assert!(error.to_string().contains("Invalid bounds"));
        assert!(error.to_string().contains("10"));
    }

    #[test]
    fn test_error_conversion() {
        let problem_error = ProblemError::DuplicateVariable {
            name: "x".to_string(),
        };
        let err: CaliperError = problem_error.into();

        match err {
            CaliperError::Problem(_) => (),
            _ => panic!("Expected Problem error"),
        }
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("Missing required field: {}", "stopper");
        assert!(matches!(config_err, CaliperError::Config(_)));
        assert!(config_err.to_string().contains("stopper"));
    }
}
