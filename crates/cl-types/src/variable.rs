//! Tunable variables.

use serde::{Deserialize, Serialize};

use crate::errors::ProblemError;

/// A named tunable quantity with bounds and an initial value.
///
/// The name is the variable's identity; trial points and hints are keyed by
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    initial: f64,
    lower: f64,
    upper: f64,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        initial: f64,
        lower: f64,
        upper: f64,
    ) -> Result<Self, ProblemError> {
        let name = name.into();
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(ProblemError::InvalidBounds { name, lower, upper });
        }
        if !(lower..=upper).contains(&initial) {
            return Err(ProblemError::InitialOutOfBounds {
                name,
                initial,
                lower,
                upper,
            });
        }
        Ok(Self {
            name,
            initial,
            lower,
            upper,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Width of the admissible range.
    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }

    /// Clamp `value` into the variable's bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        let err = Variable::new("x", 0.0, 5.0, 1.0).unwrap_err();
        assert!(matches!(err, ProblemError::InvalidBounds { .. }));
    }

    #[test]
    fn rejects_initial_outside_bounds() {
        let err = Variable::new("x", 11.0, 0.0, 10.0).unwrap_err();
        assert!(matches!(err, ProblemError::InitialOutOfBounds { .. }));
    }

    #[test]
    fn clamp_and_contains() {
        let x = Variable::new("x", 5.0, 0.0, 10.0).unwrap();
        assert!(x.contains(0.0));
        assert!(x.contains(10.0));
        assert!(!x.contains(10.5));
        assert_eq!(x.clamp(-3.0), 0.0);
        assert_eq!(x.span(), 10.0);
    }
}
