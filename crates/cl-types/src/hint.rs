//! Search hints attached to a problem.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::variable::Variable;

/// Discriminant used to look a hint up on a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HintKind {
    InitialDelta,
    InitialDomain,
}

/// Guidance for algorithms about where to start searching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Hint {
    /// Half-width of the starting window around each variable's initial value.
    /// Variables without an entry use `default_fraction` of their span.
    InitialDelta {
        deltas: HashMap<String, f64>,
        default_fraction: f64,
    },
    /// Explicit starting range per variable; unlisted variables use their bounds.
    InitialDomain { ranges: HashMap<String, (f64, f64)> },
}

impl Hint {
    pub fn initial_delta() -> Self {
        Self::InitialDelta {
            deltas: HashMap::new(),
            default_fraction: 0.1,
        }
    }

    pub fn initial_domain() -> Self {
        Self::InitialDomain {
            ranges: HashMap::new(),
        }
    }

    /// Set the delta (or range) for one variable.
    pub fn with_delta(mut self, variable: impl Into<String>, delta: f64) -> Self {
        if let Self::InitialDelta { deltas, .. } = &mut self {
            deltas.insert(variable.into(), delta.abs());
        }
        self
    }

    pub fn with_range(mut self, variable: impl Into<String>, low: f64, high: f64) -> Self {
        if let Self::InitialDomain { ranges } = &mut self {
            ranges.insert(variable.into(), (low.min(high), low.max(high)));
        }
        self
    }

    pub fn kind(&self) -> HintKind {
        match self {
            Self::InitialDelta { .. } => HintKind::InitialDelta,
            Self::InitialDomain { .. } => HintKind::InitialDomain,
        }
    }

    /// Starting search range for `variable`, clamped to its bounds.
    pub fn range(&self, variable: &Variable) -> (f64, f64) {
        let (low, high) = match self {
            Self::InitialDelta {
                deltas,
                default_fraction,
            } => {
                let delta = deltas
                    .get(variable.name())
                    .copied()
                    .unwrap_or(default_fraction * variable.span());
                (variable.initial() - delta, variable.initial() + delta)
            }
            Self::InitialDomain { ranges } => ranges
                .get(variable.name())
                .copied()
                .unwrap_or((variable.lower(), variable.upper())),
        };
        (variable.clamp(low), variable.clamp(high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_range_is_clamped() {
        let x = Variable::new("x", 1.0, 0.0, 10.0).unwrap();
        let hint = Hint::initial_delta().with_delta("x", 2.0);
        assert_eq!(hint.range(&x), (0.0, 3.0));
    }

    #[test]
    fn delta_defaults_to_fraction_of_span() {
        let x = Variable::new("x", 5.0, 0.0, 10.0).unwrap();
        assert_eq!(Hint::initial_delta().range(&x), (4.0, 6.0));
    }

    #[test]
    fn domain_falls_back_to_bounds() {
        let x = Variable::new("x", 5.0, 0.0, 10.0).unwrap();
        let y = Variable::new("y", 5.0, 0.0, 10.0).unwrap();
        let hint = Hint::initial_domain().with_range("x", 6.0, 2.0);
        assert_eq!(hint.range(&x), (2.0, 6.0));
        assert_eq!(hint.range(&y), (0.0, 10.0));
        assert_eq!(hint.kind(), HintKind::InitialDomain);
    }
}
