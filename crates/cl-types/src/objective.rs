//! Objectives and satisfaction curves.

use std::fmt;
use std::sync::Arc;

/// Maps a measured value to a satisfaction.
pub type SatisfactionFn = dyn Fn(f64) -> f64 + Send + Sync;

/// A named, scored dimension of a problem.
///
/// Satisfaction is the normalized desirability of a measured value, always in
/// `[0, 1]`. Curve output outside that range is clamped and non-finite output
/// counts as zero.
#[derive(Clone)]
pub struct Objective {
    name: String,
    curve: Arc<SatisfactionFn>,
}

impl Objective {
    pub fn new<F>(name: impl Into<String>, curve: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            curve: Arc::new(curve),
        }
    }

    /// Objective that is fully satisfied at `target` and decays as
    /// `1 / (1 + |value - target| / tolerance)`.
    pub fn target(name: impl Into<String>, target: f64, tolerance: f64) -> Self {
        Self::new(name, move |value| {
            SatisfactionCurve::inverse(value - target, tolerance)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn satisfaction(&self, value: f64) -> f64 {
        let raw = (self.curve)(value);
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective").field("name", &self.name).finish()
    }
}

/// Stock satisfaction curves.
pub struct SatisfactionCurve;

impl SatisfactionCurve {
    /// `1 / (1 + |value| / tolerance)`: 1 at zero, 0.5 at one tolerance.
    pub fn inverse(value: f64, tolerance: f64) -> f64 {
        1.0 / (1.0 + (value / tolerance).abs())
    }

    /// `1 / (1 + (value / tolerance)^2)`.
    pub fn inverse_square(value: f64, tolerance: f64) -> f64 {
        let x = value / tolerance;
        1.0 / (1.0 + x * x)
    }

    /// Rises linearly from 0 at `low` to 1 at `high`.
    pub fn linear_rising(value: f64, low: f64, high: f64) -> f64 {
        if high <= low {
            return if value >= high { 1.0 } else { 0.0 };
        }
        ((value - low) / (high - low)).clamp(0.0, 1.0)
    }

    /// Falls linearly from 1 at `low` to 0 at `high`.
    pub fn linear_falling(value: f64, low: f64, high: f64) -> f64 {
        1.0 - Self::linear_rising(value, low, high)
    }

    /// 1 at or above `threshold`, 0 below.
    pub fn step(value: f64, threshold: f64) -> f64 {
        if value >= threshold {
            1.0
        } else {
            0.0
        }
    }

    /// Logistic curve centred on `center`; a negative `slope` rewards small values.
    pub fn sigmoid(value: f64, center: f64, slope: f64) -> f64 {
        1.0 / (1.0 + (-slope * (value - center)).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_objective_peaks_at_target() {
        let objective = Objective::target("distance", 3.0, 1.0);
        assert_eq!(objective.satisfaction(3.0), 1.0);
        assert!((objective.satisfaction(4.0) - 0.5).abs() < 1e-12);
        assert!(objective.satisfaction(10.0) < objective.satisfaction(5.0));
    }

    #[test]
    fn satisfaction_is_clamped_and_finite() {
        let wild = Objective::new("wild", |v| v * 10.0);
        assert_eq!(wild.satisfaction(5.0), 1.0);
        assert_eq!(wild.satisfaction(-5.0), 0.0);

        let broken = Objective::new("broken", |_| f64::NAN);
        assert_eq!(broken.satisfaction(1.0), 0.0);
    }

    #[test]
    fn stock_curves() {
        assert!((SatisfactionCurve::inverse_square(1.0, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(SatisfactionCurve::linear_rising(5.0, 0.0, 10.0), 0.5);
        assert_eq!(SatisfactionCurve::linear_falling(10.0, 0.0, 10.0), 0.0);
        assert_eq!(SatisfactionCurve::step(0.99, 1.0), 0.0);
        assert_eq!(SatisfactionCurve::sigmoid(2.0, 2.0, 4.0), 0.5);
    }
}
