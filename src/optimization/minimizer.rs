//! Derivative-free bounded minimization.
//!
//! Projected compass search: the iterate lives in bound-normalized
//! coordinates `u ∈ [0, 1]ⁿ`. Each sweep polls `u ± step·eᵢ` (clamped to the
//! box) one axis at a time and moves to the first strictly better feasible
//! point. A sweep with no improvement halves the step; the search converges
//! once the step drops below `tolerance`. Infeasible or non-finite points are
//! rejected outright (extreme barrier), so every accepted iterate satisfies
//! the constraint.

use serde::{Deserialize, Serialize};

/// A closed interval for one search dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    fn width(self) -> f64 {
        self.upper - self.lower
    }

    fn clamp(self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Hard cap on objective evaluations.
    pub max_evaluations: usize,
    /// Normalized step size at which the search is considered converged.
    pub tolerance: f64,
    /// First normalized step size.
    pub initial_step: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 2000,
            tolerance: 1e-4,
            initial_step: 0.25,
        }
    }
}

/// A converged search.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MinimizeError {
    #[error("bounds and starting point differ in dimension ({bounds} vs {start})")]
    DimensionMismatch { bounds: usize, start: usize },
    #[error("invalid bound for dimension {dim}: [{lower}, {upper}]")]
    InvalidBound { dim: usize, lower: f64, upper: f64 },
    #[error("starting point violates the constraints")]
    InfeasibleStart,
    #[error("iteration limit exceeded after {evaluations} evaluations (step {step:e})")]
    BudgetExhausted { evaluations: usize, step: f64 },
}

/// Minimize `objective` over the box `bounds`, subject to `feasible`.
///
/// `start` is projected onto the box before use and must then satisfy
/// `feasible`.
pub fn minimize<F, C>(
    mut objective: F,
    feasible: C,
    start: &[f64],
    bounds: &[Bound],
    options: &SearchOptions,
) -> Result<Minimum, MinimizeError>
where
    F: FnMut(&[f64]) -> f64,
    C: Fn(&[f64]) -> bool,
{
    if bounds.len() != start.len() {
        return Err(MinimizeError::DimensionMismatch {
            bounds: bounds.len(),
            start: start.len(),
        });
    }
    for (dim, b) in bounds.iter().enumerate() {
        if !(b.lower.is_finite() && b.upper.is_finite() && b.lower <= b.upper) {
            return Err(MinimizeError::InvalidBound {
                dim,
                lower: b.lower,
                upper: b.upper,
            });
        }
    }

    let to_x = |u: &[f64]| -> Vec<f64> {
        u.iter()
            .zip(bounds)
            .map(|(&ui, b)| b.clamp(b.lower + ui * b.width()))
            .collect()
    };

    // The accepted point is kept in unscaled coordinates as evaluated, so the
    // result is exactly a point that passed `feasible`.
    let mut x_best: Vec<f64> = start.iter().zip(bounds).map(|(&xi, b)| b.clamp(xi)).collect();
    let mut u: Vec<f64> = x_best
        .iter()
        .zip(bounds)
        .map(|(&xi, b)| {
            if b.width() > 0.0 {
                (xi - b.lower) / b.width()
            } else {
                0.0
            }
        })
        .collect();

    if !feasible(&x_best) {
        return Err(MinimizeError::InfeasibleStart);
    }

    let mut evaluations = 1;
    let mut best = objective(&x_best);
    if !best.is_finite() {
        best = f64::INFINITY;
    }

    let mut step = options.initial_step;
    while step >= options.tolerance {
        let mut improved = false;

        'poll: for dim in 0..u.len() {
            for sign in [1.0, -1.0] {
                let moved = (u[dim] + sign * step).clamp(0.0, 1.0);
                if moved == u[dim] {
                    continue;
                }
                if evaluations >= options.max_evaluations {
                    return Err(MinimizeError::BudgetExhausted { evaluations, step });
                }

                let mut trial = u.clone();
                trial[dim] = moved;
                let x = to_x(&trial);
                if !feasible(&x) {
                    continue;
                }

                evaluations += 1;
                let value = objective(&x);
                if value.is_finite() && value < best {
                    best = value;
                    u = trial;
                    x_best = x;
                    improved = true;
                    break 'poll;
                }
            }
        }

        if !improved {
            step *= 0.5;
        }
    }

    Ok(Minimum {
        x: x_best,
        value: best,
        evaluations,
    })
}
