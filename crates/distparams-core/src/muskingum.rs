//! Derived Muskingum travel time `k`.
//!
//! Muskingum routing stays stable only while `k` sits between
//! `0.5 / (1 - x)` and `0.5 / x`. An optimiser therefore does not search `k`
//! directly: it searches a position in `[0, 100]` along a 101-point grid
//! spanning those `x`-dependent limits, clipped to the global bounds.
use crate::error::{invalid, Result};

/// Number of candidate `k` values between the two limits.
pub const N_CANDIDATES: usize = 101;

/// Default global upper bound on `k` (hours).
pub const DEFAULT_KUB: f64 = 1.0;
/// Default global lower bound on `k` (hours).
pub const DEFAULT_KLB: f64 = 0.5;

/// The `x`-dependent limits `(constraint_high, constraint_low)` after
/// clipping to `ub` / `lb`.
///
/// `constraint_high = 0.5 / (1 - x)` is clipped down to `ub`,
/// `constraint_low = 0.5 / x` is clipped up to `lb`.
pub fn k_limits(x: f64, ub: f64, lb: f64) -> Result<(f64, f64)> {
    if !x.is_finite() {
        return invalid!("muskingum x must be finite, got {x}");
    }
    if x == 0.0 || x == 1.0 {
        return invalid!("muskingum x = {x} divides by zero; x must not be 0 or 1");
    }
    let mut high = 0.5 / (1.0 - x);
    let mut low = 0.5 / x;
    if high > ub {
        high = ub;
    }
    if low < lb {
        low = lb;
    }
    Ok((high, low))
}

/// The 101 evenly spaced candidates from `start` to `stop` inclusive.
/// Descending when `start > stop`.
pub fn candidates(start: f64, stop: f64) -> [f64; N_CANDIDATES] {
    let step = (stop - start) / (N_CANDIDATES - 1) as f64;
    let mut out = [0.0; N_CANDIDATES];
    for (i, v) in out.iter_mut().enumerate() {
        *v = start + i as f64 * step;
    }
    out[N_CANDIDATES - 1] = stop;
    out
}

/// Pick the travel time `k` for weighting coefficient `x` at grid `position`.
///
/// `position` is rounded half-to-even and must land in `[0, 100]`.
pub fn calculate_k(x: f64, position: f64, ub: f64, lb: f64) -> Result<f64> {
    let (high, low) = k_limits(x, ub, lb)?;

    if !position.is_finite() {
        return invalid!("k position must be finite, got {position}");
    }
    let idx = position.round_ties_even();
    if !(0.0..=(N_CANDIDATES - 1) as f64).contains(&idx) {
        return invalid!(
            "k position {position} rounds to {idx}, outside [0, {}]",
            N_CANDIDATES - 1
        );
    }

    Ok(candidates(high, low)[idx as usize])
}
