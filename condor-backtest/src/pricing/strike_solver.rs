//! Strike selection by target delta.
//!
//! For fixed spot, time and volatility, delta is monotonically non-increasing
//! in strike for both calls and puts, so the strike for a target delta is
//! found by bisection over a spot-relative bracket.

use thiserror::Error;

use crate::data::OptionType;

use super::black_scholes::BlackScholes;

/// Convergence tolerance on |delta(K) - target|.
pub const DELTA_TOLERANCE: f64 = 1e-4;

/// Bisection iteration budget.
pub const MAX_ITERATIONS: usize = 100;

/// Initial bracket as multiples of spot.
const INITIAL_BRACKET: (f64, f64) = (0.5, 1.5);

/// Bracket used after a single widening.
const WIDE_BRACKET: (f64, f64) = (0.25, 3.0);

/// The target delta could not be bracketed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "cannot bracket {option_type} delta {target_delta:.4} \
     (spot={spot:.2}, time={time:.4}, vol={vol:.4})"
)]
pub struct ConvergenceError {
    pub option_type: OptionType,
    pub target_delta: f64,
    pub spot: f64,
    pub time: f64,
    pub vol: f64,
}

/// Inverts Black-Scholes delta to a strike.
#[derive(Debug, Clone, Copy)]
pub struct StrikeSolver {
    bs: BlackScholes,
    tolerance: f64,
    max_iterations: usize,
}

impl StrikeSolver {
    pub fn new(bs: BlackScholes) -> Self {
        Self {
            bs,
            tolerance: DELTA_TOLERANCE,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Find the strike whose delta matches `target_delta`.
    ///
    /// Puts take a negative target, calls a positive one. When the iteration
    /// budget runs out the last midpoint is returned.
    pub fn strike_from_delta(
        &self,
        spot: f64,
        time: f64,
        vol: f64,
        target_delta: f64,
        opt_type: OptionType,
    ) -> Result<f64, ConvergenceError> {
        let error = || ConvergenceError {
            option_type: opt_type,
            target_delta,
            spot,
            time,
            vol,
        };

        // Delta is a step function here; no strike hits an interior target.
        if !(spot > 0.0 && time > 0.0 && vol > 0.0) || !target_delta.is_finite() {
            return Err(error());
        }

        let residual =
            |strike: f64| self.bs.delta(spot, strike, time, vol, opt_type) - target_delta;
        // Decreasing in strike: a root lies in [lo, hi] when f(lo) >= 0 >= f(hi).
        let brackets = |lo: f64, hi: f64| residual(lo) >= 0.0 && residual(hi) <= 0.0;

        let (mut lo, mut hi) = (INITIAL_BRACKET.0 * spot, INITIAL_BRACKET.1 * spot);
        if !brackets(lo, hi) {
            lo = WIDE_BRACKET.0 * spot;
            hi = WIDE_BRACKET.1 * spot;
            if !brackets(lo, hi) {
                return Err(error());
            }
        }

        let mut mid = 0.5 * (lo + hi);
        for _ in 0..self.max_iterations {
            mid = 0.5 * (lo + hi);
            let diff = residual(mid);

            if diff.abs() < self.tolerance {
                return Ok(mid);
            }

            if diff > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        Ok(mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SPOT: f64 = 590.0;
    const TIME: f64 = 30.0 / 365.0;
    const VOL: f64 = 0.18;

    fn solver() -> StrikeSolver {
        StrikeSolver::new(BlackScholes::new(0.05))
    }

    #[test]
    fn test_put_round_trip() {
        let bs = BlackScholes::new(0.05);
        for step in 1..=8 {
            let target = -0.05 * step as f64;
            let strike = solver()
                .strike_from_delta(SPOT, TIME, VOL, target, OptionType::Put)
                .unwrap();
            let delta = bs.delta(SPOT, strike, TIME, VOL, OptionType::Put);
            assert_relative_eq!(delta, target, epsilon = 1e-3);
            assert!(strike < SPOT);
        }
    }

    #[test]
    fn test_call_round_trip() {
        let bs = BlackScholes::new(0.05);
        for step in 1..=8 {
            let target = 0.05 * step as f64;
            let strike = solver()
                .strike_from_delta(SPOT, TIME, VOL, target, OptionType::Call)
                .unwrap();
            let delta = bs.delta(SPOT, strike, TIME, VOL, OptionType::Call);
            assert_relative_eq!(delta, target, epsilon = 1e-3);
            assert!(strike > SPOT);
        }
    }

    #[test]
    fn test_sixteen_delta_strikes_straddle_spot() {
        let s = solver();
        let put = s
            .strike_from_delta(SPOT, TIME, VOL, -0.16, OptionType::Put)
            .unwrap();
        let call = s
            .strike_from_delta(SPOT, TIME, VOL, 0.16, OptionType::Call)
            .unwrap();

        // Roughly one standard deviation (S * vol * sqrt(T) ~ 30) either side.
        assert!(put > 555.0 && put < 575.0, "put strike {}", put);
        assert!(call > 610.0 && call < 630.0, "call strike {}", call);
    }

    #[test]
    fn test_widened_bracket_for_deep_targets() {
        // High vol and long tenor push the 5-delta put below half of spot.
        let strike = solver()
            .strike_from_delta(100.0, 2.0, 0.9, -0.05, OptionType::Put)
            .unwrap();
        assert!(strike < 50.0);
    }

    #[test]
    fn test_degenerate_inputs_fail() {
        let s = solver();
        assert!(s
            .strike_from_delta(SPOT, 0.0, VOL, -0.16, OptionType::Put)
            .is_err());
        assert!(s
            .strike_from_delta(SPOT, TIME, 0.0, 0.16, OptionType::Call)
            .is_err());
    }

    #[test]
    fn test_wrong_sign_target_cannot_bracket() {
        let err = solver()
            .strike_from_delta(SPOT, TIME, VOL, 0.16, OptionType::Put)
            .unwrap_err();
        assert_eq!(err.option_type, OptionType::Put);
        assert!(err.to_string().contains("cannot bracket"));
    }
}
