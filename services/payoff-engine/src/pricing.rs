//! Black-Scholes pricing primitives
//!
//! Everything here is a pure function of its arguments. Time is expressed in
//! years, volatility and rates as decimals (0.5 = 50%).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

const SQRT_2PI: f64 = 2.5066282746310007;
const DAYS_PER_YEAR: f64 = 365.0;

// Abramowitz-Stegun 7.1.26 coefficients
const AS_A1: f64 = 0.254829592;
const AS_A2: f64 = -0.284496736;
const AS_A3: f64 = 1.421413741;
const AS_A4: f64 = -1.453152027;
const AS_A5: f64 = 1.061405429;
const AS_P: f64 = 0.3275911;

/// Option type for derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptionKind {
    /// Call option - right to buy the underlying at strike price
    Call,
    /// Put option - right to sell the underlying at strike price
    Put,
}

impl OptionKind {
    /// Value of the option at expiry
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        }
    }
}

/// Tuning knobs for the Newton-Raphson implied volatility solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvSolverParams {
    /// Maximum Newton steps before giving up
    pub max_iterations: usize,
    /// Absolute price tolerance, also used as the volatility floor
    pub tolerance: f64,
    /// Starting volatility
    pub initial_guess: f64,
}

impl Default for IvSolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-5,
            initial_guess: 0.5,
        }
    }
}

/// Black-Scholes option pricing model implementation
#[derive(Debug)]
pub struct BlackScholes;

impl BlackScholes {
    /// Standard normal cumulative distribution function.
    ///
    /// Rational approximation of erf (Abramowitz-Stegun 7.1.26), absolute
    /// error below 1.5e-7 for every real `x`.
    pub fn norm_cdf(x: f64) -> f64 {
        let sign = if x < 0.0 { -1.0 } else { 1.0 };
        let z = x.abs() / std::f64::consts::SQRT_2;

        let t = 1.0 / (1.0 + AS_P * z);
        let poly = ((((AS_A5 * t + AS_A4) * t + AS_A3) * t + AS_A2) * t + AS_A1) * t;
        let erf = 1.0 - poly * (-z * z).exp();

        0.5 * (1.0 + sign * erf)
    }

    /// Standard normal probability density function
    pub fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / SQRT_2PI
    }

    /// Calculate d1 parameter
    pub fn d1(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
        ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / (vol * time.sqrt())
    }

    /// Calculate d2 parameter
    pub fn d2(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
        Self::d1(spot, strike, rate, vol, time) - vol * time.sqrt()
    }

    /// Black-Scholes option price.
    ///
    /// Falls back to intrinsic value when `time <= 0` or `vol <= 0`; the
    /// closed form divides by `vol * sqrt(time)`.
    pub fn price(kind: OptionKind, spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return kind.intrinsic(spot, strike);
        }

        let d1 = Self::d1(spot, strike, rate, vol, time);
        let d2 = d1 - vol * time.sqrt();
        let discounted_strike = strike * (-rate * time).exp();

        match kind {
            OptionKind::Call => spot * Self::norm_cdf(d1) - discounted_strike * Self::norm_cdf(d2),
            OptionKind::Put => discounted_strike * Self::norm_cdf(-d2) - spot * Self::norm_cdf(-d1),
        }
    }

    /// Sensitivity to volatility, per unit (not per 1%) change
    pub fn vega(spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return 0.0;
        }
        let d1 = Self::d1(spot, strike, rate, vol, time);
        spot * time.sqrt() * Self::norm_pdf(d1)
    }

    /// Rate of change of option price with respect to underlying price
    pub fn delta(kind: OptionKind, spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return 0.0;
        }
        let nd1 = Self::norm_cdf(Self::d1(spot, strike, rate, vol, time));
        match kind {
            OptionKind::Call => nd1,
            OptionKind::Put => nd1 - 1.0,
        }
    }

    /// Time decay per calendar day
    pub fn theta(kind: OptionKind, spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return 0.0;
        }
        let sqrt_t = time.sqrt();
        let d1 = Self::d1(spot, strike, rate, vol, time);
        let d2 = d1 - vol * sqrt_t;
        let decay = -spot * Self::norm_pdf(d1) * vol / (2.0 * sqrt_t);
        let carry = rate * strike * (-rate * time).exp();

        match kind {
            OptionKind::Call => (decay - carry * Self::norm_cdf(d2)) / DAYS_PER_YEAR,
            OptionKind::Put => (decay + carry * Self::norm_cdf(-d2)) / DAYS_PER_YEAR,
        }
    }

    /// Implied volatility using Newton-Raphson method.
    ///
    /// Returns the first sigma whose price lies within `params.tolerance` of
    /// `market_price`. A step that would make sigma non-positive is clamped to
    /// the tolerance instead.
    pub fn implied_volatility(
        kind: OptionKind,
        spot: f64,
        strike: f64,
        time: f64,
        market_price: f64,
        rate: f64,
        params: IvSolverParams,
    ) -> EngineResult<f64> {
        if time <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "time to expiry must be positive to solve implied volatility, got {time}"
            )));
        }

        let mut sigma = params.initial_guess;
        for iteration in 0..params.max_iterations {
            let price = Self::price(kind, spot, strike, time, sigma, rate);
            let diff = price - market_price;
            if diff.abs() < params.tolerance {
                return Ok(sigma);
            }

            let vega = Self::vega(spot, strike, time, sigma, rate);
            if !vega.is_finite() || vega == 0.0 {
                warn!(?kind, spot, strike, market_price, sigma, "vega vanished during implied volatility solve");
                return Err(EngineError::ConvergenceFailure { iterations: iteration + 1 });
            }

            sigma -= diff / vega;
            if sigma <= 0.0 {
                sigma = params.tolerance;
            }
        }

        warn!(?kind, spot, strike, market_price, "implied volatility did not converge");
        Err(EngineError::ConvergenceFailure {
            iterations: params.max_iterations,
        })
    }
}
