//! Uniswap V3 concentrated liquidity leg
//!
//! Prices are token1 per token0. The leg's liquidity and deposited token
//! amounts are not stored: they are re-solved from the current fields each
//! time they are read, so edits to the range, entry price, capital or token
//! split can never leave stale derived state behind.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult, validate_non_negative, validate_positive};

/// Maximum acceptable gap between the token0- and token1-implied liquidity
pub const LIQUIDITY_TOLERANCE: f64 = 0.01;

/// Bisection halvings allowed; beyond this the step is below f64 resolution
const MAX_BISECTION_STEPS: usize = 200;

const DAYS_PER_YEAR: f64 = 365.0;
const TICK_BASE: f64 = 1.0001;

/// Liquidity and token amounts produced by depositing capital at a price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityAllocation {
    /// Uniswap V3 liquidity `L`
    pub liquidity: f64,
    /// Token0 deposited
    pub amount0: f64,
    /// Token1 deposited
    pub amount1: f64,
}

/// Uniswap V3 liquidity position
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityPosition {
    lower_price: f64,
    upper_price: f64,
    price_at_entry: f64,
    value_at_entry: f64,
    apr: f64,
    token0_fraction: f64,
    use_custom_token_fraction: bool,
    enabled: bool,
}

impl LiquidityPosition {
    /// Create a position over `[lower_price, upper_price]`.
    ///
    /// `value_at_entry` is the capital in token1 units, `apr` the fee yield in
    /// percent. The custom token split starts disabled.
    pub fn new(
        lower_price: f64,
        upper_price: f64,
        price_at_entry: f64,
        value_at_entry: f64,
        token0_fraction: f64,
        apr: f64,
    ) -> EngineResult<Self> {
        validate_range(lower_price, upper_price)?;
        validate_positive("price at entry", price_at_entry)?;
        validate_positive("position value", value_at_entry)?;
        validate_fraction(token0_fraction)?;
        validate_non_negative("apr", apr)?;

        Ok(Self {
            lower_price,
            upper_price,
            price_at_entry,
            value_at_entry,
            apr,
            token0_fraction,
            use_custom_token_fraction: false,
            enabled: true,
        })
    }

    pub fn lower_price(&self) -> f64 {
        self.lower_price
    }

    pub fn upper_price(&self) -> f64 {
        self.upper_price
    }

    pub fn price_at_entry(&self) -> f64 {
        self.price_at_entry
    }

    pub fn value_at_entry(&self) -> f64 {
        self.value_at_entry
    }

    pub fn apr(&self) -> f64 {
        self.apr
    }

    pub fn token0_fraction(&self) -> f64 {
        self.token0_fraction
    }

    pub fn use_custom_token_fraction(&self) -> bool {
        self.use_custom_token_fraction
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Move both bounds at once; fails unless `lower < upper`
    pub fn set_range(&mut self, lower: f64, upper: f64) -> EngineResult<()> {
        validate_range(lower, upper)?;
        self.lower_price = lower;
        self.upper_price = upper;
        Ok(())
    }

    pub fn set_lower_price(&mut self, lower: f64) -> EngineResult<()> {
        self.set_range(lower, self.upper_price)
    }

    pub fn set_upper_price(&mut self, upper: f64) -> EngineResult<()> {
        self.set_range(self.lower_price, upper)
    }

    pub fn set_price_at_entry(&mut self, price: f64) -> EngineResult<()> {
        validate_positive("price at entry", price)?;
        self.price_at_entry = price;
        Ok(())
    }

    pub fn set_value_at_entry(&mut self, value: f64) -> EngineResult<()> {
        validate_positive("position value", value)?;
        self.value_at_entry = value;
        Ok(())
    }

    pub fn set_apr(&mut self, apr: f64) -> EngineResult<()> {
        validate_non_negative("apr", apr)?;
        self.apr = apr;
        Ok(())
    }

    pub fn set_token0_fraction(&mut self, fraction: f64) -> EngineResult<()> {
        validate_fraction(fraction)?;
        self.token0_fraction = fraction;
        Ok(())
    }

    pub fn set_use_custom_token_fraction(&mut self, custom: bool) {
        self.use_custom_token_fraction = custom;
    }

    /// Switch to a user-chosen token split in one step
    pub fn set_custom_token_distribution(&mut self, fraction: f64) -> EngineResult<()> {
        self.set_token0_fraction(fraction)?;
        self.use_custom_token_fraction = true;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn label(&self) -> String {
        format!("UniV3 IL {} {}", self.lower_price, self.upper_price)
    }

    fn sqrt_bounds(&self) -> (f64, f64) {
        (self.lower_price.sqrt(), self.upper_price.sqrt())
    }

    /// Solve the liquidity obtained by depositing the entry capital at the
    /// entry price.
    ///
    /// Outside the range the deposit is single-sided. Inside, the token0
    /// share is bisected until the liquidity implied by each token agrees
    /// within [`LIQUIDITY_TOLERANCE`]; token0-implied liquidity falls and
    /// token1-implied liquidity rises as the share grows, so the search moves
    /// towards whichever side is smaller.
    pub fn allocation(&self) -> EngineResult<LiquidityAllocation> {
        let price = self.price_at_entry;
        let capital = self.value_at_entry;
        let (sqrt_pl, sqrt_pu) = self.sqrt_bounds();

        if price <= self.lower_price {
            let amount0 = capital / price;
            return Ok(LiquidityAllocation {
                liquidity: amount0 * sqrt_pl * sqrt_pu / (sqrt_pu - sqrt_pl),
                amount0,
                amount1: 0.0,
            });
        }

        if price >= self.upper_price {
            return Ok(LiquidityAllocation {
                liquidity: capital / (sqrt_pu - sqrt_pl),
                amount0: 0.0,
                amount1: capital,
            });
        }

        let sqrt_p = price.sqrt();
        let amounts_for = |fraction: f64| (capital * fraction / price, capital * (1.0 - fraction));
        let liquidity_for = |amount0: f64, amount1: f64| {
            (
                amount0 * sqrt_p * sqrt_pu / (sqrt_pu - sqrt_p),
                amount1 / (sqrt_p - sqrt_pl),
            )
        };

        let mut fraction = 0.5;
        let mut step = 0.5;
        let (mut amount0, mut amount1) = amounts_for(fraction);
        let (mut l0, mut l1) = liquidity_for(amount0, amount1);

        let mut steps = 0;
        while (l1 - l0).abs() > LIQUIDITY_TOLERANCE {
            if steps == MAX_BISECTION_STEPS {
                warn!(
                    lower = self.lower_price,
                    upper = self.upper_price,
                    price,
                    capital,
                    "liquidity bisection did not converge"
                );
                return Err(EngineError::ConvergenceFailure { iterations: steps });
            }
            step /= 2.0;
            fraction += if l1 > l0 { step } else { -step };
            (amount0, amount1) = amounts_for(fraction);
            (l0, l1) = liquidity_for(amount0, amount1);
            steps += 1;
        }

        Ok(LiquidityAllocation {
            liquidity: l1,
            amount0,
            amount1,
        })
    }

    /// Liquidity `L` of the position
    pub fn liquidity(&self) -> EngineResult<f64> {
        Ok(self.allocation()?.liquidity)
    }

    /// Token amounts held at entry: the solved split, or the custom one
    pub fn deposited_amounts(&self) -> EngineResult<(f64, f64)> {
        if self.use_custom_token_fraction {
            return Ok((
                self.value_at_entry * self.token0_fraction / self.price_at_entry,
                self.value_at_entry * (1.0 - self.token0_fraction),
            ));
        }
        let allocation = self.allocation()?;
        Ok((allocation.amount0, allocation.amount1))
    }

    /// Token amounts the position holds at `price`
    pub fn token_amounts_at_price(&self, price: f64) -> EngineResult<(f64, f64)> {
        let liquidity = self.liquidity()?;
        Ok(self.amounts_with_liquidity(liquidity, price))
    }

    fn amounts_with_liquidity(&self, liquidity: f64, price: f64) -> (f64, f64) {
        let (sqrt_pl, sqrt_pu) = self.sqrt_bounds();

        if price <= self.lower_price {
            (liquidity * (sqrt_pu - sqrt_pl) / (sqrt_pl * sqrt_pu), 0.0)
        } else if price >= self.upper_price {
            (0.0, liquidity * (sqrt_pu - sqrt_pl))
        } else {
            let sqrt_p = price.sqrt();
            (
                liquidity * (sqrt_pu - sqrt_p) / (sqrt_p * sqrt_pu),
                liquidity * (sqrt_p - sqrt_pl),
            )
        }
    }

    /// Position value minus held-deposit value, both at each price, in token1
    pub fn impermanent_loss(&self, prices: &[f64]) -> EngineResult<Vec<f64>> {
        let liquidity = self.liquidity()?;
        let (deposited0, deposited1) = self.deposited_amounts()?;

        Ok(prices
            .iter()
            .map(|&price| {
                let (amount0, amount1) = self.amounts_with_liquidity(liquidity, price);
                let current = amount0 * price + amount1;
                let held = deposited0 * price + deposited1;
                current - held
            })
            .collect())
    }

    /// Impermanent loss at the lower and upper bound
    pub fn edge_losses(&self) -> EngineResult<(f64, f64)> {
        let losses = self.impermanent_loss(&[self.lower_price, self.upper_price])?;
        Ok((losses[0], losses[1]))
    }

    /// Sum of both edge losses
    pub fn combined_edge_loss(&self) -> EngineResult<f64> {
        let (lower, upper) = self.edge_losses()?;
        Ok(lower + upper)
    }

    /// Simple (non-compounding) fee income in token1 after `days` days
    pub fn fees_accrued(&self, days: u32) -> f64 {
        self.value_at_entry * (self.apr / 100.0) * (f64::from(days) / DAYS_PER_YEAR)
    }

    /// Number of 1bp ticks spanned by the range
    pub fn tick_span(&self) -> u64 {
        ticks_between(self.lower_price, self.upper_price)
    }
}

/// Tick index of a price: `log_1.0001(price)`
pub fn price_to_tick(price: f64) -> f64 {
    price.ln() / TICK_BASE.ln()
}

/// Absolute number of whole ticks between two prices
pub fn ticks_between(p1: f64, p2: f64) -> u64 {
    (price_to_tick(p2) - price_to_tick(p1)).round().abs() as u64
}

fn validate_range(lower: f64, upper: f64) -> EngineResult<()> {
    validate_positive("lower price", lower)?;
    validate_positive("upper price", upper)?;
    if lower >= upper {
        return Err(EngineError::InvalidRange { lower, upper });
    }
    Ok(())
}

fn validate_fraction(fraction: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter(format!("token0 fraction must lie in [0, 1], got {fraction}")))
    }
}
