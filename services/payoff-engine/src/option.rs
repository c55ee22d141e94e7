//! Vanilla option leg
//!
//! The quoted entry premium is the single source of truth for volatility:
//! implied volatility is re-derived from the entry fields whenever a forward
//! valuation needs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult, validate_finite, validate_non_negative, validate_positive};
use crate::pricing::{BlackScholes, IvSolverParams, OptionKind};

const DAYS_PER_YEAR: f64 = 365.0;

/// Direction of an option leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PositionSide {
    /// Long the option, premium paid
    Buy,
    /// Short the option, premium received
    Sell,
}

impl PositionSide {
    /// +1 for long exposure, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Buy => 1.0,
            PositionSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "Call"),
            OptionKind::Put => write!(f, "Put"),
        }
    }
}

impl FromStr for OptionKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(OptionKind::Call),
            "put" => Ok(OptionKind::Put),
            other => Err(EngineError::InvalidInstrumentKind(format!("unknown option type '{other}'"))),
        }
    }
}

impl TryFrom<String> for OptionKind {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionKind> for String {
    fn from(kind: OptionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Buy => write!(f, "Buy"),
            PositionSide::Sell => write!(f, "Sell"),
        }
    }
}

impl FromStr for PositionSide {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(PositionSide::Buy),
            "sell" => Ok(PositionSide::Sell),
            other => Err(EngineError::InvalidInstrumentKind(format!("unknown position side '{other}'"))),
        }
    }
}

impl TryFrom<String> for PositionSide {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PositionSide> for String {
    fn from(side: PositionSide) -> Self {
        side.to_string()
    }
}

/// Delta and theta of a leg, signed by side and scaled by quantity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegGreeks {
    /// Rate of change of leg value with respect to underlying price
    pub delta: f64,
    /// Leg value lost per calendar day
    pub theta: f64,
}

/// Quoted premium compared with the model premium at entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConsistency {
    /// Black-Scholes premium at entry using the solved volatility
    pub theoretical_premium: f64,
    /// Premium actually quoted
    pub actual_premium: f64,
    /// `actual - theoretical`
    pub difference: f64,
    /// Difference as a percentage of theoretical, 0 when theoretical is 0
    pub percentage_difference: f64,
}

/// Single option leg
#[derive(Debug, Clone, PartialEq)]
pub struct OptionInstrument {
    kind: OptionKind,
    side: PositionSide,
    quantity: f64,
    strike_price: f64,
    premium_per_unit: f64,
    spot_price_at_entry: f64,
    expiration_days: u32,
    risk_free_rate: f64,
    enabled: bool,
}

impl OptionInstrument {
    /// Create a new option leg, validating every numeric field
    pub fn new(
        kind: OptionKind,
        side: PositionSide,
        quantity: f64,
        strike_price: f64,
        premium_per_unit: f64,
        spot_price_at_entry: f64,
        expiration_days: u32,
    ) -> EngineResult<Self> {
        validate_positive("quantity", quantity)?;
        validate_positive("strike price", strike_price)?;
        validate_non_negative("premium", premium_per_unit)?;
        validate_positive("spot price at entry", spot_price_at_entry)?;
        validate_expiration(expiration_days)?;

        Ok(Self {
            kind,
            side,
            quantity,
            strike_price,
            premium_per_unit,
            spot_price_at_entry,
            expiration_days,
            risk_free_rate: 0.0,
            enabled: true,
        })
    }

    /// Set the continuously compounded risk-free rate
    pub fn with_risk_free_rate(mut self, rate: f64) -> EngineResult<Self> {
        self.set_risk_free_rate(rate)?;
        Ok(self)
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn strike_price(&self) -> f64 {
        self.strike_price
    }

    pub fn premium_per_unit(&self) -> f64 {
        self.premium_per_unit
    }

    pub fn spot_price_at_entry(&self) -> f64 {
        self.spot_price_at_entry
    }

    pub fn expiration_days(&self) -> u32 {
        self.expiration_days
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_kind(&mut self, kind: OptionKind) {
        self.kind = kind;
    }

    pub fn set_side(&mut self, side: PositionSide) {
        self.side = side;
    }

    pub fn set_quantity(&mut self, quantity: f64) -> EngineResult<()> {
        validate_positive("quantity", quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_strike_price(&mut self, strike_price: f64) -> EngineResult<()> {
        validate_positive("strike price", strike_price)?;
        self.strike_price = strike_price;
        Ok(())
    }

    pub fn set_premium_per_unit(&mut self, premium: f64) -> EngineResult<()> {
        validate_non_negative("premium", premium)?;
        self.premium_per_unit = premium;
        Ok(())
    }

    pub fn set_spot_price_at_entry(&mut self, spot: f64) -> EngineResult<()> {
        validate_positive("spot price at entry", spot)?;
        self.spot_price_at_entry = spot;
        Ok(())
    }

    pub fn set_expiration_days(&mut self, days: u32) -> EngineResult<()> {
        validate_expiration(days)?;
        self.expiration_days = days;
        Ok(())
    }

    pub fn set_risk_free_rate(&mut self, rate: f64) -> EngineResult<()> {
        validate_finite("risk-free rate", rate)?;
        self.risk_free_rate = rate;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Premium paid or received for the whole leg
    pub fn total_premium(&self) -> f64 {
        self.quantity * self.premium_per_unit
    }

    /// Premium cash flow at entry: negative when bought, positive when sold
    pub fn premium_cash_flow(&self) -> f64 {
        -self.side.sign() * self.total_premium()
    }

    /// Human-readable series name
    pub fn label(&self) -> String {
        format!(
            "{} {} {} @ {}. ${} ({}d)",
            self.kind,
            self.side,
            self.quantity,
            self.strike_price,
            self.total_premium(),
            self.expiration_days
        )
    }

    /// Volatility consistent with the quoted entry premium
    pub fn implied_volatility(&self) -> EngineResult<f64> {
        BlackScholes::implied_volatility(
            self.kind,
            self.spot_price_at_entry,
            self.strike_price,
            f64::from(self.expiration_days) / DAYS_PER_YEAR,
            self.premium_per_unit,
            self.risk_free_rate,
            IvSolverParams::default(),
        )
    }

    /// Years left to expiry after `days_elapsed` days in the position
    pub fn time_to_expiry(&self, days_elapsed: u32) -> f64 {
        f64::from(self.expiration_days.saturating_sub(days_elapsed)) / DAYS_PER_YEAR
    }

    /// P&L of the leg for each hypothetical price after `days_elapsed` days
    pub fn payoff(&self, prices: &[f64], days_elapsed: u32) -> EngineResult<Vec<f64>> {
        let time = self.time_to_expiry(days_elapsed);
        let vol = if time > 0.0 { Some(self.implied_volatility()?) } else { None };

        Ok(prices.iter().map(|&price| self.pnl_with(price, time, vol)).collect())
    }

    /// P&L at a single price
    pub fn pnl_at(&self, price: f64, days_elapsed: u32) -> EngineResult<f64> {
        let time = self.time_to_expiry(days_elapsed);
        let vol = if time > 0.0 { Some(self.implied_volatility()?) } else { None };
        Ok(self.pnl_with(price, time, vol))
    }

    fn pnl_with(&self, price: f64, time: f64, vol: Option<f64>) -> f64 {
        let value = match vol {
            Some(vol) if time > 0.0 => {
                BlackScholes::price(self.kind, price, self.strike_price, time, vol, self.risk_free_rate)
            }
            _ => self.kind.intrinsic(price, self.strike_price),
        };

        match self.side {
            PositionSide::Buy => (value - self.premium_per_unit) * self.quantity,
            PositionSide::Sell => (self.premium_per_unit - value) * self.quantity,
        }
    }

    /// Delta and theta of the leg at `price` after `days_elapsed` days
    pub fn greeks(&self, price: f64, days_elapsed: u32) -> EngineResult<LegGreeks> {
        let time = self.time_to_expiry(days_elapsed);
        if time <= 0.0 {
            return Ok(LegGreeks::default());
        }

        let vol = self.implied_volatility()?;
        let scale = self.quantity * self.side.sign();
        Ok(LegGreeks {
            delta: BlackScholes::delta(self.kind, price, self.strike_price, time, vol, self.risk_free_rate) * scale,
            theta: BlackScholes::theta(self.kind, price, self.strike_price, time, vol, self.risk_free_rate) * scale,
        })
    }

    /// Model premium at entry, full expiry, solved volatility
    pub fn theoretical_premium_at_entry(&self) -> EngineResult<f64> {
        let vol = self.implied_volatility()?;
        Ok(BlackScholes::price(
            self.kind,
            self.spot_price_at_entry,
            self.strike_price,
            f64::from(self.expiration_days) / DAYS_PER_YEAR,
            vol,
            self.risk_free_rate,
        ))
    }

    /// How far the quoted premium sits from the model premium
    pub fn pricing_consistency(&self) -> EngineResult<PricingConsistency> {
        let theoretical = self.theoretical_premium_at_entry()?;
        let actual = self.premium_per_unit;
        let difference = actual - theoretical;
        let percentage_difference = if theoretical != 0.0 {
            difference / theoretical * 100.0
        } else {
            0.0
        };

        Ok(PricingConsistency {
            theoretical_premium: theoretical,
            actual_premium: actual,
            difference,
            percentage_difference,
        })
    }
}

fn validate_expiration(days: u32) -> EngineResult<()> {
    if days == 0 {
        return Err(EngineError::InvalidParameter("expiration days must be greater than zero".to_string()));
    }
    Ok(())
}
