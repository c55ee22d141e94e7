//! Linear futures leg

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult, validate_finite};

/// Direction of a futures leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FutureDirection {
    /// Profits when the underlying rises
    Long,
    /// Profits when the underlying falls
    Short,
}

impl FutureDirection {
    pub fn multiplier(self) -> f64 {
        match self {
            FutureDirection::Long => 1.0,
            FutureDirection::Short => -1.0,
        }
    }
}

impl fmt::Display for FutureDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureDirection::Long => write!(f, "long"),
            FutureDirection::Short => write!(f, "short"),
        }
    }
}

impl FromStr for FutureDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(FutureDirection::Long),
            "short" => Ok(FutureDirection::Short),
            other => Err(EngineError::InvalidInstrumentKind(format!("unknown future type '{other}'"))),
        }
    }
}

impl TryFrom<String> for FutureDirection {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FutureDirection> for String {
    fn from(direction: FutureDirection) -> Self {
        direction.to_string()
    }
}

/// Perpetual-style futures leg
#[derive(Debug, Clone, PartialEq)]
pub struct FutureInstrument {
    direction: FutureDirection,
    amount: f64,
    entry_price: f64,
    margin_percent: f64,
    enabled: bool,
}

impl FutureInstrument {
    /// Create a futures leg. Margin is clamped into `[0, 100]`, never rejected.
    pub fn new(
        direction: FutureDirection,
        amount: f64,
        entry_price: f64,
        margin_percent: f64,
    ) -> EngineResult<Self> {
        validate_finite("amount", amount)?;
        validate_finite("entry price", entry_price)?;
        validate_finite("margin", margin_percent)?;

        Ok(Self {
            direction,
            amount,
            entry_price,
            margin_percent: clamp_margin(margin_percent),
            enabled: true,
        })
    }

    pub fn direction(&self) -> FutureDirection {
        self.direction
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn margin_percent(&self) -> f64 {
        self.margin_percent
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_direction(&mut self, direction: FutureDirection) {
        self.direction = direction;
    }

    pub fn set_amount(&mut self, amount: f64) -> EngineResult<()> {
        validate_finite("amount", amount)?;
        self.amount = amount;
        Ok(())
    }

    pub fn set_entry_price(&mut self, price: f64) -> EngineResult<()> {
        validate_finite("entry price", price)?;
        self.entry_price = price;
        Ok(())
    }

    pub fn set_margin_percent(&mut self, margin: f64) -> EngineResult<()> {
        validate_finite("margin", margin)?;
        self.margin_percent = clamp_margin(margin);
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn label(&self) -> String {
        format!("{} {} @ {}% margin", self.direction, self.amount, self.margin_percent)
    }

    /// `±amount × (price − entry)` for each price
    pub fn payoff(&self, prices: &[f64]) -> Vec<f64> {
        let scale = self.direction.multiplier() * self.amount;
        prices.iter().map(|&price| scale * (price - self.entry_price)).collect()
    }
}

fn clamp_margin(margin: f64) -> f64 {
    margin.clamp(0.0, 100.0)
}
