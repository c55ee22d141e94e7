//! Closed set of strategy legs

use uuid::Uuid;

use crate::error::EngineResult;
use crate::future::FutureInstrument;
use crate::liquidity::LiquidityPosition;
use crate::option::OptionInstrument;

/// One instrument of a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    /// Vanilla option priced with Black-Scholes
    Option(OptionInstrument),
    /// Linear futures exposure
    Future(FutureInstrument),
    /// Uniswap V3 concentrated liquidity
    UniswapV3(LiquidityPosition),
}

impl Position {
    /// Persisted type tag
    pub fn type_tag(&self) -> &'static str {
        match self {
            Position::Option(_) => "option",
            Position::Future(_) => "future",
            Position::UniswapV3(_) => "uniswap_v3",
        }
    }

    pub fn label(&self) -> String {
        match self {
            Position::Option(option) => option.label(),
            Position::Future(future) => future.label(),
            Position::UniswapV3(liquidity) => liquidity.label(),
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Position::Option(option) => option.enabled(),
            Position::Future(future) => future.enabled(),
            Position::UniswapV3(liquidity) => liquidity.enabled(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        match self {
            Position::Option(option) => option.set_enabled(enabled),
            Position::Future(future) => future.set_enabled(enabled),
            Position::UniswapV3(liquidity) => liquidity.set_enabled(enabled),
        }
    }

    /// Reset the leg's reference price to `spot`
    pub fn reprice_to(&mut self, spot: f64) -> EngineResult<()> {
        match self {
            Position::Option(option) => option.set_spot_price_at_entry(spot),
            Position::Future(future) => future.set_entry_price(spot),
            Position::UniswapV3(liquidity) => liquidity.set_price_at_entry(spot),
        }
    }
}

impl From<OptionInstrument> for Position {
    fn from(option: OptionInstrument) -> Self {
        Position::Option(option)
    }
}

impl From<FutureInstrument> for Position {
    fn from(future: FutureInstrument) -> Self {
        Position::Future(future)
    }
}

impl From<LiquidityPosition> for Position {
    fn from(liquidity: LiquidityPosition) -> Self {
        Position::UniswapV3(liquidity)
    }
}

/// A position together with its strategy-scoped identity
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    /// Generated when the leg joins a strategy; never persisted
    pub id: Uuid,
    /// The instrument itself
    pub position: Position,
}

impl Leg {
    pub fn new(position: Position) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
        }
    }
}
