//! ShrivenQuant Payoff Engine
//! Payoff curves for multi-leg option, futures and Uniswap V3 strategies
//!
//! Features:
//! - Black-Scholes pricing with Newton-Raphson implied volatility
//! - Delta and theta for option legs
//! - Linear futures payoff with clamped margin
//! - Uniswap V3 liquidity solve, impermanent loss and fee accrual
//! - Strategy aggregation over an evenly spaced price grid
//! - Saved-strategy JSON compatible with the charting front end
//!
//! The engine is synchronous and allocation-light: every valuation is a pure
//! pass over the current instrument fields.

pub mod config;
pub mod error;
pub mod future;
pub mod grid;
pub mod liquidity;
pub mod option;
pub mod persistence;
pub mod position;
pub mod pricing;
pub mod strategy;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use future::{FutureDirection, FutureInstrument};
pub use grid::{linspace, price_grid};
pub use liquidity::{LiquidityAllocation, LiquidityPosition};
pub use option::{LegGreeks, OptionInstrument, PositionSide, PricingConsistency};
pub use persistence::{FutureRecord, LiquidityRecord, OptionRecord, PositionRecord, StrategyRecord};
pub use position::{Leg, Position};
pub use pricing::{BlackScholes, IvSolverParams, OptionKind};
pub use strategy::{LegSeries, PayoffSurface, Strategy, StrategySeries};
