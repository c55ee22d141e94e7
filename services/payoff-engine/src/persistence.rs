//! At-rest JSON shapes for positions and strategies
//!
//! Field names follow the saved-strategy format used by the charting front
//! end, so files written by either side load in the other. Records are
//! converted into instruments through the validating constructors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::future::{FutureDirection, FutureInstrument};
use crate::liquidity::LiquidityPosition;
use crate::option::{OptionInstrument, PositionSide};
use crate::position::Position;
use crate::pricing::OptionKind;

const KNOWN_TAGS: [&str; 3] = ["option", "future", "uniswap_v3"];

fn default_enabled() -> bool {
    true
}

/// Persisted option leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRecord {
    #[serde(rename = "optionType")]
    pub option_type: OptionKind,
    pub position: PositionSide,
    pub quantity: f64,
    pub strike_price: f64,
    pub premium_per_item: f64,
    #[serde(rename = "purchaseSpotPrice")]
    pub purchase_spot_price: f64,
    #[serde(rename = "expirationDays")]
    pub expiration_days: u32,
    #[serde(rename = "riskFreeRate", default)]
    pub risk_free_rate: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Persisted futures leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRecord {
    #[serde(rename = "futureType")]
    pub future_type: FutureDirection,
    pub amount: f64,
    pub margin: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub price: f64,
}

/// Persisted Uniswap V3 leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRecord {
    pub p_l: f64,
    pub p_u: f64,
    #[serde(rename = "initialPriceInToken1")]
    pub initial_price_in_token1: f64,
    #[serde(rename = "initialPositionValueInToken1")]
    pub initial_position_value_in_token1: f64,
    #[serde(rename = "t0Part")]
    pub t0_part: f64,
    pub apr: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "isCustomTokenDistribution", default)]
    pub is_custom_token_distribution: bool,
}

/// `{type, data}` envelope around a persisted leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PositionRecord {
    #[serde(rename = "option")]
    Option(OptionRecord),
    #[serde(rename = "future")]
    Future(FutureRecord),
    #[serde(rename = "uniswap_v3")]
    UniswapV3(LiquidityRecord),
}

/// Persisted strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub name: String,
    pub positions: Vec<PositionRecord>,
    #[serde(rename = "spotPrice")]
    pub spot_price: f64,
    #[serde(rename = "daysInPosition")]
    pub days_in_position: u32,
    #[serde(rename = "savedAt", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(rename = "hiddenSeries", default)]
    pub hidden_series: Vec<String>,
    #[serde(rename = "priceRangePercent", default, skip_serializing_if = "Option::is_none")]
    pub price_range_percent: Option<f64>,
    #[serde(rename = "includeFeesInTotal", default, skip_serializing_if = "Option::is_none")]
    pub include_fees_in_total: Option<bool>,
    #[serde(rename = "gridPoints", default, skip_serializing_if = "Option::is_none")]
    pub grid_points: Option<usize>,
}

impl StrategyRecord {
    /// Parse a saved strategy, rejecting position tags outside the known set
    /// and unknown instrument kinds before the typed decode.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(positions) = value.get("positions").and_then(serde_json::Value::as_array) {
            for position in positions {
                check_position(position)?;
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl PositionRecord {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        check_position(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn check_position(value: &serde_json::Value) -> EngineResult<()> {
    let tag = match value.get("type").and_then(serde_json::Value::as_str) {
        Some(tag) if KNOWN_TAGS.contains(&tag) => tag,
        Some(tag) => return Err(EngineError::UnknownVariant(tag.to_string())),
        None => return Err(EngineError::UnknownVariant("<missing type tag>".to_string())),
    };

    // Kind strings go through `FromStr` so a bad one reports the kind, not a serde error
    match tag {
        "option" => {
            if let Some(kind) = data_str(value, "optionType") {
                kind.parse::<OptionKind>()?;
            }
            if let Some(side) = data_str(value, "position") {
                side.parse::<PositionSide>()?;
            }
        }
        "future" => {
            if let Some(direction) = data_str(value, "futureType") {
                direction.parse::<FutureDirection>()?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn data_str<'a>(value: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    value.get("data")?.get(name)?.as_str()
}

impl From<&OptionInstrument> for OptionRecord {
    fn from(option: &OptionInstrument) -> Self {
        Self {
            option_type: option.kind(),
            position: option.side(),
            quantity: option.quantity(),
            strike_price: option.strike_price(),
            premium_per_item: option.premium_per_unit(),
            purchase_spot_price: option.spot_price_at_entry(),
            expiration_days: option.expiration_days(),
            risk_free_rate: option.risk_free_rate(),
            enabled: option.enabled(),
        }
    }
}

impl TryFrom<OptionRecord> for OptionInstrument {
    type Error = EngineError;

    fn try_from(record: OptionRecord) -> EngineResult<Self> {
        let mut option = OptionInstrument::new(
            record.option_type,
            record.position,
            record.quantity,
            record.strike_price,
            record.premium_per_item,
            record.purchase_spot_price,
            record.expiration_days,
        )?
        .with_risk_free_rate(record.risk_free_rate)?;
        option.set_enabled(record.enabled);
        Ok(option)
    }
}

impl From<&FutureInstrument> for FutureRecord {
    fn from(future: &FutureInstrument) -> Self {
        Self {
            future_type: future.direction(),
            amount: future.amount(),
            margin: future.margin_percent(),
            enabled: future.enabled(),
            price: future.entry_price(),
        }
    }
}

impl TryFrom<FutureRecord> for FutureInstrument {
    type Error = EngineError;

    fn try_from(record: FutureRecord) -> EngineResult<Self> {
        let mut future =
            FutureInstrument::new(record.future_type, record.amount, record.price, record.margin)?;
        future.set_enabled(record.enabled);
        Ok(future)
    }
}

impl From<&LiquidityPosition> for LiquidityRecord {
    fn from(liquidity: &LiquidityPosition) -> Self {
        Self {
            p_l: liquidity.lower_price(),
            p_u: liquidity.upper_price(),
            initial_price_in_token1: liquidity.price_at_entry(),
            initial_position_value_in_token1: liquidity.value_at_entry(),
            t0_part: liquidity.token0_fraction(),
            apr: liquidity.apr(),
            enabled: liquidity.enabled(),
            is_custom_token_distribution: liquidity.use_custom_token_fraction(),
        }
    }
}

impl TryFrom<LiquidityRecord> for LiquidityPosition {
    type Error = EngineError;

    fn try_from(record: LiquidityRecord) -> EngineResult<Self> {
        let mut liquidity = LiquidityPosition::new(
            record.p_l,
            record.p_u,
            record.initial_price_in_token1,
            record.initial_position_value_in_token1,
            record.t0_part,
            record.apr,
        )?;
        liquidity.set_use_custom_token_fraction(record.is_custom_token_distribution);
        liquidity.set_enabled(record.enabled);
        Ok(liquidity)
    }
}

impl From<&Position> for PositionRecord {
    fn from(position: &Position) -> Self {
        match position {
            Position::Option(option) => PositionRecord::Option(option.into()),
            Position::Future(future) => PositionRecord::Future(future.into()),
            Position::UniswapV3(liquidity) => PositionRecord::UniswapV3(liquidity.into()),
        }
    }
}

impl TryFrom<PositionRecord> for Position {
    type Error = EngineError;

    fn try_from(record: PositionRecord) -> EngineResult<Self> {
        Ok(match record {
            PositionRecord::Option(option) => Position::Option(option.try_into()?),
            PositionRecord::Future(future) => Position::Future(future.try_into()?),
            PositionRecord::UniswapV3(liquidity) => Position::UniswapV3(liquidity.try_into()?),
        })
    }
}
