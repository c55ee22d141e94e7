//! Multi-leg strategy aggregation

use chrono::Utc;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, validate_positive};
use crate::future::{FutureDirection, FutureInstrument};
use crate::grid::{self, DEFAULT_GRID_POINTS};
use crate::liquidity::LiquidityPosition;
use crate::option::{OptionInstrument, PositionSide};
use crate::persistence::{PositionRecord, StrategyRecord};
use crate::position::{Leg, Position};
use crate::pricing::OptionKind;

/// Series name of the aggregated curve
pub const TOTAL_SERIES_NAME: &str = "Total Strategy";

const DEFAULT_PRICE_RANGE_PERCENT: f64 = 70.0;

/// Premium of the default option leg, capped at a fraction of spot
const DEFAULT_OPTION_PREMIUM: f64 = 10.0;
const DEFAULT_OPTION_PREMIUM_SPOT_FRACTION: f64 = 0.01;

/// Payoff series of one leg
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegSeries {
    pub id: Uuid,
    pub label: String,
    /// Persisted type tag of the leg
    pub kind: &'static str,
    pub values: Vec<f64>,
    /// Accrued fees, liquidity legs only
    pub fees: Option<f64>,
    /// Series name is in the strategy's hidden set
    pub hidden: bool,
}

/// Everything a chart needs for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySeries {
    pub prices: Vec<f64>,
    pub legs: Vec<LegSeries>,
    pub total: Vec<f64>,
    /// Fees accrued by all enabled liquidity legs
    pub total_fees: f64,
    /// Price-independent part of the P&L: fees plus option premium cash flow
    pub static_pnl: f64,
}

/// Strategy total over the price grid for every day of the holding period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoffSurface {
    pub prices: Vec<f64>,
    /// Day offsets `0..=days_in_position`, one per row of `values`
    pub days: Vec<u32>,
    /// `values[d][i]` is the total at `days[d]` and `prices[i]`
    pub values: Vec<Vec<f64>>,
}

/// Ordered collection of legs evaluated against a shared price grid
#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    legs: Vec<Leg>,
    spot_price: f64,
    days_in_position: u32,
    price_range_percent: f64,
    grid_points: usize,
    include_fees_in_total: bool,
    hidden_series: FxHashSet<String>,
}

impl Strategy {
    /// Create an empty strategy
    pub fn new(name: impl Into<String>, spot_price: f64, days_in_position: u32) -> EngineResult<Self> {
        validate_positive("spot price", spot_price)?;
        Ok(Self {
            name: name.into(),
            legs: Vec::new(),
            spot_price,
            days_in_position,
            price_range_percent: DEFAULT_PRICE_RANGE_PERCENT,
            grid_points: DEFAULT_GRID_POINTS,
            include_fees_in_total: true,
            hidden_series: FxHashSet::default(),
        })
    }

    /// Create an empty strategy using configured grid and fee defaults
    pub fn with_config(
        name: impl Into<String>,
        spot_price: f64,
        days_in_position: u32,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let mut strategy = Self::new(name, spot_price, days_in_position)?;
        strategy.apply_config(config)?;
        Ok(strategy)
    }

    /// Apply configured grid and fee defaults to an existing strategy
    pub fn apply_config(&mut self, config: &EngineConfig) -> EngineResult<()> {
        self.set_price_range_percent(config.price_range_percent)?;
        self.set_grid_points(config.grid_points)?;
        self.include_fees_in_total = config.include_fees_in_total;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn spot_price(&self) -> f64 {
        self.spot_price
    }

    pub fn days_in_position(&self) -> u32 {
        self.days_in_position
    }

    pub fn set_days_in_position(&mut self, days: u32) {
        self.days_in_position = days;
    }

    pub fn price_range_percent(&self) -> f64 {
        self.price_range_percent
    }

    /// Grid half-width in percent of spot; must lie in `(0, 100)` so the
    /// lowest grid price stays positive.
    pub fn set_price_range_percent(&mut self, percent: f64) -> EngineResult<()> {
        if !(percent > 0.0 && percent < 100.0) {
            return Err(EngineError::InvalidParameter(format!(
                "price range percent must lie in (0, 100), got {percent}"
            )));
        }
        self.price_range_percent = percent;
        Ok(())
    }

    pub fn grid_points(&self) -> usize {
        self.grid_points
    }

    pub fn set_grid_points(&mut self, points: usize) -> EngineResult<()> {
        if points < 2 {
            return Err(EngineError::InvalidParameter(format!("grid needs at least 2 points, got {points}")));
        }
        self.grid_points = points;
        Ok(())
    }

    pub fn include_fees_in_total(&self) -> bool {
        self.include_fees_in_total
    }

    pub fn set_include_fees_in_total(&mut self, include: bool) {
        self.include_fees_in_total = include;
    }

    /// Change the market spot price and reprice every leg to it
    pub fn set_spot_price(&mut self, spot_price: f64) -> EngineResult<()> {
        validate_positive("spot price", spot_price)?;
        self.spot_price = spot_price;
        self.reprice_all_legs_to(spot_price)
    }

    /// Reset every leg's reference price to `spot`.
    ///
    /// Futures take it as entry price, options as entry spot, liquidity legs
    /// as entry price. The previous cost basis is discarded.
    pub fn reprice_all_legs_to(&mut self, spot: f64) -> EngineResult<()> {
        validate_positive("spot price", spot)?;
        debug!(strategy = %self.name, spot, legs = self.legs.len(), "repricing all legs");
        for leg in &mut self.legs {
            leg.position.reprice_to(spot)?;
        }
        Ok(())
    }

    /// Lowest price on the grid
    pub fn min_price(&self) -> f64 {
        self.spot_price - self.spot_price * (self.price_range_percent / 100.0)
    }

    /// Highest price on the grid
    pub fn max_price(&self) -> f64 {
        self.spot_price + self.spot_price * (self.price_range_percent / 100.0)
    }

    /// Price grid around the current spot
    pub fn price_grid(&self) -> Vec<f64> {
        grid::price_grid(self.spot_price, self.price_range_percent, self.grid_points)
    }

    /// Append a leg and return its generated id
    pub fn add_position(&mut self, position: impl Into<Position>) -> Uuid {
        let leg = Leg::new(position.into());
        let id = leg.id;
        info!(strategy = %self.name, %id, kind = leg.position.type_tag(), "leg added");
        self.legs.push(leg);
        id
    }

    /// Remove a leg by id; returns whether it was present
    pub fn remove_position(&mut self, id: Uuid) -> bool {
        let before = self.legs.len();
        self.legs.retain(|leg| leg.id != id);
        let removed = self.legs.len() != before;
        if removed {
            info!(strategy = %self.name, %id, "leg removed");
        }
        removed
    }

    pub fn position(&self, id: Uuid) -> Option<&Position> {
        self.legs.iter().find(|leg| leg.id == id).map(|leg| &leg.position)
    }

    pub fn position_mut(&mut self, id: Uuid) -> Option<&mut Position> {
        self.legs.iter_mut().find(|leg| leg.id == id).map(|leg| &mut leg.position)
    }

    /// Buy call 20% above spot, 30 days, premium 10 or 1% of spot if lower.
    ///
    /// The leg is only added once its volatility solves, so a default leg can
    /// never break later evaluations.
    pub fn add_default_option(&mut self) -> EngineResult<Uuid> {
        let premium = DEFAULT_OPTION_PREMIUM.min(self.spot_price * DEFAULT_OPTION_PREMIUM_SPOT_FRACTION);
        let option = OptionInstrument::new(
            OptionKind::Call,
            PositionSide::Buy,
            1.0,
            self.spot_price * 1.2,
            premium,
            self.spot_price,
            30,
        )?;
        option.implied_volatility()?;
        Ok(self.add_position(option))
    }

    /// Liquidity over ±20% of spot with 1000 token1 of capital at 20% APR
    pub fn add_default_liquidity(&mut self) -> EngineResult<Uuid> {
        let liquidity = LiquidityPosition::new(
            self.spot_price * 0.8,
            self.spot_price * 1.2,
            self.spot_price,
            1000.0,
            0.5,
            20.0,
        )?;
        Ok(self.add_position(liquidity))
    }

    /// Long one unit at spot with 20% margin
    pub fn add_default_future(&mut self) -> EngineResult<Uuid> {
        let future = FutureInstrument::new(FutureDirection::Long, 1.0, self.spot_price, 20.0)?;
        Ok(self.add_position(future))
    }

    pub fn hidden_series(&self) -> &FxHashSet<String> {
        &self.hidden_series
    }

    pub fn is_hidden(&self, series_name: &str) -> bool {
        self.hidden_series.contains(series_name)
    }

    pub fn set_series_hidden(&mut self, series_name: impl Into<String>, hidden: bool) {
        let series_name = series_name.into();
        if hidden {
            self.hidden_series.insert(series_name);
        } else {
            self.hidden_series.remove(&series_name);
        }
    }

    /// Evaluate every enabled leg over `prices` after `days` days.
    ///
    /// Liquidity legs always contribute their impermanent loss; their fees are
    /// added as a flat amount only when fees are included in the total, but are
    /// reported in `total_fees` either way. Disabled legs are skipped. Any
    /// failing leg fails the whole evaluation.
    pub fn compute_series(&self, prices: &[f64], days: u32) -> EngineResult<StrategySeries> {
        grid::validate_grid(prices)?;

        let mut total = vec![0.0; prices.len()];
        let mut legs = Vec::with_capacity(self.legs.len());
        let mut total_fees = 0.0;
        let mut premium_flow = 0.0;

        for leg in self.legs.iter().filter(|leg| leg.position.enabled()) {
            let (values, fees) = match &leg.position {
                Position::UniswapV3(liquidity) => {
                    let loss = liquidity.impermanent_loss(prices)?;
                    let fees = liquidity.fees_accrued(days);
                    let fee_shift = if self.include_fees_in_total { fees } else { 0.0 };
                    for (acc, value) in total.iter_mut().zip(&loss) {
                        *acc += value + fee_shift;
                    }
                    total_fees += fees;
                    (loss, Some(fees))
                }
                Position::Option(option) => {
                    let payoff = option.payoff(prices, days)?;
                    accumulate(&mut total, &payoff);
                    premium_flow += option.premium_cash_flow();
                    (payoff, None)
                }
                Position::Future(future) => {
                    let payoff = future.payoff(prices);
                    accumulate(&mut total, &payoff);
                    (payoff, None)
                }
            };

            let label = leg.position.label();
            legs.push(LegSeries {
                id: leg.id,
                hidden: self.is_hidden(&label),
                label,
                kind: leg.position.type_tag(),
                values,
                fees,
            });
        }

        debug!(
            strategy = %self.name,
            points = prices.len(),
            legs = legs.len(),
            days,
            total_fees,
            "computed strategy series"
        );

        Ok(StrategySeries {
            prices: prices.to_vec(),
            legs,
            total,
            total_fees,
            static_pnl: total_fees + premium_flow,
        })
    }

    /// Evaluate over the strategy's own grid and holding period
    pub fn series(&self) -> EngineResult<StrategySeries> {
        self.compute_series(&self.price_grid(), self.days_in_position)
    }

    /// Total payoff for each day from entry up to the holding period.
    ///
    /// Each row is the `total` of [`Strategy::compute_series`] for that day,
    /// so the last row matches [`Strategy::series`].
    pub fn payoff_surface(&self) -> EngineResult<PayoffSurface> {
        let prices = self.price_grid();
        let days: Vec<u32> = (0..=self.days_in_position).collect();
        let values = days
            .iter()
            .map(|&day| self.compute_series(&prices, day).map(|series| series.total))
            .collect::<EngineResult<Vec<_>>>()?;

        debug!(strategy = %self.name, rows = values.len(), points = prices.len(), "computed payoff surface");
        Ok(PayoffSurface { prices, days, values })
    }

    /// Snapshot in the at-rest format, stamped with the current time
    pub fn to_record(&self) -> StrategyRecord {
        let mut hidden_series: Vec<String> = self.hidden_series.iter().cloned().collect();
        hidden_series.sort();

        StrategyRecord {
            name: self.name.clone(),
            positions: self.legs.iter().map(|leg| PositionRecord::from(&leg.position)).collect(),
            spot_price: self.spot_price,
            days_in_position: self.days_in_position,
            saved_at: Some(Utc::now()),
            hidden_series,
            price_range_percent: Some(self.price_range_percent),
            include_fees_in_total: Some(self.include_fees_in_total),
            grid_points: Some(self.grid_points),
        }
    }

    /// Rebuild a strategy from a record; every leg gets a fresh id
    pub fn from_record(record: StrategyRecord) -> EngineResult<Self> {
        let mut strategy = Self::new(record.name, record.spot_price, record.days_in_position)?;
        if let Some(percent) = record.price_range_percent {
            strategy.set_price_range_percent(percent)?;
        }
        if let Some(points) = record.grid_points {
            strategy.set_grid_points(points)?;
        }
        if let Some(include) = record.include_fees_in_total {
            strategy.include_fees_in_total = include;
        }
        strategy.hidden_series = record.hidden_series.into_iter().collect();
        for position in record.positions {
            strategy.legs.push(Leg::new(Position::try_from(position)?));
        }
        Ok(strategy)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        self.to_record().to_json()
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        Self::from_record(StrategyRecord::from_json(json)?)
    }
}

fn accumulate(total: &mut [f64], values: &[f64]) {
    for (acc, value) in total.iter_mut().zip(values) {
        *acc += value;
    }
}
