//! Price grid construction and validation

use crate::error::{EngineError, EngineResult};

/// Number of grid points used when nothing else is configured
pub const DEFAULT_GRID_POINTS: usize = 100;

/// Finest rounding applied to grid values; finer steps are left unrounded
const MAX_DECIMAL_PLACES: i32 = 12;

/// Evenly spaced values from `start` to `stop` inclusive.
///
/// Each value is rounded to [`decimal_places`] digits so that grids over wide
/// ranges land on whole prices. The precision is raised until one step spans
/// at least one unit of the last kept digit, so narrow grids never collapse
/// onto the same value.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let points = (0..num).map(|i| start + step * i as f64);
            match rounding_places(start, stop, step) {
                Some(places) => {
                    let factor = 10f64.powi(places);
                    points.map(|p| (p * factor).round() / factor).collect()
                }
                None => points.collect(),
            }
        }
    }
}

fn rounding_places(start: f64, stop: f64, step: f64) -> Option<i32> {
    let places = decimal_places(start, stop);
    let step = step.abs();
    if step == 0.0 || !step.is_finite() {
        return Some(places);
    }
    let needed = places.max((-step.log10()).ceil() as i32);
    (needed <= MAX_DECIMAL_PLACES).then_some(needed)
}

/// Rounding precision for a grid spanning `min_price..max_price`
pub fn decimal_places(min_price: f64, max_price: f64) -> i32 {
    let range = max_price - min_price;
    if range > 1000.0 {
        0
    } else if range > 100.0 {
        1
    } else if range > 10.0 {
        2
    } else {
        3
    }
}

/// Grid centred on `spot`, spanning ±`range_percent`%
pub fn price_grid(spot: f64, range_percent: f64, points: usize) -> Vec<f64> {
    let half_width = spot * (range_percent / 100.0);
    linspace(spot - half_width, spot + half_width, points)
}

/// Reject grids that cannot be valued: empty, non-finite, non-positive or
/// descending.
pub fn validate_grid(prices: &[f64]) -> EngineResult<()> {
    if prices.is_empty() {
        return Err(EngineError::InvalidPriceGrid("grid is empty".to_string()));
    }
    if let Some((index, price)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
        return Err(EngineError::InvalidPriceGrid(format!(
            "price at index {index} must be positive and finite, got {price}"
        )));
    }
    if let Some(index) = prices.windows(2).position(|w| w[1] < w[0]) {
        return Err(EngineError::InvalidPriceGrid(format!(
            "grid must be ascending, index {} drops from {} to {}",
            index + 1,
            prices[index],
            prices[index + 1]
        )));
    }
    Ok(())
}
