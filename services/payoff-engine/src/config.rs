//! Engine configuration

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::grid::DEFAULT_GRID_POINTS;

/// Defaults applied to strategies created or loaded by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Points in the price grid
    pub grid_points: usize,
    /// Half-width of the price grid as a percentage of spot
    pub price_range_percent: f64,
    /// Add accrued liquidity fees into the total payoff curve
    pub include_fees_in_total: bool,
    /// `tracing` filter directive used by the binary
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_points: DEFAULT_GRID_POINTS,
            price_range_percent: 70.0,
            include_fees_in_total: true,
            log_filter: "payoff_engine=info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional file plus `PAYOFF_*` environment variables.
    ///
    /// Values in `.env` are picked up first; the environment overrides the
    /// file and the file overrides the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("PAYOFF").try_parsing(true))
            .build()
            .context("failed to read engine configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.grid_points >= 2, "grid_points must be at least 2, got {}", self.grid_points);
        ensure!(
            self.price_range_percent > 0.0 && self.price_range_percent < 100.0,
            "price_range_percent must lie in (0, 100), got {}",
            self.price_range_percent
        );
        Ok(())
    }
}
