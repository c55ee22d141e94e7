//! Payoff Engine CLI
//!
//! Loads a saved strategy and prints its payoff series for a chart to render

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use payoff_engine::strategy::TOTAL_SERIES_NAME;
use payoff_engine::{EngineConfig, LegSeries, Position, Strategy, StrategyRecord, StrategySeries};

#[derive(Parser)]
#[command(name = "payoff-engine")]
#[command(about = "Payoff curves for option, futures and Uniswap V3 strategies")]
#[command(version)]
struct Cli {
    /// Configuration file (any format the `config` crate understands)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a saved strategy over its price grid
    Series {
        #[arg(long)]
        strategy: PathBuf,
        /// Override the strategy's days in position
        #[arg(long)]
        days: Option<u32>,
        /// Move the spot price, repricing every leg to it
        #[arg(long)]
        spot: Option<f64>,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// Print the strategy total for every day of the holding period as JSON
    Surface {
        #[arg(long)]
        strategy: PathBuf,
        /// Override the strategy's days in position
        #[arg(long)]
        days: Option<u32>,
    },
    /// Log per-leg diagnostics for a saved strategy
    Inspect {
        #[arg(long)]
        strategy: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Series {
            strategy,
            days,
            spot,
            format,
        } => run_series(&config, &strategy, days, spot, format),
        Commands::Surface { strategy, days } => run_surface(&config, &strategy, days),
        Commands::Inspect { strategy } => run_inspect(&config, &strategy),
    }
}

fn load_strategy(config: &EngineConfig, path: &Path) -> Result<Strategy> {
    let json = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let record = StrategyRecord::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))?;
    let has_range = record.price_range_percent.is_some();
    let has_fee_flag = record.include_fees_in_total.is_some();
    let has_grid_points = record.grid_points.is_some();

    let mut strategy = Strategy::from_record(record)?;
    if !has_grid_points {
        strategy.set_grid_points(config.grid_points)?;
    }
    if !has_range {
        strategy.set_price_range_percent(config.price_range_percent)?;
    }
    if !has_fee_flag {
        strategy.set_include_fees_in_total(config.include_fees_in_total);
    }

    info!(name = strategy.name(), legs = strategy.legs().len(), spot = strategy.spot_price(), "strategy loaded");
    Ok(strategy)
}

fn run_series(
    config: &EngineConfig,
    path: &Path,
    days: Option<u32>,
    spot: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let mut strategy = load_strategy(config, path)?;
    if let Some(days) = days {
        strategy.set_days_in_position(days);
    }
    if let Some(spot) = spot {
        strategy.set_spot_price(spot)?;
    }

    let series = strategy.series()?;
    info!(
        points = series.prices.len(),
        total_fees = series.total_fees,
        static_pnl = series.static_pnl,
        "series computed"
    );

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout().lock(), &series)?;
            println!();
        }
        OutputFormat::Csv => write_csv(&series, io::stdout().lock())?,
    }
    Ok(())
}

fn run_surface(config: &EngineConfig, path: &Path, days: Option<u32>) -> Result<()> {
    let mut strategy = load_strategy(config, path)?;
    if let Some(days) = days {
        strategy.set_days_in_position(days);
    }

    let surface = strategy.payoff_surface()?;
    info!(rows = surface.days.len(), points = surface.prices.len(), "surface computed");

    serde_json::to_writer_pretty(io::stdout().lock(), &surface)?;
    println!();
    Ok(())
}

/// One row per grid price: price, each visible leg, total
fn write_csv<W: io::Write>(series: &StrategySeries, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let visible: Vec<&LegSeries> = series.legs.iter().filter(|leg| !leg.hidden).collect();

    let mut header = vec!["price".to_string()];
    header.extend(visible.iter().map(|leg| leg.label.clone()));
    header.push(TOTAL_SERIES_NAME.to_string());
    writer.write_record(&header)?;

    for (i, price) in series.prices.iter().enumerate() {
        let mut row = vec![price.to_string()];
        row.extend(visible.iter().map(|leg| leg.values[i].to_string()));
        row.push(series.total[i].to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_inspect(config: &EngineConfig, path: &Path) -> Result<()> {
    let strategy = load_strategy(config, path)?;
    let spot = strategy.spot_price();
    let days = strategy.days_in_position();

    for leg in strategy.legs() {
        let label = leg.position.label();
        if !leg.position.enabled() {
            info!(id = %leg.id, %label, "disabled");
            continue;
        }

        match &leg.position {
            Position::Option(option) => match option.implied_volatility() {
                Ok(iv) => {
                    let greeks = option.greeks(spot, days)?;
                    let consistency = option.pricing_consistency()?;
                    info!(
                        id = %leg.id,
                        %label,
                        iv,
                        delta = greeks.delta,
                        theta = greeks.theta,
                        theoretical_premium = consistency.theoretical_premium,
                        "option"
                    );
                }
                Err(e) => warn!(id = %leg.id, %label, error = %e, "option volatility unsolved"),
            },
            Position::Future(future) => {
                info!(
                    id = %leg.id,
                    %label,
                    entry_price = future.entry_price(),
                    margin = future.margin_percent(),
                    "future"
                );
            }
            Position::UniswapV3(liquidity) => {
                let allocation = liquidity.allocation()?;
                let (deposited0, deposited1) = liquidity.deposited_amounts()?;
                let (lower_loss, upper_loss) = liquidity.edge_losses()?;
                info!(
                    id = %leg.id,
                    %label,
                    liquidity = allocation.liquidity,
                    deposited0,
                    deposited1,
                    lower_loss,
                    upper_loss,
                    ticks = liquidity.tick_span(),
                    fees = liquidity.fees_accrued(days),
                    "uniswap_v3"
                );
            }
        }
    }
    Ok(())
}
