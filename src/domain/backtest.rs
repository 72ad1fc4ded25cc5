//! Backtest orchestration and the result bundle.
//!
//! `run_backtest` is a pure function of an aligned price table and a
//! `BacktestConfig`; `run` adds the price loading step in front of it.

use crate::domain::allocation::{
    InvestmentMode, PortfolioParams, TargetWeightTable, construct_portfolio,
};
use crate::domain::calendar::{
    RebalanceCalendar, RebalanceDay, RebalanceFrequency, rebalance_calendar,
};
use crate::domain::error::QuantestError;
use crate::domain::growth::{dca_growth, drawdown_series, pure_growth};
use crate::domain::metrics::{
    AnnualReturn, AssetContribution, AssetPerformance, MetricInputs, MonthlyReturnTable,
    PerformanceMetrics, annual_returns, asset_contribution, asset_performance, monthly_returns,
};
use crate::domain::momentum::{MomentumParams, MomentumScoreTable, compute_momentum, full_momentum};
use crate::domain::price_table::{LoadDiagnostics, PriceTable};
use crate::domain::series::TimeSeries;
use crate::domain::simulation::{Granularity, SimulationOutput, simulate};
use crate::domain::universe::{AssetClasses, all_tickers, currency_symbol, load_prices};
use crate::ports::price_port::PriceDataPort;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    /// Added on every rebalance date; 0 disables contributions.
    pub monthly_contribution: f64,
    pub benchmark: String,
    pub granularity: Granularity,
    pub rebalance_frequency: RebalanceFrequency,
    pub rebalance_day: RebalanceDay,
    /// One-way cost as a fraction of turnover.
    pub transaction_cost: f64,
    pub risk_free_rate: f64,
    pub assets: AssetClasses,
    pub momentum: MomentumParams,
    pub portfolio: PortfolioParams,
}

impl BacktestConfig {
    /// Every ticker the run needs, sorted.
    pub fn tickers(&self) -> Vec<String> {
        all_tickers(&self.assets, &self.benchmark)
    }
}

/// Value, growth and drawdown curves of the strategy and the benchmark.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueCurves {
    /// Contribution-inclusive account value.
    pub portfolio_value: TimeSeries,
    pub benchmark_value: TimeSeries,
    /// Pure compounding from the initial capital.
    pub strategy_growth: TimeSeries,
    pub benchmark_growth: TimeSeries,
    pub strategy_drawdown: TimeSeries,
    pub benchmark_drawdown: TimeSeries,
}

/// Everything a run produces. Serializes without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub prices: PriceTable,
    pub diagnostics: LoadDiagnostics,
    pub currency_symbol: String,
    pub calendar: RebalanceCalendar,
    pub momentum: MomentumScoreTable,
    /// Mean trading-day momentum of the canary class on every price date.
    pub canary_momentum: TimeSeries,
    pub target_weights: TargetWeightTable,
    pub investment_modes: Vec<InvestmentMode>,
    pub returns: SimulationOutput,
    pub curves: ValueCurves,
    pub contributions_made: usize,
    pub metrics: PerformanceMetrics,
    pub benchmark_metrics: PerformanceMetrics,
    pub asset_contribution: Vec<AssetContribution>,
    pub annual_returns: Vec<AnnualReturn>,
    pub monthly_returns: MonthlyReturnTable,
    pub asset_performance: Vec<AssetPerformance>,
}

impl BacktestResult {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.dates().first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.dates().last().copied()
    }
}

/// Loads prices through `port` and runs the backtest on them.
pub fn run(port: &dyn PriceDataPort, config: &BacktestConfig) -> Result<BacktestResult, QuantestError> {
    let tickers = config.tickers();
    info!(tickers = tickers.len(), start = %config.start_date, end = %config.end_date, "loading prices");
    let (table, diagnostics) = load_prices(port, &tickers, config.start_date, config.end_date)?;
    run_backtest(table, diagnostics, config)
}

pub fn run_backtest(
    table: PriceTable,
    diagnostics: LoadDiagnostics,
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantestError> {
    if table.is_empty() {
        return Err(QuantestError::DataUnavailable {
            tickers: config.tickers(),
        });
    }
    if !table.contains(&config.benchmark) {
        return Err(QuantestError::data_unavailable(config.benchmark.as_str()));
    }

    let classes = config.assets.restrict_to(&table);
    if classes.holdable().len() < config.assets.holdable().len() {
        warn!(
            held = classes.holdable().len(),
            configured = config.assets.holdable().len(),
            "some aggressive or defensive tickers have no data and are skipped"
        );
    }

    let calendar = rebalance_calendar(&table, config.rebalance_frequency, config.rebalance_day);
    info!(
        dates = calendar.len(),
        frequency = %config.rebalance_frequency,
        day = %config.rebalance_day,
        "built rebalance calendar"
    );

    let momentum = compute_momentum(&table, &calendar, &config.momentum)?;
    let (target_weights, investment_modes) =
        construct_portfolio(&momentum, &classes, &config.portfolio);

    let returns = simulate(
        &table,
        &calendar,
        &target_weights,
        config.transaction_cost,
        config.granularity,
        &config.benchmark,
    )?;

    let (portfolio_value, contributions_made) = dca_growth(
        &returns.portfolio,
        config.initial_capital,
        config.monthly_contribution,
        &calendar.dates,
    );
    let (benchmark_value, _) = dca_growth(
        &returns.benchmark,
        config.initial_capital,
        config.monthly_contribution,
        &calendar.dates,
    );
    let strategy_growth = pure_growth(&returns.portfolio, config.initial_capital);
    let benchmark_growth = pure_growth(&returns.benchmark, config.initial_capital);

    let total_contributed =
        config.initial_capital + config.monthly_contribution * contributions_made as f64;
    let periods_per_year = config.granularity.periods_per_year(config.rebalance_frequency);

    let metrics = PerformanceMetrics::compute(MetricInputs {
        returns: &returns.portfolio,
        growth: &strategy_growth,
        value: &portfolio_value,
        initial_capital: config.initial_capital,
        total_contributed,
        risk_free_rate: config.risk_free_rate,
        periods_per_year,
    });
    let benchmark_metrics = PerformanceMetrics::compute(MetricInputs {
        returns: &returns.benchmark,
        growth: &benchmark_growth,
        value: &benchmark_value,
        initial_capital: config.initial_capital,
        total_contributed,
        risk_free_rate: config.risk_free_rate,
        periods_per_year,
    });

    info!(
        cagr = metrics.cagr,
        mdd = metrics.mdd,
        sharpe = metrics.sharpe_ratio,
        final_value = metrics.final_value,
        "backtest complete"
    );

    let contribution = asset_contribution(&table, &calendar, &target_weights, &classes.holdable());
    let annual = annual_returns(&returns.portfolio, &returns.benchmark);
    let monthly = monthly_returns(&returns.portfolio, config.granularity);
    let performance = asset_performance(&table, config.risk_free_rate);
    let canary_momentum = full_momentum(&table, &config.momentum).mean_series(&classes.canary);

    let curves = ValueCurves {
        strategy_drawdown: drawdown_series(&strategy_growth),
        benchmark_drawdown: drawdown_series(&benchmark_growth),
        portfolio_value,
        benchmark_value,
        strategy_growth,
        benchmark_growth,
    };

    Ok(BacktestResult {
        config: config.clone(),
        currency_symbol: currency_symbol(&config.tickers()).to_string(),
        prices: table,
        diagnostics,
        calendar,
        momentum,
        canary_momentum,
        target_weights,
        investment_modes,
        returns,
        curves,
        contributions_made,
        metrics,
        benchmark_metrics,
        asset_contribution: contribution,
        annual_returns: annual,
        monthly_returns: monthly,
        asset_performance: performance,
    })
}
