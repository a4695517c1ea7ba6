//! A single instrument: ticker, cleaned prices, returns and their metrics.

use chrono::NaiveDate;

use super::error::FinextractError;
use super::metrics::{self, MetricsSettings, RiskMetrics, TailRisk};
use super::montecarlo::GbmParams;
use super::ohlcv::PriceSeries;
use super::returns::ReturnSeries;

/// Metrics are computed once in [`Asset::new`]; the value is immutable
/// afterwards. New prices mean a new `Asset`.
#[derive(Debug, Clone)]
pub struct Asset {
    source: String,
    prices: PriceSeries,
    returns: ReturnSeries,
    settings: MetricsSettings,
    metrics: RiskMetrics,
}

impl Asset {
    pub fn new(prices: PriceSeries, settings: MetricsSettings) -> Result<Self, FinextractError> {
        settings.validate()?;
        let returns = ReturnSeries::from_prices_with_minimum(&prices, settings.min_observations)?;
        let metrics = RiskMetrics::compute(&returns, &settings)?;
        Ok(Self {
            source: String::new(),
            prices,
            returns,
            settings,
            metrics,
        })
    }

    /// Tag the asset with the name of the data source it came from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn ticker(&self) -> &str {
        &self.prices.ticker
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn returns(&self) -> &ReturnSeries {
        &self.returns
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &RiskMetrics {
        &self.metrics
    }

    pub fn mean_return(&self) -> f64 {
        self.metrics.mean_return
    }

    pub fn stdev_return(&self) -> f64 {
        self.metrics.stdev_return
    }

    pub fn annualized_return(&self) -> f64 {
        self.metrics.annualized_return
    }

    pub fn annualized_volatility(&self) -> f64 {
        self.metrics.annualized_volatility
    }

    /// `None` when the return series has zero dispersion.
    pub fn sharpe_ratio(&self) -> Option<f64> {
        self.metrics.sharpe_ratio
    }

    /// Sharpe against a different annual risk-free rate than the one the
    /// asset was built with.
    pub fn sharpe_ratio_at(&self, risk_free_rate: f64) -> Result<f64, FinextractError> {
        metrics::sharpe_from_moments(
            self.metrics.mean_return,
            self.metrics.stdev_return,
            risk_free_rate,
            self.settings.periods_per_year,
        )
    }

    pub fn sortino_ratio(&self) -> Option<f64> {
        self.metrics.sortino_ratio
    }

    pub fn cagr(&self) -> f64 {
        self.metrics.cagr
    }

    pub fn max_drawdown(&self) -> f64 {
        self.metrics.max_drawdown
    }

    pub fn skewness(&self) -> Option<f64> {
        self.metrics.skewness
    }

    pub fn kurtosis(&self) -> Option<f64> {
        self.metrics.kurtosis
    }

    /// Historical VaR/CVaR at the configured confidence level.
    pub fn tail_risk(&self) -> &TailRisk {
        &self.metrics.tail
    }

    pub fn last_close(&self) -> f64 {
        self.returns.last_close()
    }

    /// Dollar VaR of a position worth `current_value`.
    pub fn value_at_risk(&self, confidence: f64, current_value: f64) -> Result<f64, FinextractError> {
        let tail = metrics::tail_risk(self.returns.values(), confidence)?;
        Ok(tail.var_loss(current_value))
    }

    pub fn conditional_value_at_risk(
        &self,
        confidence: f64,
        current_value: f64,
    ) -> Result<f64, FinextractError> {
        let tail = metrics::tail_risk(self.returns.values(), confidence)?;
        Ok(tail.cvar_loss(current_value))
    }

    /// Annualized drift and volatility for simulating this asset.
    pub fn gbm_params(&self) -> GbmParams {
        GbmParams {
            drift: self.metrics.annualized_return,
            volatility: self.metrics.annualized_volatility,
            periods_per_year: self.settings.periods_per_year,
        }
    }

    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            ticker: self.ticker().to_string(),
            source: self.source.clone(),
            observations: self.prices.len(),
            start_date: self.prices.first_date(),
            end_date: self.prices.last_date(),
            mean_return: self.metrics.mean_return,
            stdev_return: self.metrics.stdev_return,
            annualized_return: self.metrics.annualized_return,
            annualized_volatility: self.metrics.annualized_volatility,
            sharpe_ratio: self.metrics.sharpe_ratio,
            sortino_ratio: self.metrics.sortino_ratio,
            cagr: self.metrics.cagr,
            max_drawdown: self.metrics.max_drawdown,
            var: self.metrics.tail.var,
            cvar: self.metrics.tail.cvar,
            confidence_level: self.metrics.tail.confidence_level,
            skewness: self.metrics.skewness,
            kurtosis: self.metrics.kurtosis,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetSummary {
    pub ticker: String,
    pub source: String,
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub mean_return: f64,
    pub stdev_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub var: f64,
    pub cvar: f64,
    pub confidence_level: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_optional(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "undefined".to_string(),
    }
}

impl AssetSummary {
    /// Label/value pairs in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let confidence = self.confidence_level * 100.0;
        vec![
            ("Ticker", self.ticker.clone()),
            ("Source", self.source.clone()),
            ("Data Points", self.observations.to_string()),
            ("Start Date", fmt_date(self.start_date)),
            ("End Date", fmt_date(self.end_date)),
            ("Mean Return", format!("{:.6}", self.mean_return)),
            ("Volatility", format!("{:.6}", self.stdev_return)),
            ("Annualized Return", format!("{:.4}", self.annualized_return)),
            ("Annualized Volatility", format!("{:.4}", self.annualized_volatility)),
            ("Sharpe Ratio", fmt_optional(self.sharpe_ratio, 4)),
            ("Sortino Ratio", fmt_optional(self.sortino_ratio, 4)),
            ("CAGR", format!("{:.4}", self.cagr)),
            ("Max Drawdown", format!("{:.4}", self.max_drawdown)),
            ("Historical VaR", format!("{:.4} @ {confidence:.0}%", self.var)),
            ("Historical CVaR", format!("{:.4} @ {confidence:.0}%", self.cvar)),
            ("Skewness", fmt_optional(self.skewness, 4)),
            ("Excess Kurtosis", fmt_optional(self.kurtosis, 4)),
        ]
    }
}
