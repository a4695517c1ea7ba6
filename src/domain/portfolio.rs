//! Weighted collection of assets and its aggregate statistics.
//!
//! Weights are validated and normalized once at construction. Everything
//! else (covariance, volatility, Sharpe) is derived on each call from the
//! immutable components, so there is no cache to invalidate; changing the
//! weights goes through [`Portfolio::with_weights`], which builds a new value.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use tracing::info;

use super::asset::Asset;
use super::error::FinextractError;
use super::metrics::{self, MetricsSettings};
use super::montecarlo::GbmParams;
use super::returns::sample_covariance;

/// Raw weight sums at or below this cannot be normalized.
pub const WEIGHT_EPSILON: f64 = 1e-12;

/// Units of each constituent held when valuing the portfolio.
pub const DEFAULT_REFERENCE_UNITS: f64 = 100.0;

pub const CONCENTRATION_LIMIT: f64 = 0.5;
pub const SHORT_HISTORY_DAYS: i64 = 365;
pub const HIGH_VOLATILITY_LIMIT: f64 = 0.4;

#[derive(Debug, Clone)]
pub struct Portfolio<'a> {
    components: Vec<&'a Asset>,
    /// Normalized, index-aligned with `components`.
    weights: Vec<f64>,
    settings: MetricsSettings,
}

/// Component returns restricted to the dates every component shares.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    /// One column per component, in component order.
    pub columns: Vec<Vec<f64>>,
}

impl<'a> Portfolio<'a> {
    /// Every asset needs exactly one weight entry and vice versa. Weights
    /// must be finite and non-negative; they are rescaled to sum to 1.
    /// Metric settings are taken from the first asset.
    pub fn new(assets: &[&'a Asset], weights: &[(String, f64)]) -> Result<Self, FinextractError> {
        let Some(first) = assets.first() else {
            return Err(FinextractError::invalid_parameter(
                "assets",
                "a portfolio needs at least one asset",
            ));
        };

        let mut seen = HashSet::new();
        for (ticker, _) in weights {
            if !seen.insert(ticker.as_str()) {
                return Err(FinextractError::invalid_parameter(
                    "weights",
                    format!("duplicate weight for {ticker}"),
                ));
            }
        }

        let asset_tickers: HashSet<&str> = assets.iter().map(|a| a.ticker()).collect();
        if asset_tickers.len() != assets.len() {
            return Err(FinextractError::invalid_parameter(
                "assets",
                "duplicate ticker among assets",
            ));
        }

        let missing_weights: Vec<String> = assets
            .iter()
            .map(|a| a.ticker())
            .filter(|t| !seen.contains(t))
            .map(str::to_string)
            .collect();
        let missing_assets: Vec<String> = weights
            .iter()
            .map(|(t, _)| t.as_str())
            .filter(|t| !asset_tickers.contains(t))
            .map(str::to_string)
            .collect();
        if !missing_weights.is_empty() || !missing_assets.is_empty() {
            return Err(FinextractError::MismatchedComponents {
                missing_weights,
                missing_assets,
            });
        }

        let mut raw = Vec::with_capacity(assets.len());
        for asset in assets {
            let weight = weights
                .iter()
                .find(|(t, _)| t == asset.ticker())
                .map(|(_, w)| *w)
                .unwrap_or(0.0);
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(FinextractError::InvalidWeight {
                    ticker: asset.ticker().to_string(),
                    weight,
                });
            }
            raw.push(weight);
        }

        let total: f64 = raw.iter().sum();
        if total <= WEIGHT_EPSILON {
            return Err(FinextractError::DegenerateWeights { total });
        }
        if (total - 1.0).abs() > 1e-9 {
            info!(total, "normalizing portfolio weights to sum to 1");
        }

        Ok(Portfolio {
            components: assets.to_vec(),
            weights: raw.iter().map(|w| w / total).collect(),
            settings: *first.settings(),
        })
    }

    /// Same components under new weights.
    pub fn with_weights(&self, weights: &[(String, f64)]) -> Result<Self, FinextractError> {
        Portfolio::new(&self.components, weights)
    }

    pub fn components(&self) -> &[&'a Asset] {
        &self.components
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.components.iter().map(|a| a.ticker()).collect()
    }

    pub fn weight(&self, ticker: &str) -> Option<f64> {
        self.components
            .iter()
            .position(|a| a.ticker() == ticker)
            .map(|i| self.weights[i])
    }

    /// `(ticker, normalized weight)` in component order.
    pub fn weights(&self) -> Vec<(String, f64)> {
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(a, &w)| (a.ticker().to_string(), w))
            .collect()
    }

    /// Inner join of every component's returns on date. Fails when fewer
    /// than `min_observations` dates are shared.
    pub fn aligned_returns(&self) -> Result<AlignedReturns, FinextractError> {
        let (head, rest) = self
            .components
            .split_first()
            .ok_or(FinextractError::InsufficientOverlap {
                observations: 0,
                minimum: self.settings.min_observations,
            })?;

        let mut dates = Vec::new();
        let mut columns = vec![Vec::new(); self.components.len()];
        'dates: for (&date, &r) in head.returns().dates().iter().zip(head.returns().values()) {
            let mut row = Vec::with_capacity(rest.len());
            for asset in rest {
                match asset.returns().get(date) {
                    Some(v) => row.push(v),
                    None => continue 'dates,
                }
            }
            dates.push(date);
            columns[0].push(r);
            for (col, v) in columns[1..].iter_mut().zip(row) {
                col.push(v);
            }
        }

        if dates.len() < self.settings.min_observations {
            return Err(FinextractError::InsufficientOverlap {
                observations: dates.len(),
                minimum: self.settings.min_observations,
            });
        }
        Ok(AlignedReturns { dates, columns })
    }

    /// Sample covariance of the date-aligned component returns.
    pub fn covariance_matrix(&self) -> Result<Vec<Vec<f64>>, FinextractError> {
        let aligned = self.aligned_returns()?;
        let n = aligned.columns.len();
        let mut cov = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let c = sample_covariance(&aligned.columns[i], &aligned.columns[j]);
                cov[i][j] = c;
                cov[j][i] = c;
            }
        }
        Ok(cov)
    }

    /// Per-period mean return: weights dotted with component mean returns.
    pub fn portfolio_return(&self) -> f64 {
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(a, w)| w * a.mean_return())
            .sum()
    }

    /// Per-period volatility `sqrt(w' * cov * w)`.
    pub fn portfolio_volatility(&self) -> Result<f64, FinextractError> {
        let cov = self.covariance_matrix()?;
        let variance: f64 = self
            .weights
            .iter()
            .enumerate()
            .map(|(i, wi)| {
                self.weights
                    .iter()
                    .enumerate()
                    .map(|(j, wj)| wi * cov[i][j] * wj)
                    .sum::<f64>()
            })
            .sum();
        // Rounding can leave a tiny negative variance for degenerate inputs.
        Ok(variance.max(0.0).sqrt())
    }

    pub fn annualized_return(&self) -> f64 {
        metrics::annualized_return(self.portfolio_return(), self.settings.periods_per_year)
    }

    pub fn annualized_volatility(&self) -> Result<f64, FinextractError> {
        Ok(metrics::annualized_volatility(
            self.portfolio_volatility()?,
            self.settings.periods_per_year,
        ))
    }

    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> Result<f64, FinextractError> {
        metrics::sharpe_from_moments(
            self.portfolio_return(),
            self.portfolio_volatility()?,
            risk_free_rate,
            self.settings.periods_per_year,
        )
    }

    pub fn gbm_params(&self) -> Result<GbmParams, FinextractError> {
        Ok(GbmParams {
            drift: self.annualized_return(),
            volatility: self.annualized_volatility()?,
            periods_per_year: self.settings.periods_per_year,
        })
    }

    /// Value of holding `units` of each constituent scaled by its weight,
    /// at the last close.
    pub fn reference_value(&self, units: f64) -> f64 {
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(a, w)| a.last_close() * w * units)
            .sum()
    }

    /// Per-date weighted portfolio return over the aligned dates.
    pub fn weighted_returns(&self) -> Result<Vec<(NaiveDate, f64)>, FinextractError> {
        let aligned = self.aligned_returns()?;
        Ok(aligned
            .dates
            .iter()
            .enumerate()
            .map(|(t, &date)| {
                let r = aligned
                    .columns
                    .iter()
                    .zip(&self.weights)
                    .map(|(col, w)| w * col[t])
                    .sum();
                (date, r)
            })
            .collect())
    }

    /// Concentration, history length and volatility checks. The volatility
    /// check is skipped when the components do not overlap enough to
    /// compute it.
    pub fn warnings(&self) -> Vec<PortfolioWarning> {
        let mut out = Vec::new();
        for (asset, &weight) in self.components.iter().zip(&self.weights) {
            let days = asset.prices().calendar_days();
            if days < SHORT_HISTORY_DAYS {
                out.push(PortfolioWarning::ShortHistory {
                    ticker: asset.ticker().to_string(),
                    days,
                });
            }
            if weight > CONCENTRATION_LIMIT {
                out.push(PortfolioWarning::Concentrated {
                    ticker: asset.ticker().to_string(),
                    weight,
                });
            }
        }
        if let Ok(vol) = self.annualized_volatility() {
            if vol > HIGH_VOLATILITY_LIMIT {
                out.push(PortfolioWarning::HighVolatility { annualized: vol });
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortfolioWarning {
    ShortHistory { ticker: String, days: i64 },
    Concentrated { ticker: String, weight: f64 },
    HighVolatility { annualized: f64 },
}

impl fmt::Display for PortfolioWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortfolioWarning::ShortHistory { ticker, days } => {
                write!(f, "{ticker}: only {days} days of history (less than one year)")
            }
            PortfolioWarning::Concentrated { ticker, weight } => {
                write!(f, "{ticker}: concentrated weight ({:.1}%)", weight * 100.0)
            }
            PortfolioWarning::HighVolatility { annualized } => {
                write!(f, "portfolio: high volatility ({:.1}%)", annualized * 100.0)
            }
        }
    }
}
