//! Ticker lists, weight lists, and loading a set of assets from a data port.
//!
//! Tickers that cannot be fetched or fail validation are skipped with a
//! warning; loading only fails when nothing survives.

use crate::domain::asset::Asset;
use crate::domain::error::FinextractError;
use crate::domain::metrics::MetricsSettings;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::preprocess::{preprocess, PreprocessWarning};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("malformed weight entry '{0}', expected TICKER:weight")]
    MalformedWeight(String),
}

impl From<UniverseError> for FinextractError {
    fn from(e: UniverseError) -> Self {
        FinextractError::invalid_parameter("tickers", e.to_string())
    }
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// `"AAPL:0.3, msft:0.7"` → `[("AAPL", 0.3), ("MSFT", 0.7)]`. Weights are
/// returned raw; normalization happens when the portfolio is built.
pub fn parse_weights(input: &str) -> Result<Vec<(String, f64)>, UniverseError> {
    let mut weights = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let (ticker, value) = trimmed
            .split_once(':')
            .ok_or_else(|| UniverseError::MalformedWeight(trimmed.to_string()))?;
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(UniverseError::MalformedWeight(trimmed.to_string()));
        }
        let weight: f64 = value
            .trim()
            .parse()
            .map_err(|_| UniverseError::MalformedWeight(trimmed.to_string()))?;
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        weights.push((ticker, weight));
    }

    Ok(weights)
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub assets: Vec<Asset>,
    pub skipped: Vec<SkippedTicker>,
    pub warnings: Vec<(String, PreprocessWarning)>,
}

impl LoadedUniverse {
    pub fn asset_refs(&self) -> Vec<&Asset> {
        self.assets.iter().collect()
    }

    pub fn find(&self, ticker: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.ticker() == ticker)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    Fetch(String),
    Invalid(String),
}

pub fn load_assets(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    settings: &MetricsSettings,
) -> Result<LoadedUniverse, FinextractError> {
    let mut assets = Vec::new();
    let mut skipped = Vec::new();
    let mut warnings = Vec::new();
    let min_rows = settings.min_observations + 1;

    for ticker in tickers {
        let bars = match data_port.fetch_ohlcv(ticker, start_date, end_date) {
            Ok(bars) if bars.is_empty() => {
                warn!(%ticker, "skipping: no data in range");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Ok(bars) => bars,
            Err(e) => {
                warn!(%ticker, error = %e, "skipping: fetch failed");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::Fetch(e.to_string()),
                });
                continue;
            }
        };

        let built = preprocess(ticker, bars, min_rows).and_then(|clean| {
            let series = PriceSeries::new(ticker.clone(), clean.bars);
            let asset = Asset::new(series, *settings)?.with_source(data_port.source_name());
            Ok((asset, clean.warnings))
        });

        match built {
            Ok((asset, asset_warnings)) => {
                info!(%ticker, rows = asset.prices().len(), "loaded");
                warnings.extend(asset_warnings.into_iter().map(|w| (ticker.clone(), w)));
                assets.push(asset);
            }
            Err(e) => {
                warn!(%ticker, error = %e, "skipping: validation failed");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::Invalid(e.to_string()),
                });
            }
        }
    }

    if assets.is_empty() {
        return Err(FinextractError::NoData {
            ticker: tickers.join(","),
        });
    }

    if !skipped.is_empty() {
        info!(
            loaded = assets.len(),
            requested = tickers.len(),
            "some tickers were skipped"
        );
    }

    Ok(LoadedUniverse {
        assets,
        skipped,
        warnings,
    })
}
