//! Deterministic synthetic price source.
//!
//! Generates a geometric random walk over business days (Mon-Fri) in the
//! requested range. The RNG is seeded from the ticker, so the same ticker
//! and range always produce the same bars.

use crate::domain::error::FinextractError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const INITIAL_PRICE: f64 = 100.0;
pub const DAILY_DRIFT: f64 = 0.0005;
pub const DAILY_VOLATILITY: f64 = 0.02;
/// Noise applied to derive open/high/low from the close.
pub const INTRADAY_NOISE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct SyntheticAdapter {
    initial_price: f64,
    drift: f64,
    volatility: f64,
}

impl Default for SyntheticAdapter {
    fn default() -> Self {
        Self {
            initial_price: INITIAL_PRICE,
            drift: DAILY_DRIFT,
            volatility: DAILY_VOLATILITY,
        }
    }
}

impl SyntheticAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(initial_price: f64, drift: f64, volatility: f64) -> Self {
        Self {
            initial_price,
            drift,
            volatility,
        }
    }
}

/// FNV-1a over the ticker bytes.
pub fn ticker_seed(ticker: &str) -> u64 {
    ticker.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

impl DataPort for SyntheticAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FinextractError> {
        let dates = business_days(start_date, end_date);
        if dates.is_empty() {
            return Err(FinextractError::DataSource {
                reason: format!("no business days between {} and {}", start_date, end_date),
            });
        }

        let invalid = |e: rand_distr::NormalError| FinextractError::DataSource {
            reason: format!("invalid synthetic parameters: {}", e),
        };
        let returns = Normal::new(self.drift, self.volatility).map_err(invalid)?;
        let noise = Normal::new(0.0, INTRADAY_NOISE).map_err(invalid)?;
        let wick = Normal::new(0.0, INTRADAY_NOISE / 2.0).map_err(invalid)?;

        let mut rng = StdRng::seed_from_u64(ticker_seed(ticker));
        let mut log_price = self.initial_price.ln();

        let bars = dates
            .into_iter()
            .map(|date| {
                log_price += returns.sample(&mut rng);
                let close = log_price.exp();
                let open = close * (1.0 + noise.sample(&mut rng));
                let high = open.max(close) * (1.0 + wick.sample(&mut rng).abs());
                let low = open.min(close) * (1.0 - wick.sample(&mut rng).abs());
                let volume = rng.gen_range(1_000_000u64..10_000_000) as f64;
                PriceBar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                }
            })
            .collect();

        Ok(bars)
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
