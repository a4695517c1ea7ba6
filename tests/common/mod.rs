#![allow(dead_code)]

use chrono::NaiveDate;
use finextract::domain::asset::Asset;
use finextract::domain::error::FinextractError;
use finextract::domain::metrics::MetricsSettings;
pub use finextract::domain::ohlcv::{PriceBar, PriceSeries};
use finextract::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FinextractError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(FinextractError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000_000.0,
    }
}

/// One bar per calendar day starting at `start`.
pub fn bars_from_closes(start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let start = date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start + chrono::Duration::days(i as i64), c))
        .collect()
}

/// `n` closes growing geometrically from `first` to `last`.
pub fn geometric_closes(n: usize, first: f64, last: f64) -> Vec<f64> {
    let step = (last / first).ln() / (n - 1) as f64;
    (0..n).map(|i| first * (step * i as f64).exp()).collect()
}

/// Trend with a sine wobble so returns have nonzero variance.
pub fn wave_closes(n: usize, start: f64, trend: f64, amplitude: f64, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            start * (1.0 + trend * t) * (1.0 + amplitude * (0.7 * t + phase).sin())
        })
        .collect()
}

pub fn make_asset(ticker: &str, closes: &[f64]) -> Asset {
    let series = PriceSeries::new(ticker, bars_from_closes("2023-01-02", closes));
    Asset::new(series, MetricsSettings::default()).unwrap()
}

/// Write `<dir>/<TICKER>.csv` in the standard column layout.
pub fn write_csv(dir: &std::path::Path, ticker: &str, bars: &[PriceBar]) {
    let mut out = String::from("Date,Open,High,Low,Close,Volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), out).unwrap();
}
