//! Log-return series and the summary moments every metric builds on.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::error::FinextractError;
use super::ohlcv::PriceSeries;

/// Fewer returns than this and metrics are considered unreliable.
pub const MIN_OBSERVATIONS: usize = 30;

/// `r[i] = ln(close[i + 1] / close[i])`, keyed by the date of the later close.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    first_close: f64,
    last_close: f64,
    date_index: HashMap<NaiveDate, usize>,
}

impl ReturnSeries {
    /// Build with the default [`MIN_OBSERVATIONS`] threshold.
    pub fn from_prices(series: &PriceSeries) -> Result<Self, FinextractError> {
        Self::from_prices_with_minimum(series, MIN_OBSERVATIONS)
    }

    pub fn from_prices_with_minimum(
        series: &PriceSeries,
        min_observations: usize,
    ) -> Result<Self, FinextractError> {
        let closes = series.closes();
        let values = log_returns(&closes)?;

        if values.len() < min_observations {
            return Err(FinextractError::InsufficientData {
                context: format!("{} returns", series.ticker),
                observations: values.len(),
                minimum: min_observations,
            });
        }

        let dates: Vec<NaiveDate> = series.bars.iter().skip(1).map(|b| b.date).collect();
        let date_index = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

        Ok(Self {
            dates,
            values,
            first_close: closes[0],
            last_close: closes[closes.len() - 1],
            date_index,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_close(&self) -> f64 {
        self.first_close
    }

    pub fn last_close(&self) -> f64 {
        self.last_close
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.date_index.get(&date).map(|&i| self.values[i])
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    pub fn stdev(&self) -> f64 {
        sample_stdev(&self.values)
    }

    /// Closing prices rebuilt by cumulatively exponentiating the returns
    /// from the first close. Length is `len() + 1`.
    pub fn reconstruct_prices(&self) -> Vec<f64> {
        let mut prices = Vec::with_capacity(self.values.len() + 1);
        let mut log_level = self.first_close.ln();
        prices.push(self.first_close);
        for r in &self.values {
            log_level += r;
            prices.push(log_level.exp());
        }
        prices
    }
}

/// Log returns of a close sequence. Needs at least two prices, all positive
/// and finite.
pub fn log_returns(closes: &[f64]) -> Result<Vec<f64>, FinextractError> {
    if closes.len() < 2 {
        return Err(FinextractError::InsufficientData {
            context: "log returns".to_string(),
            observations: closes.len(),
            minimum: 2,
        });
    }
    if let Some((index, &price)) = closes
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
        return Err(FinextractError::InvalidPrice { index, price });
    }

    Ok(closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample covariance (ddof = 1). Inputs must have equal length.
pub fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    if n < 2 {
        return 0.0;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

pub fn sample_variance(values: &[f64]) -> f64 {
    sample_covariance(values, values)
}

pub fn sample_stdev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use approx::assert_relative_eq;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 0.0,
            })
            .collect();
        PriceSeries::new("TEST", bars)
    }

    #[test]
    fn log_returns_basic() {
        let r = log_returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], (1.1_f64).ln());
        assert_relative_eq!(r[1], (0.9_f64).ln());
    }

    #[test]
    fn log_returns_rejects_non_positive() {
        let err = log_returns(&[100.0, 0.0, 99.0]).unwrap_err();
        assert_eq!(err, FinextractError::InvalidPrice { index: 1, price: 0.0 });

        let err = log_returns(&[-1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FinextractError::InvalidPrice { index: 0, .. }));
    }

    #[test]
    fn log_returns_needs_two_prices() {
        let err = log_returns(&[100.0]).unwrap_err();
        assert!(matches!(err, FinextractError::InsufficientData { minimum: 2, .. }));
    }

    #[test]
    fn from_prices_enforces_minimum() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let err = ReturnSeries::from_prices(&series(&closes)).unwrap_err();
        assert!(matches!(
            err,
            FinextractError::InsufficientData {
                observations: 29,
                minimum: 30,
                ..
            }
        ));

        let closes: Vec<f64> = (0..31).map(|i| 100.0 + i as f64).collect();
        let returns = ReturnSeries::from_prices(&series(&closes)).unwrap();
        assert_eq!(returns.len(), 30);
    }

    #[test]
    fn dates_align_with_later_close() {
        let s = series(&[100.0, 101.0, 102.0]);
        let returns = ReturnSeries::from_prices_with_minimum(&s, 1).unwrap();
        assert_eq!(returns.dates()[0], s.bars[1].date);
        assert_relative_eq!(returns.get(s.bars[2].date).unwrap(), (102.0_f64 / 101.0).ln());
        assert!(returns.get(s.bars[0].date).is_none());
    }

    #[test]
    fn reconstruct_round_trips() {
        let closes = [100.0, 103.5, 98.2, 120.0, 119.9];
        let returns = ReturnSeries::from_prices_with_minimum(&series(&closes), 1).unwrap();
        let rebuilt = returns.reconstruct_prices();
        assert_eq!(rebuilt.len(), closes.len());
        for (a, b) in rebuilt.iter().zip(closes.iter()) {
            assert_relative_eq!(a, b, max_relative = 1e-12);
        }
    }

    #[test]
    fn sample_moments() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v), 5.0);
        assert_relative_eq!(sample_variance(&v), 32.0 / 7.0);
        assert_relative_eq!(sample_stdev(&v), (32.0_f64 / 7.0).sqrt());
    }

    #[test]
    fn covariance_of_scaled_series() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x).collect();
        assert_relative_eq!(sample_covariance(&a, &b), 2.0 * sample_variance(&a));
    }

    #[test]
    fn degenerate_moments() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(sample_variance(&[1.0]), 0.0);
    }
}
