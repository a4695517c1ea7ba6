//! Risk and return metrics over a log-return series.
//!
//! Every function is pure. Annualization uses the caller's
//! `periods_per_year`; the risk-free rate is annualized. Ratios whose
//! denominator vanishes return [`FinextractError::DivisionByZero`] rather
//! than an infinite or zero stand-in.

use super::error::FinextractError;
use super::returns::{mean, sample_stdev, ReturnSeries, MIN_OBSERVATIONS};

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Standard deviations at or below this are treated as zero.
pub const DEGENERATE_STDEV: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSettings {
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    pub confidence_level: f64,
    pub min_observations: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            risk_free_rate: 0.0,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_observations: MIN_OBSERVATIONS,
        }
    }
}

impl MetricsSettings {
    pub fn validate(&self) -> Result<(), FinextractError> {
        validate_periods_per_year(self.periods_per_year)?;
        validate_confidence(self.confidence_level)?;
        if !self.risk_free_rate.is_finite() {
            return Err(FinextractError::invalid_parameter(
                "risk_free_rate",
                "must be finite",
            ));
        }
        if self.min_observations < 2 {
            return Err(FinextractError::invalid_parameter(
                "min_observations",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_confidence(confidence: f64) -> Result<(), FinextractError> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(FinextractError::invalid_parameter(
            "confidence_level",
            format!("{confidence} is outside (0, 1)"),
        ))
    }
}

pub(crate) fn validate_periods_per_year(periods_per_year: f64) -> Result<(), FinextractError> {
    if periods_per_year.is_finite() && periods_per_year > 0.0 {
        Ok(())
    } else {
        Err(FinextractError::invalid_parameter(
            "periods_per_year",
            "must be positive",
        ))
    }
}

pub fn annualized_return(mean_return: f64, periods_per_year: f64) -> f64 {
    mean_return * periods_per_year
}

pub fn annualized_volatility(stdev_return: f64, periods_per_year: f64) -> f64 {
    stdev_return * periods_per_year.sqrt()
}

/// `(mean * ppy - rf) / (stdev * sqrt(ppy))` from per-period moments.
pub fn sharpe_from_moments(
    mean_return: f64,
    stdev_return: f64,
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Result<f64, FinextractError> {
    if stdev_return <= DEGENERATE_STDEV {
        return Err(FinextractError::DivisionByZero {
            metric: "sharpe ratio",
        });
    }
    let excess = annualized_return(mean_return, periods_per_year) - risk_free_rate;
    Ok(excess / annualized_volatility(stdev_return, periods_per_year))
}

pub fn sharpe_ratio(
    returns: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Result<f64, FinextractError> {
    sharpe_from_moments(
        mean(returns),
        sample_stdev(returns),
        risk_free_rate,
        periods_per_year,
    )
}

/// Sample standard deviation of the strictly negative returns. Zero when
/// fewer than two negative returns exist.
pub fn downside_deviation(returns: &[f64]) -> f64 {
    let negatives: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    sample_stdev(&negatives)
}

pub fn sortino_ratio(
    returns: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Result<f64, FinextractError> {
    let downside = downside_deviation(returns);
    if downside <= DEGENERATE_STDEV {
        return Err(FinextractError::DivisionByZero {
            metric: "sortino ratio",
        });
    }
    let excess = annualized_return(mean(returns), periods_per_year) - risk_free_rate;
    Ok(excess / annualized_volatility(downside, periods_per_year))
}

/// `(last / first)^(periods_per_year / periods) - 1`, where `periods` is the
/// number of returns between the two prices.
pub fn cagr(
    first_price: f64,
    last_price: f64,
    periods: usize,
    periods_per_year: f64,
) -> Result<f64, FinextractError> {
    if !(first_price.is_finite() && first_price > 0.0) {
        return Err(FinextractError::InvalidPrice {
            index: 0,
            price: first_price,
        });
    }
    if periods == 0 {
        return Err(FinextractError::InsufficientData {
            context: "cagr".to_string(),
            observations: 0,
            minimum: 1,
        });
    }
    validate_periods_per_year(periods_per_year)?;
    Ok((last_price / first_price).powf(periods_per_year / periods as f64) - 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawdown {
    /// Largest peak-to-trough decline as a non-negative fraction of the peak.
    pub max_drawdown: f64,
    /// Longest run of consecutive periods spent below a prior peak.
    pub longest_duration: usize,
}

/// Drawdown of the value path rebuilt from log returns, starting at 1.0.
pub fn drawdown(returns: &[f64]) -> Drawdown {
    let mut level = 0.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    let mut current = 0usize;
    let mut longest = 0usize;

    for r in returns {
        level += r;
        let value = level.exp();
        if value >= peak {
            peak = value;
            current = 0;
        } else {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current += 1;
            longest = longest.max(current);
        }
    }

    Drawdown {
        max_drawdown: max_dd,
        longest_duration: longest,
    }
}

pub fn max_drawdown(returns: &[f64]) -> f64 {
    drawdown(returns).max_drawdown
}

/// Empirical quantile of ascending-sorted values by linear interpolation
/// between closest ranks. `q` in `[0, 1]`.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Lower tail of a distribution at a confidence level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowerTail {
    /// The `(1 - confidence)` percentile.
    pub threshold: f64,
    /// Mean of every value at or below the threshold; `None` when that set is
    /// empty.
    pub tail_mean: Option<f64>,
}

impl LowerTail {
    /// Tail mean, or the threshold itself when the tail is empty.
    pub fn expected_shortfall(&self) -> f64 {
        self.tail_mean.unwrap_or(self.threshold)
    }
}

pub fn lower_tail(values: &[f64], confidence: f64) -> Result<LowerTail, FinextractError> {
    validate_confidence(confidence)?;
    if values.is_empty() {
        return Err(FinextractError::InsufficientData {
            context: "tail estimate".to_string(),
            observations: 0,
            minimum: 1,
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(lower_tail_sorted(&sorted, confidence))
}

pub(crate) fn lower_tail_sorted(sorted: &[f64], confidence: f64) -> LowerTail {
    let threshold = percentile_sorted(sorted, 1.0 - confidence);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|&v| v <= threshold).collect();
    let tail_mean = if tail.is_empty() {
        None
    } else {
        Some(mean(&tail))
    };
    LowerTail {
        threshold,
        tail_mean,
    }
}

/// Historical VaR and CVaR as positive loss fractions of current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailRisk {
    pub confidence_level: f64,
    pub var: f64,
    pub cvar: f64,
    /// Set when the tail was empty and `cvar` repeats `var`.
    pub cvar_is_fallback: bool,
}

impl TailRisk {
    pub fn var_loss(&self, current_value: f64) -> f64 {
        self.var * current_value
    }

    pub fn cvar_loss(&self, current_value: f64) -> f64 {
        self.cvar * current_value
    }
}

pub fn tail_risk(returns: &[f64], confidence: f64) -> Result<TailRisk, FinextractError> {
    let tail = lower_tail(returns, confidence)?;
    Ok(TailRisk {
        confidence_level: confidence,
        var: -tail.threshold,
        cvar: -tail.expected_shortfall(),
        cvar_is_fallback: tail.tail_mean.is_none(),
    })
}

/// Negative `(1 - confidence)` percentile of returns: a loss fraction.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> Result<f64, FinextractError> {
    tail_risk(returns, confidence).map(|t| t.var)
}

pub fn conditional_value_at_risk(
    returns: &[f64],
    confidence: f64,
) -> Result<f64, FinextractError> {
    tail_risk(returns, confidence).map(|t| t.cvar)
}

/// Population central moments (m2, m3, m4).
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mu = mean(values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mu;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Bias-corrected sample skewness (adjusted Fisher-Pearson, G1).
pub fn skewness(returns: &[f64]) -> Result<f64, FinextractError> {
    let n = returns.len();
    if n < 3 {
        return Err(FinextractError::InsufficientData {
            context: "skewness".to_string(),
            observations: n,
            minimum: 3,
        });
    }
    let (m2, m3, _) = central_moments(returns);
    if m2.sqrt() <= DEGENERATE_STDEV {
        return Err(FinextractError::DivisionByZero { metric: "skewness" });
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    Ok(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected sample excess kurtosis (G2); a normal sample scores ~0.
pub fn kurtosis(returns: &[f64]) -> Result<f64, FinextractError> {
    let n = returns.len();
    if n < 4 {
        return Err(FinextractError::InsufficientData {
            context: "kurtosis".to_string(),
            observations: n,
            minimum: 4,
        });
    }
    let (m2, _, m4) = central_moments(returns);
    if m2.sqrt() <= DEGENERATE_STDEV {
        return Err(FinextractError::DivisionByZero { metric: "kurtosis" });
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    Ok((n - 1.0) / ((n - 2.0) * (n - 3.0)) * ((n + 1.0) * g2 + 6.0))
}

/// Every metric for one return series. Ratios and moments that are
/// undefined for this series are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    pub observations: usize,
    pub mean_return: f64,
    pub stdev_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub tail: TailRisk,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

impl RiskMetrics {
    pub fn compute(
        series: &ReturnSeries,
        settings: &MetricsSettings,
    ) -> Result<Self, FinextractError> {
        settings.validate()?;
        let returns = series.values();
        let ppy = settings.periods_per_year;
        let rf = settings.risk_free_rate;

        let mean_return = mean(returns);
        let stdev_return = sample_stdev(returns);
        let dd = drawdown(returns);

        Ok(RiskMetrics {
            observations: returns.len(),
            mean_return,
            stdev_return,
            annualized_return: annualized_return(mean_return, ppy),
            annualized_volatility: annualized_volatility(stdev_return, ppy),
            sharpe_ratio: defined(sharpe_from_moments(mean_return, stdev_return, rf, ppy))?,
            sortino_ratio: defined(sortino_ratio(returns, rf, ppy))?,
            cagr: cagr(series.first_close(), series.last_close(), returns.len(), ppy)?,
            max_drawdown: dd.max_drawdown,
            max_drawdown_duration: dd.longest_duration,
            tail: tail_risk(returns, settings.confidence_level)?,
            skewness: defined(skewness(returns))?,
            kurtosis: defined(kurtosis(returns))?,
        })
    }
}

/// Maps a zero denominator, or a series too short for the statistic, to
/// `None`; any other error propagates.
fn defined(result: Result<f64, FinextractError>) -> Result<Option<f64>, FinextractError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(FinextractError::DivisionByZero { metric }) => {
            tracing::debug!("{metric} undefined for zero-dispersion series");
            Ok(None)
        }
        Err(FinextractError::InsufficientData {
            context,
            observations,
            minimum,
        }) => {
            tracing::debug!(observations, minimum, "{context} undefined for short series");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn wavy_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 0.001 + 0.02 * ((i as f64) * 0.7).sin())
            .collect()
    }

    #[test]
    fn sharpe_zero_rf_is_annualized_mean_over_stdev() {
        let r = wavy_returns(100);
        let expected = (mean(&r) * 252.0) / (sample_stdev(&r) * 252.0_f64.sqrt());
        assert_eq!(sharpe_ratio(&r, 0.0, 252.0).unwrap(), expected);
    }

    #[test]
    fn sharpe_subtracts_risk_free_rate() {
        let r = wavy_returns(100);
        let base = sharpe_ratio(&r, 0.0, 252.0).unwrap();
        let with_rf = sharpe_ratio(&r, 0.02, 252.0).unwrap();
        let vol = annualized_volatility(sample_stdev(&r), 252.0);
        assert_relative_eq!(base - with_rf, 0.02 / vol, max_relative = 1e-12);
    }

    #[test]
    fn sharpe_zero_volatility_is_division_by_zero() {
        let r = vec![0.001; 50];
        assert_eq!(
            sharpe_ratio(&r, 0.0, 252.0),
            Err(FinextractError::DivisionByZero {
                metric: "sharpe ratio"
            })
        );
    }

    #[test]
    fn sortino_uses_negative_returns_only() {
        let r = [0.02, -0.01, 0.03, -0.03, 0.01];
        let downside = sample_stdev(&[-0.01, -0.03]);
        assert_relative_eq!(downside_deviation(&r), downside);
        let expected = (mean(&r) * 252.0) / (downside * 252.0_f64.sqrt());
        assert_relative_eq!(sortino_ratio(&r, 0.0, 252.0).unwrap(), expected);
    }

    #[test]
    fn sortino_without_losses_is_undefined() {
        let r = [0.01, 0.02, 0.0, 0.03];
        assert!(matches!(
            sortino_ratio(&r, 0.0, 252.0),
            Err(FinextractError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn cagr_one_year_of_daily_returns() {
        let g = cagr(100.0, 120.0, 252, 252.0).unwrap();
        assert_relative_eq!(g, 0.2, max_relative = 1e-12);
    }

    #[test]
    fn cagr_respects_frequency() {
        // 52 weekly returns doubling the price is 100% a year.
        let g = cagr(50.0, 100.0, 52, 52.0).unwrap();
        assert_relative_eq!(g, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn cagr_rejects_non_positive_start() {
        assert!(matches!(
            cagr(0.0, 10.0, 10, 252.0),
            Err(FinextractError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn drawdown_from_returns() {
        let prices: [f64; 6] = [100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        let r: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let dd = drawdown(&r);
        assert_relative_eq!(dd.max_drawdown, (110.0 - 80.0) / 110.0, max_relative = 1e-12);
        assert_eq!(dd.longest_duration, 4);
    }

    #[test]
    fn drawdown_monotonic_rise_is_zero() {
        let r = vec![0.01; 20];
        assert_eq!(max_drawdown(&r), 0.0);
    }

    #[test]
    fn percentile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 0.5), 3.0);
        assert_relative_eq!(percentile(&v, 0.05), 1.2);
        assert_relative_eq!(percentile(&v, 0.95), 4.8);
        assert_relative_eq!(percentile(&[5.0, 1.0, 3.0], 0.25), 2.0);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn var_and_cvar_on_known_distribution() {
        let r: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
        let tail = tail_risk(&r, 0.95).unwrap();
        // 5th percentile of -0.049..0.050 at pos 4.95.
        assert_relative_eq!(tail.var, 0.04405, max_relative = 1e-9);
        // mean of the five returns at or below: -0.049..-0.045
        assert_relative_eq!(tail.cvar, 0.047, max_relative = 1e-9);
        assert!(!tail.cvar_is_fallback);
        assert!(tail.cvar >= tail.var);
        assert_relative_eq!(tail.var_loss(1_000.0), 44.05, max_relative = 1e-9);
    }

    #[test]
    fn higher_confidence_is_larger_var() {
        let r = wavy_returns(250);
        let v95 = value_at_risk(&r, 0.95).unwrap();
        let v99 = value_at_risk(&r, 0.99).unwrap();
        assert!(v99 >= v95);
        assert!(conditional_value_at_risk(&r, 0.99).unwrap() >= v99);
    }

    #[test]
    fn var_rejects_bad_confidence() {
        let r = wavy_returns(10);
        for c in [0.0, 1.0, -0.5, 1.5] {
            assert!(matches!(
                value_at_risk(&r, c),
                Err(FinextractError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn empty_tail_falls_back_to_threshold() {
        let tail = LowerTail {
            threshold: -0.02,
            tail_mean: None,
        };
        assert_eq!(tail.expected_shortfall(), -0.02);
    }

    #[test]
    fn skewness_signs() {
        let right = [0.0, 0.0, 0.0, 0.0, 1.0];
        let left = [0.0, 0.0, 0.0, 0.0, -1.0];
        assert!(skewness(&right).unwrap() > 0.0);
        assert!(skewness(&left).unwrap() < 0.0);
        assert_abs_diff_eq!(skewness(&[1.0, 2.0, 3.0]).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn skewness_known_value() {
        // G1 for [1, 2, 3, 10]
        let v = [1.0, 2.0, 3.0, 10.0];
        let (m2, m3, _) = central_moments(&v);
        let expected = m3 / m2.powf(1.5) * (12.0_f64).sqrt() / 2.0;
        assert_relative_eq!(skewness(&v).unwrap(), expected);
    }

    #[test]
    fn kurtosis_of_uniform_grid_is_negative() {
        let v: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let k = kurtosis(&v).unwrap();
        assert_abs_diff_eq!(k, -1.2, epsilon = 0.01);
    }

    #[test]
    fn moments_need_minimum_length() {
        assert!(matches!(
            skewness(&[1.0, 2.0]),
            Err(FinextractError::InsufficientData { minimum: 3, .. })
        ));
        assert!(matches!(
            kurtosis(&[1.0, 2.0, 3.0]),
            Err(FinextractError::InsufficientData { minimum: 4, .. })
        ));
    }

    #[test]
    fn settings_validation() {
        assert!(MetricsSettings::default().validate().is_ok());
        let bad = MetricsSettings {
            periods_per_year: 0.0,
            ..MetricsSettings::default()
        };
        assert!(bad.validate().is_err());
        let bad = MetricsSettings {
            confidence_level: 1.0,
            ..MetricsSettings::default()
        };
        assert!(bad.validate().is_err());
    }
}
