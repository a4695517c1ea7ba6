//! Cleaning raw OHLCV rows into a series the core can consume.
//!
//! Pipeline: validate → fill missing values → date consistency → validate.
//! Non-fatal findings come back as [`PreprocessWarning`]s and are logged.

use std::fmt;

use tracing::warn;

use super::error::FinextractError;
use super::ohlcv::PriceBar;

/// Calendar-day gap between consecutive rows worth reporting.
pub const MAX_GAP_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessWarning {
    DroppedIncomplete { rows: usize },
    DuplicateDates { rows: usize },
    Unsorted,
    LargeGaps { count: usize },
}

impl fmt::Display for PreprocessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessWarning::DroppedIncomplete { rows } => {
                write!(f, "dropped {rows} rows with missing values")
            }
            PreprocessWarning::DuplicateDates { rows } => {
                write!(f, "found {rows} duplicate dates; kept the first occurrence")
            }
            PreprocessWarning::Unsorted => write!(f, "dates were out of order and have been sorted"),
            PreprocessWarning::LargeGaps { count } => {
                write!(f, "found {count} gaps longer than {MAX_GAP_DAYS} days")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub bars: Vec<PriceBar>,
    pub warnings: Vec<PreprocessWarning>,
}

fn fill_column(bars: &mut [PriceBar], field: fn(&mut PriceBar) -> &mut f64) {
    let mut last = None;
    for bar in bars.iter_mut() {
        let v = field(bar);
        if v.is_finite() {
            last = Some(*v);
        } else if let Some(prev) = last {
            *v = prev;
        }
    }
    let mut next = None;
    for bar in bars.iter_mut().rev() {
        let v = field(bar);
        if v.is_finite() {
            next = Some(*v);
        } else if let Some(after) = next {
            *v = after;
        }
    }
}

/// Forward-fill then back-fill every numeric column, then drop rows that are
/// still incomplete. Returns the number of rows dropped.
pub fn clean_missing(bars: &mut Vec<PriceBar>) -> usize {
    fill_column(bars, |b| &mut b.open);
    fill_column(bars, |b| &mut b.high);
    fill_column(bars, |b| &mut b.low);
    fill_column(bars, |b| &mut b.close);
    fill_column(bars, |b| &mut b.volume);

    let before = bars.len();
    bars.retain(PriceBar::is_complete);
    before - bars.len()
}

/// Drop duplicate dates (first occurrence wins), sort ascending, and count
/// gaps longer than [`MAX_GAP_DAYS`].
pub fn check_consistency(bars: &mut Vec<PriceBar>) -> Vec<PreprocessWarning> {
    let mut warnings = Vec::new();

    let mut seen = std::collections::HashSet::new();
    let before = bars.len();
    bars.retain(|b| seen.insert(b.date));
    let duplicates = before - bars.len();
    if duplicates > 0 {
        warnings.push(PreprocessWarning::DuplicateDates { rows: duplicates });
    }

    if bars.windows(2).any(|w| w[0].date > w[1].date) {
        warnings.push(PreprocessWarning::Unsorted);
        bars.sort_by_key(|b| b.date);
    }

    let gaps = bars
        .windows(2)
        .filter(|w| (w[1].date - w[0].date).num_days() > MAX_GAP_DAYS)
        .count();
    if gaps > 0 {
        warnings.push(PreprocessWarning::LargeGaps { count: gaps });
    }

    warnings
}

/// Non-empty, at least `min_rows` rows, every present close positive.
pub fn validate_bars(bars: &[PriceBar], min_rows: usize) -> Result<(), FinextractError> {
    if bars.len() < min_rows.max(1) {
        return Err(FinextractError::InsufficientData {
            context: "price rows".to_string(),
            observations: bars.len(),
            minimum: min_rows.max(1),
        });
    }
    if let Some((index, bar)) = bars
        .iter()
        .enumerate()
        .find(|(_, b)| !b.close.is_nan() && b.close <= 0.0)
    {
        return Err(FinextractError::InvalidPrice {
            index,
            price: bar.close,
        });
    }
    Ok(())
}

pub fn preprocess(
    ticker: &str,
    mut bars: Vec<PriceBar>,
    min_rows: usize,
) -> Result<Preprocessed, FinextractError> {
    validate_bars(&bars, min_rows)?;

    let mut warnings = Vec::new();
    let dropped = clean_missing(&mut bars);
    if dropped > 0 {
        warnings.push(PreprocessWarning::DroppedIncomplete { rows: dropped });
    }
    warnings.extend(check_consistency(&mut bars));

    validate_bars(&bars, min_rows)?;

    for w in &warnings {
        warn!(ticker, "{w}");
    }
    Ok(Preprocessed { bars, warnings })
}
