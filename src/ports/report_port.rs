//! Report generation port trait.

use chrono::NaiveDate;

use crate::domain::error::FinextractError;
use crate::domain::montecarlo::SimulationResult;
use crate::domain::portfolio::Portfolio;
use crate::domain::preprocess::PreprocessWarning;
use crate::domain::universe::SkippedTicker;

/// Everything a report renders. Borrowed; the report never computes
/// simulations of its own.
pub struct ReportContext<'a> {
    pub portfolio: &'a Portfolio<'a>,
    pub simulation: &'a SimulationResult,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub source: &'a str,
    pub skipped: &'a [SkippedTicker],
    pub data_warnings: &'a [(String, PreprocessWarning)],
}

/// Port for writing portfolio reports.
pub trait ReportPort {
    fn write(&self, context: &ReportContext<'_>, output_path: &str) -> Result<(), FinextractError>;
}
