//! Price data access port.

use crate::domain::error::FinextractError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// A provider of raw daily OHLCV rows. Rows may be unsorted or carry
/// missing (`NaN`) cells; the preprocessing pipeline cleans them.
pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FinextractError>;

    /// Short name recorded on every asset built from this source.
    fn source_name(&self) -> &str;
}
