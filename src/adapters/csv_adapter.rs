//! CSV file data adapter.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with a header row naming the
//! columns `Date, Open, High, Low, Close, Volume` (any order, any case).
//! Empty numeric cells are read as `NaN` and left for preprocessing.

use crate::domain::error::FinextractError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn source_error(reason: String) -> FinextractError {
    FinextractError::DataSource { reason }
}

fn parse_cell(value: Option<&str>, column: &str, row: usize) -> Result<f64, FinextractError> {
    match value.map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(s) => s
            .parse()
            .map_err(|e| source_error(format!("invalid {} value '{}' on row {}: {}", column, s, row, e))),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FinextractError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path)
            .map_err(|e| source_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| source_error(format!("CSV header error: {}", e)))?
            .clone();

        let mut index = [0usize; 6];
        for (slot, name) in index.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| source_error(format!("missing {} column in {}", name, path.display())))?;
        }

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| source_error(format!("CSV parse error: {}", e)))?;

            let date_str = record.get(index[0]).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                source_error(format!("invalid date '{}' on row {}: {}", date_str, row + 1, e))
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(PriceBar {
                date,
                open: parse_cell(record.get(index[1]), "open", row + 1)?,
                high: parse_cell(record.get(index[2]), "high", row + 1)?,
                low: parse_cell(record.get(index[3]), "low", row + 1)?,
                close: parse_cell(record.get(index[4]), "close", row + 1)?,
                volume: parse_cell(record.get(index[5]), "volume", row + 1)?,
            });
        }

        Ok(bars)
    }

    fn source_name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Open,High,Low,Close,Volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";
        fs::write(path.join("BHP.csv"), csv_content).unwrap();

        fs::write(
            path.join("GAPS.csv"),
            "date,close,open,high,low,volume\n2024-01-15,105.0,,110.0,90.0,\n",
        )
        .unwrap();
        fs::write(path.join("NOCLOSE.csv"), "date,open,high,low,volume\n").unwrap();

        (dir, path)
    }

    fn january() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn fetch_ohlcv_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (start, end) = january();
        let bars = adapter.fetch_ohlcv("BHP", start, end).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let day = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let bars = adapter.fetch_ohlcv("BHP", day, day).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, day);
    }

    #[test]
    fn empty_cells_become_nan_and_columns_are_matched_by_name() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (start, end) = january();
        let bars = adapter.fetch_ohlcv("GAPS", start, end).unwrap();
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].high, 110.0);
        assert!(bars[0].open.is_nan());
        assert!(bars[0].volume.is_nan());
        assert!(!bars[0].is_complete());
    }

    #[test]
    fn missing_column_is_a_data_source_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (start, end) = january();
        let err = adapter.fetch_ohlcv("NOCLOSE", start, end).unwrap_err();
        assert!(matches!(err, FinextractError::DataSource { reason } if reason.contains("close")));
    }

    #[test]
    fn fetch_ohlcv_errors_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (start, end) = january();
        assert!(adapter.fetch_ohlcv("XYZ", start, end).is_err());
        assert_eq!(adapter.source_name(), "csv");
    }
}
