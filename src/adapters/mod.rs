//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod markdown_report;
pub mod synthetic_adapter;

use std::path::PathBuf;

use crate::domain::config_validation::{DataSettings, DataSourceKind};
use crate::domain::error::FinextractError;
use crate::ports::data_port::DataPort;

use csv_adapter::CsvAdapter;
use synthetic_adapter::SyntheticAdapter;

/// Build the data port selected by `[data] source`.
pub fn data_port_for(settings: &DataSettings) -> Result<Box<dyn DataPort>, FinextractError> {
    match settings.source {
        DataSourceKind::Csv => {
            let dir = settings
                .csv_dir
                .as_ref()
                .ok_or_else(|| FinextractError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        DataSourceKind::Synthetic => Ok(Box::new(SyntheticAdapter::new())),
    }
}
