//! Configuration validation.
//!
//! Every section is checked and converted into typed settings before any
//! data is fetched, so a bad key fails fast with the section and key named.

use crate::domain::error::FinextractError;
use crate::domain::metrics::MetricsSettings;
use crate::domain::montecarlo::SimulationConfig;
use crate::domain::universe::{parse_tickers, parse_weights};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Csv,
    Synthetic,
}

impl DataSourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataSourceKind::Csv => "csv",
            DataSourceKind::Synthetic => "synthetic",
        }
    }

    pub const ALL: [DataSourceKind; 2] = [DataSourceKind::Csv, DataSourceKind::Synthetic];
}

impl FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSourceKind::Csv),
            "synthetic" => Ok(DataSourceKind::Synthetic),
            other => Err(format!("unknown data source '{other}', expected csv or synthetic")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub source: DataSourceKind,
    pub csv_dir: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSettings {
    pub tickers: Vec<String>,
    /// Raw weights in ticker order; equal weights when none are configured.
    pub weights: Vec<(String, f64)>,
    /// Build from the tickers that loaded, renormalizing the remaining
    /// weights, instead of failing when one is skipped.
    pub drop_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub engine: SimulationConfig,
    /// Starting value; the portfolio reference value is used when absent.
    pub initial_value: Option<f64>,
    pub components: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSettings {
    pub output: Option<String>,
    pub chart: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data: DataSettings,
    pub analysis: MetricsSettings,
    pub portfolio: Option<PortfolioSettings>,
    pub simulation: SimulationSettings,
    pub report: ReportSettings,
}

pub fn load_config(config: &dyn ConfigPort) -> Result<AppConfig, FinextractError> {
    Ok(AppConfig {
        data: validate_data_config(config)?,
        analysis: validate_analysis_config(config)?,
        portfolio: validate_portfolio_config(config)?,
        simulation: validate_simulation_config(config)?,
        report: validate_report_config(config),
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FinextractError {
    FinextractError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> FinextractError {
    FinextractError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse an optional key; absent means `None`, unparsable is an error.
fn parse_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, FinextractError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{raw}'"))),
    }
}

fn parse_or<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, FinextractError> {
    Ok(parse_optional(config, section, key)?.unwrap_or(default))
}

fn parse_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, FinextractError> {
    let raw = non_empty(config, section, key).ok_or_else(|| missing(section, key))?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<DataSettings, FinextractError> {
    let source = match non_empty(config, "data", "source") {
        None => DataSourceKind::Csv,
        Some(raw) => raw.parse().map_err(|e: String| invalid("data", "source", e))?,
    };
    let csv_dir = non_empty(config, "data", "csv_dir");
    if source == DataSourceKind::Csv && csv_dir.is_none() {
        return Err(missing("data", "csv_dir"));
    }

    let start_date = parse_date(config, "data", "start_date")?;
    let end_date = parse_date(config, "data", "end_date")?;
    if start_date >= end_date {
        return Err(invalid("data", "start_date", "start_date must be before end_date"));
    }

    Ok(DataSettings {
        source,
        csv_dir,
        start_date,
        end_date,
    })
}

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<MetricsSettings, FinextractError> {
    let defaults = MetricsSettings::default();
    let settings = MetricsSettings {
        periods_per_year: parse_or(config, "analysis", "periods_per_year", defaults.periods_per_year)?,
        risk_free_rate: parse_or(config, "analysis", "risk_free_rate", defaults.risk_free_rate)?,
        confidence_level: parse_or(config, "analysis", "confidence_level", defaults.confidence_level)?,
        min_observations: parse_or(config, "analysis", "min_observations", defaults.min_observations)?,
    };

    if !(settings.periods_per_year.is_finite() && settings.periods_per_year > 0.0) {
        return Err(invalid("analysis", "periods_per_year", "periods_per_year must be positive"));
    }
    if !(settings.risk_free_rate > -1.0 && settings.risk_free_rate < 1.0) {
        return Err(invalid("analysis", "risk_free_rate", "risk_free_rate must be between -1 and 1"));
    }
    if !(settings.confidence_level > 0.0 && settings.confidence_level < 1.0) {
        return Err(invalid("analysis", "confidence_level", "confidence_level must be in (0, 1)"));
    }
    if settings.min_observations < 2 {
        return Err(invalid("analysis", "min_observations", "min_observations must be at least 2"));
    }
    Ok(settings)
}

/// `None` when the config names no portfolio at all.
pub fn validate_portfolio_config(
    config: &dyn ConfigPort,
) -> Result<Option<PortfolioSettings>, FinextractError> {
    let tickers = non_empty(config, "portfolio", "tickers")
        .map(|raw| parse_tickers(&raw).map_err(|e| invalid("portfolio", "tickers", e.to_string())))
        .transpose()?;
    let weights = non_empty(config, "portfolio", "weights")
        .map(|raw| parse_weights(&raw).map_err(|e| invalid("portfolio", "weights", e.to_string())))
        .transpose()?;

    let (tickers, weights) = match (tickers, weights) {
        (None, None) => return Ok(None),
        (Some(tickers), None) => {
            let weights = tickers.iter().map(|t| (t.clone(), 1.0)).collect();
            (tickers, weights)
        }
        (None, Some(weights)) => (weights.iter().map(|(t, _)| t.clone()).collect(), weights),
        (Some(tickers), Some(weights)) => {
            let mut weighted: Vec<&str> = weights.iter().map(|(t, _)| t.as_str()).collect();
            let mut listed: Vec<&str> = tickers.iter().map(String::as_str).collect();
            weighted.sort_unstable();
            listed.sort_unstable();
            if weighted != listed {
                return Err(invalid(
                    "portfolio",
                    "weights",
                    "weights must name exactly the configured tickers",
                ));
            }
            (tickers, weights)
        }
    };
    let settings = PortfolioSettings {
        tickers,
        weights,
        drop_missing: config.get_bool("portfolio", "drop_missing", false),
    };

    if let Some((ticker, w)) = settings.weights.iter().find(|(_, w)| !(w.is_finite() && *w >= 0.0)) {
        return Err(invalid(
            "portfolio",
            "weights",
            format!("weight {w} for {ticker} must be non-negative"),
        ));
    }
    if settings.weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
        return Err(invalid("portfolio", "weights", "weights must not all be zero"));
    }
    Ok(Some(settings))
}

pub fn validate_simulation_config(
    config: &dyn ConfigPort,
) -> Result<SimulationSettings, FinextractError> {
    let defaults = SimulationConfig::default();
    let confidence_level = parse_or(
        config,
        "analysis",
        "confidence_level",
        defaults.confidence_level,
    )?;
    let initial_value: Option<f64> = parse_optional(config, "simulation", "initial_value")?;

    let engine = SimulationConfig {
        num_simulations: parse_or(config, "simulation", "num_simulations", defaults.num_simulations)?,
        time_horizon: parse_or(config, "simulation", "time_horizon", defaults.time_horizon)?,
        initial_value: initial_value.unwrap_or(defaults.initial_value),
        confidence_level,
        seed: parse_optional(config, "simulation", "seed")?,
        batch_size: parse_or(config, "simulation", "batch_size", defaults.batch_size)?,
        max_matrix_cells: parse_or(
            config,
            "simulation",
            "max_matrix_cells",
            defaults.max_matrix_cells,
        )?,
    };

    if let Err(e) = engine.validate() {
        let key = match &e {
            FinextractError::InvalidParameter { name, .. } => *name,
            _ => "num_simulations",
        };
        return Err(invalid("simulation", key, e.to_string()));
    }

    Ok(SimulationSettings {
        engine,
        initial_value,
        components: config.get_bool("simulation", "components", false),
    })
}

pub fn validate_report_config(config: &dyn ConfigPort) -> ReportSettings {
    ReportSettings {
        output: non_empty(config, "report", "output"),
        chart: non_empty(config, "report", "chart"),
    }
}
