//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::data_port_for;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report::MarkdownReportAdapter;
use crate::domain::asset::AssetSummary;
use crate::domain::config_validation::{
    load_config, AppConfig, DataSettings, DataSourceKind, PortfolioSettings,
};
use crate::domain::error::FinextractError;
use crate::domain::metrics::MetricsSettings;
use crate::domain::montecarlo::{simulate_components, MonteCarloEngine, SimulationResult};
use crate::domain::portfolio::{Portfolio, DEFAULT_REFERENCE_UNITS};
use crate::domain::universe::{load_assets, LoadedUniverse};
use crate::ports::report_port::{ReportContext, ReportPort};

pub const DEFAULT_REPORT_PATH: &str = "portfolio_report.md";

#[derive(Parser, Debug)]
#[command(
    name = "finextract",
    about = "Risk metrics and Monte Carlo simulation for assets and portfolios"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print risk metrics for a single ticker
    Analyze {
        #[arg(long)]
        ticker: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Read `<DIR>/<TICKER>.csv` instead of the configured source
        #[arg(long)]
        csv_dir: Option<PathBuf>,
        /// Data source name (csv or synthetic)
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Build the configured portfolio, simulate it and write a report
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write an SVG fan chart to this path
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Simulate the configured portfolio and print a summary
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Also simulate each constituent on its own
        #[arg(long)]
        components: bool,
    },
    /// Compare one ticker's metrics across every data source
    Compare {
        #[arg(long)]
        ticker: String,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            ticker,
            config,
            csv_dir,
            source,
            start,
            end,
        } => run_analyze(
            &ticker,
            config.as_deref(),
            csv_dir.as_deref(),
            source.as_deref(),
            start,
            end,
        ),
        Command::Portfolio {
            config,
            output,
            chart,
        } => run_portfolio(&config, output.as_deref(), chart.as_deref()),
        Command::Simulate {
            config,
            seed,
            components,
        } => run_simulate(&config, seed, components),
        Command::Compare { ticker, config } => run_compare(&ticker, &config),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_app_config(path: &Path) -> Result<AppConfig, FinextractError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    load_config(&adapter)
}

fn require_portfolio(app: &AppConfig) -> Result<&PortfolioSettings, FinextractError> {
    app.portfolio
        .as_ref()
        .ok_or_else(|| FinextractError::ConfigMissing {
            section: "portfolio".into(),
            key: "tickers".into(),
        })
}

/// Data and analysis settings for `analyze`: the config file when given,
/// with command-line flags taking precedence.
pub fn resolve_analyze_settings(
    config: Option<&Path>,
    csv_dir: Option<&Path>,
    source: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(DataSettings, MetricsSettings), FinextractError> {
    let (base, analysis) = match config {
        Some(path) => {
            let adapter = FileConfigAdapter::from_file(path)?;
            let app = load_config(&adapter)?;
            (Some(app.data), app.analysis)
        }
        None => (None, MetricsSettings::default()),
    };

    let source = match source {
        Some(raw) => raw.parse::<DataSourceKind>().map_err(|reason| FinextractError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason,
        })?,
        None if csv_dir.is_some() => DataSourceKind::Csv,
        None => base.as_ref().map_or(DataSourceKind::Csv, |b| b.source),
    };
    let csv_dir = csv_dir
        .map(|d| d.display().to_string())
        .or_else(|| base.as_ref().and_then(|b| b.csv_dir.clone()));
    if source == DataSourceKind::Csv && csv_dir.is_none() {
        return Err(FinextractError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        });
    }

    let start_date = start
        .or(base.as_ref().map(|b| b.start_date))
        .ok_or_else(|| FinextractError::ConfigMissing {
            section: "data".into(),
            key: "start_date".into(),
        })?;
    let end_date = end
        .or(base.as_ref().map(|b| b.end_date))
        .ok_or_else(|| FinextractError::ConfigMissing {
            section: "data".into(),
            key: "end_date".into(),
        })?;
    if start_date >= end_date {
        return Err(FinextractError::ConfigInvalid {
            section: "data".into(),
            key: "start_date".into(),
            reason: "start_date must be before end_date".into(),
        });
    }

    Ok((
        DataSettings {
            source,
            csv_dir,
            start_date,
            end_date,
        },
        analysis,
    ))
}

fn run_analyze(
    ticker: &str,
    config: Option<&Path>,
    csv_dir: Option<&Path>,
    source: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), FinextractError> {
    let (data, analysis) = resolve_analyze_settings(config, csv_dir, source, start, end)?;
    let port = data_port_for(&data)?;
    let tickers = [ticker.trim().to_uppercase()];
    let universe = load_assets(
        port.as_ref(),
        &tickers,
        data.start_date,
        data.end_date,
        &analysis,
    )?;

    for asset in &universe.assets {
        print_summary(&asset.summary());
    }
    for (ticker, warning) in &universe.warnings {
        println!("note: {ticker}: {warning}");
    }
    Ok(())
}

fn print_summary(summary: &AssetSummary) {
    println!("=== {} ===", summary.ticker);
    for (label, value) in summary.rows() {
        println!("{:<22} {}", label, value);
    }
}

/// Load the configured tickers. Weights of skipped tickers are kept, so
/// building the portfolio fails, unless `drop_missing` is set.
fn load_portfolio_universe(
    app: &AppConfig,
) -> Result<(LoadedUniverse, Vec<(String, f64)>, String), FinextractError> {
    let settings = require_portfolio(app)?;
    let port = data_port_for(&app.data)?;
    let universe = load_assets(
        port.as_ref(),
        &settings.tickers,
        app.data.start_date,
        app.data.end_date,
        &app.analysis,
    )?;

    if !settings.drop_missing {
        return Ok((universe, settings.weights.clone(), port.source_name().to_string()));
    }
    let weights: Vec<(String, f64)> = settings
        .weights
        .iter()
        .filter(|(ticker, _)| universe.find(ticker).is_some())
        .cloned()
        .collect();
    if weights.len() < settings.weights.len() {
        warn!(
            kept = weights.len(),
            configured = settings.weights.len(),
            "weights of skipped tickers dropped"
        );
    }

    Ok((universe, weights, port.source_name().to_string()))
}

fn simulate_portfolio(
    app: &AppConfig,
    portfolio: &Portfolio<'_>,
    seed: Option<u64>,
) -> Result<SimulationResult, FinextractError> {
    let mut config = app.simulation.engine.clone();
    config.initial_value = app
        .simulation
        .initial_value
        .unwrap_or_else(|| portfolio.reference_value(DEFAULT_REFERENCE_UNITS));
    if seed.is_some() {
        config.seed = seed;
    }
    MonteCarloEngine::new(config)?.run(&portfolio.gbm_params()?)
}

fn run_portfolio(
    config_path: &Path,
    output: Option<&Path>,
    chart: Option<&Path>,
) -> Result<(), FinextractError> {
    let app = load_app_config(config_path)?;
    let (universe, weights, source) = load_portfolio_universe(&app)?;
    let refs = universe.asset_refs();
    let portfolio = Portfolio::new(&refs, &weights)?;
    let simulation = simulate_portfolio(&app, &portfolio, None)?;

    let output = output
        .map(|p| p.display().to_string())
        .or_else(|| app.report.output.clone())
        .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string());
    let chart = chart
        .map(|p| p.display().to_string())
        .or_else(|| app.report.chart.clone());

    let mut adapter = MarkdownReportAdapter::new();
    if let Some(chart) = &chart {
        adapter = adapter.with_chart(chart.clone());
    }
    let context = ReportContext {
        portfolio: &portfolio,
        simulation: &simulation,
        start_date: app.data.start_date,
        end_date: app.data.end_date,
        source: &source,
        skipped: &universe.skipped,
        data_warnings: &universe.warnings,
    };
    adapter.write(&context, &output)?;

    print_simulation("Portfolio", &simulation);
    println!("Report written to: {}", output);
    if let Some(chart) = chart {
        println!("Chart written to: {}", chart);
    }
    Ok(())
}

fn print_simulation(label: &str, result: &SimulationResult) {
    println!("=== {} ===", label);
    println!("{:<22} {:.2}", "Initial Value", result.initial_value);
    println!("{:<22} {:.2}", "Expected Value", result.mean_final_value);
    println!("{:<22} {:.2}", "5th Percentile", result.percentile_5);
    println!("{:<22} {:.2}", "95th Percentile", result.percentile_95);
    let confidence = result.confidence_level * 100.0;
    println!("{:<22} {:.2}", format!("VaR ({confidence:.0}%)"), result.var_loss);
    let fallback = if result.cvar_is_fallback {
        " (tail empty)"
    } else {
        ""
    };
    println!(
        "{:<22} {:.2}{}",
        format!("CVaR ({confidence:.0}%)"),
        result.cvar_loss,
        fallback
    );
    if let Some(seed) = result.seed {
        println!("{:<22} {}", "Seed", seed);
    }
}

fn run_simulate(config_path: &Path, seed: Option<u64>, components: bool) -> Result<(), FinextractError> {
    let app = load_app_config(config_path)?;
    let (universe, weights, _) = load_portfolio_universe(&app)?;
    let refs = universe.asset_refs();
    let portfolio = Portfolio::new(&refs, &weights)?;

    let result = simulate_portfolio(&app, &portfolio, seed)?;
    print_simulation("Portfolio", &result);

    if components || app.simulation.components {
        let mut config = app.simulation.engine.clone();
        config.seed = result.seed;
        for (ticker, component) in simulate_components(&portfolio, &config)? {
            print_simulation(&ticker, &component);
        }
    }
    Ok(())
}

fn run_compare(ticker: &str, config_path: &Path) -> Result<(), FinextractError> {
    let app = load_app_config(config_path)?;
    let ticker = ticker.trim().to_uppercase();
    let tickers = [ticker.clone()];

    let mut summaries = Vec::new();
    for kind in DataSourceKind::ALL {
        let data = DataSettings {
            source: kind,
            ..app.data.clone()
        };
        let loaded = data_port_for(&data).and_then(|port| {
            load_assets(
                port.as_ref(),
                &tickers,
                data.start_date,
                data.end_date,
                &app.analysis,
            )
        });
        match loaded {
            Ok(universe) => summaries.extend(universe.assets.iter().map(|a| a.summary())),
            Err(e) => warn!(source = kind.name(), error = %e, "source unavailable"),
        }
    }

    if summaries.is_empty() {
        return Err(FinextractError::NoData { ticker });
    }

    print!("{:<22}", "Metric");
    for s in &summaries {
        print!(" {:>24}", s.source);
    }
    println!();
    let rows: Vec<_> = summaries.iter().map(AssetSummary::rows).collect();
    for (i, (label, _)) in rows[0].iter().enumerate() {
        print!("{:<22}", label);
        for r in &rows {
            print!(" {:>24}", r[i].1);
        }
        println!();
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), FinextractError> {
    let app = load_app_config(config_path)?;

    println!("Data source:   {}", app.data.source.name());
    println!("Period:        {} to {}", app.data.start_date, app.data.end_date);
    match &app.portfolio {
        Some(p) => {
            let described: Vec<String> = p
                .weights
                .iter()
                .map(|(t, w)| format!("{t}:{w}"))
                .collect();
            println!("Portfolio:     {}", described.join(", "));
        }
        None => println!("Portfolio:     (none)"),
    }
    println!(
        "Simulation:    {} paths x {} periods",
        app.simulation.engine.num_simulations, app.simulation.engine.time_horizon
    );
    println!("\nConfiguration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cli_parses_analyze_flags() {
        let cli = Cli::parse_from([
            "finextract",
            "analyze",
            "--ticker",
            "aapl",
            "--source",
            "synthetic",
            "--start",
            "2024-01-01",
            "--end",
            "2024-06-30",
        ]);
        match cli.command {
            Command::Analyze {
                ticker, start, end, ..
            } => {
                assert_eq!(ticker, "aapl");
                assert_eq!(start, Some(date(2024, 1, 1)));
                assert_eq!(end, Some(date(2024, 6, 30)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn analyze_flags_without_config() {
        let (data, analysis) = resolve_analyze_settings(
            None,
            None,
            Some("synthetic"),
            Some(date(2024, 1, 1)),
            Some(date(2024, 6, 30)),
        )
        .unwrap();
        assert_eq!(data.source, DataSourceKind::Synthetic);
        assert_eq!(analysis, MetricsSettings::default());
    }

    #[test]
    fn csv_dir_flag_selects_csv() {
        let (data, _) = resolve_analyze_settings(
            None,
            Some(Path::new("/data")),
            None,
            Some(date(2024, 1, 1)),
            Some(date(2024, 6, 30)),
        )
        .unwrap();
        assert_eq!(data.source, DataSourceKind::Csv);
        assert_eq!(data.csv_dir.as_deref(), Some("/data"));
    }

    #[test]
    fn analyze_requires_dates_without_config() {
        let err = resolve_analyze_settings(None, None, Some("synthetic"), None, None).unwrap_err();
        assert!(matches!(err, FinextractError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn analyze_rejects_unknown_source() {
        let err = resolve_analyze_settings(
            None,
            None,
            Some("bloomberg"),
            Some(date(2024, 1, 1)),
            Some(date(2024, 6, 30)),
        )
        .unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn analyze_rejects_inverted_range() {
        let err = resolve_analyze_settings(
            None,
            None,
            Some("synthetic"),
            Some(date(2024, 6, 30)),
            Some(date(2024, 1, 1)),
        )
        .unwrap_err();
        assert!(matches!(err, FinextractError::ConfigInvalid { .. }));
    }
}
