//! Markdown sections for the portfolio report.

use crate::domain::montecarlo::SimulationResult;
use crate::domain::portfolio::Portfolio;
use crate::domain::preprocess::PreprocessWarning;
use crate::domain::universe::{SkipReason, SkippedTicker};

fn fmt_pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn fmt_currency(v: f64) -> String {
    format!("${:.2}", v)
}

fn fmt_ratio(v: Option<f64>) -> String {
    v.map(|r| format!("{:.4}", r))
        .unwrap_or_else(|| "undefined".to_string())
}

pub fn render_executive_summary(portfolio: &Portfolio<'_>) -> String {
    let rf = portfolio.settings().risk_free_rate;
    let volatility = portfolio
        .annualized_volatility()
        .map(fmt_pct)
        .unwrap_or_else(|e| format!("unavailable ({})", e));
    let sharpe = fmt_ratio(portfolio.sharpe_ratio(rf).ok());

    let mut out = String::new();
    out.push_str(&format!(
        "- **Annualized Return:** {}\n",
        fmt_pct(portfolio.annualized_return())
    ));
    out.push_str(&format!("- **Annualized Volatility:** {}\n", volatility));
    out.push_str(&format!(
        "- **Number of Assets:** {}\n",
        portfolio.components().len()
    ));
    out.push_str(&format!("- **Portfolio Sharpe Ratio:** {}\n", sharpe));
    out
}

pub fn render_key_metrics(result: &SimulationResult) -> String {
    let confidence = result.confidence_level * 100.0;
    let mut out = String::new();
    out.push_str(&format!(
        "- **Initial Value:** {}\n",
        fmt_currency(result.initial_value)
    ));
    out.push_str(&format!(
        "- **Value at Risk ({:.0}%):** {}\n",
        confidence,
        fmt_currency(result.var_threshold)
    ));
    out.push_str(&format!(
        "- **Potential Loss (VaR):** {}\n",
        fmt_currency(result.var_loss)
    ));
    let cvar_note = if result.cvar_is_fallback {
        " (tail empty, equals VaR)"
    } else {
        ""
    };
    out.push_str(&format!(
        "- **Expected Shortfall (CVaR):** {}{}\n",
        fmt_currency(result.cvar_loss),
        cvar_note
    ));
    out.push_str(&format!(
        "- **Expected Value ({} periods):** {}\n",
        result.time_horizon,
        fmt_currency(result.mean_final_value)
    ));
    out
}

pub fn render_asset_table(portfolio: &Portfolio<'_>) -> String {
    let mut out = String::new();
    out.push_str("| Ticker | Weight | Annual Return | Volatility | Sharpe Ratio | CAGR | Max Drawdown |\n");
    out.push_str("|--------|--------|---------------|------------|--------------|------|--------------|\n");
    for (asset, (_, weight)) in portfolio.components().iter().zip(portfolio.weights()) {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            asset.ticker(),
            fmt_pct(weight),
            fmt_pct(asset.annualized_return()),
            fmt_pct(asset.annualized_volatility()),
            fmt_ratio(asset.sharpe_ratio()),
            fmt_pct(asset.cagr()),
            fmt_pct(asset.max_drawdown()),
        ));
    }
    out
}

pub fn render_warnings(
    portfolio: &Portfolio<'_>,
    skipped: &[SkippedTicker],
    data_warnings: &[(String, PreprocessWarning)],
) -> String {
    let mut lines: Vec<String> = portfolio
        .warnings()
        .iter()
        .map(|w| format!("- {}", w))
        .collect();
    lines.extend(
        data_warnings
            .iter()
            .map(|(ticker, w)| format!("- {}: {}", ticker, w)),
    );
    lines.extend(skipped.iter().map(|s| {
        let reason = match &s.reason {
            SkipReason::NoData => "no data in range".to_string(),
            SkipReason::Fetch(e) | SkipReason::Invalid(e) => e.clone(),
        };
        format!("- {}: excluded ({})", s.ticker, reason)
    }));

    if lines.is_empty() {
        "No significant warnings detected.\n".to_string()
    } else {
        lines.join("\n") + "\n"
    }
}

pub fn render_conclusion(portfolio: &Portfolio<'_>, result: &SimulationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Based on {} simulations over {} periods:\n\n",
        result.num_simulations, result.time_horizon
    ));
    out.push_str(&format!(
        "- **Optimistic scenario (95th percentile):** {}\n",
        fmt_currency(result.percentile_95)
    ));
    out.push_str(&format!(
        "- **Expected scenario (mean):** {}\n",
        fmt_currency(result.mean_final_value)
    ));
    out.push_str(&format!(
        "- **Pessimistic scenario (5th percentile):** {}\n\n",
        fmt_currency(result.percentile_5)
    ));

    let sharpe = portfolio.sharpe_ratio(portfolio.settings().risk_free_rate).ok();
    match sharpe {
        Some(s) if s > 1.0 => out.push_str(
            "The portfolio shows a favourable Sharpe ratio (> 1.0): risk is well compensated.\n",
        ),
        Some(_) => out.push_str(
            "The Sharpe ratio is below 1.0; consider reviewing the portfolio composition.\n",
        ),
        None => out.push_str("The Sharpe ratio is undefined for this portfolio.\n"),
    }
    out
}
