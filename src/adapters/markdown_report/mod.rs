//! Markdown portfolio report.
//!
//! Reads a template (the built-in default or a custom file), resolves the
//! `{{PLACEHOLDER}}` markers from `tables` and `chart_svg`, and writes the
//! result. When a chart path is set the fan chart is written next to the
//! report and linked from it.

pub mod chart_svg;
pub mod tables;

use std::fs;
use std::path::Path;

use crate::domain::error::FinextractError;
use crate::ports::report_port::{ReportContext, ReportPort};

pub const DEFAULT_TEMPLATE: &str = "# Portfolio Analysis Report

**Period:** {{PERIOD}} | **Data source:** {{SOURCE}}

---

## Executive Summary

{{EXECUTIVE_SUMMARY}}
## Key Metrics

{{KEY_METRICS}}
## Asset Analysis

{{ASSET_TABLE}}
## Warnings and Considerations

{{WARNINGS}}
## Conclusion

### Monte Carlo Simulation Results

{{CONCLUSION}}
{{CHART}}";

/// Resolve every placeholder in `template`. `chart_link` is the relative
/// path the report should reference, if a chart was written.
pub fn resolve(template: &str, ctx: &ReportContext<'_>, chart_link: Option<&str>) -> String {
    let chart = chart_link
        .map(|link| format!("![Monte Carlo fan chart]({})\n", link))
        .unwrap_or_default();

    template
        .replace(
            "{{PERIOD}}",
            &format!("{} to {}", ctx.start_date, ctx.end_date),
        )
        .replace("{{SOURCE}}", ctx.source)
        .replace(
            "{{EXECUTIVE_SUMMARY}}",
            &tables::render_executive_summary(ctx.portfolio),
        )
        .replace("{{KEY_METRICS}}", &tables::render_key_metrics(ctx.simulation))
        .replace("{{ASSET_TABLE}}", &tables::render_asset_table(ctx.portfolio))
        .replace(
            "{{WARNINGS}}",
            &tables::render_warnings(ctx.portfolio, ctx.skipped, ctx.data_warnings),
        )
        .replace(
            "{{CONCLUSION}}",
            &tables::render_conclusion(ctx.portfolio, ctx.simulation),
        )
        .replace("{{CHART}}", &chart)
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownReportAdapter {
    template_path: Option<String>,
    chart_path: Option<String>,
}

impl MarkdownReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, path: impl Into<String>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn with_chart(mut self, path: impl Into<String>) -> Self {
        self.chart_path = Some(path.into());
        self
    }

    fn load_template(&self) -> Result<String, FinextractError> {
        match &self.template_path {
            Some(path) => Ok(fs::read_to_string(path)?),
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }
}

fn write_creating_parents(path: &Path, contents: &str) -> Result<(), FinextractError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

impl ReportPort for MarkdownReportAdapter {
    fn write(&self, ctx: &ReportContext<'_>, output_path: &str) -> Result<(), FinextractError> {
        let template = self.load_template()?;

        let chart_link = match &self.chart_path {
            Some(chart_path) => {
                let chart = Path::new(chart_path);
                write_creating_parents(chart, &chart_svg::render_fan_chart(ctx.simulation))?;
                tracing::info!(path = %chart.display(), "wrote fan chart");
                Some(
                    chart
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| chart_path.clone()),
                )
            }
            None => None,
        };

        let report = resolve(&template, ctx, chart_link.as_deref());
        write_creating_parents(Path::new(output_path), &report)?;
        tracing::info!(path = output_path, "wrote report");
        Ok(())
    }
}
