//! SVG fan chart of simulated value paths.

use crate::domain::montecarlo::SimulationResult;

const CHART_WIDTH: f64 = 720.0;
const CHART_HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;

/// Sample paths drawn behind the bands.
pub const MAX_SAMPLE_PATHS: usize = 100;

struct Frame {
    min: f64,
    range: f64,
    steps: usize,
}

impl Frame {
    fn x(&self, t: usize) -> f64 {
        let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        MARGIN_LEFT + (t as f64 / self.steps.max(1) as f64) * plot_width
    }

    fn y(&self, v: f64) -> f64 {
        let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        MARGIN_TOP + plot_height - ((v - self.min) / self.range) * plot_height
    }

    fn path_data(&self, values: &[f64]) -> String {
        let mut d = String::new();
        for (t, v) in values.iter().enumerate() {
            let cmd = if t == 0 { "M" } else { " L" };
            d.push_str(&format!("{} {:.1} {:.1}", cmd, self.x(t), self.y(*v)));
        }
        d
    }
}

fn fmt_value(v: f64) -> String {
    format!("${:.2}", v)
}

/// Sample paths, the 5th/95th percentile bands, and the mean trajectory.
pub fn render_fan_chart(result: &SimulationResult) -> String {
    let low = result.percentile_path(0.05);
    let high = result.percentile_path(0.95);
    let mean = result.mean_path();
    let stride = (result.num_simulations / MAX_SAMPLE_PATHS).max(1);
    let samples: Vec<&[f64]> = result.paths().step_by(stride).take(MAX_SAMPLE_PATHS).collect();

    let (min, max) = samples
        .iter()
        .flat_map(|p| p.iter())
        .chain(low.iter())
        .chain(high.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let frame = Frame {
        min,
        range: (max - min).max(f64::EPSILON),
        steps: result.time_horizon,
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"18\" text-anchor=\"middle\" font-size=\"13\" fill=\"#333\">Monte Carlo simulation ({} paths)</text>\n",
        CHART_WIDTH / 2.0,
        result.num_simulations
    ));
    svg.push_str(&format!(
        "  <line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n  <line x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        l = MARGIN_LEFT,
        t = MARGIN_TOP,
        b = CHART_HEIGHT - MARGIN_BOTTOM,
        r = CHART_WIDTH - MARGIN_RIGHT
    ));
    for (v, y) in [(max, MARGIN_TOP + 5.0), (min, CHART_HEIGHT - MARGIN_BOTTOM - 5.0)] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            fmt_value(v)
        ));
    }
    for t in [0, result.time_horizon / 2, result.time_horizon] {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            frame.x(t),
            CHART_HEIGHT - 10.0,
            t
        ));
    }

    svg.push_str("  <g fill=\"none\" stroke=\"#87ceeb\" stroke-width=\"0.5\" stroke-opacity=\"0.3\">\n");
    for path in &samples {
        svg.push_str(&format!("    <path d=\"{}\"/>\n", frame.path_data(path)));
    }
    svg.push_str("  </g>\n");

    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"#dc2626\" stroke-width=\"2\" stroke-dasharray=\"6 4\"/>\n",
        frame.path_data(&low)
    ));
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"#16a34a\" stroke-width=\"2\" stroke-dasharray=\"6 4\"/>\n",
        frame.path_data(&high)
    ));
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"#1e3a8a\" stroke-width=\"2.5\"/>\n",
        frame.path_data(&mean)
    ));

    let legend = [
        ("#dc2626", "5th percentile"),
        ("#16a34a", "95th percentile"),
        ("#1e3a8a", "Mean trajectory"),
    ];
    for (i, (color, label)) in legend.iter().enumerate() {
        let y = MARGIN_TOP + 10.0 + i as f64 * 14.0;
        svg.push_str(&format!(
            "  <line x1=\"{x}\" y1=\"{y}\" x2=\"{x2}\" y2=\"{y}\" stroke=\"{color}\" stroke-width=\"2\"/>\n  <text x=\"{tx}\" y=\"{ty}\" font-size=\"10\" fill=\"#333\">{label}</text>\n",
            x = MARGIN_LEFT + 10.0,
            x2 = MARGIN_LEFT + 30.0,
            tx = MARGIN_LEFT + 35.0,
            ty = y + 3.0,
        ));
    }

    svg.push_str("</svg>\n");
    svg
}
