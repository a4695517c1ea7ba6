//! Monte Carlo projection of value paths under Geometric Brownian Motion.
//!
//! Lifecycle: a [`SimulationConfig`] is validated into a
//! [`MonteCarloEngine`] (configured); [`MonteCarloEngine::run`] generates
//! the paths (running) and returns an owned [`SimulationResult`]
//! (completed). Nothing is shared between runs.
//!
//! Each step applies
//! `S[t] = S[t-1] * exp((mu - sigma^2 / 2) * dt + sigma * sqrt(dt) * Z)`
//! with `dt = 1 / periods_per_year`. Paths are filled in batches of rows on
//! the rayon pool; every path draws from its own seeded stream.
//!
//! Memory: the path matrix holds `num_simulations * (time_horizon + 1)`
//! `f64`s and is checked against `max_matrix_cells` before allocation.

pub mod cancel;
pub mod variates;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::FinextractError;
use super::metrics::{self, lower_tail_sorted, percentile_sorted, validate_confidence};
use super::portfolio::Portfolio;
use super::returns::mean;

pub use cancel::CancellationToken;
pub use variates::{path_seed, NormalStream, SeededNormals, VariateSource, ZeroShocks};

pub const DEFAULT_NUM_SIMULATIONS: usize = 1000;
pub const DEFAULT_TIME_HORIZON: usize = 252;
pub const DEFAULT_BATCH_SIZE: usize = 256;
/// 400 MB of `f64`.
pub const DEFAULT_MAX_MATRIX_CELLS: usize = 50_000_000;

/// Annualized GBM inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbmParams {
    pub drift: f64,
    pub volatility: f64,
    pub periods_per_year: f64,
}

impl GbmParams {
    pub fn validate(&self) -> Result<(), FinextractError> {
        if !self.drift.is_finite() {
            return Err(FinextractError::invalid_parameter("drift", "must be finite"));
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0) {
            return Err(FinextractError::invalid_parameter(
                "volatility",
                "must be finite and non-negative",
            ));
        }
        metrics::validate_periods_per_year(self.periods_per_year)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub num_simulations: usize,
    pub time_horizon: usize,
    pub initial_value: f64,
    pub confidence_level: f64,
    /// `None` draws a fresh base seed; the seed used is reported in the result.
    pub seed: Option<u64>,
    /// Paths per batch; cancellation is checked between batches.
    pub batch_size: usize,
    pub max_matrix_cells: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_simulations: DEFAULT_NUM_SIMULATIONS,
            time_horizon: DEFAULT_TIME_HORIZON,
            initial_value: 1.0,
            confidence_level: metrics::DEFAULT_CONFIDENCE_LEVEL,
            seed: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_matrix_cells: DEFAULT_MAX_MATRIX_CELLS,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), FinextractError> {
        if self.num_simulations < 1 {
            return Err(FinextractError::invalid_parameter(
                "num_simulations",
                "must be at least 1",
            ));
        }
        if self.time_horizon < 1 {
            return Err(FinextractError::invalid_parameter(
                "time_horizon",
                "must be at least 1",
            ));
        }
        validate_confidence(self.confidence_level)?;
        if !(self.initial_value.is_finite() && self.initial_value > 0.0) {
            return Err(FinextractError::invalid_parameter(
                "initial_value",
                "must be positive",
            ));
        }
        if self.batch_size < 1 {
            return Err(FinextractError::invalid_parameter(
                "batch_size",
                "must be at least 1",
            ));
        }
        let cells = self.matrix_cells().unwrap_or(usize::MAX);
        if cells > self.max_matrix_cells {
            return Err(FinextractError::ResourceLimit {
                requested: cells,
                limit: self.max_matrix_cells,
            });
        }
        Ok(())
    }

    /// Cells in the path matrix, `None` on overflow.
    pub fn matrix_cells(&self) -> Option<usize> {
        self.num_simulations
            .checked_mul(self.time_horizon.checked_add(1)?)
    }
}

pub struct MonteCarloEngine {
    config: SimulationConfig,
    cancel: Option<CancellationToken>,
}

impl MonteCarloEngine {
    pub fn new(config: SimulationConfig) -> Result<Self, FinextractError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate with [`SeededNormals`] from the configured seed, or a fresh
    /// one when none is set.
    pub fn run(&self, params: &GbmParams) -> Result<SimulationResult, FinextractError> {
        let source = match self.config.seed {
            Some(seed) => SeededNormals::new(seed),
            None => SeededNormals::from_entropy(),
        };
        let mut result = self.run_with_source(params, &source)?;
        result.seed = Some(source.base_seed());
        Ok(result)
    }

    pub fn run_with_source<S: VariateSource>(
        &self,
        params: &GbmParams,
        source: &S,
    ) -> Result<SimulationResult, FinextractError> {
        params.validate()?;
        let cfg = &self.config;
        let width = cfg.time_horizon + 1;

        info!(
            paths = cfg.num_simulations,
            steps = cfg.time_horizon,
            drift = params.drift,
            volatility = params.volatility,
            "starting simulation"
        );

        let dt = 1.0 / params.periods_per_year;
        let step = PathStep {
            drift: (params.drift - 0.5 * params.volatility * params.volatility) * dt,
            diffusion: params.volatility * dt.sqrt(),
        };

        let mut matrix = vec![0.0_f64; cfg.num_simulations * width];
        let mut completed = 0usize;

        for (batch, block) in matrix.chunks_mut(cfg.batch_size * width).enumerate() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                warn!(completed, "simulation cancelled");
                return Err(FinextractError::Cancelled {
                    completed_paths: completed,
                });
            }
            let first_path = batch * cfg.batch_size;
            block
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(offset, row)| {
                    let mut stream = source.stream(first_path + offset);
                    step.fill(row, cfg.initial_value, &mut stream);
                });
            completed += block.len() / width;
        }

        let result = SimulationResult::from_matrix(cfg, matrix);
        debug!(
            mean_final = result.mean_final_value,
            p5 = result.percentile_5,
            p95 = result.percentile_95,
            "simulation complete"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
struct PathStep {
    drift: f64,
    diffusion: f64,
}

impl PathStep {
    #[inline]
    fn fill(&self, row: &mut [f64], initial_value: f64, stream: &mut impl NormalStream) {
        row[0] = initial_value;
        for t in 1..row.len() {
            let z = stream.next_normal();
            row[t] = row[t - 1] * (self.drift + self.diffusion * z).exp();
        }
    }
}

/// Simulated paths plus terminal-value statistics. Losses are dollar
/// amounts relative to `initial_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub initial_value: f64,
    pub num_simulations: usize,
    pub time_horizon: usize,
    pub confidence_level: f64,
    /// Base seed that reproduces this run. Only [`MonteCarloEngine::run`]
    /// knows it; a caller-supplied source leaves it `None`.
    pub seed: Option<u64>,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub mean_final_value: f64,
    /// Terminal value at the `(1 - confidence)` percentile.
    pub var_threshold: f64,
    pub var_loss: f64,
    pub cvar_loss: f64,
    /// Set when no terminal value fell at or below the threshold.
    pub cvar_is_fallback: bool,
    matrix: Vec<f64>,
}

impl SimulationResult {
    fn from_matrix(cfg: &SimulationConfig, matrix: Vec<f64>) -> Self {
        let width = cfg.time_horizon + 1;
        let mut terminal: Vec<f64> = matrix.chunks(width).map(|row| row[width - 1]).collect();
        terminal.sort_by(|a, b| a.total_cmp(b));

        let tail = lower_tail_sorted(&terminal, cfg.confidence_level);

        SimulationResult {
            initial_value: cfg.initial_value,
            num_simulations: cfg.num_simulations,
            time_horizon: cfg.time_horizon,
            confidence_level: cfg.confidence_level,
            seed: None,
            percentile_5: percentile_sorted(&terminal, 0.05),
            percentile_95: percentile_sorted(&terminal, 0.95),
            mean_final_value: mean(&terminal),
            var_threshold: tail.threshold,
            var_loss: cfg.initial_value - tail.threshold,
            cvar_loss: cfg.initial_value - tail.expected_shortfall(),
            cvar_is_fallback: tail.tail_mean.is_none(),
            matrix,
        }
    }

    fn width(&self) -> usize {
        self.time_horizon + 1
    }

    /// Row-major `num_simulations x (time_horizon + 1)` matrix.
    pub fn matrix(&self) -> &[f64] {
        &self.matrix
    }

    pub fn path(&self, index: usize) -> Option<&[f64]> {
        let width = self.width();
        self.matrix.get(index * width..(index + 1) * width)
    }

    pub fn paths(&self) -> impl Iterator<Item = &[f64]> {
        self.matrix.chunks(self.width())
    }

    pub fn terminal_values(&self) -> Vec<f64> {
        self.paths().map(|p| p[p.len() - 1]).collect()
    }

    pub fn mean_path(&self) -> Vec<f64> {
        let n = self.num_simulations as f64;
        let mut acc = vec![0.0; self.width()];
        for path in self.paths() {
            for (a, v) in acc.iter_mut().zip(path) {
                *a += v;
            }
        }
        acc.iter().map(|v| v / n).collect()
    }

    /// Per-step percentile band, `q` in `[0, 1]`.
    pub fn percentile_path(&self, q: f64) -> Vec<f64> {
        let width = self.width();
        let mut column = Vec::with_capacity(self.num_simulations);
        (0..width)
            .map(|t| {
                column.clear();
                column.extend(self.paths().map(|p| p[t]));
                column.sort_by(|a, b| a.total_cmp(b));
                percentile_sorted(&column, q)
            })
            .collect()
    }

    pub fn matrix_bytes(&self) -> usize {
        self.matrix.len() * std::mem::size_of::<f64>()
    }
}

/// Simulate every constituent on its own, starting from its last close.
/// With a configured seed, each asset gets an independent base seed.
pub fn simulate_components(
    portfolio: &Portfolio<'_>,
    config: &SimulationConfig,
) -> Result<Vec<(String, SimulationResult)>, FinextractError> {
    portfolio
        .components()
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let cfg = SimulationConfig {
                initial_value: asset.last_close(),
                seed: config.seed.map(|s| path_seed(s, i)),
                ..config.clone()
            };
            let result = MonteCarloEngine::new(cfg)?.run(&asset.gbm_params())?;
            Ok((asset.ticker().to_string(), result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(drift: f64, volatility: f64) -> GbmParams {
        GbmParams {
            drift,
            volatility,
            periods_per_year: 252.0,
        }
    }

    fn config(n: usize, horizon: usize) -> SimulationConfig {
        SimulationConfig {
            num_simulations: n,
            time_horizon: horizon,
            initial_value: 100.0,
            seed: Some(42),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn matrix_shape_and_start_value() {
        let engine = MonteCarloEngine::new(config(50, 20)).unwrap();
        let result = engine.run(&params(0.08, 0.2)).unwrap();
        assert_eq!(result.matrix().len(), 50 * 21);
        assert_eq!(result.paths().count(), 50);
        assert!(result.paths().all(|p| p[0] == 100.0));
        assert_eq!(result.path(49).unwrap().len(), 21);
        assert!(result.path(50).is_none());
        assert_eq!(result.matrix_bytes(), 50 * 21 * 8);
    }

    #[test]
    fn zero_volatility_is_deterministic_drift() {
        let mu = 0.1;
        let engine = MonteCarloEngine::new(config(10, 252)).unwrap();
        let result = engine.run(&params(mu, 0.0)).unwrap();
        for path in result.paths() {
            for (t, v) in path.iter().enumerate() {
                let expected = 100.0 * (mu * t as f64 / 252.0).exp();
                assert_relative_eq!(*v, expected, max_relative = 1e-10);
            }
        }
        assert_relative_eq!(result.percentile_5, result.percentile_95, max_relative = 1e-12);
        assert_relative_eq!(result.var_loss, 100.0 - 100.0 * mu.exp(), max_relative = 1e-9);
    }

    #[test]
    fn zero_shocks_match_zero_volatility_drift() {
        let engine = MonteCarloEngine::new(config(4, 10)).unwrap();
        let p = params(0.05, 0.3);
        let result = engine.run_with_source(&p, &ZeroShocks).unwrap();
        let per_step = ((0.05 - 0.5 * 0.09) / 252.0_f64).exp();
        let path = result.path(0).unwrap();
        assert_relative_eq!(path[10], 100.0 * per_step.powi(10), max_relative = 1e-12);
    }

    #[test]
    fn custom_source_reports_no_seed() {
        let engine = MonteCarloEngine::new(config(4, 10)).unwrap();
        let p = params(0.05, 0.3);
        assert_eq!(engine.run_with_source(&p, &ZeroShocks).unwrap().seed, None);
        assert_eq!(
            engine.run_with_source(&p, &SeededNormals::new(7)).unwrap().seed,
            None
        );
        assert_eq!(engine.run(&p).unwrap().seed, Some(42));
    }

    #[test]
    fn fixed_seed_is_bit_identical() {
        let engine = MonteCarloEngine::new(config(300, 30)).unwrap();
        let a = engine.run(&params(0.07, 0.25)).unwrap();
        let b = engine.run(&params(0.07, 0.25)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed, Some(42));
    }

    #[test]
    fn batch_size_does_not_change_paths() {
        let mut small = config(100, 15);
        small.batch_size = 7;
        let mut large = config(100, 15);
        large.batch_size = 1000;
        let p = params(0.05, 0.2);
        let a = MonteCarloEngine::new(small).unwrap().run(&p).unwrap();
        let b = MonteCarloEngine::new(large).unwrap().run(&p).unwrap();
        assert_eq!(a.matrix(), b.matrix());
    }

    #[test]
    fn unseeded_run_reports_replayable_seed() {
        let mut cfg = config(20, 5);
        cfg.seed = None;
        let first = MonteCarloEngine::new(cfg.clone()).unwrap().run(&params(0.05, 0.2)).unwrap();
        let seed = first.seed.unwrap();

        cfg.seed = Some(seed);
        let replay = MonteCarloEngine::new(cfg).unwrap().run(&params(0.05, 0.2)).unwrap();
        assert_eq!(first.matrix(), replay.matrix());
    }

    #[test]
    fn terminal_statistics_are_consistent() {
        let engine = MonteCarloEngine::new(config(2000, 252)).unwrap();
        let result = engine.run(&params(0.08, 0.2)).unwrap();
        assert!(result.percentile_5 < result.mean_final_value);
        assert!(result.mean_final_value < result.percentile_95);
        assert!(result.cvar_loss >= result.var_loss);
        assert!(!result.cvar_is_fallback);
        assert_relative_eq!(result.var_loss, 100.0 - result.var_threshold);

        // E[S_T] = S_0 * exp(mu * T) for GBM.
        let expected_mean = 100.0 * 0.08_f64.exp();
        assert_relative_eq!(result.mean_final_value, expected_mean, max_relative = 0.03);
    }

    #[test]
    fn percentile_bands_bracket_mean_path() {
        let engine = MonteCarloEngine::new(config(500, 40)).unwrap();
        let result = engine.run(&params(0.05, 0.3)).unwrap();
        let low = result.percentile_path(0.05);
        let high = result.percentile_path(0.95);
        let mean = result.mean_path();
        assert_eq!(low.len(), 41);
        assert_relative_eq!(low[0], 100.0);
        for t in 1..41 {
            assert!(low[t] <= mean[t] && mean[t] <= high[t]);
        }
        assert_relative_eq!(low[40], result.percentile_5, max_relative = 1e-12);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut cfg = config(0, 10);
        assert!(matches!(
            MonteCarloEngine::new(cfg.clone()),
            Err(FinextractError::InvalidParameter { name: "num_simulations", .. })
        ));
        cfg.num_simulations = 10;
        cfg.time_horizon = 0;
        assert!(matches!(
            MonteCarloEngine::new(cfg.clone()),
            Err(FinextractError::InvalidParameter { name: "time_horizon", .. })
        ));
        cfg.time_horizon = 10;
        for c in [0.0, 1.0, 1.2] {
            cfg.confidence_level = c;
            assert!(matches!(
                MonteCarloEngine::new(cfg.clone()),
                Err(FinextractError::InvalidParameter { name: "confidence_level", .. })
            ));
        }
    }

    #[test]
    fn oversized_matrix_fails_before_allocation() {
        let mut cfg = config(10_000, 252);
        cfg.max_matrix_cells = 1_000_000;
        assert_eq!(
            MonteCarloEngine::new(cfg).err(),
            Some(FinextractError::ResourceLimit {
                requested: 10_000 * 253,
                limit: 1_000_000
            })
        );

        let cfg = config(usize::MAX, usize::MAX);
        assert!(matches!(
            MonteCarloEngine::new(cfg),
            Err(FinextractError::ResourceLimit { .. })
        ));
    }

    #[test]
    fn negative_volatility_is_rejected() {
        let engine = MonteCarloEngine::new(config(5, 5)).unwrap();
        assert!(engine.run(&params(0.05, -0.1)).is_err());
    }

    /// Zero shocks that trip `token` once `path` is drawn.
    struct CancelAtPath {
        path: usize,
        token: CancellationToken,
    }

    impl VariateSource for CancelAtPath {
        type Stream = ZeroShocks;

        fn stream(&self, path_index: usize) -> ZeroShocks {
            if path_index == self.path {
                self.token.cancel();
            }
            ZeroShocks
        }
    }

    #[test]
    fn cancellation_mid_run_stops_at_next_batch() {
        let token = CancellationToken::new();
        let mut cfg = config(12, 5);
        cfg.batch_size = 4;
        let engine = MonteCarloEngine::new(cfg)
            .unwrap()
            .with_cancellation(token.clone());
        let source = CancelAtPath { path: 3, token };

        assert_eq!(
            engine.run_with_source(&params(0.05, 0.2), &source).err(),
            Some(FinextractError::Cancelled { completed_paths: 4 })
        );
    }

    #[test]
    fn cancelled_token_stops_before_first_batch() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = MonteCarloEngine::new(config(100, 10))
            .unwrap()
            .with_cancellation(token);
        assert_eq!(
            engine.run(&params(0.05, 0.2)).err(),
            Some(FinextractError::Cancelled { completed_paths: 0 })
        );
    }
}
