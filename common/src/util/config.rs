use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global_placement: GlobalPlacementConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_placement: GlobalPlacementConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

/// Tuning knobs for the analytical global placer. The numeric defaults are
/// empirically calibrated; treat them as a starting point, not a derivation.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalPlacementConfig {
    /// Density bins per region edge.
    #[serde(default = "default_bins_per_edge")]
    pub bins_per_edge: usize,
    /// Wirelength smoothing gamma as a fraction of the largest region extent.
    #[serde(default = "default_gamma_scale")]
    pub gamma_scale: f64,
    /// Target bin occupancy as a multiple of raw utilization.
    #[serde(default = "default_density_multiplier")]
    pub density_multiplier: f64,
    /// Damping applied to the initial wirelength/density gradient-norm ratio.
    #[serde(default = "default_lambda_damping")]
    pub lambda_damping: f64,
    /// Multiplicative penalty growth per iteration while still overflowing.
    #[serde(default = "default_lambda_growth")]
    pub lambda_growth: f64,
    /// Overflow level below which the penalty weight stops growing.
    #[serde(default = "default_lambda_freeze_overflow")]
    pub lambda_freeze_overflow: f64,
    /// Optimizer step size as a fraction of the bin width.
    #[serde(default = "default_step_size_factor")]
    pub step_size_factor: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Overflow ratio at or below which the layout counts as spread enough.
    #[serde(default = "default_overflow_threshold")]
    pub overflow_threshold: f64,
    /// Iterations between overflow samples for plateau detection.
    #[serde(default = "default_stagnation_window")]
    pub stagnation_window: usize,
    /// Minimum overflow improvement per window to keep iterating.
    #[serde(default = "default_stagnation_tolerance")]
    pub stagnation_tolerance: f64,
    /// Initial-placement jitter as a fraction of the region extent.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_log_every")]
    pub log_every: usize,
}

impl Default for GlobalPlacementConfig {
    fn default() -> Self {
        Self {
            bins_per_edge: default_bins_per_edge(),
            gamma_scale: default_gamma_scale(),
            density_multiplier: default_density_multiplier(),
            lambda_damping: default_lambda_damping(),
            lambda_growth: default_lambda_growth(),
            lambda_freeze_overflow: default_lambda_freeze_overflow(),
            step_size_factor: default_step_size_factor(),
            max_iterations: default_max_iterations(),
            overflow_threshold: default_overflow_threshold(),
            stagnation_window: default_stagnation_window(),
            stagnation_tolerance: default_stagnation_tolerance(),
            jitter_fraction: default_jitter_fraction(),
            seed: default_seed(),
            log_every: default_log_every(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_bench_modules")]
    pub modules: usize,
    #[serde(default = "default_bench_nets")]
    pub nets: usize,
    #[serde(default = "default_bench_utilization")]
    pub utilization: f64,
    #[serde(default = "default_bench_max_net_degree")]
    pub max_net_degree: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            modules: default_bench_modules(),
            nets: default_bench_nets(),
            utilization: default_bench_utilization(),
            max_net_degree: default_bench_max_net_degree(),
            seed: default_seed(),
        }
    }
}

fn default_bins_per_edge() -> usize {
    16
}

fn default_gamma_scale() -> f64 {
    0.01
}

fn default_density_multiplier() -> f64 {
    2.0
}

fn default_lambda_damping() -> f64 {
    0.85
}

fn default_lambda_growth() -> f64 {
    1.1
}

fn default_lambda_freeze_overflow() -> f64 {
    0.15
}

fn default_step_size_factor() -> f64 {
    0.1
}

fn default_max_iterations() -> usize {
    2500
}

fn default_overflow_threshold() -> f64 {
    0.05
}

fn default_stagnation_window() -> usize {
    50
}

fn default_stagnation_tolerance() -> f64 {
    1e-4
}

fn default_jitter_fraction() -> f64 {
    0.05
}

fn default_seed() -> u64 {
    42
}

fn default_log_every() -> usize {
    100
}

fn default_bench_modules() -> usize {
    500
}

fn default_bench_nets() -> usize {
    600
}

fn default_bench_utilization() -> f64 {
    0.30
}

fn default_bench_max_net_degree() -> usize {
    5
}
