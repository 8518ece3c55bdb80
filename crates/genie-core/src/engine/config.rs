use crate::core::rbs::params::RbsParams;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INITIAL_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_COOLING_RATE: f64 = 0.001;
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;
pub const DEFAULT_MAX_CONSECUTIVE_ORACLE_FAILURES: usize = 3;
pub const DEFAULT_ORACLE_BACKOFF: Duration = Duration::from_millis(50);
pub const DEFAULT_CDS_MUTATION_SCALE: f64 = 5.0;
pub const DEFAULT_DOWNSTREAM_INSULATOR_LENGTH: usize = 30;
pub const DEFAULT_INITIAL_RBS_LENGTH: usize = 20;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    /// Fraction by which the temperature drops after every iteration.
    pub cooling_rate: f64,
    pub max_iterations: usize,
    /// Stop as soon as the committed energy is at or below this value.
    pub energy_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub rate_error: f64,
    pub invalid: f64,
    pub rogue: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            rate_error: 1.0,
            invalid: 1.0,
            rogue: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleRetryConfig {
    pub max_consecutive_failures: usize,
    /// Pause after the n-th consecutive failure is `n * backoff`.
    pub backoff: Duration,
}

impl Default for OracleRetryConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_ORACLE_FAILURES,
            backoff: DEFAULT_ORACLE_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignConfig {
    pub annealing: AnnealingConfig,
    pub weights: ScoringWeights,
    pub oracle_retry: OracleRetryConfig,
    pub rbs_params: RbsParams,
    /// Attempt bound of every rejection-sampling generator.
    pub max_attempts: usize,
    /// Expected number of codon changes per CDS per iteration.
    pub cds_mutation_scale: f64,
    pub downstream_insulator_length: usize,
    /// Length of a generated RBS; capped by `rbs_params.max_rbs_length`.
    pub initial_rbs_length: usize,
    pub seed: Option<u64>,
}

#[derive(Default)]
pub struct DesignConfigBuilder {
    initial_temperature: Option<f64>,
    cooling_rate: Option<f64>,
    max_iterations: Option<usize>,
    energy_threshold: Option<f64>,
    weights: Option<ScoringWeights>,
    oracle_retry: Option<OracleRetryConfig>,
    rbs_params: Option<RbsParams>,
    max_attempts: Option<usize>,
    cds_mutation_scale: Option<f64>,
    downstream_insulator_length: Option<usize>,
    initial_rbs_length: Option<usize>,
    seed: Option<u64>,
}

impl DesignConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = Some(temperature);
        self
    }
    pub fn cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = Some(rate);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn energy_threshold(mut self, threshold: Option<f64>) -> Self {
        self.energy_threshold = threshold;
        self
    }
    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn oracle_retry(mut self, retry: OracleRetryConfig) -> Self {
        self.oracle_retry = Some(retry);
        self
    }
    pub fn rbs_params(mut self, params: RbsParams) -> Self {
        self.rbs_params = Some(params);
        self
    }
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
    pub fn cds_mutation_scale(mut self, scale: f64) -> Self {
        self.cds_mutation_scale = Some(scale);
        self
    }
    pub fn downstream_insulator_length(mut self, length: usize) -> Self {
        self.downstream_insulator_length = Some(length);
        self
    }
    pub fn initial_rbs_length(mut self, length: usize) -> Self {
        self.initial_rbs_length = Some(length);
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<DesignConfig, ConfigError> {
        let annealing = AnnealingConfig {
            initial_temperature: self
                .initial_temperature
                .unwrap_or(DEFAULT_INITIAL_TEMPERATURE),
            cooling_rate: self.cooling_rate.unwrap_or(DEFAULT_COOLING_RATE),
            max_iterations: self
                .max_iterations
                .ok_or(ConfigError::MissingParameter("max_iterations"))?,
            energy_threshold: self.energy_threshold,
        };
        if !(annealing.initial_temperature > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "initial_temperature",
                reason: format!("must be positive, got {}", annealing.initial_temperature),
            });
        }
        if !(0.0..1.0).contains(&annealing.cooling_rate) {
            return Err(ConfigError::InvalidParameter {
                name: "cooling_rate",
                reason: format!("must lie in [0, 1), got {}", annealing.cooling_rate),
            });
        }

        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        let oracle_retry = self.oracle_retry.unwrap_or_default();
        if oracle_retry.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_consecutive_oracle_failures",
                reason: "must be at least 1".to_string(),
            });
        }

        let initial_rbs_length = self.initial_rbs_length.unwrap_or(DEFAULT_INITIAL_RBS_LENGTH);
        if initial_rbs_length == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "initial_rbs_length",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(DesignConfig {
            annealing,
            weights: self.weights.unwrap_or_default(),
            oracle_retry,
            rbs_params: self.rbs_params.unwrap_or_default(),
            max_attempts,
            cds_mutation_scale: self
                .cds_mutation_scale
                .unwrap_or(DEFAULT_CDS_MUTATION_SCALE),
            downstream_insulator_length: self
                .downstream_insulator_length
                .unwrap_or(DEFAULT_DOWNSTREAM_INSULATOR_LENGTH),
            initial_rbs_length,
            seed: self.seed,
        })
    }
}
