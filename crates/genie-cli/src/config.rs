use crate::cli::{BackendKind, CheckArgs, DesignArgs};
use crate::error::{CliError, Result};
use clap::ValueEnum;
use partsgenie::core::rbs::params::RbsParams;
use partsgenie::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialAnnealingConfig {
    initial_temperature: Option<f64>,
    cooling_rate: Option<f64>,
    max_iterations: Option<usize>,
    energy_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialWeightsConfig {
    rate_error: Option<f64>,
    invalid: Option<f64>,
    rogue: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOracleConfig {
    backend: Option<BackendKind>,
    vienna_bin_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    max_consecutive_failures: Option<usize>,
    backoff_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialGenerationConfig {
    max_attempts: Option<usize>,
    cds_mutation_scale: Option<f64>,
    downstream_insulator_length: Option<usize>,
    initial_rbs_length: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialDataConfig {
    rbs_params: Option<PathBuf>,
    codon_usage: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialDesignConfig {
    seed: Option<u64>,
    annealing: Option<PartialAnnealingConfig>,
    weights: Option<PartialWeightsConfig>,
    oracle: Option<PartialOracleConfig>,
    generation: Option<PartialGenerationConfig>,
    data: Option<PartialDataConfig>,
}

/// How the folding oracle is built for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub backend: BackendKind,
    pub vienna_bin_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Everything the `design` command needs once file, flags and `--set`
/// values have been merged.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub design: core_config::DesignConfig,
    pub oracle: OracleSettings,
    pub codon_usage: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
}

/// Settings of the `check` command.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub rbs_params: RbsParams,
    pub catalog: Option<PathBuf>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn load_rbs_params(path: &Path) -> Result<RbsParams> {
    RbsParams::load(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

impl PartialDesignConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, args: &DesignArgs) -> Result<ResolvedConfig> {
        self.apply_set_values(&args.set_values)?;

        let annealing = self.annealing.take().unwrap_or_default();
        let weights = self.weights.take().unwrap_or_default();
        let oracle = self.oracle.take().unwrap_or_default();
        let generation = self.generation.take().unwrap_or_default();
        let data = self.data.take().unwrap_or_default();

        let mut builder = core_config::DesignConfigBuilder::new()
            .max_iterations(
                args.max_iterations
                    .or(annealing.max_iterations)
                    .unwrap_or(DEFAULT_MAX_ITERATIONS),
            )
            .energy_threshold(args.energy_threshold.or(annealing.energy_threshold))
            .seed(args.seed.or(self.seed));

        if let Some(t) = args.initial_temperature.or(annealing.initial_temperature) {
            builder = builder.initial_temperature(t);
        }
        if let Some(rate) = args.cooling_rate.or(annealing.cooling_rate) {
            builder = builder.cooling_rate(rate);
        }

        builder = builder.weights(Self::merge_weights(weights));
        builder = builder.oracle_retry(Self::merge_oracle_retry(&oracle));

        if let Some(attempts) = generation.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(scale) = generation.cds_mutation_scale {
            builder = builder.cds_mutation_scale(scale);
        }
        if let Some(length) = generation.downstream_insulator_length {
            builder = builder.downstream_insulator_length(length);
        }
        if let Some(length) = generation.initial_rbs_length {
            builder = builder.initial_rbs_length(length);
        }

        if let Some(path) = args.rbs_params.as_ref().or(data.rbs_params.as_ref()) {
            builder = builder.rbs_params(load_rbs_params(path)?);
        }

        let design = builder.build().map_err(|e| CliError::Config(e.to_string()))?;

        Ok(ResolvedConfig {
            design,
            oracle: OracleSettings {
                backend: args
                    .backend
                    .or(oracle.backend)
                    .unwrap_or(BackendKind::NearestNeighbor),
                vienna_bin_dir: args.vienna_bin_dir.clone().or(oracle.vienna_bin_dir),
                timeout: oracle.timeout_secs.map(Duration::from_secs),
            },
            codon_usage: args.codon_usage.clone().or(data.codon_usage),
            catalog: args.catalog.clone().or(data.catalog),
        })
    }

    /// Resolves what the `check` command reads from the configuration: the
    /// RBS model parameters and the protein catalog. Flags win over the file.
    pub fn resolve_check(self, args: &CheckArgs) -> Result<CheckSettings> {
        let data = self.data.unwrap_or_default();
        let rbs_params = match args.rbs_params.as_ref().or(data.rbs_params.as_ref()) {
            Some(path) => load_rbs_params(path)?,
            None => RbsParams::default(),
        };
        Ok(CheckSettings {
            rbs_params,
            catalog: args.catalog.clone().or(data.catalog),
        })
    }

    fn merge_weights(partial: PartialWeightsConfig) -> core_config::ScoringWeights {
        let defaults = core_config::ScoringWeights::default();
        core_config::ScoringWeights {
            rate_error: partial.rate_error.unwrap_or(defaults.rate_error),
            invalid: partial.invalid.unwrap_or(defaults.invalid),
            rogue: partial.rogue.unwrap_or(defaults.rogue),
        }
    }

    fn merge_oracle_retry(partial: &PartialOracleConfig) -> core_config::OracleRetryConfig {
        let defaults = core_config::OracleRetryConfig::default();
        core_config::OracleRetryConfig {
            max_consecutive_failures: partial
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures),
            backoff: partial
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key.trim() {
                "seed" => self.seed = Some(parse_value(key, value, "integer")?),
                "annealing.initial-temperature" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .initial_temperature = Some(parse_value(key, value, "float")?);
                }
                "annealing.cooling-rate" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .cooling_rate = Some(parse_value(key, value, "float")?);
                }
                "annealing.max-iterations" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value, "integer")?);
                }
                "annealing.energy-threshold" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .energy_threshold = Some(parse_value(key, value, "float")?);
                }
                "weights.rate-error" => {
                    self.weights.get_or_insert_with(Default::default).rate_error =
                        Some(parse_value(key, value, "float")?);
                }
                "weights.invalid" => {
                    self.weights.get_or_insert_with(Default::default).invalid =
                        Some(parse_value(key, value, "float")?);
                }
                "weights.rogue" => {
                    self.weights.get_or_insert_with(Default::default).rogue =
                        Some(parse_value(key, value, "float")?);
                }
                "oracle.backend" => {
                    let backend = BackendKind::from_str(value.trim(), true).map_err(|_| {
                        CliError::Config(format!("Unknown folding backend: {}", value))
                    })?;
                    self.oracle.get_or_insert_with(Default::default).backend = Some(backend);
                }
                "oracle.timeout-secs" => {
                    self.oracle.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value, "integer")?);
                }
                "oracle.max-consecutive-failures" => {
                    self.oracle
                        .get_or_insert_with(Default::default)
                        .max_consecutive_failures = Some(parse_value(key, value, "integer")?);
                }
                "oracle.backoff-ms" => {
                    self.oracle.get_or_insert_with(Default::default).backoff_ms =
                        Some(parse_value(key, value, "integer")?);
                }
                "generation.max-attempts" => {
                    self.generation
                        .get_or_insert_with(Default::default)
                        .max_attempts = Some(parse_value(key, value, "integer")?);
                }
                "generation.cds-mutation-scale" => {
                    self.generation
                        .get_or_insert_with(Default::default)
                        .cds_mutation_scale = Some(parse_value(key, value, "float")?);
                }
                "generation.downstream-insulator-length" => {
                    self.generation
                        .get_or_insert_with(Default::default)
                        .downstream_insulator_length = Some(parse_value(key, value, "integer")?);
                }
                "generation.initial-rbs-length" => {
                    self.generation
                        .get_or_insert_with(Default::default)
                        .initial_rbs_length = Some(parse_value(key, value, "integer")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn design_args(extra: &[&str]) -> DesignArgs {
        let mut args = vec!["partsgenie", "design", "-r", "request.toml"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Design(args) => args,
            other => panic!("Expected 'design' subcommand, got {:?}", other),
        }
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let resolved = PartialDesignConfig::default()
            .merge_with_cli(&design_args(&[]))
            .unwrap();

        assert_eq!(resolved.design.annealing.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(
            resolved.design.annealing.initial_temperature,
            core_config::DEFAULT_INITIAL_TEMPERATURE
        );
        assert_eq!(resolved.design.annealing.energy_threshold, None);
        assert_eq!(resolved.design.seed, None);
        assert_eq!(resolved.design.rbs_params, RbsParams::default());
        assert_eq!(resolved.oracle.backend, BackendKind::NearestNeighbor);
        assert_eq!(resolved.oracle.timeout, None);
        assert!(resolved.codon_usage.is_none());
    }

    #[test]
    fn load_from_file_and_merge_with_defaults() {
        let config_path = write_config_file(
            "config_file.toml",
            r#"
            seed = 7

            [annealing]
            max-iterations = 250
            cooling-rate = 0.01

            [weights]
            rogue = 2.5

            [oracle]
            backend = "vienna"
            vienna-bin-dir = "/opt/vienna/bin"
            timeout-secs = 5
            max-consecutive-failures = 4

            [generation]
            initial-rbs-length = 25
            "#,
        );
        let resolved = PartialDesignConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&design_args(&[]))
            .unwrap();

        assert_eq!(resolved.design.seed, Some(7));
        assert_eq!(resolved.design.annealing.max_iterations, 250);
        assert_eq!(resolved.design.annealing.cooling_rate, 0.01);
        assert_eq!(resolved.design.weights.rogue, 2.5);
        assert_eq!(resolved.design.weights.rate_error, 1.0);
        assert_eq!(resolved.design.oracle_retry.max_consecutive_failures, 4);
        assert_eq!(
            resolved.design.oracle_retry.backoff,
            core_config::DEFAULT_ORACLE_BACKOFF
        );
        assert_eq!(resolved.design.initial_rbs_length, 25);
        assert_eq!(resolved.oracle.backend, BackendKind::Vienna);
        assert_eq!(
            resolved.oracle.vienna_bin_dir,
            Some(PathBuf::from("/opt/vienna/bin"))
        );
        assert_eq!(resolved.oracle.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn cli_args_override_file_values() {
        let config_path = write_config_file(
            "config_override.toml",
            r#"
            seed = 7
            [annealing]
            max-iterations = 250
            initial-temperature = 0.5
            [oracle]
            backend = "vienna"
            "#,
        );
        let args = design_args(&[
            "--max-iterations",
            "40",
            "--seed",
            "99",
            "-t",
            "0.2",
            "--backend",
            "nearest-neighbor",
            "--energy-threshold",
            "0.05",
        ]);
        let resolved = PartialDesignConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(resolved.design.annealing.max_iterations, 40);
        assert_eq!(resolved.design.annealing.initial_temperature, 0.2);
        assert_eq!(resolved.design.annealing.energy_threshold, Some(0.05));
        assert_eq!(resolved.design.seed, Some(99));
        assert_eq!(resolved.oracle.backend, BackendKind::NearestNeighbor);
    }

    #[test]
    fn set_values_override_file_values() {
        let config_path = write_config_file(
            "config_set.toml",
            r#"
            [annealing]
            max-iterations = 250
            "#,
        );
        let args = design_args(&[
            "-S",
            "annealing.max-iterations=20",
            "-S",
            "weights.invalid=3.0",
            "-S",
            "oracle.backend=vienna",
            "-S",
            "oracle.backoff-ms=10",
        ]);
        let resolved = PartialDesignConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(resolved.design.annealing.max_iterations, 20);
        assert_eq!(resolved.design.weights.invalid, 3.0);
        assert_eq!(resolved.design.oracle_retry.backoff, Duration::from_millis(10));
        assert_eq!(resolved.oracle.backend, BackendKind::Vienna);
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        for bad in [
            "annealing.max-iterations",
            "annealing.max-iterations=many",
            "annealing.unknown=1",
            "oracle.backend=mfold",
        ] {
            let result = PartialDesignConfig::default().merge_with_cli(&design_args(&["-S", bad]));
            assert!(
                matches!(result, Err(CliError::Config(_))),
                "expected a configuration error for '{}'",
                bad
            );
        }
    }

    #[test]
    fn unknown_file_keys_are_reported_with_the_path() {
        let config_path = write_config_file(
            "config_unknown.toml",
            r#"
            [annealing]
            steps-per-temperature = 10
            "#,
        );
        let result = PartialDesignConfig::from_file(&config_path);
        assert!(matches!(
            result,
            Err(CliError::FileParsing { ref path, .. }) if *path == config_path
        ));
    }

    #[test]
    fn invalid_schedule_is_a_configuration_error() {
        let result =
            PartialDesignConfig::default().merge_with_cli(&design_args(&["--cooling-rate", "1.5"]));
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("cooling_rate")),
            other => panic!("Expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rbs_params_file_is_loaded() {
        let params_path = write_config_file(
            "rbs_params.toml",
            r#"
            max-rbs-length = 28
            rogue-cutoff = 0.2
            "#,
        );
        let config_path = write_config_file(
            "config_params.toml",
            &format!("[data]\nrbs-params = {:?}\n", params_path.to_str().unwrap()),
        );
        let resolved = PartialDesignConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&design_args(&[]))
            .unwrap();

        assert_eq!(resolved.design.rbs_params.max_rbs_length, 28);
        assert_eq!(resolved.design.rbs_params.rogue_cutoff, 0.2);
        assert_eq!(resolved.design.rbs_params.rt_eff, RbsParams::default().rt_eff);
    }
}
