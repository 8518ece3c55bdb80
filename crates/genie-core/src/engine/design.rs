use super::annealing::AnnealingSolution;
use super::config::DesignConfig;
use super::error::EngineError;
use super::mutation::{MutationContext, mutate_construct};
use super::progress::ProgressValue;
use super::transaction::Staged;
use crate::core::codon::optimizer::CodonOptimizer;
use crate::core::models::construct::Construct;
use crate::core::models::feature::{CdsOption, Feature, InsulatorSide};
use crate::core::models::protein::ProteinLookup;
use crate::core::models::record::DesignRecord;
use crate::core::models::request::DesignRequest;
use crate::core::rbs::calculator::{RbsCalculator, ThermoResult};
use crate::core::sequence::constraints::{ConstraintSet, count_matches, count_violations};
use crate::core::sequence::{GenerationError, normalize, random_valid_filler};
use crate::core::utils::math::{erf, mean};
use rand::RngCore;
use tracing::{debug, info, instrument};

/// Display ceiling of the invalid-sequence and rogue-RBS progress values.
const COUNT_DISPLAY_MAX: f64 = 10.0;
/// Display ceiling of the TIR progress value, relative to the target.
const RATE_DISPLAY_HEADROOM: f64 = 1.2;

/// Read-only collaborators shared by every step of one design job.
#[derive(Clone, Copy)]
pub struct DesignContext<'a> {
    pub config: &'a DesignConfig,
    pub calculator: &'a RbsCalculator,
    pub codons: &'a dyn CodonOptimizer,
    pub constraints: &'a ConstraintSet,
    pub excluded_codons: &'a [String],
    pub target_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DesignMetrics {
    pub mean_cai: f64,
    pub mean_rate: f64,
    /// `erf(|target - mean_rate| / target)`.
    pub mean_rate_error: f64,
    pub invalid_count: usize,
    pub rogue_count: usize,
    pub energy: f64,
}

/// A construct together with everything computed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub construct: Construct,
    /// One result per CDS option.
    pub thermo: Vec<ThermoResult>,
    pub metrics: DesignMetrics,
}

/// Normalised distance of `rate` from `target`, in [0, 1).
pub fn rate_error(target: f64, rate: f64) -> f64 {
    erf((target - rate).abs() / target)
}

impl<'a> DesignContext<'a> {
    pub fn new(
        config: &'a DesignConfig,
        calculator: &'a RbsCalculator,
        codons: &'a dyn CodonOptimizer,
        constraints: &'a ConstraintSet,
        excluded_codons: &'a [String],
        target_rate: f64,
    ) -> Self {
        Self {
            config,
            calculator,
            codons,
            constraints,
            excluded_codons,
            target_rate,
        }
    }

    fn mutation_context(&self) -> MutationContext<'a> {
        MutationContext {
            constraints: self.constraints,
            codons: self.codons,
            excluded_codons: self.excluded_codons,
            max_rbs_length: self.calculator.params().max_rbs_length,
            cds_mutation_scale: self.config.cds_mutation_scale,
        }
    }

    /// CAI of the CDS of `option` including its stop codon.
    fn cai(&self, construct: &Construct, option: usize) -> f64 {
        let stop = construct
            .features()
            .iter()
            .find_map(|f| match f {
                Feature::Stop { sequence } => Some(sequence.as_str()),
                _ => None,
            })
            .unwrap_or("");
        let cds = construct.features()[construct.cds_index()].sequence_for(option);
        self.codons
            .codon_adaptation_index(&format!("{}{}", cds, stop))
    }

    /// Thermodynamics and constraint violations of every CDS option, folded
    /// into one energy.
    #[instrument(level = "debug", skip_all, fields(options = construct.num_options()))]
    pub fn evaluate(
        &self,
        construct: &Construct,
    ) -> Result<(Vec<ThermoResult>, DesignMetrics), EngineError> {
        let options = construct.num_options();
        let mut thermo = Vec::with_capacity(options);
        let mut rates = Vec::with_capacity(options);
        let mut cais = Vec::with_capacity(options);
        let mut invalid_count = 0;
        let mut rogue_count = 0;

        for option in 0..options {
            let (region, offset) = construct.scored_region(option);
            let result = self.calculator.calc_free_energies(&region, offset)?;
            rates.push(result.intended_rate());
            rogue_count += self
                .calculator
                .rogue_sites(&result, self.target_rate)
                .len();
            invalid_count += count_matches(&construct.mutable_region(option), self.constraints);
            cais.push(self.cai(construct, option));
            thermo.push(result);
        }

        let mean_rate = mean(&rates);
        let mean_rate_error = rate_error(self.target_rate, mean_rate);
        let w = &self.config.weights;
        let energy = w.rate_error * mean_rate_error
            + w.invalid * invalid_count as f64
            + w.rogue * rogue_count as f64;

        let metrics = DesignMetrics {
            mean_cai: mean(&cais),
            mean_rate,
            mean_rate_error,
            invalid_count,
            rogue_count,
            energy,
        };
        debug!(?metrics, "Evaluated construct.");
        Ok((thermo, metrics))
    }

    /// Initial RBS for `downstream`, drawn until it also joins cleanly onto a
    /// user-supplied upstream insulator.
    fn initial_rbs(
        &self,
        downstream: &str,
        upstream: Option<&str>,
        target_dg: f64,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let length = self
            .config
            .initial_rbs_length
            .min(self.calculator.params().max_rbs_length);
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            let rbs = self.calculator.get_initial_rbs(
                length,
                downstream,
                target_dg,
                self.constraints,
                rng,
                attempts,
            )?;
            let Some(upstream) = upstream else {
                return Ok(rbs);
            };
            let baseline =
                count_violations(upstream, self.constraints) + count_violations(&rbs, self.constraints);
            let joined = format!("{}{}", upstream, rbs);
            if count_violations(&joined, self.constraints) <= baseline {
                debug!(attempt, "Initial RBS joins the supplied insulator.");
                return Ok(rbs);
            }
        }
        Err(GenerationError {
            what: "RBS",
            length,
            attempts,
        })
    }
}

/// The annealing state of one design job.
pub struct DesignSolution<'a> {
    ctx: DesignContext<'a>,
    state: Staged<Candidate>,
}

impl<'a> DesignSolution<'a> {
    /// Builds and scores the initial construct for `request`.
    #[instrument(skip_all, name = "seed_design")]
    pub fn seed(
        ctx: DesignContext<'a>,
        request: &DesignRequest,
        lookup: &dyn ProteinLookup,
        rng: &mut dyn RngCore,
    ) -> Result<Self, EngineError> {
        let proteins = request.resolve_proteins(lookup)?;
        info!(proteins = proteins.len(), "Resolved proteins.");

        let mut options = Vec::with_capacity(proteins.len());
        for protein in proteins {
            let sequence = ctx.codons.optimize(
                protein.sequence.coding_residues(),
                ctx.excluded_codons,
                ctx.constraints,
                false,
                rng,
            )?;
            options.push(CdsOption { protein, sequence });
        }
        let stop = ctx.codons.optimize(
            "*",
            ctx.excluded_codons,
            &ConstraintSet::default(),
            true,
            rng,
        )?;

        let prefix = normalize(&request.prefix);
        let suffix = normalize(&request.suffix);
        let supplied_insulator = request.insulator.sequence.as_deref().map(normalize);
        let target_dg = ctx.calculator.get_dg(ctx.target_rate);

        let rbs = match request.rbs.sequence.as_deref() {
            Some(sequence) => normalize(sequence),
            None => {
                let downstream = options.first().map_or("", |o| o.sequence.as_str());
                ctx.initial_rbs(downstream, supplied_insulator.as_deref(), target_dg, rng)?
            }
        };

        let upstream = match supplied_insulator {
            Some(sequence) => sequence,
            None => random_valid_filler(
                request.upstream_length.saturating_sub(rbs.len()),
                &prefix,
                &rbs,
                ctx.constraints,
                rng,
                ctx.config.max_attempts,
            )?,
        };
        let downstream = if options.len() > 1 {
            random_valid_filler(
                ctx.config.downstream_insulator_length,
                &stop,
                &suffix,
                ctx.constraints,
                rng,
                ctx.config.max_attempts,
            )?
        } else {
            String::new()
        };

        let construct = Construct::new(vec![
            Feature::Flanking {
                sequence: prefix,
                fixed: true,
            },
            Feature::Insulator {
                sequence: upstream,
                fixed: request.insulator.fixed,
                side: InsulatorSide::Upstream,
            },
            Feature::Rbs {
                sequence: rbs,
                fixed: request.rbs.fixed,
                target_rate: ctx.target_rate,
                target_dg,
            },
            Feature::Cds {
                options,
                fixed: request.fixed_cds,
            },
            Feature::Stop { sequence: stop },
            Feature::Insulator {
                sequence: downstream,
                fixed: true,
                side: InsulatorSide::Downstream,
            },
            Feature::Suffix {
                sequence: suffix,
                fixed: true,
            },
        ])?;

        let (thermo, metrics) = ctx.evaluate(&construct)?;
        info!(
            energy = metrics.energy,
            rate = metrics.mean_rate,
            invalid = metrics.invalid_count,
            rogue = metrics.rogue_count,
            "Seeded design."
        );
        Ok(Self {
            ctx,
            state: Staged::new(Candidate {
                construct,
                thermo,
                metrics,
            }),
        })
    }

    pub fn current(&self) -> &Candidate {
        self.state.current()
    }

    pub fn proposed(&self) -> &Candidate {
        self.state.proposed()
    }

    /// Energy of the committed candidate.
    pub fn score(&self) -> f64 {
        self.state.current().metrics.energy
    }

    /// One record per CDS option of the committed candidate.
    pub fn result(&self) -> Vec<DesignRecord> {
        let candidate = self.state.current();
        let construct = &candidate.construct;
        construct
            .cds_options()
            .iter()
            .enumerate()
            .map(|(option, cds)| {
                let rate = candidate
                    .thermo
                    .get(option)
                    .map_or(0.0, ThermoResult::intended_rate);
                DesignRecord::new(
                    &cds.protein,
                    construct.sequence(option),
                    construct.segments(option),
                    rate,
                    self.ctx.cai(construct, option),
                )
            })
            .collect()
    }

    /// Kinetic accessibility of the intended start of every CDS option.
    pub fn kinetic_scores(&self) -> Result<Vec<f64>, EngineError> {
        let construct = &self.state.current().construct;
        (0..construct.num_options())
            .map(|option| -> Result<f64, EngineError> {
                let (region, offset) = construct.scored_region(option);
                Ok(self.ctx.calculator.kinetic_score(&region, offset)?)
            })
            .collect()
    }
}

impl AnnealingSolution for DesignSolution<'_> {
    fn energy(&self) -> f64 {
        self.score()
    }

    fn propose(&mut self, rng: &mut dyn RngCore) -> Result<f64, EngineError> {
        let ctx = self.ctx;
        self.state.transaction(|proposed| -> Result<f64, EngineError> {
            mutate_construct(&mut proposed.construct, &ctx.mutation_context(), rng)?;
            let (thermo, metrics) = ctx.evaluate(&proposed.construct)?;
            proposed.thermo = thermo;
            proposed.metrics = metrics;
            Ok(metrics.energy)
        })
    }

    fn commit(&mut self) {
        self.state.commit();
    }

    fn discard(&mut self) {
        self.state.discard();
    }

    fn progress_values(&self) -> Vec<ProgressValue> {
        let metrics = &self.state.current().metrics;
        let target = self.ctx.target_rate;
        vec![
            ProgressValue {
                id: "mean_cai",
                name: "CAI",
                value: metrics.mean_cai,
                min: 0.0,
                max: 1.0,
                target: 1.0,
            },
            ProgressValue {
                id: "mean_tir",
                name: "TIR",
                value: metrics.mean_rate,
                min: 0.0,
                max: RATE_DISPLAY_HEADROOM * target,
                target,
            },
            ProgressValue {
                id: "num_invalid_seqs",
                name: "Invalid seqs",
                value: metrics.invalid_count as f64,
                min: 0.0,
                max: COUNT_DISPLAY_MAX,
                target: 0.0,
            },
            ProgressValue {
                id: "num_rogue_rbs",
                name: "Rogue RBSs",
                value: metrics.rogue_count as f64,
                min: 0.0,
                max: COUNT_DISPLAY_MAX,
                target: 0.0,
            },
        ]
    }
}
