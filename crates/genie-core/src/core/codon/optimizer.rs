use super::genetic_code::{self, STOP};
use super::usage::CodonUsageTable;
use crate::core::sequence::constraints::ConstraintSet;
use rand::{Rng, RngCore};
use rand::distributions::{Distribution, WeightedIndex};
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Bases of already-built sequence re-checked when a codon is appended.
const LOOKBACK: usize = 24;
const DEFAULT_MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodonError {
    #[error("Residue '{0}' cannot be translated to a codon")]
    UnknownResidue(char),
    #[error("No permitted codon encodes residue '{residue}'")]
    NoPermittedCodon { residue: char },
    #[error("Unable to codon-optimise a {length}-residue protein without forbidden patterns after {attempts} attempts")]
    Unsatisfiable { length: usize, attempts: usize },
    #[error("Nucleotide sequence of length {actual} does not encode a {expected}-residue protein")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Back-translation and synonymous mutation of protein sequences.
pub trait CodonOptimizer: Send + Sync {
    /// Back-translates `residues` codon by codon. Unless `tolerant`, the
    /// result must contain no forbidden pattern of `constraints`.
    fn optimize(
        &self,
        residues: &str,
        excluded_codons: &[String],
        constraints: &ConstraintSet,
        tolerant: bool,
        rng: &mut dyn RngCore,
    ) -> Result<String, CodonError>;

    /// Replaces each codon of `sequence` by a synonymous one with probability
    /// `rate`.
    fn mutate(
        &self,
        residues: &str,
        sequence: &str,
        rate: f64,
        excluded_codons: &[String],
        rng: &mut dyn RngCore,
    ) -> Result<String, CodonError>;

    fn codon_adaptation_index(&self, sequence: &str) -> f64;
}

/// Codon optimiser drawing codons in proportion to organism usage.
#[derive(Debug, Clone)]
pub struct UsageCodonOptimizer {
    table: CodonUsageTable,
    max_attempts: usize,
}

impl Default for UsageCodonOptimizer {
    fn default() -> Self {
        Self::new(CodonUsageTable::default())
    }
}

impl UsageCodonOptimizer {
    pub fn new(table: CodonUsageTable) -> Self {
        Self {
            table,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn table(&self) -> &CodonUsageTable {
        &self.table
    }

    fn candidates(
        &self,
        residue: char,
        excluded: &[String],
    ) -> Result<Vec<(&'static str, f64)>, CodonError> {
        if !genetic_code::is_amino_acid(residue) {
            return Err(CodonError::UnknownResidue(residue));
        }
        let codons = self.table.weighted_codons(residue, excluded);
        if codons.is_empty() {
            return Err(CodonError::NoPermittedCodon { residue });
        }
        Ok(codons)
    }

    fn draw(codons: &[(&'static str, f64)], rng: &mut dyn RngCore) -> &'static str {
        match WeightedIndex::new(codons.iter().map(|(_, w)| *w)) {
            Ok(dist) => codons[dist.sample(rng)].0,
            // All weights zero: fall back to a uniform draw.
            Err(_) => codons[rng.gen_range(0..codons.len())].0,
        }
    }

    fn single_pass(
        &self,
        residues: &[char],
        excluded: &[String],
        constraints: &ConstraintSet,
        rng: &mut dyn RngCore,
    ) -> Result<Option<String>, CodonError> {
        let mut sequence = String::with_capacity(residues.len() * 3);
        for &residue in residues {
            let mut codons = self.candidates(residue, excluded)?;
            let mut placed = false;
            while !codons.is_empty() {
                let codon = Self::draw(&codons, rng);
                let tail_start = sequence.len().saturating_sub(LOOKBACK);
                let window = format!("{}{}", &sequence[tail_start..], codon);
                if !constraints.has_forbidden_pattern(&window) {
                    sequence.push_str(codon);
                    placed = true;
                    break;
                }
                codons.retain(|(c, _)| *c != codon);
            }
            if !placed {
                return Ok(None);
            }
        }
        Ok(Some(sequence))
    }
}

impl CodonOptimizer for UsageCodonOptimizer {
    #[instrument(level = "debug", skip_all, fields(length = residues.len()))]
    fn optimize(
        &self,
        residues: &str,
        excluded_codons: &[String],
        constraints: &ConstraintSet,
        tolerant: bool,
        rng: &mut dyn RngCore,
    ) -> Result<String, CodonError> {
        let residues: Vec<char> = residues.chars().map(|c| c.to_ascii_uppercase()).collect();

        for attempt in 1..=self.max_attempts {
            if let Some(seq) = self.single_pass(&residues, excluded_codons, constraints, rng)? {
                debug!(attempt, "Codon-optimised sequence generated.");
                return Ok(seq);
            }
            trace!(attempt, "Back-translation hit a forbidden pattern; retrying.");
        }

        if tolerant {
            debug!("Falling back to unconstrained back-translation.");
            let mut sequence = String::with_capacity(residues.len() * 3);
            for &residue in &residues {
                let codons = self.candidates(residue, excluded_codons)?;
                sequence.push_str(Self::draw(&codons, rng));
            }
            return Ok(sequence);
        }

        Err(CodonError::Unsatisfiable {
            length: residues.len(),
            attempts: self.max_attempts,
        })
    }

    fn mutate(
        &self,
        residues: &str,
        sequence: &str,
        rate: f64,
        excluded_codons: &[String],
        rng: &mut dyn RngCore,
    ) -> Result<String, CodonError> {
        let residues: Vec<char> = residues
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|&c| c != STOP)
            .collect();
        if sequence.len() != residues.len() * 3 {
            return Err(CodonError::LengthMismatch {
                expected: residues.len(),
                actual: sequence.len(),
            });
        }

        let mut mutated = String::with_capacity(sequence.len());
        for (i, &residue) in residues.iter().enumerate() {
            let current = &sequence[i * 3..i * 3 + 3];
            if rng.r#gen::<f64>() >= rate {
                mutated.push_str(current);
                continue;
            }
            let alternatives: Vec<_> = self
                .candidates(residue, excluded_codons)?
                .into_iter()
                .filter(|(c, _)| !c.eq_ignore_ascii_case(current))
                .collect();
            if alternatives.is_empty() {
                mutated.push_str(current);
            } else {
                mutated.push_str(Self::draw(&alternatives, rng));
            }
        }
        Ok(mutated)
    }

    fn codon_adaptation_index(&self, sequence: &str) -> f64 {
        self.table.codon_adaptation_index(sequence)
    }
}
