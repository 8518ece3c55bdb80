//! Nucleotide sequence primitives shared by the scorer, the generators and the
//! mutation operators.

pub mod constraints;

use constraints::{ConstraintSet, count_violations};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::trace;

pub const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Upper-cases a DNA/RNA string and maps `U` to `T`.
pub fn normalize(seq: &str) -> String {
    seq.chars()
        .map(|c| match c.to_ascii_uppercase() {
            'U' => 'T',
            other => other,
        })
        .collect()
}

pub fn is_nucleotide_sequence(seq: &str) -> bool {
    seq.chars()
        .all(|c| matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'U'))
}

#[inline]
pub fn complement(base: char) -> char {
    match base.to_ascii_uppercase() {
        'A' => 'T',
        'T' | 'U' => 'A',
        'G' => 'C',
        'C' => 'G',
        other => other,
    }
}

pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement).collect()
}

/// DNA to RNA alphabet, as consumed by the folding backends.
pub fn to_rna(seq: &str) -> String {
    seq.chars()
        .map(|c| match c.to_ascii_uppercase() {
            'T' => 'U',
            other => other,
        })
        .collect()
}

pub fn random_nucleotide<R: Rng + ?Sized>(rng: &mut R) -> char {
    *NUCLEOTIDES.choose(rng).unwrap_or(&'A')
}

/// Draws a base different from `current`.
pub fn random_substitute<R: Rng + ?Sized>(current: char, rng: &mut R) -> char {
    let current = current.to_ascii_uppercase();
    let choices: Vec<char> = NUCLEOTIDES
        .iter()
        .copied()
        .filter(|&b| b != current)
        .collect();
    *choices.choose(rng).unwrap_or(&current)
}

pub fn random_sequence<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    (0..length).map(|_| random_nucleotide(rng)).collect()
}

/// Returns a copy of `seq` with the base at `pos` replaced. `seq` must be ASCII.
pub fn replace_at(seq: &str, pos: usize, base: char) -> String {
    let mut out = String::with_capacity(seq.len());
    out.push_str(&seq[..pos]);
    out.push(base);
    out.push_str(&seq[pos + 1..]);
    out
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unable to generate a valid {what} of length {length} after {attempts} attempts")]
pub struct GenerationError {
    pub what: &'static str,
    pub length: usize,
    pub attempts: usize,
}

/// Rejection-samples a random sequence that is valid under `constraints`
/// (no forbidden patterns, no spurious start codons).
pub fn random_valid_sequence<R: Rng + ?Sized>(
    length: usize,
    constraints: &ConstraintSet,
    rng: &mut R,
    max_attempts: usize,
) -> Result<String, GenerationError> {
    sample_between("random sequence", length, "", "", constraints, rng, max_attempts)
}

/// Rejection-samples a filler placed between `before` and `after` that adds
/// no forbidden pattern or start codon to its surroundings, including at the
/// two junctions.
pub fn random_valid_filler<R: Rng + ?Sized>(
    length: usize,
    before: &str,
    after: &str,
    constraints: &ConstraintSet,
    rng: &mut R,
    max_attempts: usize,
) -> Result<String, GenerationError> {
    sample_between("filler", length, before, after, constraints, rng, max_attempts)
}

fn sample_between<R: Rng + ?Sized>(
    what: &'static str,
    length: usize,
    before: &str,
    after: &str,
    constraints: &ConstraintSet,
    rng: &mut R,
    max_attempts: usize,
) -> Result<String, GenerationError> {
    let baseline = count_violations(before, constraints) + count_violations(after, constraints);
    for attempt in 1..=max_attempts {
        let candidate = random_sequence(length, rng);
        let joined = format!("{}{}{}", before, candidate, after);
        if count_violations(&joined, constraints) <= baseline {
            trace!(length, attempt, what, "Generated valid random sequence.");
            return Ok(candidate);
        }
    }
    Err(GenerationError {
        what,
        length,
        attempts: max_attempts,
    })
}
