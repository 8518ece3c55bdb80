use super::NUCLEOTIDES;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use thiserror::Error;

static START_CODON: LazyLock<Regex> = LazyLock::new(|| {
    compile_anchored("[ACGT]TG").expect("Start codon pattern must compile")
});

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid sequence pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

fn compile_anchored(fragment: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{})", fragment))
        .case_insensitive(true)
        .build()
}

/// The forbidden patterns of one design job: restriction sites and
/// homopolymer runs. Built once and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    fragments: Vec<String>,
    patterns: Vec<Regex>,
}

impl ConstraintSet {
    pub fn new<I, S>(fragments: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for fragment in fragments {
            let fragment = fragment.into();
            if fragment.is_empty() {
                continue;
            }
            let regex = compile_anchored(&fragment).map_err(|source| PatternError::Invalid {
                pattern: fragment.clone(),
                source,
            })?;
            set.fragments.push(fragment);
            set.patterns.push(regex);
        }
        Ok(set)
    }

    /// Restriction sites plus one run pattern per base of length
    /// `max_repeats + 1`, so `max_repeats` is the longest run allowed.
    pub fn from_request<S: AsRef<str>>(
        restriction_sites: &[S],
        max_repeats: usize,
    ) -> Result<Self, PatternError> {
        let runs = NUCLEOTIDES
            .iter()
            .map(|base| base.to_string().repeat(max_repeats + 1));
        let sites = restriction_sites.iter().map(|s| s.as_ref().to_string());
        Self::new(sites.chain(runs))
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when the sequence has neither forbidden patterns nor spurious
    /// start codons.
    pub fn is_valid(&self, sequence: &str) -> bool {
        count_matches(sequence, self) == 0 && count_spurious_start_codons(sequence) == 0
    }

    pub fn has_forbidden_pattern(&self, sequence: &str) -> bool {
        let upper = sequence.to_ascii_uppercase();
        (0..upper.len()).any(|i| self.patterns.iter().any(|p| p.is_match(&upper[i..])))
    }
}

fn count_anchored(sequence: &str, regex: &Regex) -> usize {
    (0..sequence.len())
        .filter(|&i| regex.is_match(&sequence[i..]))
        .count()
}

/// Number of (possibly overlapping) occurrences of every forbidden pattern.
/// Each pattern counts once per start position it matches at.
pub fn count_matches(sequence: &str, constraints: &ConstraintSet) -> usize {
    let upper = sequence.to_ascii_uppercase();
    constraints
        .patterns
        .iter()
        .map(|p| count_anchored(&upper, p))
        .sum()
}

/// Overlapping count of `NTG` triplets, i.e. potential alternative start
/// codons.
pub fn count_spurious_start_codons(sequence: &str) -> usize {
    count_anchored(&sequence.to_ascii_uppercase(), &START_CODON)
}

/// Forbidden-pattern matches plus spurious start codons.
pub fn count_violations(sequence: &str, constraints: &ConstraintSet) -> usize {
    count_matches(sequence, constraints) + count_spurious_start_codons(sequence)
}

/// Start positions of every `NTG` triplet, in ascending order.
pub fn start_codon_positions(sequence: &str) -> Vec<usize> {
    let upper = sequence.to_ascii_uppercase();
    (0..upper.len())
        .filter(|&i| START_CODON.is_match(&upper[i..]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_is_zero_for_empty_constraint_set() {
        let set = ConstraintSet::default();
        assert_eq!(count_matches("GAATTCGAATTC", &set), 0);
    }

    #[test]
    fn count_matches_counts_overlapping_occurrences() {
        let set = ConstraintSet::new(["AA"]).unwrap();
        assert_eq!(count_matches("AAAA", &set), 3);
    }

    #[test]
    fn count_matches_equals_sum_over_individual_patterns() {
        let seq = "GAATTCAAAAGGATCCTTTTGAATTC";
        let fragments = ["GAATTC", "GGATCC", "AAA", "T{3}"];
        let combined = ConstraintSet::new(fragments).unwrap();

        let individual: usize = fragments
            .iter()
            .map(|f| count_matches(seq, &ConstraintSet::new([*f]).unwrap()))
            .sum();

        assert_eq!(count_matches(seq, &combined), individual);
        assert_eq!(individual, 2 + 1 + 2 + 2);
    }

    #[test]
    fn count_matches_is_case_insensitive() {
        let set = ConstraintSet::new(["GAATTC"]).unwrap();
        assert_eq!(count_matches("ttgaattcaa", &set), 1);
    }

    #[test]
    fn from_request_builds_run_patterns_one_longer_than_max_repeats() {
        let set = ConstraintSet::from_request::<&str>(&[], 3).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(count_matches("AAAC", &set), 0);
        assert_eq!(count_matches("AAAAC", &set), 1);
    }

    #[test]
    fn from_request_with_single_repeat_forbids_adjacent_identical_bases() {
        let set = ConstraintSet::from_request::<&str>(&[], 1).unwrap();
        assert_eq!(count_matches("ACGTACGT", &set), 0);
        assert_eq!(count_matches("ACGGT", &set), 1);
    }

    #[test]
    fn invalid_fragment_is_rejected_at_construction() {
        let result = ConstraintSet::new(["GA(TC"]);
        assert!(matches!(result, Err(PatternError::Invalid { .. })));
    }

    #[test]
    fn spurious_start_codons_are_counted_with_overlap() {
        assert_eq!(count_spurious_start_codons("ATGTTG"), 2);
        assert_eq!(count_spurious_start_codons("CCCCCC"), 0);
        assert_eq!(count_spurious_start_codons("gtg"), 1);
    }

    #[test]
    fn start_codon_positions_lists_every_ntg() {
        assert_eq!(start_codon_positions("AATGCCTGA"), vec![1, 5]);
    }

    #[test]
    fn is_valid_requires_no_patterns_and_no_start_codons() {
        let set = ConstraintSet::new(["GAATTC"]).unwrap();
        assert!(set.is_valid("CCCAAACCC"));
        assert!(!set.is_valid("CCGAATTCCC"));
        assert!(!set.is_valid("CCATGCC"));
    }
}
