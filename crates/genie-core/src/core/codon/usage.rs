use super::genetic_code::{self, STOP};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Codon frequencies per thousand codons, *Escherichia coli* K-12.
const ECOLI_USAGE: [(&str, f64); 64] = [
    ("TTT", 22.1), ("TTC", 16.0), ("TTA", 14.3), ("TTG", 13.0),
    ("CTT", 11.9), ("CTC", 10.2), ("CTA", 4.2), ("CTG", 48.4),
    ("ATT", 29.8), ("ATC", 23.7), ("ATA", 6.8), ("ATG", 26.4),
    ("GTT", 19.8), ("GTC", 13.1), ("GTA", 11.6), ("GTG", 24.4),
    ("TCT", 10.4), ("TCC", 9.1), ("TCA", 8.9), ("TCG", 8.5),
    ("CCT", 7.5), ("CCC", 5.4), ("CCA", 8.6), ("CCG", 20.9),
    ("ACT", 10.3), ("ACC", 22.0), ("ACA", 9.3), ("ACG", 13.7),
    ("GCT", 17.1), ("GCC", 24.2), ("GCA", 21.2), ("GCG", 30.1),
    ("TAT", 17.5), ("TAC", 12.2), ("TAA", 2.0), ("TAG", 0.3),
    ("CAT", 12.5), ("CAC", 9.3), ("CAA", 14.6), ("CAG", 28.4),
    ("AAT", 20.6), ("AAC", 21.4), ("AAA", 35.3), ("AAG", 12.4),
    ("GAT", 32.7), ("GAC", 19.2), ("GAA", 39.1), ("GAG", 18.7),
    ("TGT", 5.2), ("TGC", 6.1), ("TGA", 1.0), ("TGG", 13.9),
    ("CGT", 20.0), ("CGC", 19.7), ("CGA", 3.8), ("CGG", 5.9),
    ("AGT", 9.9), ("AGC", 15.2), ("AGA", 3.6), ("AGG", 2.1),
    ("GGT", 25.5), ("GGC", 27.1), ("GGA", 9.5), ("GGG", 11.3),
];

#[derive(Debug, Error)]
pub enum UsageLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Unknown codon '{codon}' in usage table")]
    UnknownCodon { codon: String },
    #[error("Negative frequency {frequency} for codon '{codon}'")]
    NegativeFrequency { codon: String, frequency: f64 },
}

#[derive(Debug, Deserialize)]
struct UsageRow {
    codon: String,
    frequency: f64,
}

/// Per-organism codon usage frequencies.
#[derive(Debug, Clone)]
pub struct CodonUsageTable {
    frequencies: HashMap<String, f64>,
}

impl Default for CodonUsageTable {
    fn default() -> Self {
        Self::escherichia_coli()
    }
}

impl CodonUsageTable {
    pub fn escherichia_coli() -> Self {
        Self {
            frequencies: ECOLI_USAGE
                .iter()
                .map(|&(codon, freq)| (codon.to_string(), freq))
                .collect(),
        }
    }

    /// Loads a `codon,frequency` CSV with a header row. Codons absent from the
    /// file get frequency zero.
    pub fn from_csv_path(path: &Path) -> Result<Self, UsageLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let file = std::fs::File::open(path).map_err(|e| UsageLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut frequencies = HashMap::new();
        for row in reader.deserialize() {
            let row: UsageRow = row.map_err(|e| UsageLoadError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let codon = crate::core::sequence::normalize(&row.codon);
            if genetic_code::translate_codon(&codon).is_none() {
                return Err(UsageLoadError::UnknownCodon { codon: row.codon });
            }
            if row.frequency < 0.0 {
                return Err(UsageLoadError::NegativeFrequency {
                    codon,
                    frequency: row.frequency,
                });
            }
            frequencies.insert(codon, row.frequency);
        }
        Ok(Self { frequencies })
    }

    pub fn frequency(&self, codon: &str) -> f64 {
        self.frequencies
            .get(&crate::core::sequence::normalize(codon))
            .copied()
            .unwrap_or(0.0)
    }

    /// Synonymous codons for `residue` with their frequencies, skipping
    /// excluded codons.
    pub fn weighted_codons(&self, residue: char, excluded: &[String]) -> Vec<(&'static str, f64)> {
        genetic_code::codons_for(residue)
            .into_iter()
            .filter(|codon| !excluded.iter().any(|ex| ex.eq_ignore_ascii_case(codon)))
            .map(|codon| (codon, self.frequency(codon)))
            .collect()
    }

    /// Relative adaptiveness: frequency over the frequency of the most used
    /// synonymous codon.
    pub fn relative_adaptiveness(&self, codon: &str) -> Option<f64> {
        let residue = genetic_code::translate_codon(codon)?;
        let max = genetic_code::codons_for(residue)
            .into_iter()
            .map(|c| self.frequency(c))
            .fold(0.0_f64, f64::max);
        if max <= 0.0 {
            return None;
        }
        Some(self.frequency(codon) / max)
    }

    /// Codon adaptation index: geometric mean of relative adaptiveness over
    /// informative codons (Met, Trp and stops excluded). 1.0 when nothing is
    /// informative.
    pub fn codon_adaptation_index(&self, sequence: &str) -> f64 {
        let mut log_sum = 0.0;
        let mut count = 0usize;
        for chunk in sequence.as_bytes().chunks_exact(3) {
            let Ok(codon) = std::str::from_utf8(chunk) else {
                continue;
            };
            match genetic_code::translate_codon(codon) {
                Some('M') | Some('W') | Some(STOP) | None => continue,
                Some(_) => {}
            }
            if let Some(w) = self.relative_adaptiveness(codon) {
                // Zero-frequency codons get a floor to keep the mean finite.
                log_sum += w.max(0.01).ln();
                count += 1;
            }
        }
        if count == 0 {
            1.0
        } else {
            (log_sum / count as f64).exp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn default_table_is_escherichia_coli() {
        let table = CodonUsageTable::default();
        assert!((table.frequency("CTG") - 48.4).abs() < TOLERANCE);
        assert!((table.frequency("cug") - 48.4).abs() < TOLERANCE);
    }

    #[test]
    fn cai_of_preferred_codons_is_one() {
        let table = CodonUsageTable::escherichia_coli();
        assert!((table.codon_adaptation_index("CTGAAAGAA") - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn cai_ignores_met_trp_and_stop() {
        let table = CodonUsageTable::escherichia_coli();
        assert!((table.codon_adaptation_index("ATGTGGTAA") - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn cai_of_rare_codon_is_below_one() {
        let table = CodonUsageTable::escherichia_coli();
        let cai = table.codon_adaptation_index("CTA");
        assert!(cai > 0.0 && cai < 0.1);
    }

    #[test]
    fn weighted_codons_skips_excluded_codons() {
        let table = CodonUsageTable::escherichia_coli();
        let codons = table.weighted_codons('K', &["aag".to_string()]);
        assert_eq!(codons.len(), 1);
        assert_eq!(codons[0].0, "AAA");
    }

    #[test]
    fn from_csv_path_loads_frequencies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        fs::write(&path, "codon,frequency\nAAA,10.0\nAAG, 30.0\n").unwrap();

        let table = CodonUsageTable::from_csv_path(&path).unwrap();
        assert!((table.frequency("AAG") - 30.0).abs() < TOLERANCE);
        assert_eq!(table.frequency("CTG"), 0.0);
        assert!((table.relative_adaptiveness("AAA").unwrap() - 1.0 / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn from_csv_path_rejects_unknown_codon() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        fs::write(&path, "codon,frequency\nNNN,1.0\n").unwrap();

        let result = CodonUsageTable::from_csv_path(&path);
        assert!(matches!(result, Err(UsageLoadError::UnknownCodon { .. })));
    }

    #[test]
    fn from_csv_path_reports_missing_file() {
        let result = CodonUsageTable::from_csv_path(Path::new("/nonexistent/usage.csv"));
        assert!(matches!(result, Err(UsageLoadError::Io { .. })));
    }
}
