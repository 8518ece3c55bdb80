use super::protein::{LookupError, ProteinLookup, ProteinRecord, ProteinSequence};
use crate::core::sequence::constraints::{ConstraintSet, PatternError};
use crate::core::sequence::{is_nucleotide_sequence, normalize};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_UPSTREAM_LENGTH: usize = 60;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Target rate must be positive, got {0}")]
    InvalidTargetRate(f64),
    #[error("max-repeats must be at least 1")]
    InvalidMaxRepeats,
    #[error("Organism rRNA must be a non-empty nucleotide sequence, got '{0}'")]
    InvalidRRna(String),
    #[error("At least one protein is required")]
    NoProteins,
    #[error("Excluded codon '{0}' is not a nucleotide triplet")]
    InvalidExcludedCodon(String),
    #[error("Field '{field}' must be a nucleotide sequence, got '{value}'")]
    InvalidSequence { field: &'static str, value: String },
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Organism {
    pub name: String,
    pub r_rna: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RestrictionSite {
    #[serde(default)]
    pub name: Option<String>,
    pub site: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProteinSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default)]
    pub ec_numbers: Vec<String>,
}

/// A user-supplied sequence for a feature, optionally frozen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureSpec {
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default)]
    pub fixed: bool,
}

fn default_upstream_length() -> usize {
    DEFAULT_UPSTREAM_LENGTH
}

/// Everything a design job needs to know about the part to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DesignRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub organism: Organism,
    pub target_rate: f64,
    #[serde(default = "default_upstream_length")]
    pub upstream_length: usize,
    pub max_repeats: usize,
    #[serde(default)]
    pub restriction_sites: Vec<RestrictionSite>,
    #[serde(default)]
    pub excluded_codons: Vec<String>,
    pub proteins: Vec<ProteinSpec>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub insulator: FeatureSpec,
    #[serde(default)]
    pub rbs: FeatureSpec,
    #[serde(default)]
    pub fixed_cds: bool,
}

impl DesignRequest {
    /// Reads a request from a `.json` file, or TOML otherwise.
    pub fn load(path: &Path) -> Result<Self, RequestError> {
        let content = std::fs::read_to_string(path).map_err(|e| RequestError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RequestError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if !(self.target_rate > 0.0 && self.target_rate.is_finite()) {
            return Err(RequestError::InvalidTargetRate(self.target_rate));
        }
        if self.max_repeats < 1 {
            return Err(RequestError::InvalidMaxRepeats);
        }
        let r_rna = self.organism.r_rna.trim();
        if r_rna.is_empty() || !is_nucleotide_sequence(r_rna) {
            return Err(RequestError::InvalidRRna(self.organism.r_rna.clone()));
        }
        if self.proteins.is_empty() {
            return Err(RequestError::NoProteins);
        }
        for codon in &self.excluded_codons {
            let codon = codon.trim();
            if codon.len() != 3 || !is_nucleotide_sequence(codon) {
                return Err(RequestError::InvalidExcludedCodon(codon.to_string()));
            }
        }

        let sequences = [
            ("prefix", Some(&self.prefix)),
            ("suffix", Some(&self.suffix)),
            ("insulator.sequence", self.insulator.sequence.as_ref()),
            ("rbs.sequence", self.rbs.sequence.as_ref()),
        ];
        for (field, value) in sequences {
            if let Some(value) = value {
                if !is_nucleotide_sequence(value) {
                    return Err(RequestError::InvalidSequence {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }

        self.constraint_set()?;
        Ok(())
    }

    pub fn constraint_set(&self) -> Result<ConstraintSet, PatternError> {
        let sites: Vec<&str> = self
            .restriction_sites
            .iter()
            .map(|s| s.site.as_str())
            .collect();
        ConstraintSet::from_request(&sites, self.max_repeats)
    }

    /// Upper-cased, de-duplicated excluded codons.
    pub fn normalized_excluded_codons(&self) -> Vec<String> {
        let mut codons: Vec<String> = self
            .excluded_codons
            .iter()
            .map(|c| normalize(c.trim()))
            .collect();
        codons.sort();
        codons.dedup();
        codons
    }

    /// Proteins in request order. Entries without a sequence are resolved
    /// through `lookup`; fields given in the request take precedence.
    pub fn resolve_proteins(
        &self,
        lookup: &dyn ProteinLookup,
    ) -> Result<Vec<ProteinRecord>, LookupError> {
        self.proteins
            .iter()
            .map(|spec| -> Result<ProteinRecord, LookupError> {
                let mut record = match &spec.sequence {
                    Some(raw) => {
                        ProteinRecord::new(&spec.id, ProteinSequence::parse(&spec.id, raw)?)
                    }
                    None => lookup.resolve(&spec.id)?,
                };
                if let Some(name) = &spec.name {
                    record.name = name.clone();
                }
                if spec.description.is_some() {
                    record.description = spec.description.clone();
                }
                if spec.organism.is_some() {
                    record.organism = spec.organism.clone();
                }
                if !spec.ec_numbers.is_empty() {
                    record.ec_numbers = spec.ec_numbers.clone();
                }
                Ok(record)
            })
            .collect()
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.proteins
                .iter()
                .map(|p| p.name.as_deref().unwrap_or(&p.id))
                .join(", ")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protein::ProteinCatalog;
    use tempfile::tempdir;

    const REQUEST: &str = r#"
        target-rate = 15000.0
        max-repeats = 5
        excluded-codons = ["aga", "AGG", "AGA"]

        [organism]
        name = "Escherichia coli"
        r-rna = "acctcctta"

        [[restriction-sites]]
        name = "EcoRI"
        site = "GAATTC"

        [[proteins]]
        id = "P0A7B8"
        name = "hslV"
        sequence = "MTTIVSVRRNGHVVIAGDGQATLGNTVMKGNVKKVRRLYNDKVIAHLGSG"

        [[proteins]]
        id = "P12345"
        ec-numbers = ["1.1.1.1"]

        [rbs]
        fixed = false
    "#;

    #[test]
    fn toml_request_parses_with_defaults() {
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        assert_eq!(request.upstream_length, DEFAULT_UPSTREAM_LENGTH);
        assert_eq!(request.proteins.len(), 2);
        assert_eq!(request.restriction_sites[0].site, "GAATTC");
        assert!(request.prefix.is_empty());
        assert!(request.insulator.sequence.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn load_reads_json_by_extension() {
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(DesignRequest::load(&path).unwrap(), request);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let content = format!("bogus = 1\n{}", REQUEST);
        assert!(matches!(
            DesignRequest::from_toml_str(&content),
            Err(RequestError::Toml(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        let base = DesignRequest::from_toml_str(REQUEST).unwrap();

        let mut request = base.clone();
        request.target_rate = 0.0;
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidTargetRate(_))
        ));

        let mut request = base.clone();
        request.max_repeats = 0;
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidMaxRepeats)
        ));

        let mut request = base.clone();
        request.excluded_codons.push("AG".into());
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidExcludedCodon(_))
        ));

        let mut request = base.clone();
        request.restriction_sites.push(RestrictionSite {
            name: None,
            site: "GA(TC".into(),
        });
        assert!(matches!(request.validate(), Err(RequestError::Pattern(_))));

        let mut request = base;
        request.prefix = "GGXX".into();
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidSequence { field: "prefix", .. })
        ));
    }

    #[test]
    fn excluded_codons_are_normalized_and_deduplicated() {
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        assert_eq!(request.normalized_excluded_codons(), vec!["AGA", "AGG"]);
    }

    #[test]
    fn proteins_without_sequence_are_resolved_through_lookup() {
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        let catalog: ProteinCatalog = std::iter::once(ProteinRecord::new(
            "P12345",
            ProteinSequence::parse("P12345", "MSTNPKPQRK").unwrap(),
        ))
        .collect();

        let records = request.resolve_proteins(&catalog).unwrap();
        assert_eq!(records[0].name, "hslV");
        assert!(records[0].sequence.as_str().ends_with('*'));
        assert_eq!(records[1].sequence.as_str(), "MSTNPKPQRK*");
        assert_eq!(records[1].ec_numbers, vec!["1.1.1.1"]);

        let empty = ProteinCatalog::new();
        assert_eq!(
            request.resolve_proteins(&empty),
            Err(LookupError::NotFound("P12345".into()))
        );
    }
}
