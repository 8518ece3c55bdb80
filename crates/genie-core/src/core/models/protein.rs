use crate::core::codon::genetic_code::{self, STOP};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static UNIPROT_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2}|[OPQ][0-9][A-Z0-9]{3}[0-9])(?:\.\d+)?$",
    )
    .expect("UniProt accession pattern must compile")
});

pub fn is_uniprot_accession(id: &str) -> bool {
    UNIPROT_ACCESSION.is_match(id)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Protein '{0}' is unknown to the lookup service")]
    NotFound(String),
    #[error("Protein '{id}' has an invalid sequence: unexpected residue '{residue}'")]
    InvalidSequence { id: String, residue: char },
    #[error("Protein '{0}' has an empty sequence")]
    EmptySequence(String),
}

/// Amino-acid sequence terminated by exactly one stop (`*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProteinSequence(String);

impl ProteinSequence {
    /// Upper-cases, drops whitespace and appends the terminal stop when absent.
    pub fn parse(id: &str, raw: &str) -> Result<Self, LookupError> {
        let mut residues: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if residues.ends_with(STOP) {
            residues.pop();
        }
        if residues.is_empty() {
            return Err(LookupError::EmptySequence(id.to_string()));
        }
        if let Some(residue) = residues
            .chars()
            .find(|&c| c == STOP || !genetic_code::is_amino_acid(c))
        {
            return Err(LookupError::InvalidSequence {
                id: id.to_string(),
                residue,
            });
        }
        residues.push(STOP);
        Ok(Self(residues))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Residues encoded by the CDS, without the terminal stop.
    pub fn coding_residues(&self) -> &str {
        &self.0[..self.0.len() - 1]
    }

    /// Length including the stop.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProteinSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProteinRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub organism: Option<String>,
    pub sequence: ProteinSequence,
    pub ec_numbers: Vec<String>,
}

impl ProteinRecord {
    pub fn new(id: &str, sequence: ProteinSequence) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            organism: None,
            sequence,
            ec_numbers: Vec::new(),
        }
    }

    pub fn uniprot_id(&self) -> Option<&str> {
        is_uniprot_accession(&self.id).then_some(self.id.as_str())
    }
}

/// Resolves protein identifiers to sequences and annotations.
pub trait ProteinLookup: Send + Sync {
    fn resolve(&self, id: &str) -> Result<ProteinRecord, LookupError>;
}

/// In-memory protein annotations.
#[derive(Debug, Clone, Default)]
pub struct ProteinCatalog {
    entries: HashMap<String, ProteinRecord>,
}

impl ProteinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ProteinRecord) {
        self.entries.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ProteinRecord> for ProteinCatalog {
    fn from_iter<I: IntoIterator<Item = ProteinRecord>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for record in iter {
            catalog.insert(record);
        }
        catalog
    }
}

impl ProteinLookup for ProteinCatalog {
    fn resolve(&self, id: &str) -> Result<ProteinRecord, LookupError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(id.to_string()))
    }
}
