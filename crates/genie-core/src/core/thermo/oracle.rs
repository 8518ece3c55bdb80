use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Base pair as 0-based indices into the concatenation of all strands.
pub type BasePair = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dangles {
    None,
    #[default]
    Some,
    All,
}

impl Dangles {
    /// Numeric treatment level understood by folding tools.
    pub fn level(self) -> u8 {
        match self {
            Dangles::None => 0,
            Dangles::Some => 1,
            Dangles::All => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FoldCommand {
    /// Minimum free energy structure.
    Mfe,
    /// All structures within `energy_gap` of the minimum.
    Subopt { energy_gap: f64 },
    /// Free energy of the given structure.
    Energy { pairs: Vec<BasePair> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldRequest {
    pub command: FoldCommand,
    pub sequences: Vec<String>,
    pub dangles: Dangles,
    pub temperature: f64,
}

/// Exact identity of a request, usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FoldKey {
    command: &'static str,
    sequences: Vec<String>,
    dangles: Dangles,
    temperature_bits: u64,
    gap_bits: Option<u64>,
    pairs: Option<Vec<BasePair>>,
}

impl FoldRequest {
    pub fn mfe(sequences: Vec<String>, dangles: Dangles, temperature: f64) -> Self {
        Self {
            command: FoldCommand::Mfe,
            sequences,
            dangles,
            temperature,
        }
    }

    pub fn subopt(
        sequences: Vec<String>,
        energy_gap: f64,
        dangles: Dangles,
        temperature: f64,
    ) -> Self {
        Self {
            command: FoldCommand::Subopt { energy_gap },
            sequences,
            dangles,
            temperature,
        }
    }

    pub fn energy(
        sequences: Vec<String>,
        pairs: Vec<BasePair>,
        dangles: Dangles,
        temperature: f64,
    ) -> Self {
        Self {
            command: FoldCommand::Energy { pairs },
            sequences,
            dangles,
            temperature,
        }
    }

    pub fn key(&self) -> FoldKey {
        let (command, gap_bits, pairs) = match &self.command {
            FoldCommand::Mfe => ("mfe", None, None),
            FoldCommand::Subopt { energy_gap } => ("subopt", Some(energy_gap.to_bits()), None),
            FoldCommand::Energy { pairs } => ("energy", None, Some(pairs.clone())),
        };
        FoldKey {
            command,
            sequences: self.sequences.clone(),
            dangles: self.dangles,
            temperature_bits: self.temperature.to_bits(),
            gap_bits,
            pairs,
        }
    }

    pub fn total_length(&self) -> usize {
        self.sequences.iter().map(String::len).sum()
    }

    pub(crate) fn validate(&self) -> Result<(), OracleError> {
        if self.sequences.is_empty() || self.sequences.len() > 2 {
            return Err(OracleError::InvalidRequest(format!(
                "expected one or two strands, got {}",
                self.sequences.len()
            )));
        }
        if let FoldCommand::Energy { pairs } = &self.command {
            let n = self.total_length();
            for &(i, j) in pairs {
                if i >= j || j >= n {
                    return Err(OracleError::InvalidRequest(format!(
                        "base pair ({}, {}) is out of range for length {}",
                        i, j, n
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub energy: f64,
    pub pairs: Vec<BasePair>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FoldResult {
    pub structures: Vec<Structure>,
}

impl FoldResult {
    pub fn single(structure: Structure) -> Self {
        Self {
            structures: vec![structure],
        }
    }

    /// Lowest-energy structure, if any.
    pub fn best(&self) -> Option<&Structure> {
        self.structures
            .iter()
            .min_by(|a, b| a.energy.total_cmp(&b.energy))
    }

    pub fn energy(&self) -> f64 {
        self.best().map_or(0.0, |s| s.energy)
    }
}

#[derive(Debug, Error, Clone)]
pub enum OracleError {
    #[error("Invalid folding request: {0}")]
    InvalidRequest(String),

    #[error("Folding tool '{executable}' was not found; install it or set {env_var}")]
    ToolNotFound {
        executable: String,
        env_var: &'static str,
    },

    #[error("Folding tool '{executable}' exited with status {status}: {stderr}")]
    ToolFailed {
        executable: String,
        status: String,
        stderr: String,
    },

    #[error("Folding tool '{executable}' timed out after {timeout:?}")]
    Timeout {
        executable: String,
        timeout: Duration,
    },

    #[error("Could not parse output of '{executable}': {message}")]
    MalformedOutput { executable: String, message: String },

    #[error("Folding backend failure: {0}")]
    Backend(String),
}

/// A source of nucleic-acid folding energetics.
pub trait FoldingBackend: Send + Sync {
    fn name(&self) -> &str;

    fn fold(&self, request: &FoldRequest) -> Result<FoldResult, OracleError>;
}

pub fn to_dot_bracket(length: usize, pairs: &[BasePair]) -> String {
    let mut chars = vec!['.'; length];
    for &(i, j) in pairs {
        if i < length && j < length {
            chars[i] = '(';
            chars[j] = ')';
        }
    }
    chars.into_iter().collect()
}

/// Parses dot-bracket notation; `&` strand separators are skipped so indices
/// refer to the concatenated sequence.
pub fn parse_dot_bracket(structure: &str) -> Result<Vec<BasePair>, String> {
    let mut stack = Vec::new();
    let mut pairs = Vec::new();
    let mut index = 0usize;
    for c in structure.chars() {
        match c {
            '(' => {
                stack.push(index);
                index += 1;
            }
            ')' => {
                let open = stack
                    .pop()
                    .ok_or_else(|| format!("unbalanced ')' at position {}", index))?;
                pairs.push((open, index));
                index += 1;
            }
            '.' => index += 1,
            '&' => {}
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    if !stack.is_empty() {
        return Err(format!("{} unclosed '('", stack.len()));
    }
    pairs.sort_unstable();
    Ok(pairs)
}
