use thiserror::Error;

use super::config::ConfigError;
use crate::core::codon::optimizer::CodonError;
use crate::core::models::construct::ConstructError;
use crate::core::models::protein::LookupError;
use crate::core::models::request::RequestError;
use crate::core::sequence::GenerationError;
use crate::core::sequence::constraints::PatternError;
use crate::core::thermo::oracle::OracleError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid design request: {0}")]
    Request(#[from] RequestError),

    #[error("Invalid sequence constraint: {0}")]
    Pattern(#[from] PatternError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Codon optimisation failed: {0}")]
    Codon(#[from] CodonError),

    #[error("Protein lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Invalid construct: {0}")]
    Construct(#[from] ConstructError),

    #[error("Folding oracle call failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Folding oracle unavailable after {failures} consecutive failures: {last}")]
    OracleUnavailable { failures: usize, last: OracleError },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Failures that only invalidate the current iteration.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Oracle(_))
    }
}
