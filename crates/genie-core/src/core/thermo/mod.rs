//! # Thermodynamic Oracle
//!
//! Folding energetics of nucleic-acid strands behind the [`oracle::FoldingBackend`]
//! trait. Three commands are understood: minimum free energy, suboptimal
//! structures within an energy gap, and the energy of a given structure.
//!
//! - [`nearest_neighbor`] folds in-process with a reduced nearest-neighbour model.
//! - [`vienna`] delegates to the ViennaRNA command-line programs.
//!
//! Memoisation lives in the engine (`engine::cache::CachedOracle`) so that one
//! cache can be shared by every job using the same backend.

pub mod nearest_neighbor;
pub mod oracle;
pub mod vienna;
