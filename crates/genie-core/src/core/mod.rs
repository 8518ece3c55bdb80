//! # Core Module
//!
//! Stateless building blocks of part design: sequence constraints, codon
//! usage, folding energetics, the translation-initiation model and the data
//! models of constructs, requests and results.
//!
//! ## Architecture
//!
//! - **Sequences** ([`sequence`]) - Nucleotide helpers, forbidden-pattern counting and bounded random generators
//! - **Codons** ([`codon`]) - Genetic code, codon usage tables and codon optimisation
//! - **Thermodynamics** ([`thermo`]) - The folding oracle interface and its backends
//! - **Initiation Model** ([`rbs`]) - Start-site free energies, rates, rogue sites and initial RBS generation
//! - **Data Models** ([`models`]) - Features, constructs, proteins, requests and result records
//! - **Utilities** ([`utils`]) - Small numeric helpers
//!
//! Nothing in this layer holds optimisation state; the [`crate::engine`]
//! layer composes these pieces into a search.

pub mod codon;
pub mod models;
pub mod rbs;
pub mod sequence;
pub mod thermo;
pub mod utils;
