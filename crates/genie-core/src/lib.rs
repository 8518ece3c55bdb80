//! # PartsGenie Core Library
//!
//! Designs synthetic DNA parts: a ribosome binding site and codon-optimised
//! coding sequences that reach a target translation initiation rate while
//! avoiding restriction sites, homopolymer runs and spurious start codons.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers from data to entry point.
//!
//! - **[`core`]: The Foundation.** Stateless models (`Feature`, `Construct`, `DesignRequest`,
//!   `DesignRecord`), sequence constraints, codon optimisation, the folding oracle and
//!   its backends, and the RBS calculator.
//!
//! - **[`engine`]: The Logic Core.** The stateful search: configuration, mutation operators,
//!   the staged design solution, the oracle cache and the simulated annealing driver.
//!
//! - **[`workflows`]: The Public API.** [`workflows::design::run`] executes one design job
//!   end to end; [`workflows::job::DesignJob`] runs it on a worker thread.

pub mod core;
pub mod engine;
pub mod workflows;
