//! # Engine Module
//!
//! The stateful half of PartsGenie: everything that changes while a design job
//! runs.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Annealing schedule, scoring weights, retry policy and
//!   generator bounds, assembled through [`config::DesignConfigBuilder`]
//! - **Error Handling** ([`error`]) - [`error::EngineError`] and the conversions from every
//!   lower-layer error
//! - **Progress Monitoring** ([`progress`]) - Job events and the callback they are delivered to
//! - **Oracle Cache** ([`cache`]) - Shared memoisation of folding calls
//! - **Transactions** ([`transaction`]) - Committed and proposed copies of the design state
//! - **Mutation Operators** ([`mutation`]) - Constraint-aware edits of fillers, RBS and CDS
//! - **Design Solution** ([`design`]) - Seeding, scoring and the annealing interface of one
//!   construct
//! - **Annealing Driver** ([`annealing`]) - Metropolis loop with cancellation and oracle
//!   failure handling

pub mod annealing;
pub mod cache;
pub mod config;
pub mod design;
pub mod error;
pub mod mutation;
pub mod progress;
pub mod transaction;
