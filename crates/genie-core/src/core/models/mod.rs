//! # Core Models Module
//!
//! Data structures describing a DNA part under design and the records it
//! produces.
//!
//! ## Key Components
//!
//! - [`feature`] - The tagged segment types of a construct (prefix, insulators, RBS, CDS, stop, suffix)
//! - [`construct`] - Ordered feature list with its layout invariants and region/annotation helpers
//! - [`protein`] - Protein sequences, annotation records and the lookup service interface
//! - [`request`] - The design request as read from TOML or JSON, with validation
//! - [`record`] - The annotated result record emitted per CDS option
//!
//! ## Usage
//!
//! ```ignore
//! use partsgenie::core::models::request::DesignRequest;
//!
//! let request = DesignRequest::load(Path::new("request.toml"))?;
//! request.validate()?;
//! let constraints = request.constraint_set()?;
//! ```

pub mod construct;
pub mod feature;
pub mod protein;
pub mod record;
pub mod request;
