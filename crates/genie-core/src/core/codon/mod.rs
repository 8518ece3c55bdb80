//! Codon-level knowledge: the standard genetic code, organism codon usage, and
//! the optimiser that back-translates and synonymously mutates coding
//! sequences.

pub mod genetic_code;
pub mod optimizer;
pub mod usage;
