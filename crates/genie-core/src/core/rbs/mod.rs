//! Translation initiation model.
//!
//! The free energy of initiation at a start codon is the sum of rRNA
//! hybridisation, a spacing penalty, the start codon contribution and the cost
//! of unfolding the mRNA around the ribosome footprint. Rates follow
//! `exp(-(ΔG - ΔG_ref) / RT_eff)`.

pub mod calculator;
pub mod params;
