use crate::core::thermo::oracle::Dangles;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Constants of the translation-initiation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RbsParams {
    /// Apparent Boltzmann factor, kcal/mol.
    pub rt_eff: f64,
    /// Natural log of the proportionality constant between rate and
    /// `exp(-ΔG / RT_eff)`.
    pub log_k: f64,
    /// Nucleotides upstream (and downstream) of a start codon folded with it.
    pub cutoff: usize,
    /// Ribosome footprint downstream of the start codon.
    pub footprint: usize,
    /// Standby site length upstream of the rRNA binding site.
    pub standby_length: usize,
    pub optimal_spacing: i64,
    /// Penalty coefficients for spacings shorter than optimal.
    pub spacing_push: [f64; 4],
    /// Quadratic, linear and constant coefficients for longer spacings.
    pub spacing_pull: [f64; 3],
    pub subopt_energy_gap: f64,
    pub start_codon_energies: BTreeMap<String, f64>,
    /// Energy assigned to an intended start that is not a known start codon.
    pub non_start_codon_energy: f64,
    pub max_rbs_length: usize,
    /// Fraction of the target rate above which an unintended site is rogue.
    pub rogue_cutoff: f64,
    pub dangles: Dangles,
    pub temperature: f64,
}

impl Default for RbsParams {
    fn default() -> Self {
        Self {
            rt_eff: 2.222,
            log_k: 7.824,
            cutoff: 35,
            footprint: 13,
            standby_length: 4,
            optimal_spacing: 5,
            spacing_push: [12.2, 2.5, 2.0, 3.0],
            spacing_pull: [0.048, 0.24, 0.0],
            subopt_energy_gap: 3.0,
            start_codon_energies: [
                ("ATG", -1.194),
                ("GTG", -0.0748),
                ("TTG", -0.0435),
                ("CTG", -0.03406),
            ]
            .into_iter()
            .map(|(codon, dg)| (codon.to_string(), dg))
            .collect(),
            non_start_codon_energy: 0.0,
            max_rbs_length: 35,
            rogue_cutoff: 0.1,
            dangles: Dangles::All,
            temperature: 37.0,
        }
    }
}

impl RbsParams {
    /// Reads a TOML file; omitted keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    #[inline]
    pub fn reference_dg(&self) -> f64 {
        self.rt_eff * self.log_k
    }

    pub fn start_codon_energy(&self, codon: &str) -> f64 {
        self.start_codon_energies
            .get(&crate::core::sequence::normalize(codon))
            .copied()
            .unwrap_or(self.non_start_codon_energy)
    }

    /// Penalty for an rRNA binding site `spacing` nucleotides upstream of the
    /// start codon.
    pub fn spacing_penalty(&self, spacing: i64) -> f64 {
        let ds = (spacing - self.optimal_spacing) as f64;
        if ds < 0.0 {
            let [c1, c2, c3, c4] = self.spacing_push;
            c1 / (1.0 + (c2 * (ds + c3)).exp()).powf(c4)
        } else {
            let [c1, c2, c3] = self.spacing_pull;
            c1 * ds * ds + c2 * ds + c3
        }
    }
}
