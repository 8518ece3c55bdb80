use super::params::RbsParams;
use crate::core::sequence::constraints::{
    ConstraintSet, count_matches, count_spurious_start_codons, start_codon_positions,
};
use crate::core::sequence::{GenerationError, normalize, random_sequence, reverse_complement};
use crate::core::thermo::oracle::{BasePair, FoldRequest, FoldingBackend, OracleError};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Downstream bases included when checking an RBS for forbidden patterns at
/// its junction with the coding sequence.
const JUNCTION_LENGTH: usize = 12;
/// Bounds of the ΔG range mapped onto [0, 1] when sizing the Shine-Dalgarno
/// core of a generated RBS.
const STRONGEST_DG: f64 = -18.0;
const DG_RANGE: f64 = 43.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteEnergy {
    pub dg: f64,
    pub rate: f64,
}

/// Initiation energetics of every start codon in one scored sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThermoResult {
    pub intended: usize,
    pub sites: BTreeMap<usize, SiteEnergy>,
}

impl ThermoResult {
    pub fn intended_site(&self) -> Option<&SiteEnergy> {
        self.sites.get(&self.intended)
    }

    /// Rate at the intended start, zero when it could not be scored.
    pub fn intended_rate(&self) -> f64 {
        self.intended_site().map_or(0.0, |s| s.rate)
    }
}

/// Binding of the rRNA to one upstream window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Hybridisation {
    dg: f64,
    spacing_penalty: f64,
    /// First mRNA base bound by the rRNA (window coordinates).
    site_start: usize,
}

/// Ribosome binding site calculator over a folding backend.
pub struct RbsCalculator {
    r_rna: String,
    oracle: Arc<dyn FoldingBackend>,
    params: RbsParams,
}

impl std::fmt::Debug for RbsCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbsCalculator")
            .field("r_rna", &self.r_rna)
            .field("oracle", &self.oracle.name())
            .field("params", &self.params)
            .finish()
    }
}

impl RbsCalculator {
    pub fn new(r_rna: &str, oracle: Arc<dyn FoldingBackend>, params: RbsParams) -> Self {
        Self {
            r_rna: normalize(r_rna),
            oracle,
            params,
        }
    }

    pub fn r_rna(&self) -> &str {
        &self.r_rna
    }

    pub fn params(&self) -> &RbsParams {
        &self.params
    }

    /// Translation initiation rate for a total initiation free energy.
    pub fn rate_of(&self, dg: f64) -> f64 {
        (-(dg - self.params.reference_dg()) / self.params.rt_eff).exp()
    }

    /// Inverse of [`rate_of`](Self::rate_of).
    pub fn get_dg(&self, rate: f64) -> f64 {
        self.params.reference_dg() - self.params.rt_eff * rate.ln()
    }

    fn mfe(&self, sequence: &str) -> Result<(f64, Vec<BasePair>), OracleError> {
        let request = FoldRequest::mfe(
            vec![sequence.to_string()],
            self.params.dangles,
            self.params.temperature,
        );
        let result = self.oracle.fold(&request)?;
        Ok(result
            .best()
            .map(|s| (s.energy, s.pairs.clone()))
            .unwrap_or_default())
    }

    fn hybridise(&self, upstream: &str) -> Result<Hybridisation, OracleError> {
        let upstream_len = upstream.len();
        let unbound = Hybridisation {
            dg: 0.0,
            spacing_penalty: 0.0,
            site_start: upstream_len,
        };
        if upstream.is_empty() {
            return Ok(unbound);
        }

        let request = FoldRequest::subopt(
            vec![upstream.to_string(), self.r_rna.clone()],
            self.params.subopt_energy_gap,
            self.params.dangles,
            self.params.temperature,
        );
        let result = self.oracle.fold(&request)?;

        let mut best: Option<Hybridisation> = None;
        for structure in &result.structures {
            let inter: Vec<(usize, usize)> = structure
                .pairs
                .iter()
                .filter(|&&(i, j)| i < upstream_len && j >= upstream_len)
                .map(|&(i, j)| (i, j - upstream_len))
                .collect();

            let candidate = match inter.iter().min_by_key(|&&(_, r)| r) {
                None => Hybridisation {
                    dg: structure.energy,
                    ..unbound
                },
                Some(&(i_m, r)) => {
                    let spacing = upstream_len as i64 - (i_m + r) as i64 - 1;
                    Hybridisation {
                        dg: structure.energy,
                        spacing_penalty: self.params.spacing_penalty(spacing),
                        site_start: inter.iter().map(|&(i, _)| i).min().unwrap_or(i_m),
                    }
                }
            };

            let total = candidate.dg + candidate.spacing_penalty;
            if best.is_none_or(|b| total < b.dg + b.spacing_penalty) {
                best = Some(candidate);
            }
        }
        Ok(best.unwrap_or(unbound))
    }

    /// Energy needed to clear the standby site and ribosome footprint of
    /// secondary structure.
    fn unfolding_cost(
        &self,
        window: &str,
        upstream_len: usize,
        site_start: usize,
    ) -> Result<f64, OracleError> {
        let (dg_mrna, pairs) = self.mfe(window)?;
        let lo = site_start.saturating_sub(self.params.standby_length);
        let hi = (upstream_len + self.params.footprint).min(window.len());
        let touches = |p: usize| p >= lo && p < hi;

        let remaining: Vec<BasePair> = pairs
            .iter()
            .copied()
            .filter(|&(i, j)| !touches(i) && !touches(j))
            .collect();
        if remaining.len() == pairs.len() {
            return Ok(0.0);
        }

        let request = FoldRequest::energy(
            vec![window.to_string()],
            remaining,
            self.params.dangles,
            self.params.temperature,
        );
        let dg_open = self.oracle.fold(&request)?.energy();
        Ok(dg_open - dg_mrna)
    }

    fn site_energy(&self, sequence: &str, start: usize) -> Result<SiteEnergy, OracleError> {
        let begin = start.saturating_sub(self.params.cutoff);
        let end = (start + self.params.cutoff).min(sequence.len());
        let upstream = &sequence[begin..start];
        let window = &sequence[begin..end];

        let hybrid = self.hybridise(upstream)?;
        let dg_standby = self.unfolding_cost(window, upstream.len(), hybrid.site_start)?;
        let dg_start = sequence
            .get(start..start + 3)
            .map_or(self.params.non_start_codon_energy, |codon| {
                self.params.start_codon_energy(codon)
            });

        let dg = hybrid.dg + hybrid.spacing_penalty + dg_start + dg_standby;
        trace!(
            start,
            dg_hybrid = hybrid.dg,
            dg_spacing = hybrid.spacing_penalty,
            dg_start,
            dg_standby,
            dg,
            "Scored start site."
        );
        Ok(SiteEnergy {
            dg,
            rate: self.rate_of(dg),
        })
    }

    /// Scores the intended start and every other `NTG` in `sequence`.
    #[instrument(level = "debug", skip_all, fields(len = sequence.len(), intended))]
    pub fn calc_free_energies(
        &self,
        sequence: &str,
        intended: usize,
    ) -> Result<ThermoResult, OracleError> {
        let sequence = normalize(sequence);
        let mut positions = start_codon_positions(&sequence);
        if intended < sequence.len() && !positions.contains(&intended) {
            positions.push(intended);
        }

        let mut sites = BTreeMap::new();
        for start in positions {
            sites.insert(start, self.site_energy(&sequence, start)?);
        }
        debug!(sites = sites.len(), "Computed start site energies.");
        Ok(ThermoResult { intended, sites })
    }

    /// Unintended start sites initiating faster than `rogue_cutoff` of the
    /// target rate.
    pub fn rogue_sites(&self, result: &ThermoResult, target_rate: f64) -> Vec<usize> {
        let threshold = target_rate * self.params.rogue_cutoff;
        result
            .sites
            .iter()
            .filter(|&(&pos, site)| pos != result.intended && site.rate > threshold)
            .map(|(&pos, _)| pos)
            .collect()
    }

    /// Longest base-pair span of the structure around `start`, relative to the
    /// window length.
    pub fn kinetic_score(&self, sequence: &str, start: usize) -> Result<f64, OracleError> {
        let sequence = normalize(sequence);
        let begin = start.saturating_sub(self.params.cutoff);
        let end = (start + self.params.cutoff).min(sequence.len());
        if begin >= end {
            return Ok(0.0);
        }
        let window = &sequence[begin..end];
        let (_, pairs) = self.mfe(window)?;
        let span = pairs.iter().map(|&(i, j)| j - i).max().unwrap_or(0);
        Ok(span as f64 / window.len() as f64)
    }

    /// Random RBS of `length` bases, carrying a Shine-Dalgarno core sized by
    /// how strong `target_dg` asks the site to be.
    #[instrument(level = "debug", skip_all, fields(length, target_dg))]
    pub fn get_initial_rbs<R: Rng + ?Sized>(
        &self,
        length: usize,
        downstream: &str,
        target_dg: f64,
        constraints: &ConstraintSet,
        rng: &mut R,
        max_attempts: usize,
    ) -> Result<String, GenerationError> {
        let downstream = normalize(downstream);
        let sd_core = reverse_complement(&self.r_rna);
        let strength = ((target_dg - STRONGEST_DG) / DG_RANGE).clamp(0.0, 1.0);
        let core_len = (((1.0 - strength) * sd_core.len() as f64).round() as usize)
            .min(sd_core.len())
            .min(length);
        let core_offset = (sd_core.len() - core_len) / 2;
        let core = &sd_core[core_offset..core_offset + core_len];

        let core_end = length
            .saturating_sub(self.params.optimal_spacing.max(0) as usize)
            .max(core_len);
        let core_begin = core_end - core_len;

        let junction = &downstream[..downstream.len().min(JUNCTION_LENGTH)];
        let junction_matches = count_matches(junction, constraints);
        let leader = &downstream[..downstream.len().min(2)];

        for attempt in 1..=max_attempts {
            let mut rbs = random_sequence(length, rng);
            if core_len > 0 && rng.r#gen::<f64>() < 1.0 - strength {
                rbs.replace_range(core_begin..core_end, core);
            }

            let forbidden = count_matches(&format!("{}{}", rbs, junction), constraints);
            if forbidden > junction_matches {
                continue;
            }
            if count_spurious_start_codons(&format!("{}{}", rbs, leader)) > 0 {
                continue;
            }
            debug!(attempt, rbs = %rbs, "Generated initial RBS.");
            return Ok(rbs);
        }

        Err(GenerationError {
            what: "RBS",
            length,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thermo::nearest_neighbor::NearestNeighborBackend;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TOLERANCE: f64 = 1e-9;
    const R_RNA: &str = "acctcctta";

    fn calculator() -> RbsCalculator {
        RbsCalculator::new(
            R_RNA,
            Arc::new(NearestNeighborBackend::new()),
            RbsParams::default(),
        )
    }

    #[test]
    fn rate_and_dg_are_inverse_transforms() {
        let calc = calculator();
        for rate in [0.5, 1.0, 150.0, 15000.0, 1.0e6] {
            let roundtrip = calc.rate_of(calc.get_dg(rate));
            assert!((roundtrip - rate).abs() / rate < 1e-12);
        }
    }

    #[test]
    fn reference_dg_gives_unit_rate() {
        let calc = calculator();
        let dg = calc.params().reference_dg();
        assert!((calc.rate_of(dg) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn lower_dg_gives_higher_rate() {
        let calc = calculator();
        assert!(calc.rate_of(-5.0) > calc.rate_of(0.0));
    }

    #[test]
    fn every_start_codon_and_intended_position_is_scored() {
        let calc = calculator();
        let seq = "CCCCAAACCCCAAACCCCCATGCCCAAACCCAAACCC";
        let result = calc.calc_free_energies(seq, 19).unwrap();
        assert_eq!(result.intended, 19);
        assert_eq!(result.sites.keys().copied().collect::<Vec<_>>(), vec![19]);
        assert!(result.intended_rate() > 0.0);
    }

    #[test]
    fn shine_dalgarno_upstream_raises_the_initiation_rate() {
        let calc = calculator();
        let spacer = "ACAACA";
        let cds = "ATGCCACCACCACCACCACCA";
        let with_sd = format!("CACACACACACACAC{}{}{}", "TAAGGAGGT", spacer, cds);
        let without_sd = format!("CACACACACACACAC{}{}{}", "CACACACAC", spacer, cds);

        let strong = calc
            .calc_free_energies(&with_sd, with_sd.len() - cds.len())
            .unwrap();
        let weak = calc
            .calc_free_energies(&without_sd, without_sd.len() - cds.len())
            .unwrap();
        assert!(strong.intended_rate() > weak.intended_rate());
    }

    #[test]
    fn rogue_sites_exclude_the_intended_position() {
        let calc = calculator();
        let mut sites = BTreeMap::new();
        sites.insert(10, SiteEnergy { dg: 0.0, rate: 500.0 });
        sites.insert(40, SiteEnergy { dg: 0.0, rate: 200.0 });
        sites.insert(70, SiteEnergy { dg: 0.0, rate: 50.0 });
        let result = ThermoResult {
            intended: 10,
            sites,
        };
        assert_eq!(calc.rogue_sites(&result, 1000.0), vec![40]);
    }

    #[test]
    fn kinetic_score_is_a_fraction_of_the_window() {
        let calc = calculator();
        let seq = format!("{}ATG{}", "GGGGCCAAAAGGCCCC".repeat(3), "CCCCAAAAGGGG".repeat(3));
        let score = calc.kinetic_score(&seq, 48).unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.0);
    }

    #[test]
    fn kinetic_score_of_unstructured_window_is_zero() {
        let calc = calculator();
        let seq = "A".repeat(80);
        assert_eq!(calc.kinetic_score(&seq, 40).unwrap(), 0.0);
    }

    #[test]
    fn initial_rbs_is_valid_against_constraints() {
        let calc = calculator();
        let constraints = ConstraintSet::from_request(&["GAATTC"], 4).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let downstream = "ATGGCTAGCAAAGGCGAA";
        let target_dg = calc.get_dg(15000.0);

        let rbs = calc
            .get_initial_rbs(20, downstream, target_dg, &constraints, &mut rng, 1000)
            .unwrap();
        assert_eq!(rbs.len(), 20);
        assert!(!constraints.has_forbidden_pattern(&rbs));
        assert_eq!(count_spurious_start_codons(&format!("{}AT", rbs)), 0);
    }

    #[test]
    fn initial_rbs_generation_reports_exhaustion() {
        let calc = calculator();
        let constraints = ConstraintSet::from_request::<&str>(&[], 1).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let result = calc.get_initial_rbs(35, "ATGAAA", 0.0, &constraints, &mut rng, 5);
        assert_eq!(
            result,
            Err(GenerationError {
                what: "RBS",
                length: 35,
                attempts: 5
            })
        );
    }
}
