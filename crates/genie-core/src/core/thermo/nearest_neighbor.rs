//! A compact nearest-neighbour folding model.
//!
//! Single strands are folded with a Zuker-style dynamic programme over
//! stacking, hairpin, bulge, interior and multi-branch loops. Two strands are
//! hybridised intermolecularly only, which is the quantity needed for
//! ribosome/mRNA binding. Parameters are 37 °C values; the requested
//! temperature and dangle treatment are accepted but do not rescale energies.

use super::oracle::{
    BasePair, FoldCommand, FoldRequest, FoldResult, FoldingBackend, OracleError, Structure,
};
use phf::{Map, phf_map};
use tracing::{instrument, trace};

const INF: f64 = f64::INFINITY;
const EPSILON: f64 = 1e-9;
const MIN_HAIRPIN: usize = 3;
const MAX_LOOP: usize = 6;
const RT: f64 = 0.61632;
const LOOP_EXTRAPOLATION: f64 = 1.75 * RT;

const MULTI_CLOSING: f64 = 3.4;
const MULTI_UNPAIRED: f64 = 0.0;
const MULTI_BRANCH: f64 = 0.4;
const TERMINAL_AU: f64 = 0.45;
const INTERMOLECULAR_INIT: f64 = 4.1;
const GU_STACK: f64 = -1.3;
const GU_GU_STACK: f64 = -0.5;
const INTERIOR_AU: f64 = 0.7;
const ASYMMETRY: f64 = 0.6;
const MAX_ASYMMETRY: f64 = 3.0;
const MAX_SUBOPT: usize = 50;

/// Watson-Crick stacks keyed by the 5'->3' dinucleotide of the top strand.
static WATSON_CRICK_STACKS: Map<&'static str, f64> = phf_map! {
    "AA" => -0.93, "UU" => -0.93,
    "AU" => -1.10,
    "UA" => -1.33,
    "CU" => -2.08, "AG" => -2.08,
    "CA" => -2.11, "UG" => -2.11,
    "GU" => -2.24, "AC" => -2.24,
    "GA" => -2.35, "UC" => -2.35,
    "CG" => -2.36,
    "GG" => -3.26, "CC" => -3.26,
    "GC" => -3.42,
};

/// Hairpin initiation for loops of 3..=9 unpaired bases.
const HAIRPIN_INIT: [f64; 7] = [5.4, 5.6, 5.7, 5.4, 6.0, 6.1, 6.2];
/// Bulge initiation for 1..=6 unpaired bases.
const BULGE_INIT: [f64; 6] = [3.8, 2.8, 3.2, 3.6, 4.0, 4.4];
/// Interior loop initiation for 2..=6 unpaired bases in total.
const INTERIOR_INIT: [f64; 5] = [0.5, 1.6, 1.1, 2.0, 2.0];

#[inline]
fn can_pair(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'U') | (b'U', b'A') | (b'G', b'C') | (b'C', b'G') | (b'G', b'U') | (b'U', b'G')
    )
}

#[inline]
fn is_watson_crick(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'U') | (b'U', b'A') | (b'G', b'C') | (b'C', b'G')
    )
}

#[inline]
fn terminal_penalty(a: u8, b: u8) -> f64 {
    if matches!(a, b'A' | b'U') || matches!(b, b'A' | b'U') {
        TERMINAL_AU
    } else {
        0.0
    }
}

#[inline]
fn extrapolate(base: f64, base_size: usize, size: usize) -> f64 {
    base + LOOP_EXTRAPOLATION * (size as f64 / base_size as f64).ln()
}

/// Stack of outer pair (a, b) on inner pair (c, d); `a` and `c` are on the
/// 5' strand.
fn stack_energy(a: u8, b: u8, c: u8, d: u8) -> f64 {
    let outer_wc = is_watson_crick(a, b);
    let inner_wc = is_watson_crick(c, d);
    if outer_wc && inner_wc {
        let key = [a, c];
        std::str::from_utf8(&key)
            .ok()
            .and_then(|k| WATSON_CRICK_STACKS.get(k))
            .copied()
            .unwrap_or(GU_STACK)
    } else if !outer_wc && !inner_wc {
        GU_GU_STACK
    } else {
        GU_STACK
    }
}

fn hairpin_energy(s: &[u8], i: usize, j: usize) -> f64 {
    let size = j - i - 1;
    if size < MIN_HAIRPIN {
        return INF;
    }
    let init = if size <= 9 {
        HAIRPIN_INIT[size - MIN_HAIRPIN]
    } else {
        extrapolate(HAIRPIN_INIT[6], 9, size)
    };
    if size == MIN_HAIRPIN {
        init + terminal_penalty(s[i], s[j])
    } else {
        init
    }
}

/// Energy of the loop between outer pair (i, j) and inner pair (k, l).
fn internal_loop_energy(s: &[u8], i: usize, j: usize, k: usize, l: usize) -> f64 {
    let u1 = k - i - 1;
    let u2 = j - l - 1;
    match (u1, u2) {
        (0, 0) => stack_energy(s[i], s[j], s[k], s[l]),
        (0, b) | (b, 0) => {
            if b == 1 {
                BULGE_INIT[0] + stack_energy(s[i], s[j], s[k], s[l])
            } else {
                let init = if b <= 6 {
                    BULGE_INIT[b - 1]
                } else {
                    extrapolate(BULGE_INIT[5], 6, b)
                };
                init + terminal_penalty(s[i], s[j]) + terminal_penalty(s[k], s[l])
            }
        }
        (a, b) => {
            let size = a + b;
            let init = if size <= 6 {
                INTERIOR_INIT[size - 2]
            } else {
                extrapolate(INTERIOR_INIT[4], 6, size)
            };
            let asymmetry = (ASYMMETRY * a.abs_diff(b) as f64).min(MAX_ASYMMETRY);
            let closure = [(s[i], s[j]), (s[k], s[l])]
                .iter()
                .filter(|&&(x, y)| terminal_penalty(x, y) > 0.0)
                .count() as f64
                * INTERIOR_AU;
            init + asymmetry + closure
        }
    }
}

fn encode(sequence: &str) -> Vec<u8> {
    sequence
        .bytes()
        .map(|b| match b.to_ascii_uppercase() {
            b'T' => b'U',
            other => other,
        })
        .collect()
}

struct SingleStrandTables {
    v: Vec<Vec<f64>>,
    wm: Vec<Vec<f64>>,
    w: Vec<f64>,
}

fn fill_single_strand(s: &[u8]) -> SingleStrandTables {
    let n = s.len();
    let mut v = vec![vec![INF; n]; n];
    let mut wm = vec![vec![INF; n]; n];

    for d in (MIN_HAIRPIN + 1)..n {
        for i in 0..(n - d) {
            let j = i + d;
            if can_pair(s[i], s[j]) {
                let mut best = hairpin_energy(s, i, j);

                for k in (i + 1)..j.min(i + MAX_LOOP + 2) {
                    let u1 = k - i - 1;
                    for l in ((k + MIN_HAIRPIN + 1)..j).rev() {
                        let u2 = j - l - 1;
                        if u1 + u2 > MAX_LOOP {
                            break;
                        }
                        if v[k][l].is_finite() {
                            best = best.min(internal_loop_energy(s, i, j, k, l) + v[k][l]);
                        }
                    }
                }

                let closing = MULTI_CLOSING + MULTI_BRANCH + terminal_penalty(s[i], s[j]);
                for u in (i + 2)..(j - 1) {
                    let e = wm[i + 1][u] + wm[u + 1][j - 1];
                    if e.is_finite() {
                        best = best.min(e + closing);
                    }
                }
                v[i][j] = best;
            }

            let mut m = v[i][j] + MULTI_BRANCH + terminal_penalty(s[i], s[j]);
            m = m.min(wm[i + 1][j] + MULTI_UNPAIRED);
            m = m.min(wm[i][j - 1] + MULTI_UNPAIRED);
            for k in (i + 1)..j {
                m = m.min(wm[i][k] + wm[k + 1][j]);
            }
            wm[i][j] = m;
        }
    }

    let mut w = vec![0.0_f64; n + 1];
    for j in 0..n {
        let mut best = w[j];
        for i in 0..j {
            if v[i][j].is_finite() {
                best = best.min(w[i] + v[i][j] + terminal_penalty(s[i], s[j]));
            }
        }
        w[j + 1] = best;
    }

    SingleStrandTables { v, wm, w }
}

#[inline]
fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

enum Frame {
    Exterior(usize),
    Pair(usize, usize),
    Multi(usize, usize),
}

fn traceback_single_strand(s: &[u8], t: &SingleStrandTables) -> Vec<BasePair> {
    let mut pairs = Vec::new();
    let mut stack = vec![Frame::Exterior(s.len())];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Exterior(len) => {
                if len == 0 {
                    continue;
                }
                let j = len - 1;
                if same(t.w[len], t.w[j]) {
                    stack.push(Frame::Exterior(j));
                    continue;
                }
                if let Some(i) = (0..j).find(|&i| {
                    t.v[i][j].is_finite()
                        && same(t.w[len], t.w[i] + t.v[i][j] + terminal_penalty(s[i], s[j]))
                }) {
                    stack.push(Frame::Exterior(i));
                    stack.push(Frame::Pair(i, j));
                }
            }
            Frame::Pair(i, j) => {
                pairs.push((i, j));
                let target = t.v[i][j];
                if same(target, hairpin_energy(s, i, j)) {
                    continue;
                }
                let mut found = false;
                'interior: for k in (i + 1)..j.min(i + MAX_LOOP + 2) {
                    let u1 = k - i - 1;
                    for l in ((k + MIN_HAIRPIN + 1)..j).rev() {
                        if u1 + (j - l - 1) > MAX_LOOP {
                            break;
                        }
                        if t.v[k][l].is_finite()
                            && same(target, internal_loop_energy(s, i, j, k, l) + t.v[k][l])
                        {
                            stack.push(Frame::Pair(k, l));
                            found = true;
                            break 'interior;
                        }
                    }
                }
                if found {
                    continue;
                }
                let closing = MULTI_CLOSING + MULTI_BRANCH + terminal_penalty(s[i], s[j]);
                if let Some(u) = ((i + 2)..(j - 1))
                    .find(|&u| same(target, t.wm[i + 1][u] + t.wm[u + 1][j - 1] + closing))
                {
                    stack.push(Frame::Multi(i + 1, u));
                    stack.push(Frame::Multi(u + 1, j - 1));
                }
            }
            Frame::Multi(i, j) => {
                let target = t.wm[i][j];
                if t.v[i][j].is_finite()
                    && same(
                        target,
                        t.v[i][j] + MULTI_BRANCH + terminal_penalty(s[i], s[j]),
                    )
                {
                    stack.push(Frame::Pair(i, j));
                } else if i < j && same(target, t.wm[i + 1][j] + MULTI_UNPAIRED) {
                    stack.push(Frame::Multi(i + 1, j));
                } else if i < j && same(target, t.wm[i][j - 1] + MULTI_UNPAIRED) {
                    stack.push(Frame::Multi(i, j - 1));
                } else if let Some(k) =
                    ((i + 1)..j).find(|&k| same(target, t.wm[i][k] + t.wm[k + 1][j]))
                {
                    stack.push(Frame::Multi(i, k));
                    stack.push(Frame::Multi(k + 1, j));
                }
            }
        }
    }

    pairs.sort_unstable();
    pairs
}

fn fold_single_strand(s: &[u8]) -> Structure {
    if s.len() <= MIN_HAIRPIN + 1 {
        return Structure::default();
    }
    let tables = fill_single_strand(s);
    let energy = tables.w[s.len()];
    if energy >= 0.0 {
        return Structure::default();
    }
    Structure {
        energy,
        pairs: traceback_single_strand(s, &tables),
    }
}

/// Best duplexes between two strands, one candidate per innermost pair,
/// sorted by energy.
fn duplex_candidates(s: &[u8], n1: usize) -> Vec<Structure> {
    let n = s.len();
    let n2 = n - n1;
    let idx = |i: usize, j: usize| i * n2 + (j - n1);
    let mut c = vec![INF; n1 * n2];
    let mut back: Vec<Option<(usize, usize)>> = vec![None; n1 * n2];

    for i in 0..n1 {
        for j in (n1..n).rev() {
            if !can_pair(s[i], s[j]) {
                continue;
            }
            let mut best = INTERMOLECULAR_INIT + terminal_penalty(s[i], s[j]);
            let mut from = None;
            for p in i.saturating_sub(MAX_LOOP + 1)..i {
                let u1 = i - p - 1;
                for q in (j + 1)..n.min(j + MAX_LOOP + 2 - u1) {
                    let prev = c[idx(p, q)];
                    if !prev.is_finite() {
                        continue;
                    }
                    let e = prev + internal_loop_energy(s, p, q, i, j);
                    if e < best - EPSILON {
                        best = e;
                        from = Some((p, q));
                    }
                }
            }
            c[idx(i, j)] = best;
            back[idx(i, j)] = from;
        }
    }

    let mut candidates = Vec::new();
    for i in 0..n1 {
        for j in n1..n {
            let e = c[idx(i, j)];
            if !e.is_finite() {
                continue;
            }
            let energy = e + terminal_penalty(s[i], s[j]);
            if energy >= 0.0 {
                continue;
            }
            let mut pairs = vec![(i, j)];
            let mut cursor = back[idx(i, j)];
            while let Some((p, q)) = cursor {
                pairs.push((p, q));
                cursor = back[idx(p, q)];
            }
            pairs.sort_unstable();
            candidates.push(Structure { energy, pairs });
        }
    }
    candidates.sort_by(|a, b| a.energy.total_cmp(&b.energy).then(a.pairs.cmp(&b.pairs)));
    candidates
}

fn partner_table(n: usize, pairs: &[BasePair], s: &[u8]) -> Result<Vec<Option<usize>>, String> {
    let mut partner = vec![None; n];
    for &(i, j) in pairs {
        if partner[i].is_some() || partner[j].is_some() {
            return Err(format!("base in pair ({}, {}) is paired twice", i, j));
        }
        if !can_pair(s[i], s[j]) {
            return Err(format!(
                "non-canonical pair {}-{} at ({}, {})",
                s[i] as char, s[j] as char, i, j
            ));
        }
        partner[i] = Some(j);
        partner[j] = Some(i);
    }
    let mut open = Vec::new();
    for (pos, p) in partner.iter().enumerate() {
        if let Some(q) = *p {
            if q > pos {
                open.push(pos);
            } else if open.pop() != Some(q) {
                return Err("crossing base pairs are not supported".to_string());
            }
        }
    }
    Ok(partner)
}

/// Free energy of a nested structure. `nick` is the first index of the second
/// strand, if any; a loop interrupted by the nick is scored as exterior.
fn evaluate_structure(s: &[u8], nick: Option<usize>, pairs: &[BasePair]) -> Result<f64, String> {
    let n = s.len();
    let partner = partner_table(n, pairs, s)?;
    let mut energy = 0.0;

    let mut pos = 0;
    while pos < n {
        match partner[pos] {
            Some(q) if q > pos => {
                energy += terminal_penalty(s[pos], s[q]);
                pos = q + 1;
            }
            _ => pos += 1,
        }
    }

    for &(i, j) in pairs {
        let mut branches = Vec::new();
        let mut k = i + 1;
        while k < j {
            match partner[k] {
                Some(l) if l > k => {
                    branches.push((k, l));
                    k = l + 1;
                }
                _ => k += 1,
            }
        }

        let nicked = nick.is_some_and(|p| {
            i < p && p <= j && !branches.iter().any(|&(k, l)| k < p && p <= l)
        });
        if nicked {
            energy += terminal_penalty(s[i], s[j]);
            for &(k, l) in &branches {
                energy += terminal_penalty(s[k], s[l]);
            }
            continue;
        }

        energy += match branches.as_slice() {
            [] => {
                let e = hairpin_energy(s, i, j);
                if e.is_finite() { e } else { HAIRPIN_INIT[0] }
            }
            [(k, l)] => internal_loop_energy(s, i, j, *k, *l),
            many => {
                MULTI_CLOSING
                    + MULTI_BRANCH * (many.len() + 1) as f64
                    + terminal_penalty(s[i], s[j])
                    + many
                        .iter()
                        .map(|&(k, l)| terminal_penalty(s[k], s[l]))
                        .sum::<f64>()
            }
        };
    }

    if let Some(p) = nick {
        if pairs.iter().any(|&(i, j)| i < p && p <= j) {
            energy += INTERMOLECULAR_INIT;
        }
    }
    Ok(energy)
}

/// In-process folding backend built on a reduced nearest-neighbour model.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborBackend;

impl NearestNeighborBackend {
    pub fn new() -> Self {
        Self
    }
}

impl FoldingBackend for NearestNeighborBackend {
    fn name(&self) -> &str {
        "nearest-neighbor"
    }

    #[instrument(level = "trace", skip_all, fields(strands = request.sequences.len(), length = request.total_length()))]
    fn fold(&self, request: &FoldRequest) -> Result<FoldResult, OracleError> {
        request.validate()?;
        let s = encode(&request.sequences.concat());
        let nick = (request.sequences.len() == 2).then(|| request.sequences[0].len());

        let result = match (&request.command, nick) {
            (FoldCommand::Mfe, None) => FoldResult::single(fold_single_strand(&s)),
            (FoldCommand::Mfe, Some(n1)) => {
                let best = duplex_candidates(&s, n1).into_iter().next();
                FoldResult::single(best.unwrap_or_default())
            }
            (FoldCommand::Subopt { energy_gap }, None) => {
                let mfe = fold_single_strand(&s);
                let mut structures = vec![];
                let open_chain_within_gap = mfe.energy + energy_gap >= 0.0;
                let has_pairs = !mfe.pairs.is_empty();
                if has_pairs {
                    structures.push(mfe);
                }
                if open_chain_within_gap || !has_pairs {
                    structures.push(Structure::default());
                }
                FoldResult { structures }
            }
            (FoldCommand::Subopt { energy_gap }, Some(n1)) => {
                let candidates = duplex_candidates(&s, n1);
                let floor = candidates.first().map_or(0.0, |c| c.energy);
                let mut structures: Vec<Structure> = candidates
                    .into_iter()
                    .take_while(|c| c.energy <= floor + energy_gap + EPSILON)
                    .take(MAX_SUBOPT)
                    .collect();
                if floor + energy_gap >= 0.0 && structures.len() < MAX_SUBOPT {
                    structures.push(Structure::default());
                }
                FoldResult { structures }
            }
            (FoldCommand::Energy { pairs }, nick) => {
                let energy = evaluate_structure(&s, nick, pairs).map_err(OracleError::InvalidRequest)?;
                FoldResult::single(Structure {
                    energy,
                    pairs: pairs.clone(),
                })
            }
        };

        trace!(
            structures = result.structures.len(),
            energy = result.energy(),
            "Fold complete."
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thermo::oracle::{Dangles, to_dot_bracket};

    const TOLERANCE: f64 = 1e-6;

    fn mfe(seq: &str) -> Structure {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::mfe(vec![seq.to_string()], Dangles::Some, 37.0);
        backend.fold(&request).unwrap().best().cloned().unwrap()
    }

    fn energy_of(seqs: &[&str], pairs: Vec<BasePair>) -> f64 {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::energy(
            seqs.iter().map(|s| s.to_string()).collect(),
            pairs,
            Dangles::Some,
            37.0,
        );
        backend.fold(&request).unwrap().energy()
    }

    #[test]
    fn stack_energy_is_symmetric_under_rotation() {
        // 5'-CU-3'/3'-GA-5' equals 5'-AG-3'/3'-UC-5'
        let a = stack_energy(b'C', b'G', b'U', b'A');
        let b = stack_energy(b'A', b'U', b'G', b'C');
        assert!((a - b).abs() < TOLERANCE);
        assert!((a + 2.08).abs() < TOLERANCE);
    }

    #[test]
    fn gc_rich_hairpin_folds_into_a_stem() {
        let structure = mfe("GGGGAAAACCCC");
        assert!(structure.energy < 0.0);
        assert_eq!(to_dot_bracket(12, &structure.pairs), "((((....))))");
    }

    #[test]
    fn unstructured_sequence_has_zero_energy() {
        let structure = mfe("AAAAAAAAAA");
        assert_eq!(structure.energy, 0.0);
        assert!(structure.pairs.is_empty());
    }

    #[test]
    fn energy_of_mfe_structure_matches_mfe() {
        for seq in [
            "GGGGAAAACCCC",
            "GGGAAACCCAGGGAAACCC",
            "ACGUAGCUAGCUAGGCUAGCUUAGCGAUCGAUCGGAUCGA",
            "GGCGCAAGCCUUCGGGCUUGCGCCAAAGGCUAGCCUUAGGCUAGCC",
        ] {
            let structure = mfe(seq);
            let evaluated = energy_of(&[seq], structure.pairs.clone());
            assert!(
                (evaluated - structure.energy).abs() < TOLERANCE,
                "{}: evaluated {} vs mfe {}",
                seq,
                evaluated,
                structure.energy
            );
        }
    }

    #[test]
    fn removing_pairs_from_mfe_never_lowers_energy() {
        let seq = "GGCGCAAGCCUUCGGGCUUGCGCC";
        let structure = mfe(seq);
        let mut reduced = structure.pairs.clone();
        reduced.retain(|&(i, _)| i != structure.pairs[0].0);
        assert!(energy_of(&[seq], reduced) >= structure.energy - TOLERANCE);
    }

    #[test]
    fn shine_dalgarno_hybridises_to_anti_shine_dalgarno() {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::mfe(
            vec!["AAUAAGGAGGUAAA".to_string(), "ACCUCCUUA".to_string()],
            Dangles::Some,
            37.0,
        );
        let best = backend.fold(&request).unwrap().best().cloned().unwrap();
        assert!(best.energy < -8.0);
        assert!(best.pairs.iter().all(|&(i, j)| i < 14 && j >= 14));
        assert_eq!(best.pairs.len(), 9);
    }

    #[test]
    fn duplex_energy_evaluation_matches_hybridisation() {
        let backend = NearestNeighborBackend::new();
        let seqs = vec!["AAUAAGGAGGUAAA".to_string(), "ACCUCCUUA".to_string()];
        let best = backend
            .fold(&FoldRequest::mfe(seqs.clone(), Dangles::Some, 37.0))
            .unwrap()
            .best()
            .cloned()
            .unwrap();
        let evaluated = backend
            .fold(&FoldRequest::energy(seqs, best.pairs.clone(), Dangles::Some, 37.0))
            .unwrap()
            .energy();
        assert!((evaluated - best.energy).abs() < TOLERANCE);
    }

    #[test]
    fn subopt_on_two_strands_stays_within_gap() {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::subopt(
            vec!["AAUAAGGAGGUAAA".to_string(), "ACCUCCUUA".to_string()],
            3.0,
            Dangles::Some,
            37.0,
        );
        let result = backend.fold(&request).unwrap();
        let best = result.energy();
        assert!(result.structures.len() > 1);
        assert!(
            result
                .structures
                .iter()
                .all(|s| s.energy <= best + 3.0 + TOLERANCE)
        );
    }

    #[test]
    fn subopt_without_binding_returns_open_structure() {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::subopt(
            vec!["AAAAAAAA".to_string(), "AAAAAAAA".to_string()],
            3.0,
            Dangles::Some,
            37.0,
        );
        let result = backend.fold(&request).unwrap();
        assert_eq!(result.structures, vec![Structure::default()]);
    }

    #[test]
    fn energy_rejects_non_canonical_pairs() {
        let backend = NearestNeighborBackend::new();
        let request = FoldRequest::energy(
            vec!["AAAAAAAA".to_string()],
            vec![(0, 7)],
            Dangles::Some,
            37.0,
        );
        assert!(matches!(
            backend.fold(&request),
            Err(OracleError::InvalidRequest(_))
        ));
    }

    #[test]
    fn dna_input_is_folded_as_rna() {
        let dna = mfe("GGGGAAAACCCC");
        let rna = mfe("ggggaaaacccc");
        assert_eq!(dna, rna);
        assert_eq!(mfe("GGGGTTTTCCCC").pairs.len(), 4);
    }
}
