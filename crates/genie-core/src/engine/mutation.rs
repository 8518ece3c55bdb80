use super::error::EngineError;
use crate::core::codon::optimizer::CodonOptimizer;
use crate::core::models::construct::Construct;
use crate::core::models::feature::Feature;
use crate::core::sequence::constraints::{ConstraintSet, count_matches};
use crate::core::sequence::{random_nucleotide, random_substitute, replace_at};
use rand::{Rng, RngCore};
use tracing::trace;

const INSERT_PROBABILITY: f64 = 0.1;
const DELETE_PROBABILITY: f64 = 0.1;

/// What the operators need besides the construct itself.
pub struct MutationContext<'a> {
    pub constraints: &'a ConstraintSet,
    pub codons: &'a dyn CodonOptimizer,
    pub excluded_codons: &'a [String],
    pub max_rbs_length: usize,
    pub cds_mutation_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RbsMove {
    Insert,
    Delete,
    Substitute,
}

/// Applies one round of mutations to every non-fixed feature: filler
/// sequences first, then the RBS, then each CDS option.
pub fn mutate_construct(
    construct: &mut Construct,
    ctx: &MutationContext,
    rng: &mut dyn RngCore,
) -> Result<(), EngineError> {
    mutate_fillers(construct, ctx, rng);
    mutate_rbs(construct, ctx, rng);
    mutate_cds(construct, ctx, rng)
}

fn is_filler(feature: &Feature) -> bool {
    matches!(feature, Feature::Flanking { .. } | Feature::Insulator { .. })
}

/// Point substitution in every mutable prefix or insulator. The upstream
/// insulator is validated together with the RBS that follows it; any other
/// filler together with the feature before it.
pub fn mutate_fillers(construct: &mut Construct, ctx: &MutationContext, rng: &mut dyn RngCore) {
    let upstream = construct.upstream_insulator_index();
    let rbs = construct.rbs_index();

    for index in 0..construct.features().len() {
        let feature = &construct.features()[index];
        if !is_filler(feature) || feature.is_fixed() {
            continue;
        }
        let current = feature.sequence_for(0).to_string();
        if current.is_empty() {
            continue;
        }
        let pos = rng.gen_range(0..current.len());
        let base = current.as_bytes()[pos] as char;
        let mutated = replace_at(&current, pos, random_substitute(base, rng));

        let joined = if Some(index) == upstream {
            format!("{}{}", mutated, construct.features()[rbs].sequence_for(0))
        } else {
            let before = index
                .checked_sub(1)
                .map_or("", |i| construct.features()[i].sequence_for(0));
            format!("{}{}", before, mutated)
        };

        if ctx.constraints.is_valid(&joined) {
            trace!(index, pos, "Accepted filler substitution.");
            if let Some(seq) = construct.feature_mut(index).and_then(Feature::sequence_mut) {
                *seq = mutated;
            }
        }
    }
}

/// Insert, delete or substitute one RBS base. Length changes are absorbed by
/// the upstream insulator so the distance to the prefix is kept.
pub fn mutate_rbs(construct: &mut Construct, ctx: &MutationContext, rng: &mut dyn RngCore) {
    let rbs_index = construct.rbs_index();
    if construct.features()[rbs_index].is_fixed() {
        return;
    }
    let upstream = construct
        .upstream_insulator_index()
        .filter(|&i| !construct.features()[i].is_fixed());

    let rbs = construct.rbs_sequence().to_string();
    let insulator = construct
        .upstream_insulator_index()
        .map_or(String::new(), |i| {
            construct.features()[i].sequence_for(0).to_string()
        });

    let draw: f64 = rng.r#gen();
    let rbs_move = if upstream.is_some()
        && draw < INSERT_PROBABILITY
        && rbs.len() < ctx.max_rbs_length
        && !insulator.is_empty()
    {
        RbsMove::Insert
    } else if upstream.is_some() && draw < INSERT_PROBABILITY + DELETE_PROBABILITY && rbs.len() > 1 {
        RbsMove::Delete
    } else if rbs.is_empty() {
        return;
    } else {
        RbsMove::Substitute
    };

    let (new_insulator, new_rbs) = match rbs_move {
        RbsMove::Insert => {
            let pos = rng.gen_range(0..=rbs.len());
            let mut new_rbs = rbs.clone();
            new_rbs.insert(pos, random_nucleotide(rng));
            (insulator[1..].to_string(), new_rbs)
        }
        RbsMove::Delete => {
            let pos = rng.gen_range(0..rbs.len());
            let mut new_rbs = rbs.clone();
            new_rbs.remove(pos);
            let extended = format!("{}{}", random_nucleotide(rng), insulator);
            (extended, new_rbs)
        }
        RbsMove::Substitute => {
            let pos = rng.gen_range(0..rbs.len());
            let base = rbs.as_bytes()[pos] as char;
            (
                insulator.clone(),
                replace_at(&rbs, pos, random_substitute(base, rng)),
            )
        }
    };

    if !ctx
        .constraints
        .is_valid(&format!("{}{}", new_insulator, new_rbs))
    {
        return;
    }
    trace!(?rbs_move, length = new_rbs.len(), "Accepted RBS mutation.");

    if let Some(seq) = construct.feature_mut(rbs_index).and_then(Feature::sequence_mut) {
        *seq = new_rbs;
    }
    if let Some(index) = upstream {
        if let Some(seq) = construct.feature_mut(index).and_then(Feature::sequence_mut) {
            *seq = new_insulator;
        }
    }
}

/// Synonymous codon changes in every CDS option, at an expected
/// `cds_mutation_scale` changes per protein. A change that adds forbidden
/// patterns is dropped. Patterns are counted with the RBS and the stop codon
/// attached, so sites spanning either junction count too.
pub fn mutate_cds(
    construct: &mut Construct,
    ctx: &MutationContext,
    rng: &mut dyn RngCore,
) -> Result<(), EngineError> {
    let cds_index = construct.cds_index();
    if construct.features()[cds_index].is_fixed() {
        return Ok(());
    }
    let rbs = construct.rbs_sequence().to_string();
    let stop = construct
        .features()
        .get(cds_index + 1)
        .filter(|f| matches!(f, Feature::Stop { .. }))
        .map(|f| f.sequence_for(0).to_string())
        .unwrap_or_default();
    let in_context =
        |cds: &str| count_matches(&format!("{}{}{}", rbs, cds, stop), ctx.constraints);

    for option in construct.cds_options_mut() {
        let rate = ctx.cds_mutation_scale / option.protein.sequence.len() as f64;
        let mutated = ctx.codons.mutate(
            option.protein.sequence.coding_residues(),
            &option.sequence,
            rate,
            ctx.excluded_codons,
            rng,
        )?;
        if in_context(&mutated) <= in_context(&option.sequence) {
            option.sequence = mutated;
        }
    }
    Ok(())
}
