use crate::cli::CheckArgs;
use crate::config::PartialDesignConfig;
use crate::error::{CliError, Result};
use crate::utils::catalog::load_catalog;
use partsgenie::{
    core::{
        models::{
            protein::{ProteinCatalog, ProteinLookup, ProteinSequence},
            request::DesignRequest,
        },
        rbs::{calculator::RbsCalculator, params::RbsParams},
        sequence::constraints::{ConstraintSet, count_matches, count_spurious_start_codons},
        thermo::nearest_neighbor::NearestNeighborBackend,
    },
    engine::error::EngineError,
};
use std::sync::Arc;
use tracing::info;

/// Forbidden-pattern and start-codon counts of one supplied sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub field: &'static str,
    pub length: usize,
    pub forbidden_matches: usize,
    pub start_codons: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub name: String,
    pub target_rate: f64,
    pub target_dg: f64,
    pub patterns: Vec<String>,
    pub excluded_codons: Vec<String>,
    /// Protein id with its resolved length, or `None` when it cannot be resolved.
    pub proteins: Vec<(String, Option<usize>)>,
    pub sequences: Vec<SequenceReport>,
}

pub async fn run(args: CheckArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialDesignConfig::from_file(path)?,
        None => PartialDesignConfig::default(),
    };
    let settings = partial_config.resolve_check(&args)?;

    let request = DesignRequest::load(&args.request).map_err(|e| CliError::FileParsing {
        path: args.request.clone(),
        source: e.into(),
    })?;
    let catalog = match &settings.catalog {
        Some(path) => load_catalog(path)?,
        None => ProteinCatalog::new(),
    };

    let report = inspect(&request, &catalog, &settings.rbs_params)?;
    info!(name = %report.name, patterns = report.patterns.len(), "Request is valid.");
    print_report(&report);
    Ok(())
}

pub fn inspect(
    request: &DesignRequest,
    lookup: &dyn ProteinLookup,
    params: &RbsParams,
) -> Result<CheckReport> {
    request.validate().map_err(EngineError::from)?;
    let constraints = request.constraint_set().map_err(EngineError::from)?;

    let calculator = RbsCalculator::new(
        &request.organism.r_rna,
        Arc::new(NearestNeighborBackend::new()),
        params.clone(),
    );

    let proteins = request
        .proteins
        .iter()
        .map(|spec| {
            let length = match &spec.sequence {
                Some(raw) => ProteinSequence::parse(&spec.id, raw).ok().map(|s| s.len()),
                None => lookup.resolve(&spec.id).ok().map(|r| r.sequence.len()),
            };
            (spec.id.clone(), length)
        })
        .collect();

    let supplied = [
        ("prefix", Some(&request.prefix)),
        ("insulator", request.insulator.sequence.as_ref()),
        ("rbs", request.rbs.sequence.as_ref()),
        ("suffix", Some(&request.suffix)),
    ];
    let sequences = supplied
        .into_iter()
        .filter_map(|(field, seq)| seq.filter(|s| !s.is_empty()).map(|s| (field, s)))
        .map(|(field, seq)| sequence_report(field, seq, &constraints))
        .collect();

    Ok(CheckReport {
        name: request.display_name(),
        target_rate: request.target_rate,
        target_dg: calculator.get_dg(request.target_rate),
        patterns: constraints.fragments().to_vec(),
        excluded_codons: request.normalized_excluded_codons(),
        proteins,
        sequences,
    })
}

fn sequence_report(field: &'static str, sequence: &str, constraints: &ConstraintSet) -> SequenceReport {
    SequenceReport {
        field,
        length: sequence.len(),
        forbidden_matches: count_matches(sequence, constraints),
        start_codons: count_spurious_start_codons(sequence),
    }
}

fn print_report(report: &CheckReport) {
    println!("Request: {}", report.name);
    println!(
        "  Target TIR: {:.2} (ΔG {:.3} kcal/mol)",
        report.target_rate, report.target_dg
    );
    println!("  Forbidden patterns ({}):", report.patterns.len());
    for pattern in &report.patterns {
        println!("    {}", pattern);
    }
    if !report.excluded_codons.is_empty() {
        println!("  Excluded codons: {}", report.excluded_codons.join(", "));
    }
    println!("  Proteins:");
    for (id, length) in &report.proteins {
        match length {
            Some(len) => println!("    {} ({} residues)", id, len),
            None => println!("    {} (unresolved; supply a sequence or --catalog)", id),
        }
    }
    for seq in &report.sequences {
        println!(
            "  {}: {} nt, {} forbidden match(es), {} start codon(s)",
            seq.field, seq.length, seq.forbidden_matches, seq.start_codons
        );
    }
}
