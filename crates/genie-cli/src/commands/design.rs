use crate::cli::{BackendKind, DesignArgs};
use crate::config::{PartialDesignConfig, ResolvedConfig};
use crate::error::{CliError, Result};
use crate::utils::catalog::load_catalog;
use crate::utils::events::EventLog;
use crate::utils::progress::CliProgressHandler;
use partsgenie::{
    core::{
        codon::{optimizer::UsageCodonOptimizer, usage::CodonUsageTable},
        models::{protein::ProteinCatalog, record::DesignRecord, request::DesignRequest},
        thermo::{nearest_neighbor::NearestNeighborBackend, oracle::FoldingBackend, vienna::ViennaBackend},
    },
    engine::{
        cache::CachedOracle,
        progress::{JobStatus, ProgressCallback, ProgressEvent},
    },
    workflows::{design::DesignServices, job::DesignJob},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: DesignArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialDesignConfig::from_file(path)?,
        None => PartialDesignConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let resolved = partial_config.merge_with_cli(&args)?;

    info!("Loading design request from {:?}", &args.request);
    let request = load_request(&args.request)?;
    let (services, cache) = build_services(&resolved)?;

    let progress_handler = CliProgressHandler::new();
    let callback = progress_callback(&progress_handler, args.events.as_deref())?;

    println!("Designing {}...", request.display_name());
    let job = DesignJob::spawn(request, resolved.design, services, Some(callback))?;
    info!(job_id = job.id(), "Design job submitted.");

    let cancel = job.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling the design job.");
            cancel.cancel();
        }
    });

    let joined = tokio::task::spawn_blocking(move || job.join()).await;
    interrupt.abort();
    let outcome = joined
        .map_err(|e| CliError::Other(anyhow::anyhow!("Design worker task failed: {}", e)))??;

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "Folding cache usage."
    );

    match outcome.status {
        JobStatus::Finished => {
            write_records(&outcome.records, args.output.as_deref())?;
            println!(
                "✓ Design finished after {} iterations ({} accepted): TIR {:.2}, CAI {:.3}, {} invalid, {} rogue.",
                outcome.iterations,
                outcome.accepted,
                outcome.metrics.mean_rate,
                outcome.metrics.mean_cai,
                outcome.metrics.invalid_count,
                outcome.metrics.rogue_count,
            );
            if let Some(path) = &args.output {
                println!("  Records written to: {}", path.display());
            }
            Ok(())
        }
        status => Err(CliError::Other(anyhow::anyhow!(
            "Design job {} ended with status {:?} after {} iterations",
            outcome.job_id,
            status,
            outcome.iterations
        ))),
    }
}

fn load_request(path: &Path) -> Result<DesignRequest> {
    DesignRequest::load(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn build_services(resolved: &ResolvedConfig) -> Result<(DesignServices, Arc<CachedOracle>)> {
    let backend: Arc<dyn FoldingBackend> = match resolved.oracle.backend {
        BackendKind::NearestNeighbor => Arc::new(NearestNeighborBackend::new()),
        BackendKind::Vienna => {
            let mut vienna = ViennaBackend::new();
            if let Some(dir) = &resolved.oracle.vienna_bin_dir {
                if !dir.is_dir() {
                    return Err(CliError::Argument(format!(
                        "ViennaRNA directory does not exist: {}",
                        dir.display()
                    )));
                }
                vienna = vienna.with_bin_dir(dir);
            }
            if let Some(timeout) = resolved.oracle.timeout {
                vienna = vienna.with_timeout(timeout);
            }
            Arc::new(vienna)
        }
    };
    info!(backend = backend.name(), "Folding backend selected.");
    let cache = Arc::new(CachedOracle::new(backend));

    let table = match &resolved.codon_usage {
        Some(path) => CodonUsageTable::from_csv_path(path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?,
        None => CodonUsageTable::escherichia_coli(),
    };
    let codons = UsageCodonOptimizer::new(table).with_max_attempts(resolved.design.max_attempts);

    let catalog = match &resolved.catalog {
        Some(path) => load_catalog(path)?,
        None => ProteinCatalog::new(),
    };

    let services = DesignServices {
        oracle: cache.clone(),
        codons: Arc::new(codons),
        lookup: Arc::new(catalog),
    };
    Ok((services, cache))
}

fn progress_callback(
    handler: &CliProgressHandler,
    events_path: Option<&Path>,
) -> Result<ProgressCallback<'static>> {
    let bar = handler.get_callback();
    let log = events_path.map(EventLog::create).transpose()?;
    Ok(Box::new(move |event: &ProgressEvent| {
        bar(event);
        if let Some(log) = &log {
            log.record(event);
        }
    }))
}

fn write_records(records: &[DesignRecord], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), records)?;
        }
        None => println!("{}", serde_json::to_string_pretty(records)?),
    }
    Ok(())
}
