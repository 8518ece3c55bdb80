use crate::core::codon::optimizer::CodonOptimizer;
use crate::core::models::protein::ProteinLookup;
use crate::core::models::record::DesignRecord;
use crate::core::models::request::DesignRequest;
use crate::core::rbs::calculator::RbsCalculator;
use crate::core::thermo::oracle::FoldingBackend;
use crate::engine::annealing::{Annealer, AnnealingSolution, CancellationToken, StopReason};
use crate::engine::config::DesignConfig;
use crate::engine::design::{DesignContext, DesignMetrics, DesignSolution};
use crate::engine::error::EngineError;
use crate::engine::progress::{EventEmitter, JobStatus, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// External collaborators of a design job.
#[derive(Clone)]
pub struct DesignServices {
    pub oracle: Arc<dyn FoldingBackend>,
    pub codons: Arc<dyn CodonOptimizer>,
    pub lookup: Arc<dyn ProteinLookup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub reason: StopReason,
    pub iterations: usize,
    pub accepted: usize,
    pub metrics: DesignMetrics,
    pub records: Vec<DesignRecord>,
}

/// Seeds a construct for `request`, anneals it and reports the outcome.
///
/// Every run ends with exactly one terminal event: `Finished` carrying the
/// records, `Cancelled`, or `Error`.
#[instrument(skip_all, name = "design_workflow", fields(job_id = job_id))]
pub fn run(
    request: &DesignRequest,
    config: &DesignConfig,
    services: &DesignServices,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
    job_id: &str,
) -> Result<DesignOutcome, EngineError> {
    let events = EventEmitter::new(reporter, job_id, config.annealing.max_iterations);
    let result = execute(request, config, services, &events, cancel);
    if let Err(err) = &result {
        error!(error = %err, "Design job failed.");
        events.fire_event(
            JobStatus::Error,
            events.last_iteration(),
            err.to_string(),
            Vec::new(),
            None,
        );
    }
    result
}

fn execute(
    request: &DesignRequest,
    config: &DesignConfig,
    services: &DesignServices,
    events: &EventEmitter,
    cancel: &CancellationToken,
) -> Result<DesignOutcome, EngineError> {
    request.validate()?;
    let constraints = request.constraint_set()?;
    let excluded = request.normalized_excluded_codons();
    info!(
        name = %request.display_name(),
        target_rate = request.target_rate,
        patterns = constraints.len(),
        backend = services.oracle.name(),
        "Starting design job."
    );

    let calculator = RbsCalculator::new(
        &request.organism.r_rna,
        Arc::clone(&services.oracle),
        config.rbs_params.clone(),
    );
    let ctx = DesignContext::new(
        config,
        &calculator,
        services.codons.as_ref(),
        &constraints,
        &excluded,
        request.target_rate,
    );
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut solution = DesignSolution::seed(ctx, request, services.lookup.as_ref(), &mut rng)?;

    let annealer = Annealer::new(
        &config.annealing,
        config.oracle_retry,
        cancel.clone(),
        events,
    );
    let outcome = annealer.optimise(&mut solution, &mut rng)?;

    match solution.kinetic_scores() {
        Ok(scores) => debug!(?scores, "Kinetic accessibility of the intended starts."),
        Err(err) => warn!(error = %err, "Kinetic accessibility could not be computed."),
    }

    let records = solution.result();
    let metrics = solution.current().metrics;
    let (message, result) = match outcome.status {
        JobStatus::Finished => (
            format!("Finished after {} iterations", outcome.iterations),
            Some(records.clone()),
        ),
        _ => (
            format!("Cancelled after {} iterations", outcome.iterations),
            None,
        ),
    };
    events.fire_event(
        outcome.status,
        outcome.iterations,
        message,
        solution.progress_values(),
        result,
    );
    info!(
        status = ?outcome.status,
        iterations = outcome.iterations,
        energy = metrics.energy,
        rate = metrics.mean_rate,
        "Design job complete."
    );

    Ok(DesignOutcome {
        job_id: events.job_id().to_string(),
        status: outcome.status,
        reason: outcome.reason,
        iterations: outcome.iterations,
        accepted: outcome.accepted,
        metrics,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codon::optimizer::UsageCodonOptimizer;
    use crate::core::models::protein::ProteinCatalog;
    use crate::core::models::record::ParameterValue;
    use crate::core::sequence::GenerationError;
    use crate::core::thermo::nearest_neighbor::NearestNeighborBackend;
    use crate::core::thermo::oracle::{FoldRequest, FoldResult, OracleError};
    use crate::engine::cache::CachedOracle;
    use crate::engine::config::DesignConfigBuilder;
    use crate::engine::progress::ProgressEvent;
    use std::sync::Mutex;

    const BASE_REQUEST: &str = r#"
        target-rate = 15000.0
        max-repeats = 5

        [organism]
        name = "Escherichia coli"
        r-rna = "acctcctta"

        [[proteins]]
        id = "toy"
        name = "Toy protein"
        organism = "Escherichia coli"
        sequence = "MSKGEELFTG"
    "#;

    struct FailingBackend;

    impl FoldingBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn fold(&self, _request: &FoldRequest) -> Result<FoldResult, OracleError> {
            Err(OracleError::Backend("offline".into()))
        }
    }

    fn services() -> DesignServices {
        DesignServices {
            oracle: Arc::new(CachedOracle::new(Arc::new(NearestNeighborBackend::new()))),
            codons: Arc::new(UsageCodonOptimizer::default()),
            lookup: Arc::new(ProteinCatalog::new()),
        }
    }

    fn config(max_iterations: usize) -> DesignConfig {
        DesignConfigBuilder::new()
            .max_iterations(max_iterations)
            .seed(Some(42))
            .build()
            .unwrap()
    }

    /// Runs a job and returns its outcome together with every event it fired.
    fn run_collecting(
        request: &DesignRequest,
        config: &DesignConfig,
        services: &DesignServices,
        cancel_at: Option<usize>,
    ) -> (Result<DesignOutcome, EngineError>, Vec<ProgressEvent>) {
        let seen = Mutex::new(Vec::new());
        let cancel = CancellationToken::new();
        let observer = cancel.clone();
        let reporter = ProgressReporter::with_callback(Box::new(|e: &ProgressEvent| {
            if cancel_at == Some(e.iteration) && e.status == JobStatus::Running {
                observer.cancel();
            }
            seen.lock().unwrap().push(e.clone());
        }));
        let result = run(request, config, services, &reporter, &cancel, "test-job");
        drop(reporter);
        (result, seen.into_inner().unwrap())
    }

    fn value_of(event: &ProgressEvent, id: &str) -> f64 {
        event
            .values
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.value)
            .unwrap()
    }

    #[test]
    fn short_protein_design_finishes_with_one_record() {
        let request = DesignRequest::from_toml_str(BASE_REQUEST).unwrap();
        let (result, events) = run_collecting(&request, &config(30), &services(), None);
        let outcome = result.unwrap();

        assert_eq!(outcome.status, JobStatus::Finished);
        assert_eq!(outcome.reason, StopReason::BudgetExhausted);
        assert_eq!(outcome.iterations, 30);
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.metadata.name, "Toy protein");
        assert_eq!(record.metadata.description, "Toy protein (Escherichia coli)");
        match record.parameter("CAI") {
            Some(ParameterValue::Number(cai)) => assert!(*cai > 0.0 && *cai <= 1.0),
            other => panic!("unexpected CAI parameter: {:?}", other),
        }
        match record.parameter("TIR") {
            Some(ParameterValue::Number(tir)) => {
                assert_eq!((tir * 100.0).round() / 100.0, *tir);
            }
            other => panic!("unexpected TIR parameter: {:?}", other),
        }

        let last = events.last().unwrap();
        assert_eq!(last.status, JobStatus::Finished);
        assert_eq!(last.job_id, "test-job");
        assert_eq!(last.result.as_ref().map(Vec::len), Some(1));
        assert_eq!(events.iter().filter(|e| e.status.is_terminal()).count(), 1);
        assert!(events[..events.len() - 1].iter().all(|e| e.result.is_none()));
    }

    #[test]
    fn single_repeat_filler_succeeds_only_for_short_lengths() {
        let request_for = |upstream_length: usize| {
            let content = format!(
                "upstream-length = {}\n{}\n[rbs]\nsequence = \"ACAGA\"\nfixed = true\n",
                upstream_length,
                BASE_REQUEST
                    .replace("max-repeats = 5", "max-repeats = 1")
                    .replace("MSKGEELFTG", "M"),
            );
            DesignRequest::from_toml_str(&content).unwrap()
        };

        let (result, _) = run_collecting(&request_for(10), &config(5), &services(), None);
        let outcome = result.unwrap();
        assert_eq!(outcome.status, JobStatus::Finished);
        assert_eq!(outcome.records.len(), 1);

        let (result, events) = run_collecting(&request_for(210), &config(5), &services(), None);
        assert!(matches!(
            result,
            Err(EngineError::Generation(GenerationError {
                what: "filler",
                length: 205,
                ..
            }))
        ));
        let last = events.last().unwrap();
        assert_eq!(last.status, JobStatus::Error);
        assert!(last.result.is_none());
    }

    #[test]
    fn forbidden_site_in_supplied_insulator_is_removed() {
        let content = format!(
            "{}\n[[restriction-sites]]\nname = \"EcoRI\"\nsite = \"GAATTC\"\n\n[insulator]\nsequence = \"CACACAGAATTCACACACAC\"\n",
            BASE_REQUEST
        );
        let request = DesignRequest::from_toml_str(&content).unwrap();
        let (result, events) = run_collecting(&request, &config(500), &services(), None);
        let outcome = result.unwrap();

        assert_eq!(outcome.status, JobStatus::Finished);
        assert_eq!(outcome.metrics.invalid_count, 0);
        let last = events.last().unwrap();
        assert_eq!(value_of(last, "num_invalid_seqs"), 0.0);

        let sequence = &outcome.records[0].sequence_data.content;
        assert!(!sequence.contains("GAATTC"));
    }

    #[test]
    fn cancellation_after_third_iteration_is_reported() {
        let request = DesignRequest::from_toml_str(BASE_REQUEST).unwrap();
        let (result, events) = run_collecting(&request, &config(100), &services(), Some(3));
        let outcome = result.unwrap();

        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.iterations, 3);
        let last = events.last().unwrap();
        assert_eq!(last.status, JobStatus::Cancelled);
        assert_eq!(last.iteration, 3);
        assert!(last.result.is_none());
    }

    #[test]
    fn invalid_request_reports_an_error_event() {
        let request =
            DesignRequest::from_toml_str(&BASE_REQUEST.replace("15000.0", "-1.0")).unwrap();
        let (result, events) = run_collecting(&request, &config(10), &services(), None);

        assert!(matches!(result, Err(EngineError::Request(_))));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, JobStatus::Error);
    }

    #[test]
    fn unavailable_oracle_fails_the_job() {
        let request = DesignRequest::from_toml_str(BASE_REQUEST).unwrap();
        let services = DesignServices {
            oracle: Arc::new(FailingBackend),
            ..services()
        };
        let (result, events) = run_collecting(&request, &config(10), &services, None);

        assert!(matches!(result, Err(EngineError::Oracle(_))));
        assert_eq!(events.last().map(|e| e.status), Some(JobStatus::Error));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let request = DesignRequest::from_toml_str(BASE_REQUEST).unwrap();
        let services = services();
        let (first, _) = run_collecting(&request, &config(20), &services, None);
        let (second, _) = run_collecting(&request, &config(20), &services, None);
        assert_eq!(first.unwrap().records, second.unwrap().records);
    }
}
