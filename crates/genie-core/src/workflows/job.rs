use super::design::{DesignOutcome, DesignServices, run};
use crate::core::models::request::DesignRequest;
use crate::engine::annealing::CancellationToken;
use crate::engine::config::DesignConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{ProgressCallback, ProgressReporter};
use std::thread::{self, JoinHandle};
use tracing::info;
use uuid::Uuid;

/// A design run on its own worker thread.
///
/// Jobs share nothing but the services handed to them, so several can run at
/// once over one cached oracle.
pub struct DesignJob {
    id: String,
    cancel: CancellationToken,
    handle: JoinHandle<Result<DesignOutcome, EngineError>>,
}

impl DesignJob {
    pub fn spawn(
        request: DesignRequest,
        config: DesignConfig,
        services: DesignServices,
        callback: Option<ProgressCallback<'static>>,
    ) -> Result<Self, EngineError> {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        let worker_id = id.clone();
        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("design-{}", &id[..8]))
            .spawn(move || {
                let reporter = match callback {
                    Some(callback) => ProgressReporter::with_callback(callback),
                    None => ProgressReporter::new(),
                };
                run(
                    &request,
                    &config,
                    &services,
                    &reporter,
                    &worker_cancel,
                    &worker_id,
                )
            })
            .map_err(|e| EngineError::Internal(format!("Failed to start design worker: {}", e)))?;

        info!(job_id = %id, "Design job started.");
        Ok(Self { id, cancel, handle })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Asks the worker to stop after its current iteration.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker returns.
    pub fn join(self) -> Result<DesignOutcome, EngineError> {
        self.handle
            .join()
            .map_err(|_| EngineError::Internal(format!("Design worker {} panicked", self.id)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codon::optimizer::UsageCodonOptimizer;
    use crate::core::models::protein::{ProteinCatalog, ProteinRecord, ProteinSequence};
    use crate::core::thermo::nearest_neighbor::NearestNeighborBackend;
    use crate::engine::cache::CachedOracle;
    use crate::engine::config::DesignConfigBuilder;
    use crate::engine::progress::{JobStatus, ProgressEvent};
    use std::sync::{Arc, Mutex};

    const REQUEST: &str = r#"
        target-rate = 5000.0
        max-repeats = 5

        [organism]
        name = "Escherichia coli"
        r-rna = "acctcctta"

        [[proteins]]
        id = "P0A7B8"
    "#;

    fn services(oracle: Arc<CachedOracle>) -> DesignServices {
        let mut catalog = ProteinCatalog::new();
        catalog.insert(ProteinRecord::new(
            "P0A7B8",
            ProteinSequence::parse("P0A7B8", "MTTIVSVRRNG").unwrap(),
        ));
        DesignServices {
            oracle,
            codons: Arc::new(UsageCodonOptimizer::default()),
            lookup: Arc::new(catalog),
        }
    }

    fn config(max_iterations: usize, seed: u64) -> DesignConfig {
        DesignConfigBuilder::new()
            .max_iterations(max_iterations)
            .seed(Some(seed))
            .build()
            .unwrap()
    }

    #[test]
    fn job_runs_to_completion_on_a_worker_thread() {
        let oracle = Arc::new(CachedOracle::new(Arc::new(NearestNeighborBackend::new())));
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback<'static> = Box::new(move |e: &ProgressEvent| {
            sink.lock().unwrap().push((e.job_id.clone(), e.status));
        });

        let job = DesignJob::spawn(request, config(10, 1), services(oracle), Some(callback)).unwrap();
        let id = job.id().to_string();
        let outcome = job.join().unwrap();

        assert_eq!(outcome.job_id, id);
        assert_eq!(outcome.status, JobStatus::Finished);
        assert_eq!(outcome.records.len(), 1);
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|(job, _)| *job == id));
        assert_eq!(seen.last().map(|e| e.1), Some(JobStatus::Finished));
    }

    #[test]
    fn concurrent_jobs_share_one_cache() {
        let oracle = Arc::new(CachedOracle::new(Arc::new(NearestNeighborBackend::new())));
        let jobs: Vec<_> = (0..2)
            .map(|seed| {
                let request = DesignRequest::from_toml_str(REQUEST).unwrap();
                DesignJob::spawn(request, config(5, seed), services(Arc::clone(&oracle)), None)
                    .unwrap()
            })
            .collect();
        assert_ne!(jobs[0].id(), jobs[1].id());

        for job in jobs {
            assert_eq!(job.join().unwrap().status, JobStatus::Finished);
        }
        assert!(oracle.stats().entries > 0);
    }

    #[test]
    fn cancelled_job_stops_early() {
        let oracle = Arc::new(CachedOracle::new(Arc::new(NearestNeighborBackend::new())));
        let request = DesignRequest::from_toml_str(REQUEST).unwrap();
        let job = DesignJob::spawn(request, config(1_000_000, 2), services(oracle), None).unwrap();
        job.cancel();
        let outcome = job.join().unwrap();

        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert!(outcome.iterations < 1_000_000);
    }
}
