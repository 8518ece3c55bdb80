use super::config::{AnnealingConfig, OracleRetryConfig};
use super::error::EngineError;
use super::progress::{EventEmitter, JobStatus, ProgressValue};
use rand::{Rng, RngCore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// A mutable design state the annealer can search over.
///
/// `propose` mutates a working copy only; the committed state changes solely
/// through `commit`.
pub trait AnnealingSolution {
    /// Energy of the committed state.
    fn energy(&self) -> f64;

    /// Mutates the working copy and returns its energy.
    fn propose(&mut self, rng: &mut dyn RngCore) -> Result<f64, EngineError>;

    fn commit(&mut self);

    fn discard(&mut self);

    /// In-progress metrics of the committed state.
    fn progress_values(&self) -> Vec<ProgressValue> {
        Vec::new()
    }
}

/// Shared flag requesting a running search to stop at the next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    ThresholdReached,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingOutcome {
    pub status: JobStatus,
    pub reason: StopReason,
    /// Number of fully completed iterations.
    pub iterations: usize,
    pub accepted: usize,
    pub energy: f64,
}

/// Metropolis criterion. Equal energies are rejected.
pub fn accept<R: Rng + ?Sized>(current: f64, proposed: f64, temperature: f64, rng: &mut R) -> bool {
    if proposed < current {
        true
    } else if proposed == current {
        false
    } else {
        rng.r#gen::<f64>() < ((current - proposed) / temperature).exp()
    }
}

pub struct Annealer<'a> {
    config: &'a AnnealingConfig,
    retry: OracleRetryConfig,
    cancel: CancellationToken,
    events: &'a EventEmitter<'a>,
}

impl<'a> Annealer<'a> {
    pub fn new(
        config: &'a AnnealingConfig,
        retry: OracleRetryConfig,
        cancel: CancellationToken,
        events: &'a EventEmitter<'a>,
    ) -> Self {
        Self {
            config,
            retry,
            cancel,
            events,
        }
    }

    #[instrument(skip_all, name = "simulated_annealing", fields(max_iterations = self.config.max_iterations))]
    pub fn optimise<S: AnnealingSolution>(
        &self,
        solution: &mut S,
        rng: &mut dyn RngCore,
    ) -> Result<AnnealingOutcome, EngineError> {
        info!(
            initial_energy = solution.energy(),
            temperature = self.config.initial_temperature,
            "Starting simulated annealing."
        );

        let mut temperature = self.config.initial_temperature;
        let mut iterations = 0;
        let mut accepted = 0;
        let mut consecutive_failures = 0;

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if iterations >= self.config.max_iterations {
                break StopReason::BudgetExhausted;
            }
            if self
                .config
                .energy_threshold
                .is_some_and(|threshold| solution.energy() <= threshold)
            {
                break StopReason::ThresholdReached;
            }

            match solution.propose(rng) {
                Ok(proposed) => {
                    consecutive_failures = 0;
                    if accept(solution.energy(), proposed, temperature, rng) {
                        solution.commit();
                        accepted += 1;
                    } else {
                        solution.discard();
                    }
                }
                Err(EngineError::Oracle(err)) => {
                    solution.discard();
                    consecutive_failures += 1;
                    warn!(
                        iteration = iterations + 1,
                        consecutive_failures,
                        error = %err,
                        "Folding oracle failed; rejecting iteration."
                    );
                    if consecutive_failures >= self.retry.max_consecutive_failures {
                        return Err(EngineError::OracleUnavailable {
                            failures: consecutive_failures,
                            last: err,
                        });
                    }
                    std::thread::sleep(self.retry.backoff * consecutive_failures as u32);
                }
                Err(err) => {
                    solution.discard();
                    return Err(err);
                }
            }

            iterations += 1;
            temperature *= 1.0 - self.config.cooling_rate;
            debug!(iteration = iterations, energy = solution.energy(), temperature, "Iteration complete.");
            self.events.fire_event(
                JobStatus::Running,
                iterations,
                format!("Energy {:.4}", solution.energy()),
                solution.progress_values(),
                None,
            );
        };

        let status = match reason {
            StopReason::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Finished,
        };
        info!(
            ?reason,
            iterations,
            accepted,
            energy = solution.energy(),
            "Simulated annealing stopped."
        );
        Ok(AnnealingOutcome {
            status,
            reason,
            iterations,
            accepted,
            energy: solution.energy(),
        })
    }
}
