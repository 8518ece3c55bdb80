use crate::core::models::record::DesignRecord;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Finished,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One in-progress metric with display bounds and its goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressValue {
    pub id: &'static str,
    pub name: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub iteration: usize,
    pub max_iterations: usize,
    pub message: String,
    pub values: Vec<ProgressValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<DesignRecord>>,
}

pub type ProgressCallback<'a> = Box<dyn Fn(&ProgressEvent) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: &ProgressEvent) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

/// Stamps events of one job with its identity and iteration budget.
pub struct EventEmitter<'a> {
    reporter: &'a ProgressReporter<'a>,
    job_id: String,
    max_iterations: usize,
    last_iteration: AtomicUsize,
}

impl<'a> EventEmitter<'a> {
    pub fn new(reporter: &'a ProgressReporter<'a>, job_id: &str, max_iterations: usize) -> Self {
        Self {
            reporter,
            job_id: job_id.to_string(),
            max_iterations,
            last_iteration: AtomicUsize::new(0),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Iteration carried by the most recent event.
    pub fn last_iteration(&self) -> usize {
        self.last_iteration.load(Ordering::Relaxed)
    }

    pub fn fire_event(
        &self,
        status: JobStatus,
        iteration: usize,
        message: String,
        values: Vec<ProgressValue>,
        result: Option<Vec<DesignRecord>>,
    ) {
        self.last_iteration.store(iteration, Ordering::Relaxed);
        self.reporter.report(&ProgressEvent {
            job_id: self.job_id.clone(),
            status,
            iteration,
            max_iterations: self.max_iterations,
            message,
            values,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(status: JobStatus) -> ProgressEvent {
        ProgressEvent {
            job_id: "job".into(),
            status,
            iteration: 3,
            max_iterations: 10,
            message: String::new(),
            values: Vec::new(),
            result: None,
        }
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(&event(JobStatus::Running));
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e: &ProgressEvent| {
            seen.lock().unwrap().push(e.status);
        }));
        reporter.report(&event(JobStatus::Running));
        reporter.report(&event(JobStatus::Finished));
        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![JobStatus::Running, JobStatus::Finished]
        );
    }

    #[test]
    fn emitter_stamps_job_identity() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e: &ProgressEvent| {
            seen.lock().unwrap().push(e.clone());
        }));
        let emitter = EventEmitter::new(&reporter, "job-42", 500);
        emitter.fire_event(JobStatus::Cancelled, 7, "stopped".into(), Vec::new(), None);
        assert_eq!(emitter.last_iteration(), 7);
        drop(emitter);
        drop(reporter);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].job_id, "job-42");
        assert_eq!(seen[0].max_iterations, 500);
        assert_eq!(seen[0].iteration, 7);
        assert_eq!(seen[0].status, JobStatus::Cancelled);
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn result_is_omitted_from_json_when_absent() {
        let json = serde_json::to_value(event(JobStatus::Running)).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json.get("result").is_none());
    }
}
