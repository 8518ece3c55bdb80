use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use partsgenie::engine::progress::{JobStatus, ProgressCallback, ProgressEvent, ProgressValue};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Renders design events on a single progress bar.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target)
            .with_style(Self::bar_style())
            .with_message("Seeding...");

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |event: &ProgressEvent| {
            let Ok(pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match event.status {
                JobStatus::Running => {
                    if pb_guard.length() != Some(event.max_iterations as u64) {
                        pb_guard.set_length(event.max_iterations as u64);
                    }
                    pb_guard.set_position(event.iteration as u64);
                    pb_guard.set_message(Self::summarize(&event.values));
                }
                JobStatus::Finished => {
                    pb_guard.set_position(event.iteration as u64);
                    pb_guard.finish_with_message(format!("✓ {}", Self::summarize(&event.values)));
                }
                JobStatus::Cancelled => {
                    pb_guard.abandon_with_message("Cancelled");
                }
                JobStatus::Error => {
                    pb_guard.abandon_with_message(format!("Failed: {}", event.message));
                }
            }
        })
    }

    fn summarize(values: &[ProgressValue]) -> String {
        values
            .iter()
            .map(|v| format!("{} {:.2}", v.name, v.value))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("Failed to create bar style template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
