use crate::error::Result;
use partsgenie::engine::progress::ProgressEvent;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Appends progress events to a file as JSON lines.
#[derive(Clone)]
pub struct EventLog {
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl EventLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn record(&self, event: &ProgressEvent) {
        let Ok(mut writer) = self.writer.lock() else {
            warn!("Event log mutex was poisoned. Dropping event.");
            return;
        };
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        // Terminal events are the last a job emits.
        let flushed = written.and_then(|_| {
            if event.status.is_terminal() {
                writer.flush()
            } else {
                Ok(())
            }
        });
        if let Err(e) = flushed {
            warn!(error = %e, "Failed to write progress event.");
        }
    }
}
