//! Progress tracking and callback system for UI integration

use std::io::Write;
use std::sync::Arc;

use crate::domain::rules::{COMPLETE_PERCENT, MAX_RECORDING_PERCENT};

/// Receives integer percent updates for one run
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressCallback for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Enforces the reporting contract on top of a raw callback.
///
/// Values are nondecreasing and held at or below 99 while recording; 100 is
/// delivered exactly once, by [`ProgressReporter::complete`]. Repeated values
/// are not re-sent.
pub struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    last: Option<u8>,
    completed: bool,
}

impl ProgressReporter {
    pub fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            last: None,
            completed: false,
        }
    }

    /// Report recording progress
    pub fn report(&mut self, percent: u8) {
        if self.completed {
            return;
        }
        let clamped = percent.min(MAX_RECORDING_PERCENT);
        let next = match self.last {
            Some(last) if clamped <= last => return,
            _ => clamped,
        };
        self.last = Some(next);
        self.callback.on_progress(next);
    }

    /// Signal that the artifact is ready
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.last = Some(COMPLETE_PERCENT);
        self.callback.on_progress(COMPLETE_PERCENT);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

/// Console progress bar for CLI usage, drawn on stderr
pub struct ConsoleProgressCallback {
    label: String,
}

impl ConsoleProgressCallback {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, percent: u8) {
        let bar_length = 30;
        let filled = (percent as usize * bar_length) / 100;
        let bar = "#".repeat(filled) + &"-".repeat(bar_length - filled);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{} [{}] {:>3}%", self.label, bar, percent);
        if percent >= COMPLETE_PERCENT {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

/// JSON progress events on stdout for machine consumers
pub struct JsonProgressCallback {
    operation: String,
}

impl JsonProgressCallback {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl ProgressCallback for JsonProgressCallback {
    fn on_progress(&self, percent: u8) {
        let event = serde_json::json!({
            "event": if percent >= COMPLETE_PERCENT { "complete" } else { "progress" },
            "operation": self.operation,
            "percent": percent,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }
}

/// No-op progress callback for when progress tracking is disabled
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _percent: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u8>>>, ProgressReporter) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |p: u8| sink.lock().unwrap().push(p)));
        (seen, reporter)
    }

    #[test]
    fn test_reporter_is_monotonic_and_deduplicated() {
        let (seen, mut reporter) = recorder();
        for p in [0, 5, 5, 3, 40, 39, 41] {
            reporter.report(p);
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 5, 40, 41]);
    }

    #[test]
    fn test_reporter_reserves_one_hundred() {
        let (seen, mut reporter) = recorder();
        reporter.report(100);
        reporter.report(250);
        assert_eq!(*seen.lock().unwrap(), vec![99]);

        reporter.complete();
        reporter.complete();
        reporter.report(50);
        assert_eq!(*seen.lock().unwrap(), vec![99, 100]);
        assert!(reporter.is_complete());
        assert_eq!(reporter.last(), Some(100));
    }

    #[test]
    fn test_complete_without_recording() {
        let (seen, mut reporter) = recorder();
        reporter.complete();
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }
}
