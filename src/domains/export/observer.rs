use crate::domains::export::types::ExportRecord;
use crate::errors::ExportError;

/// Receives the outcome of one export.
/// Exactly one of `on_failed`/`on_finished` is called, after any progress.
pub trait ExportObserver: Send + Sync {
    fn on_progress(&self, identifier: &str, fraction: f32);
    fn on_failed(&self, error: &ExportError);
    fn on_finished(&self, record: &ExportRecord);
}

type ProgressFn = Box<dyn Fn(&str, f32) + Send + Sync>;
type FailedFn = Box<dyn Fn(&ExportError) + Send + Sync>;
type FinishedFn = Box<dyn Fn(&ExportRecord) + Send + Sync>;

/// Observer assembled from closures
pub struct CallbackObserver {
    progress: ProgressFn,
    failed: FailedFn,
    finished: FinishedFn,
}

impl CallbackObserver {
    pub fn new(
        progress: impl Fn(&str, f32) + Send + Sync + 'static,
        failed: impl Fn(&ExportError) + Send + Sync + 'static,
        finished: impl Fn(&ExportRecord) + Send + Sync + 'static,
    ) -> Self {
        Self {
            progress: Box::new(progress),
            failed: Box::new(failed),
            finished: Box::new(finished),
        }
    }
}

impl ExportObserver for CallbackObserver {
    fn on_progress(&self, identifier: &str, fraction: f32) {
        (self.progress)(identifier, fraction)
    }

    fn on_failed(&self, error: &ExportError) {
        (self.failed)(error)
    }

    fn on_finished(&self, record: &ExportRecord) {
        (self.finished)(record)
    }
}
