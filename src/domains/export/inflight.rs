//! Shares one pipeline run between concurrent exports of the same output.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domains::export::paths::ExportKind;
use crate::domains::export::types::ExportRecord;
use crate::errors::{ExportError, ExportResult};

pub type SharedExport = Shared<BoxFuture<'static, ExportResult<ExportRecord>>>;

/// Everything that decides which files a run writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InflightKey {
    pub cache_key: String,
    pub kind: ExportKind,
    pub save_dir: String,
}

#[derive(Default)]
pub struct InflightExports {
    // generation id guards against removing a newer run under the same key
    entries: Mutex<HashMap<InflightKey, (Uuid, SharedExport)>>,
}

impl InflightExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the run for `key`, or spawn `run` as the new one.
    /// Returns the shared result and whether an existing run was joined.
    pub fn join_or_start<F>(self: &Arc<Self>, key: InflightKey, identifier: &str, run: F) -> (SharedExport, bool)
    where
        F: FnOnce() -> BoxFuture<'static, ExportResult<ExportRecord>>,
    {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((_, shared)) = entries.get(&key) {
            log::debug!("Joining in-flight export of {} ({})", key.cache_key, key.kind.as_str());
            return (shared.clone(), true);
        }

        let generation = Uuid::new_v4();
        let registry = Arc::clone(self);
        let finished_key = key.clone();
        let future = run();
        let handle = tokio::spawn(async move {
            let result = future.await;
            registry.finish(&finished_key, generation);
            result
        });

        let identifier = identifier.to_string();
        let shared = async move {
            handle.await.unwrap_or_else(|e| {
                Err(ExportError::request_failed(&identifier, format!("Export task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        entries.insert(key, (generation, shared.clone()));
        (shared, false)
    }

    fn finish(&self, key: &InflightKey, generation: Uuid) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.get(key).map(|(current, _)| *current == generation).unwrap_or(false) {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
