//! Run-scoped state: intermediate tables and the broadcast snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;

use crate::input::DataTable;
use crate::kiln::RepairConfig;
use crate::schema::TableSchema;
use crate::train::TrainedModels;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Read-only state shared with every repair partition.
#[derive(Debug)]
pub struct Snapshot {
    /// Trained models; their order is the target column list.
    pub models: TrainedModels,
    /// Schema of the input table.
    pub schema: TableSchema,
    /// Configuration of the run.
    pub config: RepairConfig,
}

/// Owns everything a run creates.
///
/// Intermediate tables are registered under run-qualified names. All of them,
/// and the snapshot, are dropped by [`RunContext::release`], which also runs
/// when the context goes out of scope.
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    artifacts: IndexMap<String, DataTable>,
    snapshot: Option<Arc<Snapshot>>,
}

impl RunContext {
    /// Start a new run.
    pub fn new() -> Self {
        let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let run_id = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), seq);
        debug!(run_id = run_id.as_str(), "run context created");
        Self {
            run_id,
            artifacts: IndexMap::new(),
            snapshot: None,
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Keep an intermediate table for the rest of the run; returns its qualified name.
    pub fn register(&mut self, name: &str, table: DataTable) -> String {
        let qualified = format!("kiln_{}_{}", self.run_id, name);
        debug!(
            name = qualified.as_str(),
            rows = table.row_count(),
            "registered intermediate table"
        );
        self.artifacts.insert(name.to_string(), table);
        qualified
    }

    /// An intermediate table by short name.
    pub fn artifact(&self, name: &str) -> Option<&DataTable> {
        self.artifacts.get(name)
    }

    /// Names of the live intermediate tables.
    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }

    /// Publish the read-only snapshot for the repair phase.
    pub fn broadcast(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let shared = Arc::new(snapshot);
        self.snapshot = Some(Arc::clone(&shared));
        shared
    }

    /// The current snapshot, if one was published.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    /// Drop every intermediate table and the snapshot. Safe to call twice.
    pub fn release(&mut self) {
        if self.artifacts.is_empty() && self.snapshot.is_none() {
            return;
        }
        debug!(
            run_id = self.run_id.as_str(),
            tables = self.artifacts.len(),
            "releasing run resources"
        );
        self.artifacts.clear();
        self.snapshot = None;
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataTable {
        DataTable::from_strings(vec!["tid".into()], vec![vec!["1".into()]], b',')
    }

    #[test]
    fn test_register_and_release() {
        let mut ctx = RunContext::new();
        let name = ctx.register("train", table());
        assert!(name.starts_with("kiln_"));
        assert!(name.ends_with("_train"));
        assert_eq!(ctx.artifact("train").unwrap().row_count(), 1);

        let shared = ctx.broadcast(Snapshot {
            models: TrainedModels::default(),
            schema: TableSchema::default(),
            config: RepairConfig::default(),
        });
        assert_eq!(Arc::strong_count(&shared), 2);

        ctx.release();
        assert!(ctx.artifact_names().is_empty());
        assert!(ctx.snapshot().is_none());
        assert_eq!(Arc::strong_count(&shared), 1);
        ctx.release();
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new();
        let b = RunContext::new();
        assert_ne!(a.run_id(), b.run_id());
    }
}
