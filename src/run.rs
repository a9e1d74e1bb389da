//! Reconciliation run: load both sides, then match, merge and write back
//! every YACReader record in turn.
//!
//! State machine:
//! Init -> Loaded -> Running -> Completed | Cancelled
//! Init -> Aborted (source or store failed to load; nothing processed)

use crate::error::{Result, SyncError};
use crate::merge::stage_fields;
use crate::models::{
    FieldMapping, Outcome, RunReport, RunState, RunStatistics, TargetRecord,
    DEFAULT_FIELD_MAPPINGS,
};
use crate::progress::ProgressSink;
use crate::source::SourceCatalog;
use crate::store::TargetStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Inputs of one run, captured once at start.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub store_path: PathBuf,
    pub source_path: PathBuf,
    /// Overwrite every mapped field except the page position.
    pub overwrite_all: bool,
    /// Log each update statement with its values substituted.
    pub verbose: bool,
}

/// Cooperative cancellation, checked between records.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
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

pub struct ReconciliationRun {
    config: RunConfig,
    mappings: &'static [FieldMapping],
    state: RunState,
    catalog: Option<SourceCatalog>,
    store: Option<TargetStore>,
    stats: RunStatistics,
}

impl ReconciliationRun {
    pub fn new(config: RunConfig) -> Self {
        Self::with_mappings(config, DEFAULT_FIELD_MAPPINGS)
    }

    pub fn with_mappings(config: RunConfig, mappings: &'static [FieldMapping]) -> Self {
        Self {
            config,
            mappings,
            state: RunState::Init,
            catalog: None,
            store: None,
            stats: RunStatistics::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> RunStatistics {
        self.stats
    }

    pub fn report(&self) -> RunReport {
        RunReport { state: self.state, stats: self.stats }
    }

    /// Init -> Loaded: open the database and parse the ComicRack document.
    /// Either failure moves the run to Aborted.
    pub fn load(&mut self) -> Result<()> {
        self.expect_state(RunState::Init)?;

        let loaded = TargetStore::open(&self.config.store_path, self.mappings).and_then(|store| {
            let catalog = SourceCatalog::load(&self.config.source_path)?;
            Ok((store, catalog))
        });

        match loaded {
            Ok((store, catalog)) => {
                self.store = Some(store);
                self.catalog = Some(catalog);
                self.state = RunState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Aborted;
                Err(e)
            }
        }
    }

    /// Loaded -> Running -> Completed (or Cancelled).
    ///
    /// Targets are snapshotted once; rows inserted meanwhile are not seen.
    pub fn execute(&mut self, progress: &dyn ProgressSink, cancel: &CancelToken) -> Result<RunStatistics> {
        self.expect_state(RunState::Loaded)?;
        let (Some(mut store), Some(catalog)) = (self.store.take(), self.catalog.take()) else {
            return Err(SyncError::InvalidState { actual: self.state, expected: RunState::Loaded });
        };

        let targets = match store.list_targets() {
            Ok(targets) => targets,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e);
            }
        };

        self.state = RunState::Running;
        self.stats = RunStatistics::default();
        let total = targets.len();
        info!("Processing {} comics...", total);

        for (index, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Run cancelled after {} of {} comics", index, total);
                self.state = RunState::Cancelled;
                break;
            }
            self.process_one(&mut store, &catalog, target);
            progress.report(index + 1, total);
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
        info!(
            "Processing {} comics completed; {} unchanged, {} updated, and {} not found ComicRack info.",
            total, self.stats.unchanged, self.stats.updated, self.stats.missing
        );

        if let Err(e) = store.close() {
            warn!("Error while closing YACReader database: {}", e);
        }
        Ok(self.stats)
    }

    fn process_one(&mut self, store: &mut TargetStore, catalog: &SourceCatalog, target: &TargetRecord) {
        // A NULL path has no counterpart in the document
        let Some(book) = target.path.as_deref().and_then(|path| catalog.find_by_path(path)) else {
            warn!(
                "No ComicRack info found for ComicInfoId {:>8}: {}",
                target.comic_info_id,
                target.display_path()
            );
            self.stats.missing += 1;
            return;
        };
        debug!(
            "MATCH: DB path: {}, with Id {:>8} --- XML File: {}",
            target.display_path(),
            target.comic_info_id,
            book.file
        );

        let current = match store.current_values(target.comic_info_id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.missing_row(target);
                return;
            }
            Err(e) => {
                error!("Error while reading YACReader record {}: {}", target.comic_info_id, e);
                return;
            }
        };

        let staged = stage_fields(self.mappings, &current, book, self.config.overwrite_all);
        match store.apply(target.comic_info_id, &staged, self.config.verbose) {
            Outcome::Updated => self.stats.updated += 1,
            Outcome::Unchanged => {
                debug!(
                    "UPDATE: No values found for update of Id: {} at ({})",
                    target.comic_info_id,
                    target.display_path()
                );
                self.stats.unchanged += 1;
            }
            Outcome::NoRow => self.missing_row(target),
            // Counted in none of the three buckets
            Outcome::Failed(reason) => {
                error!("Error while updating the YACReader database: {}", reason);
            }
        }
    }

    /// The `comic` row points at a `comic_info` row that does not exist.
    fn missing_row(&mut self, target: &TargetRecord) {
        warn!(
            "No comic_info row with Id {:>8} for {}; nothing written",
            target.comic_info_id,
            target.display_path()
        );
        self.stats.missing += 1;
    }

    fn expect_state(&self, expected: RunState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState { actual: self.state, expected })
        }
    }
}

/// Load and execute a run, reporting a fatal error once as Aborted.
pub fn run(config: RunConfig, progress: &dyn ProgressSink, cancel: &CancelToken) -> RunReport {
    let mut run = ReconciliationRun::new(config);
    if let Err(e) = run.load() {
        error!("{}", e);
        return run.report();
    }
    if let Err(e) = run.execute(progress, cancel) {
        error!("{}", e);
    }
    run.report()
}
