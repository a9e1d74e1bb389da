//! ComicRack -> YACReader metadata reconciliation library.

pub mod config;
pub mod derive;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod run;
pub mod safety;
pub mod source;
pub mod store;

pub use error::{Result, SyncError};
pub use models::{Outcome, RunReport, RunState, RunStatistics};
pub use run::{run, CancelToken, ReconciliationRun, RunConfig};
