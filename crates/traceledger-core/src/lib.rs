//! Shared types, canonical hashing, error kinds, and configuration for the
//! TraceLedger ingestion-to-audit pipeline.

pub mod canonical;
pub mod config;
pub mod error;
pub mod ids;
pub mod log;
pub mod requests;

pub use config::TraceLedgerConfig;
pub use error::{Error, Result};
pub use log::{Log, LogStatus, NewLog, RetentionTier, ReviewUpdate};
pub use requests::{BulkSubmission, UpdateLogRequest};
