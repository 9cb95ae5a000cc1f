pub mod classifier;
pub mod idempotency;
pub mod outcome;
pub mod worker;

pub use classifier::{classify, AnomalyHistory, NoHistory};
pub use idempotency::IdempotencyCache;
pub use outcome::{BulkLogsCreated, LogCreated, LogUpdated};
pub use worker::Worker;
