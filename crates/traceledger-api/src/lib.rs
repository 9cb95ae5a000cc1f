//! The versioned HTTP ingestion API: validates and classifies logs at
//! ingress, publishes onto the event bus, and serves synchronous reads
//! straight from the store.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod responses;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
