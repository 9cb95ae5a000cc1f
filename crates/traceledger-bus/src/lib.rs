pub mod envelope;
pub mod error;
pub mod health;
pub mod inproc;
pub mod subjects;

pub use envelope::{DeadLetterMetadata, Envelope};
pub use error::BusError;
pub use health::{BusHealth, StreamHealth};
pub use inproc::{Delivery, EventBus, InProcessBus, Subscription};
