use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no subscribers for subject {0}")]
    NoSubscribers(String),
    #[error("delivery {0} is not pending (already acked, naked, or unknown)")]
    UnknownDelivery(uuid::Uuid),
    #[error("bus is shutting down")]
    Closed,
}

impl From<BusError> for traceledger_core::Error {
    fn from(e: BusError) -> Self {
        match e {
            BusError::NoSubscribers(_) => traceledger_core::Error::Transient(e.to_string()),
            BusError::UnknownDelivery(_) => traceledger_core::Error::Conflict(e.to_string()),
            BusError::Closed => traceledger_core::Error::Transient(e.to_string()),
        }
    }
}
