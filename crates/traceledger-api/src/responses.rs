//! Response bodies for the 202-style async ingress endpoints: success here
//! means the event was handed to the bus, not that it has been persisted.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct AcceptedReceipt {
    pub event_id: Uuid,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BulkAcceptedReceipt {
    pub event_id: Uuid,
    pub idempotency_key: Uuid,
    pub batch_id: Uuid,
    pub count: usize,
}
