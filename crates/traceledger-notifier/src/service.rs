//! Bridges the event bus to the room registry: one subscription per egress
//! subject, each folding deliveries into `NotifierRegistry::dispatch`.

use crate::registry::{EventKind, NotifierRegistry};
use std::sync::Arc;
use traceledger_bus::{subjects, EventBus};
use tracing::error;

pub struct NotifierService {
    registry: Arc<NotifierRegistry>,
    bus: Arc<dyn EventBus>,
}

impl NotifierService {
    pub fn new(registry: Arc<NotifierRegistry>, bus: Arc<dyn EventBus>) -> Self {
        Self { registry, bus }
    }

    pub async fn run(self: Arc<Self>) -> traceledger_core::Result<()> {
        let subscriptions = [
            (subjects::LOGS_CREATED, EventKind::LogCreated),
            (subjects::LOGS_UPDATED, EventKind::LogUpdated),
            (subjects::LOGS_BULK_CREATED, EventKind::BulkLogsCreated),
            (subjects::AUDIT_WINDOW_FINALIZED, EventKind::AuditEvent),
        ];

        let mut tasks = Vec::new();
        for (subject, kind) in subscriptions {
            let mut sub = self.bus.subscribe(subject, "notifiers").await?;
            let registry = Arc::clone(&self.registry);
            tasks.push(tokio::spawn(async move {
                while let Some(delivery) = sub.recv().await {
                    registry.dispatch(kind, &delivery.envelope.data);
                    delivery.ack();
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "notifier subscription task exited unexpectedly");
            }
        }
        Ok(())
    }
}
