//! The log worker: consumes ingress events, re-validates, classifies,
//! persists, folds into the audit chain, and republishes outcomes.

use crate::classifier::{classify, AnomalyHistory, NoHistory};
use crate::idempotency::IdempotencyCache;
use crate::outcome::{BulkLogsCreated, LogCreated, LogUpdated};
use chrono::Utc;
use std::sync::Arc;
use traceledger_audit::{AuditEntry, AuditService};
use traceledger_bus::{subjects, Delivery, Envelope, EventBus};
use traceledger_core::canonical::hash_to_hex;
use traceledger_core::ids::LogKey;
use traceledger_core::log::{Log, RetentionTier};
use traceledger_core::{BulkSubmission, Error, NewLog, UpdateLogRequest};
use traceledger_store::LogStore;
use tracing::{error, info, warn};

pub struct Worker {
    store: Arc<LogStore>,
    audit: Arc<AuditService>,
    bus: Arc<dyn EventBus>,
    idempotency: IdempotencyCache,
    history: Box<dyn AnomalyHistory>,
    hot_days: i64,
    warm_days: i64,
}

impl Worker {
    pub fn new(
        store: Arc<LogStore>,
        audit: Arc<AuditService>,
        bus: Arc<dyn EventBus>,
        idempotency_capacity: usize,
        hot_days: i64,
        warm_days: i64,
    ) -> Self {
        Self {
            store,
            audit,
            bus,
            idempotency: IdempotencyCache::new(idempotency_capacity),
            history: Box::new(NoHistory),
            hot_days,
            warm_days,
        }
    }

    /// Subscribe to the three ingress subjects under a shared queue group
    /// and process deliveries until the bus closes the subscription.
    pub async fn run(self: Arc<Self>) -> traceledger_core::Result<()> {
        let mut create_sub = self.bus.subscribe(subjects::LOGS_CREATE, "workers").await?;
        let mut bulk_sub = self.bus.subscribe(subjects::LOGS_BULK, "workers").await?;
        let mut update_sub = self.bus.subscribe(subjects::LOGS_UPDATE, "workers").await?;

        let create_worker = Arc::clone(&self);
        let create_task = tokio::spawn(async move {
            while let Some(delivery) = create_sub.recv().await {
                create_worker.handle_create(&delivery).await;
            }
        });

        let bulk_worker = Arc::clone(&self);
        let bulk_task = tokio::spawn(async move {
            while let Some(delivery) = bulk_sub.recv().await {
                bulk_worker.handle_bulk(&delivery).await;
            }
        });

        let update_worker = Arc::clone(&self);
        let update_task = tokio::spawn(async move {
            while let Some(delivery) = update_sub.recv().await {
                update_worker.handle_update(&delivery).await;
            }
        });

        let _ = tokio::join!(create_task, bulk_task, update_task);
        Ok(())
    }

    fn resolve(&self, new_log: &NewLog, status_override: Option<&str>) -> Log {
        let timestamp = new_log.timestamp.unwrap_or_else(Utc::now);
        let anomalous = status_override.is_none() && classify(new_log, self.history.as_ref());
        let status = match status_override {
            Some(s) if s == "anomaly" => traceledger_core::LogStatus::Anomaly,
            _ if anomalous => traceledger_core::LogStatus::Anomaly,
            _ => traceledger_core::LogStatus::Success,
        };
        let age = Utc::now() - timestamp;
        let retention_tier = RetentionTier::from_age(age, self.hot_days, self.warm_days);

        let mut log = Log {
            agent_id: new_log.agent_id.clone(),
            step_id: new_log.step_id,
            trace_id: new_log.trace_id.clone(),
            user_id: new_log.user_id.clone(),
            timestamp,
            input_data: new_log.input_data.clone(),
            output: new_log.output.clone(),
            reasoning: new_log.reasoning.clone(),
            status,
            reviewed: false,
            review_comments: None,
            metadata: new_log.metadata.clone(),
            version: 1,
            retention_tier,
            content_hash: [0u8; 32],
        };
        log.content_hash = log.compute_content_hash();
        log
    }

    async fn persist_and_record(&self, log: &Log) -> traceledger_core::Result<Option<AuditEntry>> {
        self.store.insert(log).await?;
        let (_, finalized) =
            self.audit.record(&LogKey::new(log.agent_id.clone(), log.step_id), log.content_hash, log.timestamp);
        Ok(finalized)
    }

    /// Broadcast a `WINDOW_FINALIZED` audit entry over the bus, carrying the
    /// finalized root and the number of hashes it covers.
    async fn publish_window_finalized(&self, entry: &AuditEntry) {
        let Some(window) = &entry.window else { return };
        let payload = serde_json::json!({
            "windowStart": window.window_start,
            "windowEnd": window.window_end,
            "merkleRoot": hash_to_hex(&window.merkle_root),
            "hashCount": window.hash_count,
        });
        self.publish_outcome(subjects::AUDIT_WINDOW_FINALIZED, &payload).await;
    }

    async fn handle_create(&self, delivery: &Delivery) {
        if self.idempotency.check_and_record(delivery.envelope.idempotency_key()) {
            delivery.ack();
            return;
        }

        let new_log: NewLog = match serde_json::from_value(delivery.envelope.data.clone()) {
            Ok(v) => v,
            Err(e) => {
                delivery.dead_letter(format!("malformed log payload: {e}"));
                return;
            }
        };
        if let Err(reason) = new_log.validate() {
            delivery.dead_letter(reason);
            return;
        }

        let log = self.resolve(&new_log, None);
        match self.persist_and_record(&log).await {
            Ok(finalized) => {
                let outcome = LogCreated {
                    agent_id: log.agent_id.clone(),
                    step_id: log.step_id,
                    status: log.status.as_str().to_string(),
                    timestamp: log.timestamp,
                };
                self.publish_outcome(subjects::LOGS_CREATED, &outcome).await;
                if let Some(entry) = &finalized {
                    self.publish_window_finalized(entry).await;
                }
                delivery.ack();
            }
            Err(e) => self.resolve_failure(delivery, e),
        }
    }

    async fn handle_bulk(&self, delivery: &Delivery) {
        if self.idempotency.check_and_record(delivery.envelope.idempotency_key()) {
            delivery.ack();
            return;
        }

        let submission: BulkSubmission = match serde_json::from_value(delivery.envelope.data.clone()) {
            Ok(v) => v,
            Err(e) => {
                delivery.dead_letter(format!("malformed bulk payload: {e}"));
                return;
            }
        };
        if submission.logs.is_empty() {
            delivery.dead_letter("bulk submission must contain at least one log".to_string());
            return;
        }

        let mut created = Vec::new();
        let mut failed_count = 0usize;
        for new_log in &submission.logs {
            if let Err(reason) = new_log.validate() {
                warn!(agent_id = %new_log.agent_id, step_id = new_log.step_id, reason, "bulk item failed validation");
                self.deadletter_bulk_item(new_log, &reason).await;
                failed_count += 1;
                continue;
            }
            let log = self.resolve(new_log, None);
            match self.persist_and_record(&log).await {
                Ok(finalized) => {
                    created.push(LogCreated {
                        agent_id: log.agent_id.clone(),
                        step_id: log.step_id,
                        status: log.status.as_str().to_string(),
                        timestamp: log.timestamp,
                    });
                    if let Some(entry) = &finalized {
                        self.publish_window_finalized(entry).await;
                    }
                }
                Err(e) => {
                    warn!(agent_id = %new_log.agent_id, step_id = new_log.step_id, error = %e, "bulk item failed to persist");
                    self.deadletter_bulk_item(new_log, &e.to_string()).await;
                    failed_count += 1;
                }
            }
        }

        let outcome = BulkLogsCreated { batch_id: submission.batch_id, created, failed_count };
        self.publish_outcome(subjects::LOGS_BULK_CREATED, &outcome).await;
        delivery.ack();
    }

    async fn deadletter_bulk_item(&self, new_log: &NewLog, reason: &str) {
        let meta = traceledger_bus::DeadLetterMetadata {
            original_subject: subjects::LOGS_BULK.to_string(),
            last_error: reason.to_string(),
            retry_count: 1,
            failed_at: Utc::now(),
        };
        let envelope = Envelope::new(serde_json::to_value(new_log).unwrap_or(serde_json::Value::Null))
            .with_metadata(serde_json::to_value(meta).unwrap_or(serde_json::Value::Null));
        if let Err(e) = self.bus.publish(&subjects::dlq_subject(subjects::LOGS_BULK), envelope).await {
            error!(error = %e, "failed to publish bulk item to dead letter subject");
        }
    }

    async fn handle_update(&self, delivery: &Delivery) {
        if self.idempotency.check_and_record(delivery.envelope.idempotency_key()) {
            delivery.ack();
            return;
        }

        let request: UpdateLogRequest = match serde_json::from_value(delivery.envelope.data.clone()) {
            Ok(v) => v,
            Err(e) => {
                delivery.dead_letter(format!("malformed update payload: {e}"));
                return;
            }
        };
        let key = LogKey::new(request.agent_id.clone(), request.step_id);

        match self.store.update_review(&key, &request.update).await {
            Ok(log) => {
                let (_, finalized) = self.audit.record_update(&key, log.content_hash, Utc::now(), request.update.clone());
                let outcome = LogUpdated {
                    agent_id: log.agent_id,
                    step_id: log.step_id,
                    version: log.version,
                    reviewed: log.reviewed,
                };
                self.publish_outcome(subjects::LOGS_UPDATED, &outcome).await;
                if let Some(entry) = &finalized {
                    self.publish_window_finalized(entry).await;
                }
                delivery.ack();
            }
            // A missing log on update may just mean its `logs.create` hasn't
            // landed yet; treat it as retryable here even though `NotFound`
            // is permanent everywhere else.
            Err(Error::NotFound(reason)) => delivery.nak(reason),
            Err(e) => self.resolve_failure(delivery, e),
        }
    }

    fn resolve_failure(&self, delivery: &Delivery, error: Error) {
        if error.is_integrity() {
            error!(%error, "fatal integrity failure processing delivery, leaving unacked for operator intervention");
            return;
        }
        if error.is_retryable() {
            delivery.nak(error.to_string());
        } else {
            delivery.dead_letter(error.to_string());
        }
    }

    async fn publish_outcome<T: serde::Serialize>(&self, subject: &str, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, subject, "failed to serialize outcome payload");
                return;
            }
        };
        if let Err(e) = self.bus.publish(subject, Envelope::new(value)).await {
            error!(error = %e, subject, "failed to publish outcome event");
        } else {
            info!(subject, "published outcome event");
        }
    }
}
