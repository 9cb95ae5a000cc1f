//! Shared test harness for the end-to-end scenarios under `tests/`: wires a
//! real store, bus, audit service, worker, and notifier registry together,
//! with no mocked components.

use std::sync::Arc;
use std::time::Duration;
use traceledger_audit::AuditService;
use traceledger_bus::{EventBus, InProcessBus};
use traceledger_store::LogStore;
use traceledger_worker::Worker;

pub struct Pipeline {
    pub store: Arc<LogStore>,
    pub bus: Arc<InProcessBus>,
    pub audit: Arc<AuditService>,
    pub worker: Arc<Worker>,
}

impl Pipeline {
    pub async fn wire(merkle_window_minutes: i64) -> Self {
        let store = Arc::new(LogStore::connect("sqlite::memory:").await.unwrap());
        let bus = Arc::new(InProcessBus::new(3, &[0, 0, 0], Duration::from_secs(5)));
        let audit = Arc::new(AuditService::new(merkle_window_minutes));
        let worker = Arc::new(Worker::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            bus.clone() as Arc<dyn EventBus>,
            1000,
            30,
            365,
        ));

        let run_worker = Arc::clone(&worker);
        tokio::spawn(async move {
            let _ = run_worker.run().await;
        });

        Self { store, bus, audit, worker }
    }
}

/// Poll until `condition` resolves true or the deadline elapses, since the
/// pipeline's outcome side-effects land asynchronously after a publish.
pub async fn wait_until<F, Fut>(condition: F, timeout: Duration)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
