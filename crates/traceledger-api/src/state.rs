use std::sync::Arc;
use traceledger_bus::EventBus;
use traceledger_core::TraceLedgerConfig;
use traceledger_store::LogStore;

pub struct AppState {
    pub store: Arc<LogStore>,
    pub bus: Arc<dyn EventBus>,
    pub config: TraceLedgerConfig,
}
