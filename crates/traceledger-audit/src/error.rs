use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("no audit entry found for {agent_id}/{step_id}")]
    EntryNotFound { agent_id: String, step_id: i64 },
    #[error("audit pack failed integrity verification: {0}")]
    PackIntegrity(String),
}

impl From<AuditError> for traceledger_core::Error {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::EntryNotFound { .. } => traceledger_core::Error::NotFound(e.to_string()),
            AuditError::PackIntegrity(_) => traceledger_core::Error::Integrity(e.to_string()),
        }
    }
}
