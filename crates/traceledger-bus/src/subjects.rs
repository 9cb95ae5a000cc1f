//! Well-known subjects used by the ingestion-to-audit pipeline.

pub const LOGS_CREATE: &str = "logs.create";
pub const LOGS_BULK: &str = "logs.bulk";
pub const LOGS_UPDATE: &str = "logs.update";

pub const LOGS_CREATED: &str = "logs.created";
pub const LOGS_BULK_CREATED: &str = "logs.bulk-created";
pub const LOGS_UPDATED: &str = "logs.updated";

pub const AUDIT_WINDOW_FINALIZED: &str = "audit.window-finalized";

/// Map an ingress/egress subject to its dead-letter mirror, e.g.
/// `logs.create` -> `logs.dlq.create`.
pub fn dlq_subject(subject: &str) -> String {
    match subject.split_once('.') {
        Some((prefix, rest)) => format!("{prefix}.dlq.{rest}"),
        None => format!("{subject}.dlq"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_mirrors_are_namespaced_under_dlq() {
        assert_eq!(dlq_subject(LOGS_CREATE), "logs.dlq.create");
        assert_eq!(dlq_subject(LOGS_BULK), "logs.dlq.bulk");
        assert_eq!(dlq_subject(LOGS_UPDATE), "logs.dlq.update");
    }
}
