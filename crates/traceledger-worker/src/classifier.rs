//! Pure anomaly classification, run at both API ingress and worker
//! validation so a direct bus producer can't bypass it.

use traceledger_core::log::NewLog;

/// Extension point for rules that need history beyond the single log under
/// classification (frequency, historical deviation). No implementation is
/// defined yet; the default hook always returns `false`.
pub trait AnomalyHistory: Send + Sync {
    fn is_anomalous_given_history(&self, log: &NewLog) -> bool;
}

pub struct NoHistory;

impl AnomalyHistory for NoHistory {
    fn is_anomalous_given_history(&self, _log: &NewLog) -> bool {
        false
    }
}

/// Evaluate the fixed rule set in order; any hit flags the log anomalous.
/// Deterministic: identical input always yields identical output.
pub fn classify(log: &NewLog, history: &dyn AnomalyHistory) -> bool {
    if log.step_id < 0 {
        return true;
    }
    let trimmed = log.reasoning.trim();
    if trimmed.len() < 10 {
        return true;
    }
    if trimmed.to_lowercase().contains("error") {
        return true;
    }
    history.is_anomalous_given_history(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(step_id: i64, reasoning: &str) -> NewLog {
        NewLog {
            agent_id: "a1".to_string(),
            step_id,
            trace_id: None,
            user_id: None,
            timestamp: None,
            input_data: json!({}),
            output: json!({}),
            reasoning: reasoning.to_string(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn negative_step_id_is_anomalous() {
        assert!(classify(&log(-1, "a perfectly fine reasoning string"), &NoHistory));
    }

    #[test]
    fn short_reasoning_is_anomalous() {
        assert!(classify(&log(1, "short"), &NoHistory));
    }

    #[test]
    fn reasoning_containing_error_is_anomalous() {
        assert!(classify(&log(1, "an ERROR occurred while reasoning"), &NoHistory));
    }

    #[test]
    fn sufficiently_long_clean_reasoning_is_not_anomalous() {
        assert!(!classify(&log(1, "this is a valid log with sufficient detail"), &NoHistory));
    }

    #[test]
    fn classification_is_deterministic() {
        let l = log(1, "this is a valid log with sufficient detail");
        assert_eq!(classify(&l, &NoHistory), classify(&l, &NoHistory));
    }
}
