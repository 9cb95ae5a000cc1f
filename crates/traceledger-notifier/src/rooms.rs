//! Room membership and filter-predicate matching.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct Filters(pub HashMap<String, Value>);

impl Filters {
    /// Each filter key must match the corresponding event field. An array
    /// filter value matches by set membership against the event's value for
    /// that key (or against the event value itself if it is also an array).
    pub fn matches(&self, event: &Value) -> bool {
        self.0.iter().all(|(key, expected)| {
            let Some(actual) = event.get(key) else { return false };
            match expected {
                Value::Array(options) => match actual {
                    Value::Array(values) => values.iter().any(|v| options.contains(v)),
                    other => options.contains(other),
                },
                other => actual == other,
            }
        })
    }
}

pub struct Room {
    pub name: String,
    pub filters: Filters,
    pub members: RwLock<HashSet<Uuid>>,
    pub last_activity: RwLock<DateTime<Utc>>,
}

impl Room {
    pub fn new(name: impl Into<String>, filters: Filters) -> Self {
        Self { name: name.into(), filters, members: RwLock::new(HashSet::new()), last_activity: RwLock::new(Utc::now()) }
    }

    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_filter_requires_exact_match() {
        let mut f = HashMap::new();
        f.insert("agentId".to_string(), json!("a1"));
        let filters = Filters(f);
        assert!(filters.matches(&json!({"agentId": "a1"})));
        assert!(!filters.matches(&json!({"agentId": "a2"})));
    }

    #[test]
    fn array_filter_matches_by_set_membership() {
        let mut f = HashMap::new();
        f.insert("agentId".to_string(), json!(["a1", "a2"]));
        let filters = Filters(f);
        assert!(filters.matches(&json!({"agentId": "a2"})));
        assert!(!filters.matches(&json!({"agentId": "a3"})));
    }

    #[test]
    fn missing_event_field_never_matches() {
        let mut f = HashMap::new();
        f.insert("agentId".to_string(), json!("a1"));
        let filters = Filters(f);
        assert!(!filters.matches(&json!({"status": "success"})));
    }
}
