pub const CREATE_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    agent_id TEXT NOT NULL,
    step_id INTEGER NOT NULL,
    trace_id TEXT,
    user_id TEXT,
    timestamp TEXT NOT NULL,
    input_data TEXT NOT NULL,
    output TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    status TEXT NOT NULL,
    reviewed INTEGER NOT NULL,
    review_comments TEXT,
    metadata TEXT NOT NULL,
    version INTEGER NOT NULL,
    retention_tier TEXT NOT NULL,
    content_hash BLOB NOT NULL,
    PRIMARY KEY (agent_id, step_id)
)
"#;

pub const CREATE_TIMESTAMP_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs (timestamp)";
pub const CREATE_STATUS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_logs_status ON logs (status)";
pub const CREATE_RETENTION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_logs_retention_tier ON logs (retention_tier)";
