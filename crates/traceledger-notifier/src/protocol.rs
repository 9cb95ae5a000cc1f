use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom { room: String, #[serde(default)] filters: std::collections::HashMap<String, Value>, user_id: Option<String> },
    LeaveRoom { room: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[allow(clippy::large_enum_variant)]
pub enum ServerMessage {
    Welcome { session_id: uuid::Uuid, server_time: DateTime<Utc> },
    RoomJoined { room: String, member_count: usize, filters: std::collections::HashMap<String, Value> },
    LogCreated { room: String, payload: Value, server_time: DateTime<Utc> },
    LogUpdated { room: String, payload: Value, server_time: DateTime<Utc> },
    BulkLogsCreated { room: String, payload: Value, server_time: DateTime<Utc> },
    AuditEvent { room: String, payload: Value, server_time: DateTime<Utc> },
}
