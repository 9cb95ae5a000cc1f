use crate::protocol::ServerMessage;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
    pub rooms: DashSet<String>,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Session {
    pub fn new(remote_addr: Option<String>, user_agent: Option<String>, sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id: Uuid::new_v4(), created_at: Utc::now(), remote_addr, user_agent, rooms: DashSet::new(), sender }
    }
}
