//! Session/room bookkeeping and event fan-out, independent of the
//! transport (axum WebSocket) that drives it.

use crate::protocol::ServerMessage;
use crate::rooms::{Filters, Room};
use crate::sessions::Session;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct JoinResult {
    pub session_id: Uuid,
    pub member_count: usize,
    pub filters: HashMap<String, Value>,
}

/// Per-instance session/room tables. Horizontal fan-out across notifier
/// instances is a property of whatever bus adapter feeds `dispatch` on each
/// instance; this registry only owns local sockets.
pub struct NotifierRegistry {
    sessions: DashMap<Uuid, Arc<Session>>,
    rooms: DashMap<String, Arc<Room>>,
    max_room_members: usize,
}

impl NotifierRegistry {
    pub fn new(max_room_members: usize) -> Self {
        Self { sessions: DashMap::new(), rooms: DashMap::new(), max_room_members }
    }

    pub fn register_session(
        &self,
        remote_addr: Option<String>,
        user_agent: Option<String>,
    ) -> (Arc<Session>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(remote_addr, user_agent, tx));
        self.sessions.insert(session.id, Arc::clone(&session));
        (session, rx)
    }

    pub fn join_room(&self, session: &Session, room_name: &str, filters: HashMap<String, Value>) -> JoinResult {
        let room = self
            .rooms
            .entry(room_name.to_string())
            .or_insert_with(|| Arc::new(Room::new(room_name, Filters(filters.clone()))))
            .clone();
        room.members.write().insert(session.id);
        room.touch();
        session.rooms.insert(room_name.to_string());
        JoinResult { session_id: session.id, member_count: room.member_count(), filters: room.filters.0.clone() }
    }

    pub fn leave_room(&self, session: &Session, room_name: &str) {
        session.rooms.remove(room_name);
        if let Some(room) = self.rooms.get(room_name) {
            room.members.write().remove(&session.id);
            if room.members.read().is_empty() {
                drop(room);
                self.rooms.remove(room_name);
            }
        }
    }

    /// Tear a session down: remove it from every room it joined and drop its
    /// sender, so no further deliveries are attempted.
    pub fn remove_session(&self, session_id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&session_id) {
            for room_name in session.rooms.iter() {
                if let Some(room) = self.rooms.get(room_name.as_str()) {
                    room.members.write().remove(&session_id);
                    let empty = room.members.read().is_empty();
                    if empty {
                        drop(room);
                        self.rooms.remove(room_name.as_str());
                    }
                }
            }
        }
    }

    /// Fan out one outcome event to every room whose filter matches,
    /// skipping rooms over the backpressure threshold. Per-session send
    /// failures tear the session down immediately.
    pub fn dispatch(&self, kind: EventKind, event: &Value) {
        let server_time = Utc::now();
        for room in self.rooms.iter() {
            let room = room.value();
            if room.member_count() > self.max_room_members {
                warn!(room = %room.name, members = room.member_count(), "room over backpressure threshold, skipping event");
                continue;
            }
            if !room.filters.matches(event) {
                continue;
            }
            room.touch();
            let message = kind.to_message(room.name.clone(), event.clone(), server_time);
            let mut dead = Vec::new();
            for member in room.members.read().iter() {
                if let Some(session) = self.sessions.get(member) {
                    if session.sender.send(message.clone()).is_err() {
                        dead.push(*member);
                    }
                }
            }
            for id in dead {
                debug!(session = %id, "dropping session with a closed send channel");
                self.remove_session(id);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EventKind {
    LogCreated,
    LogUpdated,
    BulkLogsCreated,
    AuditEvent,
}

impl EventKind {
    fn to_message(self, room: String, payload: Value, server_time: chrono::DateTime<Utc>) -> ServerMessage {
        match self {
            EventKind::LogCreated => ServerMessage::LogCreated { room, payload, server_time },
            EventKind::LogUpdated => ServerMessage::LogUpdated { room, payload, server_time },
            EventKind::BulkLogsCreated => ServerMessage::BulkLogsCreated { room, payload, server_time },
            EventKind::AuditEvent => ServerMessage::AuditEvent { room, payload, server_time },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_creates_room_on_first_member_and_removes_on_last_leave() {
        let registry = NotifierRegistry::new(1000);
        let (session, _rx) = registry.register_session(None, None);
        registry.join_room(&session, "room-a1", HashMap::from([("agentId".to_string(), json!("a1"))]));
        assert_eq!(registry.rooms.len(), 1);

        registry.leave_room(&session, "room-a1");
        assert_eq!(registry.rooms.len(), 0);
    }

    #[test]
    fn dispatch_only_reaches_matching_rooms() {
        let registry = NotifierRegistry::new(1000);
        let (s1, mut rx1) = registry.register_session(None, None);
        let (s2, mut rx2) = registry.register_session(None, None);
        registry.join_room(&s1, "room-a1", HashMap::from([("agentId".to_string(), json!("a1"))]));
        registry.join_room(&s2, "room-a2", HashMap::from([("agentId".to_string(), json!("a2"))]));

        registry.dispatch(EventKind::LogCreated, &json!({"agentId": "a1"}));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn rooms_over_the_member_threshold_are_skipped() {
        let registry = NotifierRegistry::new(1);
        let (s1, mut rx1) = registry.register_session(None, None);
        let (s2, _rx2) = registry.register_session(None, None);
        registry.join_room(&s1, "room", HashMap::new());
        registry.join_room(&s2, "room", HashMap::new());

        registry.dispatch(EventKind::LogCreated, &json!({}));
        assert!(rx1.try_recv().is_err());
    }
}
