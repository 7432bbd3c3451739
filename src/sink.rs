//! Collaborator callbacks
//!
//! Higher-level features consume the protocol layer only through these
//! two traits. Closures with the matching signature implement them.

use crate::types::RoomId;

/// Receives every protocol line the client does not handle itself
pub trait MessageSink: Send + Sync + 'static {
    fn on_message(&self, room: &RoomId, message_type: &str, fields: &[String]);
}

/// Receives the body of `view-` page payloads
pub trait PageSink: Send + Sync + 'static {
    fn on_page(&self, room: &RoomId, body: &str);
}

impl<F> MessageSink for F
where
    F: Fn(&RoomId, &str, &[String]) + Send + Sync + 'static,
{
    fn on_message(&self, room: &RoomId, message_type: &str, fields: &[String]) {
        self(room, message_type, fields)
    }
}

impl<F> PageSink for F
where
    F: Fn(&RoomId, &str) + Send + Sync + 'static,
{
    fn on_page(&self, room: &RoomId, body: &str) {
        self(room, body)
    }
}
