//! Per-connection state
//!
//! Everything owned by one socket lifetime: its identity, protocol handler
//! and send queue. A reconnect builds a fresh `Connection`.

use std::sync::Arc;

use tokio::time::Instant;

use crate::config::Config;
use crate::error::FatalError;
use crate::framer::{frame_payload, Frame};
use crate::handler::{Dispatch, ProtocolHandler};
use crate::login::LoginRequest;
use crate::queue::SendQueue;
use crate::sink::{MessageSink, PageSink};
use crate::types::ConnectionId;

/// Side effects produced by one inbound payload
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Messages to push through the send queue, in order
    pub send: Vec<String>,
    /// Login round trips to start
    pub logins: Vec<LoginRequest>,
}

/// State of one open socket
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this socket lifetime
    pub id: ConnectionId,
    /// Protocol and handshake state
    pub handler: ProtocolHandler,
    /// Outbound throttle
    pub queue: SendQueue,
}

impl Connection {
    /// Create state for a freshly opened socket
    pub fn new(config: Arc<Config>) -> Self {
        let queue = SendQueue::new(config.throttle());
        Self {
            id: ConnectionId::new(),
            handler: ProtocolHandler::new(config),
            queue,
        }
    }

    /// Frame, parse and dispatch one inbound payload
    ///
    /// Page payloads and forwarded lines go straight to the sinks; anything
    /// needing I/O is returned in the [`Outcome`].
    pub fn on_payload(
        &mut self,
        raw: &str,
        messages: &dyn MessageSink,
        pages: &dyn PageSink,
    ) -> Result<Outcome, FatalError> {
        let mut outcome = Outcome::default();

        match frame_payload(raw) {
            Frame::Page { room, body } => pages.on_page(&room, &body),
            Frame::Lines { room, lines } => {
                for line in &lines {
                    match self.handler.handle_line(&room, line)? {
                        Dispatch::Handled => {}
                        Dispatch::Send(out) => outcome.send.extend(out),
                        Dispatch::Login(request) => outcome.logins.push(request),
                        Dispatch::Forward { room, line } => {
                            messages.on_message(&room, &line.message_type, &line.fields)
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Apply a finished login round trip
    pub fn on_login_response(&mut self, challstr: &str, body: &str) -> Result<Vec<String>, FatalError> {
        self.handler.complete_login(challstr, body)
    }

    /// Queue messages, returning those that may go out now
    pub fn enqueue(&mut self, batch: Vec<String>, now: Instant) -> Vec<String> {
        self.queue.push_all(batch, now)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::RoomId;

    type Seen = Arc<Mutex<Vec<(String, String, Vec<String>)>>>;
    type Pages = Arc<Mutex<Vec<(String, String)>>>;

    fn sinks() -> (Seen, impl MessageSink, Pages, impl PageSink) {
        let seen: Seen = Arc::default();
        let pages: Pages = Arc::default();
        let seen_sink = {
            let seen = seen.clone();
            move |room: &RoomId, message_type: &str, fields: &[String]| {
                seen.lock()
                    .unwrap()
                    .push((room.to_string(), message_type.to_string(), fields.to_vec()));
            }
        };
        let page_sink = {
            let pages = pages.clone();
            move |room: &RoomId, body: &str| {
                pages.lock().unwrap().push((room.to_string(), body.to_string()));
            }
        };
        (seen, seen_sink, pages, page_sink)
    }

    fn connection() -> Connection {
        Connection::new(Arc::new(Config::new("Bot")))
    }

    #[test]
    fn test_fresh_connections_have_distinct_ids() {
        assert_ne!(connection().id, connection().id);
    }

    #[test]
    fn test_init_burst_forwards_init_and_users_only() {
        let (seen, messages, _, pages) = sinks();
        let mut conn = connection();

        let outcome = conn
            .on_payload(">room1\n|init|chat\n|users|+A,+B\n|c|A|hi", &messages, &pages)
            .unwrap();

        assert_eq!(outcome, Outcome::default());
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("room1".to_string(), "init".to_string(), vec!["chat".to_string()]),
                ("room1".to_string(), "users".to_string(), vec!["+A,+B".to_string()]),
            ]
        );
    }

    #[test]
    fn test_view_payload_goes_to_page_sink() {
        let (seen, messages, pages, page_sink) = sinks();
        let mut conn = connection();

        conn.on_payload(">view-ladder\n|a|b\n|c|d|e\nplain", &messages, &page_sink)
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            *pages.lock().unwrap(),
            vec![("view-ladder".to_string(), "|a|b\n|c|d|e\nplain".to_string())]
        );
    }

    #[test]
    fn test_challstr_produces_login_request() {
        let (seen, messages, _, pages) = sinks();
        let mut conn = connection();

        let outcome = conn.on_payload("|challstr|4|abc", &messages, &pages).unwrap();

        assert_eq!(outcome.logins.len(), 1);
        assert_eq!(outcome.logins[0].challstr, "4|abc");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fatal_line_stops_processing() {
        let (seen, messages, _, pages) = sinks();
        let mut conn = connection();

        let result = conn.on_payload("|updateuser|Bot|0|1\n|c|A|hi", &messages, &pages);

        assert_eq!(result, Err(FatalError::StillGuest));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enqueue_throttles() {
        let mut conn = connection();
        let now = Instant::now();
        let ready = conn.enqueue(vec!["a".to_string(), "b".to_string()], now);
        assert_eq!(ready, vec!["a"]);
        assert_eq!(conn.queue.len(), 1);
    }
}
