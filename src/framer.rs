//! Inbound payload framing
//!
//! Splits one transport message into its room and the protocol lines
//! that should be parsed, or a page body for `view-` rooms.

use crate::types::RoomId;

/// Result of framing one inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Opaque page document for a `view-` room
    Page { room: RoomId, body: String },
    /// Protocol lines to parse, in order
    Lines { room: RoomId, lines: Vec<String> },
}

/// Frame a raw payload.
///
/// A `>roomid` header is only honoured on multi-line payloads. When a line
/// starts with `|init|`, only that line and the first following `|users|`
/// line are kept; everything after is the join backlog and is dropped.
pub fn frame_payload(raw: &str) -> Frame {
    if !raw.contains('\n') {
        let lines = if raw.is_empty() {
            Vec::new()
        } else {
            vec![raw.to_string()]
        };
        return Frame::Lines {
            room: RoomId::lobby(),
            lines,
        };
    }

    let mut lines = raw.split('\n').peekable();
    let room = match lines.peek() {
        Some(first) if first.starts_with('>') => {
            let room = RoomId::new(&first[1..]);
            lines.next();
            room
        }
        _ => RoomId::lobby(),
    };

    if room.is_page() {
        return Frame::Page {
            room,
            body: lines.collect::<Vec<_>>().join("\n"),
        };
    }

    let mut kept = Vec::new();
    while let Some(line) = lines.next() {
        if line.starts_with("|init|") {
            kept.push(line.to_string());
            if let Some(users) = lines.find(|l| l.starts_with("|users|")) {
                kept.push(users.to_string());
            }
            break;
        }
        if !line.is_empty() {
            kept.push(line.to_string());
        }
    }

    Frame::Lines { room, lines: kept }
}
