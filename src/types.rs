//! Basic type definitions for the protocol client
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identity of one socket lifetime
//! - `RoomId`: normalized room identifier

use uuid::Uuid;

/// Identity of a single socket lifetime (newtype pattern)
///
/// A fresh id is minted on every (re)connect so that late completions
/// belonging to a torn-down connection can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier (lowercase `[a-z0-9-]` only)
///
/// Always normalized on construction, so it is safe to use as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Room used when a payload carries no `>roomid` announcement
    pub const DEFAULT: &'static str = "lobby";

    /// Normalize arbitrary text into a room id
    pub fn new(raw: &str) -> Self {
        Self(
            raw.chars()
                .flat_map(char::to_lowercase)
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
                .collect(),
        )
    }

    /// The default `lobby` room
    pub fn lobby() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rooms whose content is an opaque page document rather than protocol lines
    pub fn is_page(&self) -> bool {
        self.0.starts_with("view-")
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a display name into a user id (lowercase `[a-z0-9]` only)
pub fn to_user_id(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}
