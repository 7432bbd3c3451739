//! Protocol line handler
//!
//! Interprets the message types the client needs for itself (login
//! handshake, user updates, rename rejections) and hands everything else
//! back to the caller for forwarding. Performs no I/O: it returns a
//! [`Dispatch`] describing what the connection should do next.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::FatalError;
use crate::login::{interpret_login_response, LoginRequest};
use crate::message::{Command, ParsedLine, ServerMessage};
use crate::types::RoomId;

/// Most rooms a single `/autojoin` accepts
pub const MAX_AUTOJOIN: usize = 11;

/// What the connection should do after a line was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing further to do
    Handled,
    /// Transmit these messages through the send queue, in order
    Send(Vec<String>),
    /// Start the HTTP login round trip
    Login(LoginRequest),
    /// Pass the line to the message sink
    Forward { room: RoomId, line: ParsedLine },
}

/// Login handshake progress for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
enum Handshake {
    /// No challstr seen yet
    AwaitingChallenge,
    /// Login request in flight for this challstr
    AwaitingAssertion { challstr: String },
    /// `/trn` sent, waiting for `updateuser`
    AwaitingConfirmation,
    /// Logged in; happens at most once per connection
    Complete,
}

/// Per-connection protocol state
#[derive(Debug)]
pub struct ProtocolHandler {
    config: Arc<Config>,
    handshake: Handshake,
    /// Rooms beyond the first eleven, joined once login is confirmed
    pending_joins: Vec<String>,
}

impl ProtocolHandler {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            handshake: Handshake::AwaitingChallenge,
            pending_joins: Vec::new(),
        }
    }

    /// Whether `updateuser` has confirmed the login
    pub fn is_logged_in(&self) -> bool {
        self.handshake == Handshake::Complete
    }

    /// Rooms still waiting to be joined individually
    pub fn pending_joins(&self) -> &[String] {
        &self.pending_joins
    }

    /// Parse and handle one protocol line
    pub fn handle_line(&mut self, room: &RoomId, line: &str) -> Result<Dispatch, FatalError> {
        let parsed = ParsedLine::parse(line);
        trace!(
            room = %room,
            message_type = %parsed.message_type,
            fields = ?parsed.fields,
            "Parsed line"
        );

        match ServerMessage::from(parsed) {
            ServerMessage::Challstr(challstr) => Ok(self.handle_challstr(challstr)),
            ServerMessage::UpdateUser { name, named } => self.handle_update_user(&name, named),
            ServerMessage::NameTaken { name, reason } => self.handle_name_taken(&name, &reason),
            ServerMessage::Other(line) => Ok(Dispatch::Forward {
                room: room.clone(),
                line,
            }),
        }
    }

    /// Handle a new challenge
    ///
    /// Any earlier handshake on this connection is abandoned.
    fn handle_challstr(&mut self, challstr: String) -> Dispatch {
        if self.handshake != Handshake::AwaitingChallenge {
            info!("New challstr received, restarting login handshake");
        }
        self.handshake = Handshake::AwaitingAssertion {
            challstr: challstr.clone(),
        };
        self.pending_joins.clear();
        Dispatch::Login(LoginRequest::new(
            challstr,
            &self.config.nick,
            self.config.password(),
        ))
    }

    /// Apply the login server's response for `challstr`
    ///
    /// Returns the messages to send: an `/autojoin` for the first eleven
    /// rooms (if any) followed by `/trn`. A response for a challstr other
    /// than the current one is ignored.
    pub fn complete_login(&mut self, challstr: &str, body: &str) -> Result<Vec<String>, FatalError> {
        match &self.handshake {
            Handshake::AwaitingAssertion { challstr: current } if current == challstr => {}
            _ => {
                debug!("Ignoring login response for a superseded challstr");
                return Ok(Vec::new());
            }
        }

        let token = interpret_login_response(
            body,
            &self.config.nick,
            self.config.password().is_some(),
        )?;

        let mut out = Vec::new();
        let rooms: Vec<String> = self
            .config
            .autojoin
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if !rooms.is_empty() {
            let split = rooms.len().min(MAX_AUTOJOIN);
            let (first, rest) = rooms.split_at(split);
            out.push(Command::Autojoin(first.to_vec()).into());
            self.pending_joins = rest.to_vec();
        }
        out.push(
            Command::Rename {
                nick: self.config.nick.clone(),
                token,
            }
            .into(),
        );

        self.handshake = Handshake::AwaitingConfirmation;
        info!("Login assertion obtained, renaming to {}", self.config.nick);
        Ok(out)
    }

    fn handle_update_user(&mut self, name: &str, named: bool) -> Result<Dispatch, FatalError> {
        // The first updateuser is for the guest session
        if name != self.config.nick {
            debug!("Ignoring updateuser for {}", name);
            return Ok(Dispatch::Handled);
        }
        if !named {
            return Err(FatalError::StillGuest);
        }
        if self.handshake == Handshake::Complete {
            return Ok(Dispatch::Handled);
        }

        self.handshake = Handshake::Complete;
        info!("Logged in as {}", name);

        let mut out = Vec::new();
        if let Some(avatar) = self.config.avatar.as_ref().filter(|a| !a.is_empty()) {
            out.push(Command::Avatar(avatar.clone()).into());
        }
        out.extend(
            self.pending_joins
                .drain(..)
                .map(|room| String::from(Command::Join(room))),
        );

        if out.is_empty() {
            Ok(Dispatch::Handled)
        } else {
            Ok(Dispatch::Send(out))
        }
    }

    fn handle_name_taken(&mut self, name: &str, reason: &str) -> Result<Dispatch, FatalError> {
        if reason.contains("inappropriate") {
            return Err(FatalError::ForceRenamed {
                nick: self.config.nick.clone(),
            });
        }
        warn!("NAMETAKEN: {} ({})", name, reason);
        Ok(Dispatch::Handled)
    }
}
