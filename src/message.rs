//! Message protocol definitions
//!
//! Pipe-delimited line protocol: inbound lines look like
//! `|type|field1|field2`, outbound commands like `|/cmd args`.

/// One protocol line split into its type and fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub message_type: String,
    pub fields: Vec<String>,
}

impl ParsedLine {
    /// Split a line on `|`, dropping the empty segment before the leading pipe.
    ///
    /// A line without any usable type is kept whole as a single field.
    pub fn parse(line: &str) -> Self {
        let mut segments = line.split('|').skip(1);
        match segments.next() {
            Some(message_type) if !message_type.is_empty() => Self {
                message_type: message_type.to_string(),
                fields: segments.map(str::to_string).collect(),
            },
            _ => Self {
                message_type: String::new(),
                fields: vec![line.to_string()],
            },
        }
    }
}

/// Server → Client message
///
/// The handful of types the protocol layer interprets itself; everything
/// else is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Login challenge, fields rejoined with `|`
    Challstr(String),
    /// `|updateuser|NAME|NAMED|...`
    UpdateUser { name: String, named: bool },
    /// `|nametaken|NAME|REASON`
    NameTaken { name: String, reason: String },
    /// Anything else, forwarded to collaborators
    Other(ParsedLine),
}

impl From<ParsedLine> for ServerMessage {
    fn from(line: ParsedLine) -> Self {
        match line.message_type.as_str() {
            "challstr" => ServerMessage::Challstr(line.fields.join("|")),
            "updateuser" => {
                let mut fields = line.fields.into_iter();
                let name = fields.next().unwrap_or_default();
                let named = fields.next().as_deref() == Some("1");
                ServerMessage::UpdateUser { name, named }
            }
            "nametaken" => {
                let mut fields = line.fields.into_iter();
                let name = fields.next().unwrap_or_default();
                let reason = fields.next().unwrap_or_default();
                ServerMessage::NameTaken { name, reason }
            }
            _ => ServerMessage::Other(line),
        }
    }
}

/// Client → Server command
///
/// Rendered to the wire with `to_string()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join up to eleven rooms at once
    Autojoin(Vec<String>),
    /// Finalize login with the assertion token
    Rename { nick: String, token: String },
    /// Set the avatar
    Avatar(String),
    /// Join one room
    Join(String),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Autojoin(rooms) => write!(f, "|/autojoin {}", rooms.join(",")),
            Command::Rename { nick, token } => write!(f, "|/trn {},0,{}", nick, token),
            Command::Avatar(avatar) => write!(f, "|/avatar {}", avatar),
            Command::Join(room) => write!(f, "|/join {}", room),
        }
    }
}

impl From<Command> for String {
    fn from(cmd: Command) -> Self {
        cmd.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_line() {
        let parsed = ParsedLine::parse("|a|b|c");
        assert_eq!(parsed.message_type, "a");
        assert_eq!(parsed.fields, vec!["b", "c"]);
    }

    #[test]
    fn test_parse_line_without_pipe() {
        let parsed = ParsedLine::parse("just some text");
        assert_eq!(parsed.message_type, "");
        assert_eq!(parsed.fields, vec!["just some text"]);
    }

    #[test]
    fn test_parse_keeps_empty_fields() {
        let parsed = ParsedLine::parse("|c|~Zarel||hi");
        assert_eq!(parsed.message_type, "c");
        assert_eq!(parsed.fields, vec!["~Zarel", "", "hi"]);
    }

    #[test]
    fn test_parse_empty_type_is_opaque() {
        let parsed = ParsedLine::parse("||raw text");
        assert_eq!(parsed.message_type, "");
        assert_eq!(parsed.fields, vec!["||raw text"]);
    }

    #[test]
    fn test_challstr_rejoins_fields() {
        let msg = ServerMessage::from(ParsedLine::parse("|challstr|4|abcdef"));
        assert_eq!(msg, ServerMessage::Challstr("4|abcdef".to_string()));
    }

    #[test]
    fn test_updateuser_named_flag() {
        let msg = ServerMessage::from(ParsedLine::parse("|updateuser|Bot|1|1|{}"));
        assert_eq!(
            msg,
            ServerMessage::UpdateUser {
                name: "Bot".to_string(),
                named: true
            }
        );

        let msg = ServerMessage::from(ParsedLine::parse("|updateuser|Guest 123|0|1"));
        assert!(matches!(msg, ServerMessage::UpdateUser { named: false, .. }));
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let msg = ServerMessage::from(ParsedLine::parse("|c:|1700000000|+Bot|hello"));
        match msg {
            ServerMessage::Other(line) => {
                assert_eq!(line.message_type, "c:");
                assert_eq!(line.fields, vec!["1700000000", "+Bot", "hello"]);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_command_rendering() {
        let rooms = vec!["lobby".to_string(), "help".to_string()];
        assert_eq!(Command::Autojoin(rooms).to_string(), "|/autojoin lobby,help");
        assert_eq!(
            Command::Rename {
                nick: "Bot".to_string(),
                token: "tok".to_string()
            }
            .to_string(),
            "|/trn Bot,0,tok"
        );
        assert_eq!(Command::Avatar("167".to_string()).to_string(), "|/avatar 167");
        assert_eq!(Command::Join("help".to_string()).to_string(), "|/join help");
    }
}
