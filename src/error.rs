//! Error types for the protocol client
//!
//! Defines recoverable transport errors, fatal protocol errors and
//! handle send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Recoverable application errors
///
/// Transport and login-exchange failures. These are logged and the
/// reconnect policy decides what happens next.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP error while talking to the login server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Form encoding error for login parameters
    #[error("URL encoding error: {0}")]
    UrlEncode(#[from] serde_urlencoded::ser::Error),
}

/// Unrecoverable protocol errors
///
/// Surfaced to the owning process, which decides whether to exit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Login server answered `;`
    #[error(
        "LOGIN FAILED - The name {nick} is registered and {} password was provided",
        password_phrase(.password_provided)
    )]
    CredentialRejected {
        nick: String,
        password_provided: bool,
    },

    /// Login server answered with a short diagnostic instead of an assertion
    #[error("LOGIN FAILED - {0}")]
    LoginServerError(String),

    /// Login server is shedding load
    #[error("LOGIN FAILED - The login server is experiencing heavy load and cannot accommodate the connection right now")]
    LoginServerOverloaded,

    /// Structured login response reported failure
    #[error("Unable to login; the request was unsuccessful: {0}")]
    LoginUnsuccessful(String),

    /// `updateuser` confirmed our name but we are still a guest
    #[error("UPDATEUSER - failed to log in, still a guest")]
    StillGuest,

    /// Global staff forced a rename
    #[error("FORCE-RENAMED - A global staff member considered this username ({nick}) inappropriate. Please rename to something more appropriate")]
    ForceRenamed { nick: String },
}

fn password_phrase(provided: &bool) -> &'static str {
    if *provided {
        "an invalid"
    } else {
        "no"
    }
}

/// Handle send errors
///
/// Occurs when the client actor has stopped and its channel is closed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Client stopped")]
    ClientStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejected_message() {
        let err = FatalError::CredentialRejected {
            nick: "Bot".to_string(),
            password_provided: false,
        };
        assert!(err.to_string().contains("registered and no password"));

        let err = FatalError::CredentialRejected {
            nick: "Bot".to_string(),
            password_provided: true,
        };
        assert!(err.to_string().contains("an invalid password"));
    }
}
