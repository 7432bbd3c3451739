//! Pokemon Showdown Protocol Client Library
//!
//! A persistent WebSocket client for the pipe-delimited Showdown chat
//! protocol, built with tokio-tungstenite using the Actor pattern.
//!
//! # Features
//! - Connect and reconnect-on-failure at a fixed interval
//! - Framing of multi-line payloads into `(roomid, line)` pairs
//! - Login handshake against the HTTP login server
//! - Autojoin of configured rooms (eleven at once, the rest individually)
//! - Throttled, strictly ordered outbound queue
//! - Forwarding of all other protocol lines to a [`MessageSink`]
//!
//! # Architecture
//! A single [`Client`] actor owns the socket and processes socket
//! payloads, [`ClientHandle`] commands, login completions and timers
//! one at a time. Per-socket state lives in a [`Connection`] that is
//! rebuilt on every reconnect.
//!
//! # Example
//! ```ignore
//! use showdown_client::{Client, Config, RoomId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::new("MyBot");
//!     let (client, handle) = Client::new(
//!         config,
//!         |room: &RoomId, message_type: &str, fields: &[String]| {
//!             println!("{room} {message_type} {fields:?}");
//!         },
//!         |room: &RoomId, body: &str| println!("{room}: {body}"),
//!     );
//!
//!     tokio::spawn(async move {
//!         let _ = handle.send("|/join techcode").await;
//!     });
//!
//!     if let Err(e) = client.run().await {
//!         eprintln!("{e}");
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod framer;
pub mod handler;
pub mod login;
pub mod message;
pub mod queue;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ClientCommand, ClientHandle, ConnectionState};
pub use config::Config;
pub use connection::Connection;
pub use error::{AppError, FatalError, SendError};
pub use framer::{frame_payload, Frame};
pub use handler::{Dispatch, ProtocolHandler};
pub use login::{LoginClient, LoginRequest};
pub use message::{Command, ParsedLine, ServerMessage};
pub use queue::SendQueue;
pub use sink::{MessageSink, PageSink};
pub use types::{to_user_id, ConnectionId, RoomId};
