//! Client actor implementation
//!
//! Owns the socket and drives everything from one event loop: inbound
//! payloads, outbound commands from [`ClientHandle`]s, login completions,
//! throttle wake-ups and the reconnect delay. Nothing here runs
//! concurrently for the same connection.
//!
//! Reconnect policy: when a reconnect interval is configured, the client
//! retries forever at that fixed interval, with no backoff growth. A
//! deliberate [`ClientHandle::disconnect`] suppresses any reconnect,
//! including one already waiting to fire.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{AppError, FatalError, SendError};
use crate::login::{LoginClient, LoginRequest};
use crate::sink::{MessageSink, PageSink};
use crate::types::{ConnectionId, RoomId};

/// Channel buffer size for client commands
const CHANNEL_BUFFER_SIZE: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Commands sent to the client actor
#[derive(Debug)]
pub enum ClientCommand {
    /// Send messages in order
    Send(Vec<String>),
    /// Close deliberately and do not reconnect
    Disconnect,
    /// Login server answered
    LoginResponse {
        connection: ConnectionId,
        challstr: String,
        body: String,
    },
}

/// Lifecycle of the client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// How a session ended
enum SessionEnd {
    /// The server or transport closed the socket
    Dropped,
    /// The operator asked to disconnect
    Deliberate,
}

/// Cloneable handle for talking to a running [`Client`]
#[derive(Debug, Clone)]
pub struct ClientHandle {
    sender: mpsc::Sender<ClientCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ClientHandle {
    /// Send one raw message
    ///
    /// Dropped (with a debug log) if the client is not connected.
    pub async fn send(&self, data: impl Into<String>) -> Result<(), SendError> {
        self.command(ClientCommand::Send(vec![data.into()])).await
    }

    /// Send several raw messages, preserving their order
    pub async fn send_batch<I, S>(&self, batch: I) -> Result<(), SendError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let batch = batch.into_iter().map(Into::into).collect();
        self.command(ClientCommand::Send(batch)).await
    }

    /// Send chat text to a room as `roomid|text`
    pub async fn send_to_room(&self, room: &RoomId, text: &str) -> Result<(), SendError> {
        self.send(format!("{}|{}", room, text)).await
    }

    /// Close the connection and suppress reconnects
    pub async fn disconnect(&self) -> Result<(), SendError> {
        self.command(ClientCommand::Disconnect).await
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `target`
    pub async fn wait_for_state(&mut self, target: ConnectionState) -> Result<(), SendError> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| SendError::ClientStopped)
    }

    async fn command(&self, cmd: ClientCommand) -> Result<(), SendError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SendError::ClientStopped)
    }
}

/// The client actor
///
/// Create with [`Client::new`], then drive it with [`Client::run`].
pub struct Client {
    config: Arc<Config>,
    messages: Box<dyn MessageSink>,
    pages: Box<dyn PageSink>,
    login: LoginClient,
    /// Command receiver channel
    receiver: mpsc::Receiver<ClientCommand>,
    /// Kept for login tasks to report back on
    sender: mpsc::Sender<ClientCommand>,
    state: watch::Sender<ConnectionState>,
    /// Operator asked for a deliberate close
    closed: bool,
}

impl Client {
    /// Create a client and a handle to it
    pub fn new(
        config: Config,
        messages: impl MessageSink,
        pages: impl PageSink,
    ) -> (Self, ClientHandle) {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let login = LoginClient::new(config.login_url.clone(), config.login_timeout());

        let client = Self {
            config: Arc::new(config),
            messages: Box::new(messages),
            pages: Box::new(pages),
            login,
            receiver,
            sender: sender.clone(),
            state: state_tx,
            closed: false,
        };
        let handle = ClientHandle {
            sender,
            state: state_rx,
        };
        (client, handle)
    }

    /// Run the client until it is closed or hits a fatal protocol error
    ///
    /// Returns `Ok(())` after a deliberate disconnect or when the socket is
    /// lost with reconnect disabled.
    pub async fn run(mut self) -> Result<(), FatalError> {
        let url = self.config.websocket_url();

        loop {
            self.set_state(ConnectionState::Connecting);
            info!("Connecting to {}:{}...", self.config.server, self.config.port);

            match self.while_offline(connect_async(url.as_str())).await {
                Some(Ok((ws, _))) => {
                    info!("Connected!");
                    match self.run_session(ws).await {
                        Ok(SessionEnd::Dropped) => info!("Connection closed"),
                        Ok(SessionEnd::Deliberate) => info!("Disconnected"),
                        Err(e) => {
                            self.set_state(ConnectionState::Closed);
                            return Err(e);
                        }
                    }
                }
                Some(Err(e)) => warn!("Connection failed: {}", e),
                None => {}
            }

            if self.closed {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }
            self.set_state(ConnectionState::Disconnected);

            let Some(delay) = self.config.reconnect_delay() else {
                info!("Reconnect disabled, staying disconnected");
                return Ok(());
            };
            info!("Retrying in {} seconds...", delay.as_secs());
            if self.while_offline(sleep(delay)).await.is_none() {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }
        }
    }

    /// Await `fut` while no socket is open, answering commands meanwhile
    ///
    /// Returns `None` if a disconnect was requested before `fut` finished.
    async fn while_offline<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Some(output),
                Some(cmd) = self.receiver.recv() => match cmd {
                    ClientCommand::Send(batch) => {
                        debug!(
                            "Failed to send data: disconnected from the server ({} dropped)",
                            batch.len()
                        );
                    }
                    ClientCommand::LoginResponse { connection, .. } => {
                        debug!("Ignoring login response for closed connection {}", connection);
                    }
                    ClientCommand::Disconnect => {
                        self.closed = true;
                        return None;
                    }
                },
            }
        }
    }

    /// Drive one open socket until it closes
    async fn run_session(&mut self, ws: WsStream) -> Result<SessionEnd, FatalError> {
        let mut connection = Connection::new(self.config.clone());
        let (mut writer, mut reader) = ws.split();
        self.set_state(ConnectionState::Connected);
        debug!("Session {} started", connection.id);

        loop {
            let deadline = connection.queue.deadline();
            let wake = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                msg = reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let outcome = connection.on_payload(
                            text.as_str(),
                            &*self.messages,
                            &*self.pages,
                        )?;
                        for request in outcome.logins {
                            self.spawn_login(connection.id, request);
                        }
                        let ready = connection.enqueue(outcome.send, Instant::now());
                        transmit_all(&mut writer, ready).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Dropped),
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames carry no protocol lines
                    }
                    Some(Err(e)) => {
                        warn!("Error with connection: {}", e);
                        return Ok(SessionEnd::Dropped);
                    }
                },

                Some(cmd) = self.receiver.recv() => match cmd {
                    ClientCommand::Send(batch) => {
                        let ready = connection.enqueue(batch, Instant::now());
                        transmit_all(&mut writer, ready).await;
                    }
                    ClientCommand::Disconnect => {
                        self.closed = true;
                        if let Err(e) = writer.close().await {
                            debug!("Error closing socket: {}", e);
                        }
                        return Ok(SessionEnd::Deliberate);
                    }
                    ClientCommand::LoginResponse { connection: id, challstr, body } => {
                        if id != connection.id {
                            debug!("Ignoring login response for stale connection {}", id);
                            continue;
                        }
                        let out = connection.on_login_response(&challstr, &body)?;
                        let ready = connection.enqueue(out, Instant::now());
                        transmit_all(&mut writer, ready).await;
                    }
                },

                _ = sleep_until(wake), if deadline.is_some() => {
                    if let Some(data) = connection.queue.on_deadline(Instant::now()) {
                        transmit_all(&mut writer, vec![data]).await;
                    }
                }
            }
        }
    }

    /// Run the login round trip off the event loop
    ///
    /// The result comes back as a [`ClientCommand::LoginResponse`]. HTTP
    /// failures are logged and leave the handshake incomplete.
    fn spawn_login(&self, connection: ConnectionId, request: LoginRequest) {
        let login = self.login.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            match login.fetch(&request).await {
                Ok(body) => {
                    let response = ClientCommand::LoginResponse {
                        connection,
                        challstr: request.challstr,
                        body,
                    };
                    if sender.send(response).await.is_err() {
                        debug!("Client stopped before login completed");
                    }
                }
                Err(e) => error!("Error while logging in: {}", e),
            }
        });
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

async fn transmit_all(writer: &mut WsWriter, batch: Vec<String>) {
    for data in batch {
        if let Err(e) = transmit(writer, data).await {
            warn!("Failed to send data: {}", e);
        }
    }
}

async fn transmit(writer: &mut WsWriter, data: String) -> Result<(), AppError> {
    trace!("Sending: {}", data);
    writer.send(Message::Text(data.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_client(config: Config) -> (Client, ClientHandle) {
        Client::new(
            config,
            |_: &RoomId, _: &str, _: &[String]| {},
            |_: &RoomId, _: &str| {},
        )
    }

    #[tokio::test]
    async fn test_handle_starts_disconnected() {
        let (_client, handle) = quiet_client(Config::new("Bot"));
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_handle_errors_after_client_dropped() {
        let (client, handle) = quiet_client(Config::new("Bot"));
        drop(client);
        assert!(matches!(
            handle.send("|/cmd").await,
            Err(SendError::ClientStopped)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_without_reconnect_returns() {
        let mut config = Config::new("Bot");
        config.server = "127.0.0.1".to_string();
        // Reserved port, nothing listens there
        config.port = 1;
        let (client, handle) = quiet_client(config);

        client.run().await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_during_reconnect_wait_closes() {
        let mut config = Config::new("Bot");
        config.server = "127.0.0.1".to_string();
        config.port = 1;
        config.reconnect_time = Some(3600);
        let (client, handle) = quiet_client(config);

        let task = tokio::spawn(client.run());
        handle.send("dropped while offline").await.unwrap();
        handle.disconnect().await.unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(handle.state(), ConnectionState::Closed);
    }
}
