//! Pokemon Showdown Protocol Client - Entry Point
//!
//! Connects, logs every forwarded message and page, relays stdin lines as
//! raw outbound messages and disconnects on Ctrl-C.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use showdown_client::{Client, ClientHandle, Config, RoomId};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let config = Config::parse();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to override, e.g. RUST_LOG=showdown_client=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!("showdown_client={}", config.log_level))
            }),
        )
        .init();

    if let Some(room) = &config.primary_room {
        info!("Primary room: {}", room);
    }

    let (client, handle) = Client::new(
        config,
        |room: &RoomId, message_type: &str, fields: &[String]| {
            info!("[{}] {} {:?}", room, message_type, fields);
        },
        |room: &RoomId, body: &str| {
            info!("[{}] page ({} bytes)", room, body.len());
        },
    );

    tokio::spawn(relay_stdin(handle.clone()));
    tokio::spawn(disconnect_on_ctrl_c(handle));

    if let Err(e) = client.run().await {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Client stopped");
}

/// Send every stdin line verbatim
async fn relay_stdin(handle: ClientHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if handle.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

async fn disconnect_on_ctrl_c(handle: ClientHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, disconnecting");
        let _ = handle.disconnect().await;
    }
}
