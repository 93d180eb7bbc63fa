//! Chat Relay - Entry Point
//!
//! `serve` starts the relay; `connect` runs a terminal client.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatSession, Cli, ClientConfig, Command, Relay, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(config) => serve(config).await,
        Command::Connect(config) => connect(config).await,
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let relay = Relay::bind(config.clone()).await?;
    info!(
        "Chat relay listening on {} ({:?} format)",
        relay.local_addr()?,
        config.format
    );

    relay.run().await?;
    Ok(())
}

async fn connect(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let room = config.room_name();
    let mut session =
        ChatSession::register(config.server, &config.username, &room, config.format).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = session.next_event() => match event? {
                Some(incoming) if incoming.is_presence() => println!("*** {}", incoming.render()),
                Some(incoming) => println!("{}", incoming.render()),
                None => {
                    println!("*** connection closed by server");
                    return Ok(());
                }
            },
            line = stdin.next_line() => match line? {
                Some(text) if text.trim() == "/quit" => break,
                Some(text) if text.is_empty() => {}
                Some(text) => session.send_chat(&text).await?,
                None => break,
            },
        }
    }

    session.disconnect().await?;
    println!("*** left room {}", room);
    Ok(())
}
