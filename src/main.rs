//! Line-based TCP Chat - Entry Point
//!
//! `server` binds the listener and accepts connections; `client` connects
//! and chats from the terminal.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tcp_chat::config::{Cli, Command};
use tcp_chat::{client, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_chat=trace
    // Logs go to stderr so the client's stdout carries only chat lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_chat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(config) => {
            let server = Server::bind(&config).await?;
            info!(
                "Chat server listening on {} ({:?} protocol)",
                server.local_addr()?,
                config.protocol
            );
            server.run_until_ctrl_c().await;
        }
        Command::Client(config) => client::run(config).await?,
    }

    Ok(())
}
