//! Command line configuration

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::handler::DEFAULT_MAX_LINE_LENGTH;
use crate::message::WireFormat;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:6666";

#[derive(Parser, Debug)]
#[command(name = "tcp_chat", version, about = "Line-based TCP broadcast chat")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server
    Server(ServerConfig),
    /// Connect to a server and chat from the terminal
    Client(ClientConfig),
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind. Use port 0 for an ephemeral port.
    #[arg(long, env = "TCP_CHAT_LISTEN", default_value = DEFAULT_ADDR)]
    pub listen: SocketAddr,

    /// Wire format for chat messages
    #[arg(long, env = "TCP_CHAT_PROTOCOL", value_parser = parse_wire_format, default_value = "legacy")]
    pub protocol: WireFormat,

    /// Longest accepted line in bytes; longer lines close the connection
    #[arg(long, env = "TCP_CHAT_MAX_LINE", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 6666)),
            protocol: WireFormat::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Address of the server to connect to
    #[arg(long, env = "TCP_CHAT_SERVER", default_value = DEFAULT_ADDR)]
    pub server: SocketAddr,

    /// Wire format the server speaks
    #[arg(long, env = "TCP_CHAT_PROTOCOL", value_parser = parse_wire_format, default_value = "legacy")]
    pub protocol: WireFormat,

    /// The server's line cap in bytes; broadcasts may exceed it by their envelope
    #[arg(long, env = "TCP_CHAT_MAX_LINE", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

/// Parse `--protocol`: `legacy` or `json`
fn parse_wire_format(name: &str) -> Result<WireFormat, String> {
    WireFormat::from_name(name)
        .ok_or_else(|| format!("unknown protocol '{}' (expected 'legacy' or 'json')", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let cli = Cli::try_parse_from(["tcp_chat", "server"]).unwrap();
        let Command::Server(config) = cli.command else {
            panic!("Wrong subcommand");
        };

        assert_eq!(config.listen.to_string(), DEFAULT_ADDR);
        assert_eq!(config.protocol, WireFormat::Legacy);
        assert_eq!(config.max_line_length, 8192);
    }

    #[test]
    fn test_client_overrides() {
        let cli = Cli::try_parse_from([
            "tcp_chat",
            "client",
            "--server",
            "10.0.0.5:7000",
            "--protocol",
            "json",
        ])
        .unwrap();
        let Command::Client(config) = cli.command else {
            panic!("Wrong subcommand");
        };

        assert_eq!(config.server.to_string(), "10.0.0.5:7000");
        assert_eq!(config.protocol, WireFormat::Json);
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let result = Cli::try_parse_from(["tcp_chat", "server", "--protocol", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_config_default_matches_cli() {
        assert_eq!(ServerConfig::default().listen.to_string(), DEFAULT_ADDR);
    }
}
