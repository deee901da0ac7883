use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use client::{ChatClient, ChatMessage, ChatView, ClientConfig, ClientError, Sender};
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long the first connection attempt gets before the cli gives up
/// (unless reconnection keeps trying in the background).
const STARTUP_PROBE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not connect to {0}; is the peer running?")]
    ConnectFailed(String),
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "parlor-cli", about = "Interactive terminal chat client")]
struct Cli {
    /// Peer endpoint; `http(s)` URLs are upgraded to `ws(s)`.
    #[arg(long, env = "PARLOR_ENDPOINT", default_value = "http://127.0.0.1:1234")]
    endpoint: String,

    /// Bearer credential sent on the websocket handshake.
    #[arg(long, env = "PARLOR_TOKEN", default_value = "test")]
    token: String,

    /// Room to join once connected.
    #[arg(long, env = "PARLOR_ROOM")]
    room: Option<String>,

    /// Re-dial automatically after a failed or dropped connection.
    #[arg(long)]
    reconnect: bool,

    /// Seconds between reconnection attempts.
    #[arg(long, default_value_t = 3)]
    reconnect_delay: u64,

    /// Reconnection attempts before giving up.
    #[arg(long, default_value_t = 10)]
    reconnect_attempts: u32,
}

/// Renders chat lines and connection status to stdout.
struct ConsoleView;

impl ChatView for ConsoleView {
    fn on_connect(&self, connection_id: &str) {
        println!("* connected: {connection_id}");
    }

    fn on_disconnect(&self) {
        println!("* Disconnected");
    }

    fn on_message(&self, message: &ChatMessage) {
        match message.sender {
            Sender::Local => println!("me: {}", message.text),
            Sender::Remote => println!("peer: {}", message.text),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.endpoint.clone(), cli.token.clone())
        .with_reconnection(cli.reconnect)
        .with_reconnection_delay(Duration::from_secs(cli.reconnect_delay))
        .with_reconnection_attempts(cli.reconnect_attempts);

    let client = ChatClient::new(Arc::new(ConsoleView));
    client.initialize(config);

    // Give the handshake a moment; without reconnection a dead peer means
    // there is nothing this process can ever do.
    tokio::time::sleep(STARTUP_PROBE).await;
    if !client.is_connected() && !cli.reconnect {
        return Err(CliError::ConnectFailed(cli.endpoint));
    }

    if let Some(room) = &cli.room {
        client.join(room);
    }

    eprintln!("type to chat; \"exit\" quits, /connect /disconnect /join <room> /leave");

    run_repl(&client).await?;

    client.disconnect().await;
    Ok(())
}

/// Read stdin line by line until EOF or an exit word.
async fn run_repl(client: &ChatClient) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line == "/quit" {
            break;
        }

        if let Some(command) = line.strip_prefix('/') {
            run_command(client, command).await;
            continue;
        }

        if let Err(error) = client.send(line) {
            match error {
                ClientError::NotConnected => println!("Please connect first"),
                other => eprintln!("send failed: {other}"),
            }
        }
    }

    Ok(())
}

async fn run_command(client: &ChatClient, command: &str) {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "connect" => client.connect(),
        "disconnect" => client.disconnect().await,
        "leave" => client.leave(),
        "join" => {
            if rest.is_empty() {
                eprintln!("usage: /join <room>");
            } else {
                client.join(rest);
            }
        }
        other => eprintln!("unknown command: /{other}"),
    }
}
