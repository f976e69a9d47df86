//! TCP chat relay
//!
//! Usage:
//!   cargo run -- server              # Run the relay on the default port
//!   cargo run -- server 9000        # Run the relay on a specific port
//!   cargo run -- client              # Connect to 127.0.0.1:8080
//!   cargo run -- client host:port    # Connect to a specific relay

use std::env;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use chat_relay::{
    ChatClient, ChatClientConfig, ChatServer, ClientEvent, Result, ServerConfig, ServerMessage,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "server" => {
            run_server(parse_port(&args)).await?;
        }
        "client" => {
            run_client(parse_server_addr(&args)).await?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!("chat-relay - TCP chat relay server and client");
    println!();
    println!("USAGE:");
    println!("    cargo run -- <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    server [port]        Start the relay server (default port: 8080)");
    println!("    client [host:port]   Connect to a relay (default: 127.0.0.1:8080)");
    println!("    help                 Show this help message");
    println!();
    println!("CLIENT COMMANDS:");
    println!("    /name <name>         Pick a display name");
    println!("    /quit                Leave the chat");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- server");
    println!("    cargo run -- server 9000");
    println!("    cargo run -- client 192.168.1.10:8080");
    println!("    RUST_LOG=debug cargo run -- server");
}

fn parse_port(args: &[String]) -> u16 {
    args.get(2).and_then(|s| s.parse().ok()).unwrap_or(8080)
}

fn parse_server_addr(args: &[String]) -> SocketAddr {
    args.get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "127.0.0.1:8080".parse().unwrap())
}

async fn run_server(port: u16) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        bind_addr: format!("0.0.0.0:{}", port).parse()?,
        ..ServerConfig::default()
    };

    let mut server = ChatServer::new(config);
    if let Err(e) = server.run_until_ctrl_c().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn run_client(server_addr: SocketAddr) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut client = ChatClient::new(ChatClientConfig {
        server_addr,
        ..ChatClientConfig::default()
    });
    let mut events = client.connect().await?;

    println!("Commands: /name <name> to pick a display name, /quit to leave.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ClientEvent::Connected) => {
                        println!("Connected to {}", server_addr);
                    }
                    Some(ClientEvent::Message(message)) => {
                        render_message(&message);
                    }
                    Some(ClientEvent::Error(e)) => {
                        eprintln!("!!! {}", e);
                    }
                    Some(ClientEvent::Disconnected(reason)) => {
                        println!("Disconnected: {}", reason);
                        break;
                    }
                    None => break,
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_input_line(&mut client, line.trim()).await? {
                            break;
                        }
                    }
                    Ok(None) => {
                        // stdin closed
                        client.close().await?;
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                client.close().await?;
                break;
            }
        }
    }

    Ok(())
}

/// Apply one line of user input; returns false once the user has quit
async fn handle_input_line(client: &mut ChatClient, line: &str) -> Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }

    if line == "/quit" || line == "quit" || line == "exit" {
        client.close().await?;
        return Ok(false);
    }

    if let Some(name) = line.strip_prefix("/name ") {
        client.set_name(name.trim()).await?;
        return Ok(true);
    }

    client.send_chat(line).await?;
    Ok(true)
}

/// Print one server message in the interactive format
fn render_message(message: &ServerMessage) {
    match message {
        ServerMessage::Chat { from, message, .. } => {
            println!("<{}> {}", from, message);
        }
        ServerMessage::SetNameResult {
            success, message, ..
        } => {
            if *success {
                println!("*** {}", message);
            } else {
                println!("!!! {}", message);
            }
        }
        ServerMessage::UserJoined { user, .. } => {
            println!("*** {} joined", user);
        }
        ServerMessage::UserLeft { user, .. } => {
            println!("*** {} left", user);
        }
        ServerMessage::Error { code, message } => {
            println!("!!! [{}] {}", code, message);
        }
    }
}
