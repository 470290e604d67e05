//! Terminal chat client
//!
//! Connects to an im_server, claims a name, then relays stdin lines to the
//! server and prints whatever the server sends.

use std::io::Write;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use im_server::client::{hang_up, rename_target, ClientInput, ClientState, HELP};
use im_server::config::{DEFAULT_IP, DEFAULT_PORT};

/// Terminal client for the line-delimited chat server
#[derive(Debug, Parser)]
#[command(name = "im_client", version, about)]
struct ClientArgs {
    /// Server IP address
    #[arg(long, default_value = DEFAULT_IP)]
    ip: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Your username
    #[arg(long, default_value = "bacon")]
    name: String,
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr = format!("{}:{}", args.ip, args.port);
    println!("Connecting to IM server at {}...", addr);
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected to IM server!");
    println!("{}", HELP);
    println!();

    let (read, write) = stream.into_split();
    let mut server_lines = FramedRead::new(read, LinesCodec::new());
    let mut sink = FramedWrite::new(write, LinesCodec::new());
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    let mut state = ClientState::new(args.name.clone());
    sink.send(format!("rename {}", args.name)).await?;
    prompt();

    loop {
        tokio::select! {
            incoming = server_lines.next() => match incoming {
                Some(Ok(line)) => {
                    if let Some(name) = state.process_server_line(&line) {
                        println!("\nName updated to: {}", name);
                    }
                    println!("\n{}", line);
                    prompt();
                }
                Some(Err(e)) => {
                    eprintln!("Error reading from server: {}", e);
                    break;
                }
                None => break,
            },
            input = stdin_lines.next_line() => {
                let Some(input) = input? else {
                    break;
                };
                match ClientInput::parse(&input) {
                    ClientInput::Empty => {}
                    ClientInput::Quit => break,
                    ClientInput::ShowName => println!("Current name: {}", state.current_name()),
                    ClientInput::Send(line) => {
                        if let Some(target) = rename_target(&line) {
                            println!("Attempting to rename to: {}", target);
                        }
                        if let Err(e) = sink.send(line).await {
                            eprintln!("Error sending message: {}", e);
                            break;
                        }
                    }
                }
                prompt();
            }
        }
    }

    debug!("Closing connection to {}", addr);
    if let Err(e) = hang_up(&mut sink).await {
        debug!("Error closing connection: {}", e);
    }
    println!("\nDisconnected from server. Goodbye!");
    Ok(())
}
