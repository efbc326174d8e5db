//! # Chat example
//!
//! Start a conversation from the CLI, or join one with a ticket, then type
//! lines to send them.
//!
//! ## Host a chat
//!
//! ```sh
//! cargo run --example chat host Elena Mateo
//! ```
//!
//! ## Join a chat
//!
//! ```sh
//! cargo run --example chat join <ticket> Mateo Elena
//! ```

use anyhow::Result;
use clap::Parser;
use kiwia::{ChatEvent, ChatMessage, ChatRoom, Config, DeliveryStatus, DocChatStore};
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Optional JSON config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Start a new chat document
    Host {
        /// Your username
        me: String,
        /// Who you are talking to
        other: String,
    },
    /// Join an existing chat document
    Join {
        /// The ticket printed by the host
        ticket: String,
        me: String,
        other: String,
    },
}

fn status_mark(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "…",
        DeliveryStatus::Sent => "✓",
        DeliveryStatus::Delivered => "✓✓",
        DeliveryStatus::Read => "✓✓ read",
    }
}

fn print_messages(me: &str, messages: &[ChatMessage]) {
    println!("\n-------------");
    for message in messages {
        if message.sender == me {
            println!("{:>40} {}", message.text, status_mark(message.status));
        } else {
            println!("{}: {}", message.sender, message.text);
        }
    }
    println!("-------------");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    let data_dir = tempfile::tempdir()?;
    let data_path = data_dir.path().to_path_buf();

    // --- Setup Store ---
    let (store, me, other) = match cli.command {
        Commands::Host { me, other } => {
            let store = DocChatStore::create(data_path).await?;
            println!("Chat hosted! Your ID: {}", store.id());
            println!("Ticket: {}", store.ticket());
            (store, me, other)
        }
        Commands::Join { ticket, me, other } => {
            let store = DocChatStore::join(data_path, &ticket).await?;
            println!("Joined chat! Your ID: {}", store.id());
            (store, me, other)
        }
    };

    let (room, mut events) =
        ChatRoom::open(Arc::new(store.clone()), &me, &other, config.chat_page_size).await?;
    println!("Chatting with {other} in room {}", room.key());

    // --- Event Loop ---
    let mut stdin = ReaderStream::new(tokio::io::stdin());

    loop {
        print!("> ");
        io::stdout().flush()?;

        tokio::select! {
            Some(Ok(input)) = futures::StreamExt::next(&mut stdin) => {
                let line = String::from_utf8(input.to_vec())?.trim().to_string();
                if line.is_empty() { continue; }
                if line == "quit" { break; }
                if let Err(e) = room.send(&line).await {
                    eprintln!("Failed to send: {e}");
                }
            }

            Some(event) = events.recv() => {
                let ChatEvent::Messages(messages) = event;
                print_messages(&me, &messages);
                // opening the chat counts as reading it
                for message in messages.iter().filter(|m| m.sender != me && m.status < DeliveryStatus::Read) {
                    if let Err(e) = room.mark_read(&message.id).await {
                        eprintln!("Failed to mark read: {e}");
                    }
                }
            }
            else => {
                break;
            }
        }
    }

    drop(room);
    store.shutdown().await?;
    Ok(())
}
