mod logging;
mod render;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use chat_client::ChatClient;
use chat_core::{Config, Message};
use chat_state::{ChatSession, Settlement};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "chat-cli")]
#[command(about = "Terminal client for the streaming chat service")]
#[command(version)]
struct Cli {
    /// Base URL of the chat service (overrides config.toml)
    #[arg(long, env = "CHAT_API_URL")]
    api_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat
    Chat,
    /// Stream the reply to a single message
    Stream {
        /// Message content
        message: String,
    },
    /// Send a single message and wait for the whole reply
    Ask {
        /// Message content
        message: String,
    },
    /// Check service health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    logging::init_logging(cli.debug || config.debug);

    let client = Arc::new(ChatClient::from_config(&config).context("Failed to build HTTP client")?);
    log::debug!("Using chat service at {}", client.api_url());

    match cli.command {
        Commands::Chat => run_interactive_chat(client, &config).await,
        Commands::Stream { message } => stream_message(client, &message).await,
        Commands::Ask { message } => ask_message(&client, &message).await,
        Commands::Health => check_health(&client).await,
    }
}

async fn run_interactive_chat(client: Arc<ChatClient>, config: &Config) -> anyhow::Result<()> {
    let initial: Vec<Message> = config.greeting.iter().map(Message::assistant).collect();
    let session = ChatSession::with_transcript(client, initial);

    for message in session.messages() {
        render::print_message(&message);
    }
    println!(
        "{}",
        "Type a message. Ctrl-C cancels a reply, /exit quits.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".cyan().bold());
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if input == "/exit" || input == "/quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        render::stream_reply(&session, input).await?;
    }

    log::debug!("Chat ended with {} messages", session.len());
    Ok(())
}

async fn stream_message(client: Arc<ChatClient>, message: &str) -> anyhow::Result<()> {
    let session = ChatSession::new(client);
    match render::stream_reply(&session, message).await? {
        Settlement::Failed(reason) => anyhow::bail!("Reply failed: {reason}"),
        Settlement::Completed | Settlement::Cancelled => Ok(()),
    }
}

async fn ask_message(client: &ChatClient, message: &str) -> anyhow::Result<()> {
    println!("{}", format!("Sending message: {}", message).cyan());

    let reply = client
        .complete(&[Message::user(message).to_wire()])
        .await
        .context("Chat request failed")?;

    println!("{} {}", "assistant>".green().bold(), reply);
    Ok(())
}

async fn check_health(client: &ChatClient) -> anyhow::Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("Health check against {} failed", client.health_url()))?;

    let status = if health.is_ok() {
        health.status.green()
    } else {
        health.status.red()
    };
    println!("Status:  {}", status);
    println!("Version: {}", health.version);
    if !health.model.is_null() {
        println!("Model:   {}", serde_json::to_string_pretty(&health.model)?);
    }
    Ok(())
}
