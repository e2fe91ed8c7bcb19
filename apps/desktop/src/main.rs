use std::sync::Arc;

use anyhow::{bail, Context, Result};
use api_client::HttpChatApi;
use chat_engine::{ChatConfig, ChatEvent, ChatSession, Sender};
use clap::Parser;
use shared::domain::{GameId, ParticipantId, SenderKind};
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    game_id: String,
    #[arg(long)]
    participant_id: String,
    #[arg(long)]
    name: String,
    /// Join as the game host instead of a player.
    #[arg(long, default_value_t = false)]
    host: bool,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(token) = args.token {
        settings.auth_token = token;
    }
    if settings.auth_token.is_empty() {
        bail!("no auth token configured; set CHAT_AUTH_TOKEN or pass --token");
    }

    let api = HttpChatApi::new(&settings.server_url, settings.auth_token.clone())
        .context("invalid server url")?;
    let kind = if args.host {
        SenderKind::Host
    } else {
        SenderKind::Player
    };
    let session = ChatSession::new(
        Arc::new(api),
        ChatConfig::new(
            GameId::new(args.game_id),
            Sender {
                id: ParticipantId::new(args.participant_id),
                kind,
                display_name: args.name,
            },
        ),
    );

    let mut events = session.subscribe_events();
    let printer = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    ChatEvent::LogUpdated => {
                        if let Some(row) = session.render_log().await.last() {
                            let pending = if row.pending { " (sending)" } else { "" };
                            match &row.sender {
                                Some(sender) => println!(
                                    "[{}] {}: {}{pending}",
                                    row.timestamp, sender.display_name, row.text
                                ),
                                None => println!("[{}] * {}", row.timestamp, row.text),
                            }
                        }
                    }
                    ChatEvent::NewMessageBadge { count } if count > 0 => {
                        println!("-- {count} new message(s) below --");
                    }
                    ChatEvent::ParticipantsUpdated => {
                        let names: Vec<String> = session
                            .participants()
                            .await
                            .into_iter()
                            .map(|p| {
                                let muted = if p.is_muted { " (muted)" } else { "" };
                                format!("{}{muted}", p.name)
                            })
                            .collect();
                        println!("-- participants: {} --", names.join(", "));
                    }
                    _ => {}
                }
            }
        })
    };

    session.start().await?;
    println!("joined; type a message, or /refresh, /mute <participant-id>, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if line == "/refresh" {
            session.manual_refresh().await;
            continue;
        }
        if let Some(target) = line.strip_prefix("/mute ") {
            if let Err(err) = session.toggle_mute(&ParticipantId::new(target.trim())).await {
                eprintln!("mute failed: {err}");
            }
            continue;
        }
        if let Err(err) = session.send(line).await {
            eprintln!("send failed: {err}");
        }
    }

    session.leave().await;
    printer.abort();
    Ok(())
}
