//! analyst-chat - interactive client for the analytics agent
//!
//! Each stdin line is a question; answers stream to stdout as they arrive.
//! Logs go to stderr as JSON.

use analyst_chat::{
    ChatTransport, ClientConfig, ConversationUpdate, HttpTransport, InMemorySessionStore, Role,
    SessionStore, StreamController, StreamStatus,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Controller = StreamController<Arc<HttpTransport>>;

enum Command {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analyst_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(base_url = %config.base_url, "Starting analyst chat");
    let transport = Arc::new(HttpTransport::new(&config)?);

    let health = transport.health().await;
    if health.ok {
        println!(
            "Connected to {} (GPT {})",
            config.base_url,
            if health.gpt_enabled { "enabled" } else { "disabled" }
        );
    } else {
        println!(
            "Server unavailable: {}",
            health.message.as_deref().unwrap_or("unknown error")
        );
    }

    let samples = transport.sample_queries().await;
    if !samples.is_empty() {
        println!("Try asking:");
        for sample in &samples {
            println!("  - {}", sample.text);
        }
    }
    println!("Commands: /stop, /new, /export, /quit");

    let sessions = InMemorySessionStore::new();
    let mut controller = StreamController::new(sessions.current_or_create(), Arc::clone(&transport));
    let mut updates = controller.subscribe();
    if config.greet_on_start {
        controller.greet();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Command::Quit = handle_line(&mut controller, &sessions, &config, line.trim()) {
                    break;
                }
            }

            more = controller.process_next() => {
                if !more {
                    break;
                }
            }

            update = updates.recv() => match update {
                Ok(update) => render(&update),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Display fell behind the conversation");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.cancel_active();
    Ok(())
}

fn handle_line(
    controller: &mut Controller,
    sessions: &InMemorySessionStore,
    config: &ClientConfig,
    line: &str,
) -> Command {
    match line {
        "" => {}
        "/quit" => return Command::Quit,
        "/stop" => {
            if controller.cancel_active().is_none() {
                println!("Nothing to stop");
            }
        }
        "/new" => {
            controller.reset(sessions.create_new());
            if config.greet_on_start {
                controller.greet();
            }
        }
        "/export" => {
            let table = controller
                .conversation()
                .panels()
                .iter()
                .rev()
                .find_map(|panel| panel.table());
            match table {
                Some(table) => println!("{}", table.to_csv()),
                None => println!("No table to export"),
            }
        }
        question => {
            controller.submit(question);
        }
    }
    Command::Continue
}

fn render(update: &ConversationUpdate) {
    match update {
        ConversationUpdate::MessageAppended {
            role: Role::Assistant,
            ..
        } => print!("\nassistant: "),
        ConversationUpdate::ContentAppended { text, .. } => print!("{text}"),
        ConversationUpdate::ThinkingStep { step, .. } => print!("\n  ({step})"),
        ConversationUpdate::PanelAdded { panel } => {
            let rows = panel.table().map_or(0, |t| t.rows.len());
            print!("\n  [{} panel, {rows} rows]", panel.kind().tool_name());
        }
        ConversationUpdate::QueryAdjusted { query } => print!("\n  (query: {query})"),
        ConversationUpdate::ProtocolError { message, .. } => {
            eprintln!("\n  skipped malformed event: {message}");
        }
        ConversationUpdate::StreamFinished { status, .. } => {
            if *status != StreamStatus::Failed {
                println!();
            }
        }
        ConversationUpdate::StreamFailed { message, .. } => {
            eprintln!("\nRequest failed: {message}");
        }
        ConversationUpdate::SessionReset { session_id } => {
            println!("\n-- new session {session_id} --");
        }
        ConversationUpdate::MessageAppended { .. } | ConversationUpdate::ThinkingDismissed => {}
    }
    let _ = std::io::stdout().flush();
}
