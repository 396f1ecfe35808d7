use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use medifind_core::{exchange, image, ChatSession, Config, Reply};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod app;
mod cards;
mod handler;
mod tui;
mod ui;

use app::App;
use cards::ChatEntry;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "medifind")]
#[command(about = "Ask an AI about medicines for your symptoms, from the terminal")]
#[command(version)]
struct Cli {
    /// Gemini model to use (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log level filter, e.g. "debug" or "medifind_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the answer as plain text
    Ask {
        /// Symptoms or question
        #[arg(default_value = "")]
        text: String,
        /// Photo of a medicine or strip to attach
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
}

/// RUST_LOG wins, then the flag, then the config file
fn env_filter(cli_level: Option<&str>, config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or_else(|| config.log_level())))
}

/// Log to a daily file so output never lands on the TUI
fn init_file_logging(filter: EnvFilter) -> Result<WorkerGuard> {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("medifind")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "medifind.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
    Ok(guard)
}

fn init_stderr_logging(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = Some(model);
    }
    let filter = env_filter(cli.log_level.as_deref(), &config);

    match cli.command {
        Some(Commands::Ask { text, image }) => {
            init_stderr_logging(filter);
            ask(config, &text, image).await
        }
        None => {
            let _guard = init_file_logging(filter)?;
            run_tui(config).await
        }
    }
}

async fn run_tui(config: Config) -> Result<()> {
    info!(model = config.model(), "starting medifind");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

/// One-shot question: same request, classification and cards as the chat
async fn ask(config: Config, text: &str, image_path: Option<PathBuf>) -> Result<()> {
    let client = config
        .gemini_client()
        .ok_or_else(|| anyhow!("No Gemini API key. Set GEMINI_API_KEY or add gemini_api_key to the config file."))?;

    let mut session = ChatSession::new();
    if let Some(path) = image_path {
        let encoded = image::encode_file(&path).await?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        session.pending_mut().replace(label, encoded);
    }

    let dispatch = session.begin_send(text)?;
    let mut transcript = vec![ChatEntry::User {
        text: dispatch.text.clone(),
        image: dispatch.image_label.clone(),
    }];

    let outcome = exchange(&client, &dispatch.request).await;
    for reply in session.resolve(dispatch.id, outcome)? {
        transcript.push(match reply {
            Reply::Medicines(records) => ChatEntry::Medicines(records),
            Reply::Notice(notice) => ChatEntry::Notice(notice),
        });
    }

    let lines = cards::transcript_lines(&transcript, false, 0, 72);
    println!("{}", cards::plain_text(&lines));
    Ok(())
}
